//! Ex 命令集成测试
//!
//! 对应源文件: src/ex.rs
//! 测试范围: 范围解析、substitute、global、move/copy/sort/put/normal/read、
//! 表达式求值与错误吸收

use vimgolf_core::{create_initial_state, Engine, ShellRunner};

fn run(text: &str, keys: &str) -> String {
    let engine = Engine::new();
    let state = create_initial_state(text);
    engine.execute_keystrokes(&state, keys).text()
}

// ==================== substitute ====================

#[test]
fn test_substitute_global_whole_file() {
    assert_eq!(run("aaa\nbab", ":%s/a/b/g<CR>"), "bbb\nbbb\n");
}

#[test]
fn test_substitute_first_match_only() {
    assert_eq!(run("aaa", ":s/a/b/<CR>"), "baa\n");
}

#[test]
fn test_substitute_line_range() {
    assert_eq!(run("a\na\na", ":2s/a/b/<CR>"), "a\nb\na\n");
}

#[test]
fn test_substitute_relative_range() {
    assert_eq!(run("a\na\na", ":.,+1s/a/b/<CR>"), "b\nb\na\n");
}

#[test]
fn test_substitute_custom_delimiter() {
    assert_eq!(run("a/b", ":s#/#-#<CR>"), "a-b\n");
}

#[test]
fn test_substitute_escaped_delimiter() {
    assert_eq!(run("a/b", ":s/\\//X/<CR>"), "aXb\n");
}

#[test]
fn test_substitute_whole_match_reference() {
    assert_eq!(run("hello world", ":s/world/[&]/<CR>"), "hello [world]\n");
}

#[test]
fn test_substitute_backreferences() {
    assert_eq!(run("ab", ":s/\\(a\\)\\(b\\)/\\2\\1/<CR>"), "ba\n");
}

#[test]
fn test_substitute_case_folds() {
    assert_eq!(run("hello", ":s/hello/\\U&/<CR>"), "HELLO\n");
    assert_eq!(run("hello", ":s/hello/\\u&/<CR>"), "Hello\n");
    assert_eq!(run("HELLO", ":s/HELLO/\\L&/<CR>"), "hello\n");
    assert_eq!(run("abc def", ":s/\\(abc\\) \\(def\\)/\\U\\1\\E \\2/<CR>"), "ABC def\n");
}

#[test]
fn test_substitute_expression_replacement() {
    assert_eq!(run("x", ":s/x/\\='y' . 'z'/<CR>"), "yz\n");
    assert_eq!(run("x\nx", ":%s/x/\\=line('.')/<CR>"), "1\n2\n");
}

#[test]
fn test_substitute_newline_in_replacement() {
    assert_eq!(run("ab", ":s/a/a\\r/<CR>"), "a\nb\n");
}

#[test]
fn test_substitute_multiline_pattern() {
    assert_eq!(run("a\nb", ":%s/a\\nb/X/<CR>"), "X\n");
}

#[test]
fn test_substitute_invalid_pattern_is_noop() {
    assert_eq!(run("foo", ":s/\\(/x/<CR>"), "foo\n");
}

#[test]
fn test_substitute_ignorecase_flag() {
    assert_eq!(run("FOO", ":s/foo/bar/i<CR>"), "bar\n");
}

#[test]
fn test_substitute_empty_pattern_reuses_search() {
    assert_eq!(run("abc abc", "/abc<CR>:s//X/g<CR>"), "X X\n");
}

#[test]
fn test_substitute_very_magic() {
    assert_eq!(run("aab", ":s/\\v(a+)b/[\\1]/<CR>"), "[aa]\n");
}

// ==================== global ====================

#[test]
fn test_global_delete() {
    assert_eq!(run("apple\nbanana\navocado", ":g/^a/d<CR>"), "banana\n");
}

#[test]
fn test_inverse_global_delete() {
    assert_eq!(run("apple\nbanana\navocado", ":v/^a/d<CR>"), "apple\navocado\n");
}

#[test]
fn test_global_bang_is_inverse() {
    assert_eq!(run("apple\nbanana\navocado", ":g!/^a/d<CR>"), "apple\navocado\n");
}

#[test]
fn test_global_move_to_top_reverses() {
    assert_eq!(run("a\nb\nc", ":g/^/m0<CR>"), "c\nb\na\n");
}

#[test]
fn test_global_substitute() {
    assert_eq!(run("a1\nb2\na3", ":g/^a/s/\\d/X/<CR>"), "aX\nb2\naX\n");
}

// ==================== move / copy / sort ====================

#[test]
fn test_move_line_to_top() {
    assert_eq!(run("a\nb", ":2m0<CR>"), "b\na\n");
}

#[test]
fn test_move_range_to_end() {
    assert_eq!(run("a\nb\nc", ":1,2m$<CR>"), "c\na\nb\n");
}

#[test]
fn test_copy_line() {
    assert_eq!(run("a\nb", ":1t$<CR>"), "a\nb\na\n");
    assert_eq!(run("a\nb", ":1t0<CR>"), "a\na\nb\n");
}

#[test]
fn test_sort_lines() {
    assert_eq!(run("b\nc\na", ":sort<CR>"), "a\nb\nc\n");
}

#[test]
fn test_sort_unique() {
    assert_eq!(run("b\na\nb", ":sort u<CR>"), "a\nb\n");
}

#[test]
fn test_sort_range_only() {
    assert_eq!(run("c\nb\nz\na", ":1,2sort<CR>"), "b\nc\nz\na\n");
}

// ==================== put / delete / goto ====================

#[test]
fn test_put_expression() {
    assert_eq!(run("x", ":put ='new'<CR>"), "x\nnew\n");
    assert_eq!(run("x", ":put =1+2<CR>"), "x\n3\n");
}

#[test]
fn test_put_expression_line_builtin() {
    assert_eq!(run("a\nb", ":put =line('$')<CR>"), "a\n2\nb\n");
}

#[test]
fn test_put_pi_stub() {
    assert_eq!(run("x", ":put =Pi()<CR>"), "x\n3.141592653589793\n");
}

#[test]
fn test_put_at_top() {
    assert_eq!(run("x", ":0put ='top'<CR>"), "top\nx\n");
}

#[test]
fn test_put_register() {
    assert_eq!(run("abc", "yy:put<CR>"), "abc\nabc\n");
}

#[test]
fn test_delete_range() {
    assert_eq!(run("a\nb\nc", ":1,2d<CR>"), "c\n");
}

#[test]
fn test_delete_with_marks_range() {
    assert_eq!(run("a\nb\nc", "Vj:'<,'>d<CR>"), "c\n");
}

// ==================== normal ====================

#[test]
fn test_normal_applies_keys_per_line() {
    assert_eq!(run("a\nb\nc", ":%normal A!<CR>"), "a!\nb!\nc!\n");
}

#[test]
fn test_normal_single_line() {
    assert_eq!(run("a\nb", ":normal x<CR>"), "\nb\n");
}

#[test]
fn test_normal_with_expression_register() {
    assert_eq!(run("x", ":normal A<C-R>=1+2<CR>"), "x3\n");
}

#[test]
fn test_normal_implicit_escape_ends_insert() {
    let engine = Engine::new();
    let state = create_initial_state("a");
    let state = engine.execute_keystrokes(&state, ":normal ix<CR>");
    assert_eq!(state.mode, vimgolf_core::Mode::Normal);
    assert_eq!(state.text(), "xa\n");
}

// ==================== read ====================

struct FakeShell;

impl ShellRunner for FakeShell {
    fn run(&self, command: &str) -> Option<String> {
        if command == "gen" {
            Some("hi\nthere".to_string())
        } else {
            None
        }
    }
}

#[test]
fn test_read_shell_command() {
    let engine = Engine::with_shell_runner(Box::new(FakeShell));
    let state = create_initial_state("x");
    let state = engine.execute_keystrokes(&state, ":r !gen<CR>");
    assert_eq!(state.text(), "x\nhi\nthere\n");
}

#[test]
fn test_read_without_runner_is_noop() {
    assert_eq!(run("x", ":r !gen<CR>"), "x\n");
}

// ==================== 错误吸收 ====================

#[test]
fn test_unknown_command_is_noop() {
    assert_eq!(run("abc", ":frobnicate<CR>"), "abc\n");
}

#[test]
fn test_command_cancel_with_escape() {
    // 逐字符进入命令行后取消
    let engine = Engine::new();
    let state = create_initial_state("abc");
    let state = engine.execute_keystroke(&state, ":");
    let state = engine.execute_keystroke(&state, "<Esc>");
    assert_eq!(state.mode, vimgolf_core::Mode::Normal);
    assert_eq!(state.text(), "abc\n");
}
