//! Visual 模式集成测试
//!
//! 对应源文件: src/normal.rs (handle_visual), src/editor.rs
//! 测试范围: 字符/行/块可视模式、选区操作符、块插入

use vimgolf_core::{create_initial_state, Engine};

fn run(text: &str, keys: &str) -> String {
    let engine = Engine::new();
    let state = create_initial_state(text);
    engine.execute_keystrokes(&state, keys).text()
}

// ==================== 字符可视 ====================

#[test]
fn test_visual_delete() {
    assert_eq!(run("hello", "vlld"), "lo\n");
}

#[test]
fn test_visual_delete_inclusive_both_ends() {
    assert_eq!(run("abc", "vd"), "bc\n");
}

#[test]
fn test_visual_yank() {
    let engine = Engine::new();
    let state = create_initial_state("hello world");
    let state = engine.execute_keystrokes(&state, "vey");
    assert_eq!(state.registers.get('"').unwrap().content, "hello");
    assert_eq!(state.text(), "hello world\n");
}

#[test]
fn test_visual_change() {
    assert_eq!(run("hello", "vllcab<Esc>"), "ablo\n");
}

#[test]
fn test_visual_swap_ends() {
    // o 把光标换到锚点一侧再扩展
    assert_eq!(run("abcde", "llvlohd"), "ae\n");
}

#[test]
fn test_visual_across_lines() {
    assert_eq!(run("ab\ncd", "vjd"), "d\n");
}

#[test]
fn test_visual_uppercase() {
    assert_eq!(run("hello", "vlU"), "HEllo\n");
}

#[test]
fn test_visual_replace_char() {
    assert_eq!(run("abc", "vlrx"), "xxc\n");
}

#[test]
fn test_visual_paste_replaces_selection() {
    assert_eq!(run("foo bar", "yiwwviwp"), "foo foo\n");
}

#[test]
fn test_visual_object_selection() {
    assert_eq!(run("a (bc) d", "f(vi(d"), "a () d\n");
}

#[test]
fn test_visual_escape_keeps_buffer() {
    let engine = Engine::new();
    let state = create_initial_state("abc");
    let state = engine.execute_keystrokes(&state, "vll<Esc>");
    assert_eq!(state.mode, vimgolf_core::Mode::Normal);
    assert_eq!(state.text(), "abc\n");
}

// ==================== 行可视 ====================

#[test]
fn test_visual_line_delete() {
    assert_eq!(run("a\nb\nc", "Vjd"), "c\n");
}

#[test]
fn test_visual_line_yank_paste() {
    assert_eq!(run("a\nb", "Vyjp"), "a\nb\na\n");
}

#[test]
fn test_visual_line_indent() {
    assert_eq!(run("a\nb", "Vj>"), "  a\n  b\n");
}

#[test]
fn test_visual_line_join() {
    assert_eq!(run("a\nb\nc", "VjJ"), "a b\nc\n");
}

#[test]
fn test_visual_paragraph_selection() {
    assert_eq!(run("a\nb\n\nc", "vipd"), "\nc\n");
}

#[test]
fn test_visual_line_change() {
    assert_eq!(run("a\nb\nc", "Vcx<Esc>"), "x\nb\nc\n");
}

// ==================== 块可视 ====================

#[test]
fn test_block_insert() {
    assert_eq!(run("ab\nab", "<C-v>jI-<Esc>"), "-ab\n-ab\n");
}

#[test]
fn test_block_append() {
    assert_eq!(run("a\nabc", "<C-v>jA!<Esc>"), "a!\na!bc\n");
}

#[test]
fn test_block_delete() {
    assert_eq!(run("abc\nabc", "<C-v>jld"), "c\nc\n");
}

#[test]
fn test_block_change() {
    assert_eq!(run("abc\nabc", "<C-v>jcX<Esc>"), "Xbc\nXbc\n");
}

#[test]
fn test_block_yank() {
    let engine = Engine::new();
    let state = create_initial_state("abc\ndef");
    let state = engine.execute_keystrokes(&state, "<C-v>jly");
    assert_eq!(state.registers.get('"').unwrap().content, "ab\nde");
}

#[test]
fn test_block_replace_char() {
    assert_eq!(run("ab\nab", "<C-v>jrX"), "Xb\nXb\n");
}

// ==================== 可视模式的搜索扩展 ====================

#[test]
fn test_visual_extend_with_search() {
    assert_eq!(run("one two three", "v/three<CR>d"), "hree\n");
}
