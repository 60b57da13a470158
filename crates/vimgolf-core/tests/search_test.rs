//! Search 集成测试
//!
//! 对应源文件: src/search.rs
//! 测试范围: / ? n N * # 、回绕、大小写选项、字面回退

use vimgolf_core::{create_initial_state, create_initial_state_with_options, Engine, Options};

fn run(text: &str, keys: &str) -> String {
    let engine = Engine::new();
    let state = create_initial_state(text);
    engine.execute_keystrokes(&state, keys).text()
}

fn cursor_after(text: &str, keys: &str) -> (usize, usize) {
    let engine = Engine::new();
    let state = create_initial_state(text);
    engine.execute_keystrokes(&state, keys).cursor.position()
}

// ==================== 基本搜索 ====================

#[test]
fn test_search_forward() {
    assert_eq!(run("foo bar\nbaz", "/bar<CR>x"), "foo ar\nbaz\n");
}

#[test]
fn test_search_moves_across_lines() {
    assert_eq!(cursor_after("foo\nbar baz", "/baz<CR>"), (1, 4));
}

#[test]
fn test_search_next() {
    assert_eq!(run("a x a x", "/x<CR>nx"), "a x a \n");
}

#[test]
fn test_search_reverse_repeat() {
    assert_eq!(cursor_after("x a x a x", "/x<CR>nN"), (0, 4));
}

#[test]
fn test_search_backward() {
    assert_eq!(run("x a x a", "$?x<CR>x"), "x a  a\n");
}

#[test]
fn test_search_wraps_around() {
    assert_eq!(run("x a", "ll/x<CR>x"), " a\n");
}

#[test]
fn test_empty_pattern_repeats_last() {
    assert_eq!(cursor_after("x a x", "/x<CR>//<CR>"), (0, 0));
}

// ==================== 单词搜索 ====================

#[test]
fn test_star_searches_word_forward() {
    assert_eq!(run("foo bar foo", "*x"), "foo bar oo\n");
}

#[test]
fn test_star_respects_word_boundary() {
    // foobar 不是独立的 foo
    assert_eq!(cursor_after("foo foobar foo", "*"), (0, 11));
}

#[test]
fn test_hash_searches_backward() {
    assert_eq!(run("foo bar foo", "$#x"), "oo bar foo\n");
}

// ==================== 选项 ====================

#[test]
fn test_ignorecase() {
    let mut options = Options::default();
    options.ignorecase = true;
    let engine = Engine::new();
    let state = create_initial_state_with_options("bar FOO", options);
    let state = engine.execute_keystrokes(&state, "/foo<CR>x");
    assert_eq!(state.text(), "bar OO\n");
}

#[test]
fn test_smartcase_upper_pattern_is_sensitive() {
    let mut options = Options::default();
    options.ignorecase = true;
    options.smartcase = true;
    let engine = Engine::new();
    let state = create_initial_state_with_options("foo FOO", options);
    let state = engine.execute_keystrokes(&state, "/FOO<CR>x");
    assert_eq!(state.text(), "foo OO\n");
}

#[test]
fn test_nowrapscan() {
    let mut options = Options::default();
    options.wrapscan = false;
    let engine = Engine::new();
    let state = create_initial_state_with_options("x a", options);
    let state = engine.execute_keystrokes(&state, "ll/x<CR>");
    // 不回绕：光标原地不动
    assert_eq!(state.cursor.position(), (0, 2));
}

// ==================== 模式翻译与回退 ====================

#[test]
fn test_literal_fallback_for_invalid_pattern() {
    assert_eq!(run("a)b", "/)<CR>x"), "ab\n");
}

#[test]
fn test_magic_word_boundary_pattern() {
    assert_eq!(cursor_after("ff f", "/\\<f\\><CR>"), (0, 3));
}

#[test]
fn test_search_as_operator_motion() {
    assert_eq!(run("one two three", "d/three<CR>"), "three\n");
}
