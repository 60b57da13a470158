//! Motion 集成测试
//!
//! 对应源文件: src/motion.rs
//! 测试范围: 单词/行/查找/配对/段落/句子动作及其与操作符的组合

use vimgolf_core::{create_initial_state, Engine};

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

// ==================== 单词动作 ====================

#[test]
fn test_word_forward() {
    assert_eq!(cursor_after("hello world", "w"), (0, 6));
    assert_eq!(run("hello world", "wx"), "hello orld\n");
}

#[test]
fn test_word_forward_count() {
    assert_eq!(cursor_after("a b c d", "3w"), (0, 6));
}

#[test]
fn test_word_forward_across_lines() {
    assert_eq!(cursor_after("one\ntwo", "w"), (1, 0));
}

#[test]
fn test_word_end() {
    assert_eq!(run("hello world", "ex"), "hell world\n");
}

#[test]
fn test_word_backward() {
    assert_eq!(run("hello world", "wbx"), "ello world\n");
}

#[test]
fn test_big_word() {
    // W 把标点算进单词
    assert_eq!(cursor_after("a.b c", "W"), (0, 4));
    assert_eq!(cursor_after("a.b c", "w"), (0, 1));
}

// ==================== 行内动作 ====================

#[test]
fn test_line_start_and_end() {
    assert_eq!(run("hello", "$x"), "hell\n");
    assert_eq!(run("abc", "ll0x"), "bc\n");
}

#[test]
fn test_first_non_blank() {
    assert_eq!(run("  foo", "$^x"), "  oo\n");
}

#[test]
fn test_column_motion() {
    assert_eq!(run("abcdef", "4|x"), "abcef\n");
}

#[test]
fn test_preferred_column_preserved() {
    // 经过短行后 j 恢复到记忆列
    assert_eq!(cursor_after("abcdef\nx\nabcdef", "4|jj"), (2, 3));
}

// ==================== 行跳转 ====================

#[test]
fn test_goto_last_line() {
    assert_eq!(cursor_after("a\nb\nc", "G"), (2, 0));
    assert_eq!(cursor_after("a\nb\nc", "2G"), (1, 0));
}

#[test]
fn test_goto_first_line() {
    assert_eq!(cursor_after("a\nb\nc", "Ggg"), (0, 0));
    assert_eq!(cursor_after("a\nb\nc", "3gg"), (2, 0));
}

#[test]
fn test_screen_lines() {
    assert_eq!(cursor_after("a\nb\nc\nd\ne", "L"), (4, 0));
    assert_eq!(cursor_after("a\nb\nc\nd\ne", "LM"), (2, 0));
    assert_eq!(cursor_after("a\nb\nc\nd\ne", "LH"), (0, 0));
}

// ==================== 行内查找 ====================

#[test]
fn test_find_char() {
    assert_eq!(run("hello", "flx"), "helo\n");
}

#[test]
fn test_till_char() {
    assert_eq!(run("hello", "tlx"), "hllo\n");
}

#[test]
fn test_find_backward() {
    assert_eq!(run("hello", "$Fex"), "hllo\n");
}

#[test]
fn test_find_repeat() {
    assert_eq!(run("abcabc", "fc;x"), "abcab\n");
}

#[test]
fn test_find_repeat_reverse() {
    assert_eq!(run("abcabc", "fc;,x"), "ababc\n");
}

#[test]
fn test_find_missing_char_is_noop() {
    assert_eq!(cursor_after("hello", "fz"), (0, 0));
}

#[test]
fn test_delete_till() {
    assert_eq!(run("hello world", "dtw"), "world\n");
}

#[test]
fn test_delete_find_inclusive() {
    assert_eq!(run("hello world", "dfo"), " world\n");
}

// ==================== 括号配对 ====================

#[test]
fn test_match_pair() {
    assert_eq!(run("(abc)x", "%x"), "(abcx\n");
}

#[test]
fn test_match_pair_backward() {
    assert_eq!(run("(abc)", "$%x"), "abc)\n");
}

#[test]
fn test_delete_match_pair() {
    assert_eq!(run("x(abc)y", "d%"), "y\n");
}

// ==================== 段落与句子 ====================

#[test]
fn test_delete_paragraph_motion() {
    assert_eq!(run("a\nb\n\nc", "d}"), "\nc\n");
}

#[test]
fn test_paragraph_backward() {
    assert_eq!(cursor_after("a\nb\n\nc", "G{"), (2, 0));
}

#[test]
fn test_sentence_forward() {
    assert_eq!(run("One. Two. Three.", ")x"), "One. wo. Three.\n");
}

#[test]
fn test_sentence_backward() {
    assert_eq!(run("One. Two.", "$(x"), "One. wo.\n");
}

// ==================== 操作符组合 ====================

#[test]
fn test_multiplicative_counts() {
    assert_eq!(run("a b c d e f g", "2d3w"), "g\n");
}

#[test]
fn test_delete_to_line_start() {
    assert_eq!(run("hello", "lld0"), "llo\n");
}

#[test]
fn test_delete_down_is_linewise() {
    assert_eq!(run("a\nb\nc", "dj"), "c\n");
}

#[test]
fn test_delete_to_last_line() {
    assert_eq!(run("a\nb\nc", "jdG"), "a\n");
}

#[test]
fn test_delete_search_motion() {
    assert_eq!(run("hello world", "d/wor<CR>"), "world\n");
}

#[test]
fn test_delete_backward_motion_excludes_cursor() {
    assert_eq!(run("hello", "ldb"), "ello\n");
}

#[test]
fn test_delete_word_stops_before_indented_line() {
    // w 跨行只隔空白时 dw 不吃掉下一行的缩进
    assert_eq!(run("foo\n  bar", "dw"), "\n  bar\n");
}

#[test]
fn test_delete_right_at_line_end() {
    assert_eq!(run("abc", "$dl"), "ab\n");
}
