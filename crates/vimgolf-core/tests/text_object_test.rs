//! Text Object 集成测试
//!
//! 对应源文件: src/text_object.rs
//! 测试范围: iw/aw、引号、括号、段落、句子、标签对象与操作符组合

use vimgolf_core::{create_initial_state, Engine};

fn run(text: &str, keys: &str) -> String {
    let engine = Engine::new();
    let state = create_initial_state(text);
    engine.execute_keystrokes(&state, keys).text()
}

// ==================== 单词对象 ====================

#[test]
fn test_delete_inner_word() {
    assert_eq!(run("foo bar baz", "wdiw"), "foo  baz\n");
}

#[test]
fn test_delete_around_word() {
    assert_eq!(run("foo bar baz", "wdaw"), "foo baz\n");
}

#[test]
fn test_around_word_at_line_end_takes_leading_space() {
    assert_eq!(run("foo bar", "wdaw"), "foo\n");
}

#[test]
fn test_inner_word_on_whitespace() {
    assert_eq!(run("a   b", "ldiw"), "ab\n");
}

#[test]
fn test_big_word_object() {
    assert_eq!(run("a b.c d", "wdiW"), "a  d\n");
}

#[test]
fn test_change_inner_word() {
    assert_eq!(run("foo bar", "ciwnew<Esc>"), "new bar\n");
}

// ==================== 引号对象 ====================

#[test]
fn test_change_inner_quote() {
    assert_eq!(run("say \"hi\" now", "ci\"yes<Esc>"), "say \"yes\" now\n");
}

#[test]
fn test_delete_inner_single_quote() {
    assert_eq!(run("'a' 'b'", "di'"), "'' 'b'\n");
}

#[test]
fn test_delete_around_quote_takes_trailing_space() {
    assert_eq!(run("x \"y\" z", "da\""), "x z\n");
}

#[test]
fn test_quote_from_before_pair() {
    assert_eq!(run("x = \"value\"", "di\""), "x = \"\"\n");
}

#[test]
fn test_backtick_object() {
    assert_eq!(run("a `code` b", "fcdi`"), "a `` b\n");
}

// ==================== 括号对象 ====================

#[test]
fn test_delete_inner_paren_nested() {
    assert_eq!(run("a(b(c)d)e", "5|di("), "a(b()d)e\n");
}

#[test]
fn test_delete_around_paren_nested_outer() {
    assert_eq!(run("a(b(c)d)e", "3|da("), "ae\n");
}

#[test]
fn test_delete_inner_brace_multiline_keeps_braces_lines() {
    assert_eq!(run("fn x() {\n    body\n}", "jdi{"), "fn x() {\n}\n");
}

#[test]
fn test_delete_around_brace_multiline() {
    assert_eq!(run("{\n a\n}", "jda{"), "");
}

#[test]
fn test_square_and_angle_brackets() {
    assert_eq!(run("a[b]c", "di["), "a[]c\n");
    assert_eq!(run("a<b>c", "di<"), "a<>c\n");
}

#[test]
fn test_bracket_object_from_delimiter() {
    assert_eq!(run("(abc)", "di("), "()\n");
    assert_eq!(run("(abc)", "$di("), "()\n");
}

// ==================== 段落对象 ====================

#[test]
fn test_delete_inner_paragraph() {
    assert_eq!(run("a\nb\n\nc", "dip"), "\nc\n");
}

#[test]
fn test_delete_around_paragraph_swallows_blanks() {
    assert_eq!(run("a\nb\n\nc", "dap"), "c\n");
}

#[test]
fn test_paragraph_object_is_linewise() {
    assert_eq!(run("a\nb\n\nc", "wyipP"), "a\nb\na\nb\n\nc\n");
}

// ==================== 句子对象 ====================

#[test]
fn test_delete_around_sentence() {
    assert_eq!(run("One. Two. Three.", "fTdas"), "One. Three.\n");
}

#[test]
fn test_delete_inner_sentence_keeps_trailing_space() {
    assert_eq!(run("One. Two. Three.", "fTdis"), "One.  Three.\n");
}

// ==================== 标签对象 ====================

#[test]
fn test_delete_inner_tag() {
    assert_eq!(run("<b>bold</b>", "fbdit"), "<b></b>\n");
}

#[test]
fn test_delete_around_tag() {
    assert_eq!(run("x<b>bold</b>y", "fbdat"), "xy\n");
}

#[test]
fn test_nested_tag_prefers_inner() {
    assert_eq!(run("<a><b>x</b></a>", "8|dit"), "<a><b></b></a>\n");
}

#[test]
fn test_tag_across_lines() {
    assert_eq!(run("<p>\nhello\n</p>", "jdit"), "<p></p>\n");
}

#[test]
fn test_change_inner_tag() {
    assert_eq!(run("<li>old</li>", "focitnew<Esc>"), "<li>new</li>\n");
}

#[test]
fn test_missing_object_is_noop() {
    assert_eq!(run("no quotes here", "di\""), "no quotes here\n");
    assert_eq!(run("plain", "dit"), "plain\n");
}
