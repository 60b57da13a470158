use crate::buffer::Buffer;
use crate::motion::Span;
use crate::text_object::ObjectScope;

/// 操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Delete,
    Change,
    Yank,
    Indent,
    Dedent,
    Reindent,
    Uppercase,
    Lowercase,
    ToggleCase,
    Format,
}

impl Operator {
    pub fn from_key(token: &str) -> Option<Operator> {
        match token {
            "d" => Some(Operator::Delete),
            "c" => Some(Operator::Change),
            "y" => Some(Operator::Yank),
            ">" => Some(Operator::Indent),
            "<" => Some(Operator::Dedent),
            "=" => Some(Operator::Reindent),
            _ => None,
        }
    }

    /// g 前缀操作符（gU/gu/g~/gq）
    pub fn from_g_key(token: &str) -> Option<Operator> {
        match token {
            "U" => Some(Operator::Uppercase),
            "u" => Some(Operator::Lowercase),
            "~" => Some(Operator::ToggleCase),
            "q" => Some(Operator::Format),
            _ => None,
        }
    }

    /// 双写快捷形式的第二个键（dd / yy / gUU ...）
    pub fn double_key(&self) -> &'static str {
        match self {
            Operator::Delete => "d",
            Operator::Change => "c",
            Operator::Yank => "y",
            Operator::Indent => ">",
            Operator::Dedent => "<",
            Operator::Reindent => "=",
            Operator::Uppercase => "U",
            Operator::Lowercase => "u",
            Operator::ToggleCase => "~",
            Operator::Format => "q",
        }
    }
}

/// 等待动作的操作符状态
///
/// 结构化表示，避免字符串拼接式的状态机。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperator {
    pub operator: Operator,
    /// 操作符前的计数（0 表示未给出）
    pub count: usize,
    pub register: Option<char>,
    /// 操作符之后出现的 g 前缀（dgg 等）
    pub g_prefix: bool,
    /// i / a 文本对象修饰
    pub scope: Option<ObjectScope>,
    /// f/F/t/T 等待目标字符：(till, backward)
    pub find: Option<(bool, bool)>,
    /// '/` 等待标记名：Some(exact)
    pub goto_mark: Option<bool>,
}

impl PendingOperator {
    pub fn new(operator: Operator, count: usize, register: Option<char>) -> Self {
        Self {
            operator,
            count,
            register,
            g_prefix: false,
            scope: None,
            find: None,
            goto_mark: None,
        }
    }
}

// ==================== 范围原语 ====================

fn line_chars(buffer: &Buffer, line: usize) -> Vec<char> {
    buffer.line(line).unwrap_or_default().chars().collect()
}

/// 读取范围文本；整行范围带结尾换行
pub fn span_text(buffer: &Buffer, span: &Span) -> String {
    let max_line = buffer.len_lines().saturating_sub(1);
    if span.linewise {
        let mut text = String::new();
        for line in span.start_line..=span.end_line.min(max_line) {
            text.push_str(&buffer.line(line).unwrap_or_default());
            text.push('\n');
        }
        return text;
    }
    if span.is_empty() {
        return String::new();
    }
    if span.start_line == span.end_line {
        let chars = line_chars(buffer, span.start_line);
        let end = span.end_col.min(chars.len());
        let start = span.start_col.min(end);
        return chars[start..end].iter().collect();
    }
    let mut text = String::new();
    let first = line_chars(buffer, span.start_line);
    text.extend(first[span.start_col.min(first.len())..].iter());
    for line in span.start_line + 1..span.end_line.min(max_line) {
        text.push('\n');
        text.push_str(&buffer.line(line).unwrap_or_default());
    }
    text.push('\n');
    let last = line_chars(buffer, span.end_line.min(max_line));
    text.extend(last[..span.end_col.min(last.len())].iter());
    text
}

/// 删除范围，返回 (删除的文本, 新光标位置)
pub fn delete_span(buffer: &mut Buffer, span: &Span) -> (String, (usize, usize)) {
    let max_line = buffer.len_lines().saturating_sub(1);
    if span.linewise {
        let start = span.start_line.min(max_line);
        let end = span.end_line.min(max_line);
        let mut removed = Vec::new();
        for _ in start..=end {
            match buffer.remove_line(start) {
                Some(line) => removed.push(line),
                None => break,
            }
        }
        let mut text = removed.join("\n");
        text.push('\n');
        let new_line = start.min(buffer.len_lines().saturating_sub(1));
        return (text, (new_line, buffer.first_non_blank(new_line)));
    }

    if span.is_empty() {
        return (String::new(), (span.start_line, span.start_col));
    }
    if span.start_line == span.end_line {
        let removed = buffer.remove_in_line(span.start_line, span.start_col, span.end_col);
        return (removed, (span.start_line, span.start_col));
    }

    let removed = span_text(buffer, span);
    let end_line = span.end_line.min(max_line);
    let first = line_chars(buffer, span.start_line);
    let last = line_chars(buffer, end_line);
    let mut joined: String = first[..span.start_col.min(first.len())].iter().collect();
    joined.extend(last[span.end_col.min(last.len())..].iter());
    buffer.set_line(span.start_line, &joined);
    for _ in span.start_line + 1..=end_line {
        buffer.remove_line(span.start_line + 1);
    }
    (removed, (span.start_line, span.start_col))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseKind {
    Upper,
    Lower,
    Toggle,
}

fn convert_case(text: &str, kind: CaseKind) -> String {
    text.chars()
        .map(|c| match kind {
            CaseKind::Upper => c.to_ascii_uppercase(),
            CaseKind::Lower => c.to_ascii_lowercase(),
            CaseKind::Toggle => {
                if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            }
        })
        .collect()
}

/// 大小写变换（gU/gu/g~ 与可视模式 U/u/~）
pub fn case_span(buffer: &mut Buffer, span: &Span, kind: CaseKind) {
    let max_line = buffer.len_lines().saturating_sub(1);
    if span.linewise {
        for line in span.start_line..=span.end_line.min(max_line) {
            if let Some(text) = buffer.line(line) {
                buffer.set_line(line, &convert_case(&text, kind));
            }
        }
        return;
    }
    if span.start_line == span.end_line {
        let chars = line_chars(buffer, span.start_line);
        let end = span.end_col.min(chars.len());
        let start = span.start_col.min(end);
        let mut text: String = chars[..start].iter().collect();
        text.push_str(&convert_case(&chars[start..end].iter().collect::<String>(), kind));
        text.extend(chars[end..].iter());
        buffer.set_line(span.start_line, &text);
        return;
    }
    for line in span.start_line..=span.end_line.min(max_line) {
        let chars = line_chars(buffer, line);
        let (start, end) = if line == span.start_line {
            (span.start_col.min(chars.len()), chars.len())
        } else if line == span.end_line {
            (0, span.end_col.min(chars.len()))
        } else {
            (0, chars.len())
        };
        let mut text: String = chars[..start].iter().collect();
        text.push_str(&convert_case(&chars[start..end].iter().collect::<String>(), kind));
        text.extend(chars[end..].iter());
        buffer.set_line(line, &text);
    }
}

/// 缩进/反缩进：作用于范围覆盖的整行
pub fn indent_span(buffer: &mut Buffer, span: &Span, dedent: bool, width: usize) {
    let max_line = buffer.len_lines().saturating_sub(1);
    for line in span.start_line..=span.end_line.min(max_line) {
        let Some(text) = buffer.line(line) else { continue };
        if dedent {
            let mut stripped = 0;
            let mut chars = text.chars();
            let mut rest = text.as_str();
            while stripped < width {
                match chars.next() {
                    Some(' ') => {
                        stripped += 1;
                        rest = &rest[1..];
                    }
                    Some('\t') => {
                        rest = &rest[1..];
                        break;
                    }
                    _ => break,
                }
            }
            buffer.set_line(line, &rest.to_string());
        } else if !text.is_empty() {
            let mut indented = " ".repeat(width);
            indented.push_str(&text);
            buffer.set_line(line, &indented);
        }
    }
}

/// gq 重排：覆盖行按段落贪心折行到 textwidth
pub fn format_span(buffer: &mut Buffer, span: &Span, textwidth: usize) {
    let max_line = buffer.len_lines().saturating_sub(1);
    let start = span.start_line.min(max_line);
    let end = span.end_line.min(max_line);
    let width = textwidth.max(1);

    let mut formatted: Vec<String> = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let flush = |formatted: &mut Vec<String>, words: &mut Vec<String>| {
        if words.is_empty() {
            return;
        }
        let mut line = String::new();
        for word in words.drain(..) {
            if line.is_empty() {
                line = word;
            } else if line.chars().count() + 1 + word.chars().count() <= width {
                line.push(' ');
                line.push_str(&word);
            } else {
                formatted.push(std::mem::take(&mut line));
                line = word;
            }
        }
        if !line.is_empty() {
            formatted.push(line);
        }
    };

    let mut all = buffer.lines();
    let covered: Vec<String> = all.drain(start..=end).collect();
    for text in &covered {
        if text.trim().is_empty() {
            flush(&mut formatted, &mut words);
            formatted.push(String::new());
        } else {
            words.extend(text.split_whitespace().map(String::from));
        }
    }
    flush(&mut formatted, &mut words);

    all.splice(start..start, formatted);
    buffer.set_lines(all);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_span_charwise_same_line() {
        let mut buffer = Buffer::from_text("hello world");
        let (removed, cursor) = delete_span(&mut buffer, &Span::charwise((0, 0), (0, 6)));
        assert_eq!(removed, "hello ");
        assert_eq!(buffer.line(0).unwrap(), "world");
        assert_eq!(cursor, (0, 0));
    }

    #[test]
    fn test_delete_span_charwise_multiline() {
        let mut buffer = Buffer::from_text("one two\nthree\nfour five");
        let (removed, _) = delete_span(&mut buffer, &Span::charwise((0, 4), (2, 5)));
        assert_eq!(removed, "two\nthree\nfour ");
        assert_eq!(buffer.to_text(), "one five\n");
    }

    #[test]
    fn test_delete_span_linewise() {
        let mut buffer = Buffer::from_text("a\nb\nc");
        let (removed, cursor) = delete_span(&mut buffer, &Span::linewise(0, 0));
        assert_eq!(removed, "a\n");
        assert_eq!(buffer.to_text(), "b\nc\n");
        assert_eq!(cursor, (0, 0));
    }

    #[test]
    fn test_delete_all_lines_leaves_empty_buffer() {
        let mut buffer = Buffer::from_text("a\nb");
        let (removed, cursor) = delete_span(&mut buffer, &Span::linewise(0, 1));
        assert_eq!(removed, "a\nb\n");
        assert_eq!(buffer.len_lines(), 1);
        assert_eq!(buffer.line(0).unwrap(), "");
        assert_eq!(cursor, (0, 0));
    }

    #[test]
    fn test_span_text_matches_delete() {
        let buffer = Buffer::from_text("one two\nthree");
        let span = Span::charwise((0, 4), (1, 3));
        assert_eq!(span_text(&buffer, &span), "two\nthr");
    }

    #[test]
    fn test_case_span() {
        let mut buffer = Buffer::from_text("hello World");
        case_span(&mut buffer, &Span::charwise((0, 0), (0, 5)), CaseKind::Upper);
        assert_eq!(buffer.line(0).unwrap(), "HELLO World");

        case_span(&mut buffer, &Span::linewise(0, 0), CaseKind::Toggle);
        assert_eq!(buffer.line(0).unwrap(), "hello wORLD");
    }

    #[test]
    fn test_indent_dedent() {
        let mut buffer = Buffer::from_text("one\ntwo");
        indent_span(&mut buffer, &Span::linewise(0, 1), false, 2);
        assert_eq!(buffer.lines(), vec!["  one", "  two"]);

        indent_span(&mut buffer, &Span::linewise(0, 0), true, 2);
        assert_eq!(buffer.lines(), vec!["one", "  two"]);
    }

    #[test]
    fn test_indent_skips_empty_lines() {
        let mut buffer = Buffer::from_text("a\n\nb");
        indent_span(&mut buffer, &Span::linewise(0, 2), false, 2);
        assert_eq!(buffer.lines(), vec!["  a", "", "  b"]);
    }

    #[test]
    fn test_format_span_wraps() {
        let mut buffer = Buffer::from_text("aaa bbb ccc ddd");
        format_span(&mut buffer, &Span::linewise(0, 0), 7);
        assert_eq!(buffer.lines(), vec!["aaa bbb", "ccc ddd"]);
    }
}
