use crate::buffer::Buffer;
use crate::cursor::Cursor;
use crate::options::Options;
use crate::search::{self, SearchDirection, SearchState};
use std::collections::HashMap;

/// 操作符作用范围
///
/// 字符范围：起点含、终点不含；整行范围：只看行号（含两端），列被忽略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub linewise: bool,
}

impl Span {
    pub fn charwise(start: (usize, usize), end: (usize, usize)) -> Self {
        Self {
            start_line: start.0,
            start_col: start.1,
            end_line: end.0,
            end_col: end.1,
            linewise: false,
        }
    }

    pub fn linewise(start_line: usize, end_line: usize) -> Self {
        let (start_line, end_line) = if start_line <= end_line {
            (start_line, end_line)
        } else {
            (end_line, start_line)
        };
        Self {
            start_line,
            start_col: 0,
            end_line,
            end_col: 0,
            linewise: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.linewise
            && self.start_line == self.end_line
            && self.start_col >= self.end_col
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    LineStart,
    FirstNonBlank,
    LineEnd,
    Column,
    WordForward { big: bool },
    WordBackward { big: bool },
    WordEnd { big: bool },
    /// G：无计数时到最后一行
    GoToLine,
    /// gg：无计数时到第一行
    GoToFirst,
    ScreenTop,
    ScreenMiddle,
    ScreenBottom,
    ParagraphForward,
    ParagraphBackward,
    SentenceForward,
    SentenceBackward,
    FindChar { ch: char, till: bool, backward: bool },
    MatchPair,
    Mark { ch: char, exact: bool },
    SearchRepeat { invert: bool },
    SearchPattern { pattern: String, backward: bool },
}

/// 单键动作解析（f/F/t/T、标记跳转等带参数的动作由调用方组装）
pub fn parse_motion_key(token: &str) -> Option<Motion> {
    match token {
        "h" | "<Left>" | "<BS>" => Some(Motion::Left),
        "l" | "<Right>" | " " => Some(Motion::Right),
        "k" | "<Up>" => Some(Motion::Up),
        "j" | "<Down>" => Some(Motion::Down),
        "0" => Some(Motion::LineStart),
        "^" => Some(Motion::FirstNonBlank),
        "$" => Some(Motion::LineEnd),
        "|" => Some(Motion::Column),
        "w" => Some(Motion::WordForward { big: false }),
        "W" => Some(Motion::WordForward { big: true }),
        "b" => Some(Motion::WordBackward { big: false }),
        "B" => Some(Motion::WordBackward { big: true }),
        "e" => Some(Motion::WordEnd { big: false }),
        "E" => Some(Motion::WordEnd { big: true }),
        "G" => Some(Motion::GoToLine),
        "H" => Some(Motion::ScreenTop),
        "M" => Some(Motion::ScreenMiddle),
        "L" => Some(Motion::ScreenBottom),
        "}" => Some(Motion::ParagraphForward),
        "{" => Some(Motion::ParagraphBackward),
        ")" => Some(Motion::SentenceForward),
        "(" => Some(Motion::SentenceBackward),
        "%" => Some(Motion::MatchPair),
        "n" => Some(Motion::SearchRepeat { invert: false }),
        "N" => Some(Motion::SearchRepeat { invert: true }),
        _ => None,
    }
}

pub fn is_linewise(motion: &Motion) -> bool {
    matches!(
        motion,
        Motion::Up
            | Motion::Down
            | Motion::GoToLine
            | Motion::GoToFirst
            | Motion::ScreenTop
            | Motion::ScreenMiddle
            | Motion::ScreenBottom
            | Motion::Mark { exact: false, .. }
    )
}

pub fn is_inclusive(motion: &Motion) -> bool {
    match motion {
        Motion::LineEnd | Motion::WordEnd { .. } | Motion::MatchPair => true,
        Motion::FindChar { backward, .. } => !backward,
        _ => false,
    }
}

pub struct MotionContext<'a> {
    pub buffer: &'a Buffer,
    pub cursor: Cursor,
    /// 0 表示未给出计数
    pub count: usize,
    pub marks: &'a HashMap<char, (usize, usize)>,
    pub search: &'a SearchState,
    pub options: &'a Options,
}

impl<'a> MotionContext<'a> {
    fn effective_count(&self) -> usize {
        self.count.max(1)
    }
}

/// 计算动作的目标位置
///
/// 返回的列可以等于行长（比如行尾单词之后），普通移动由调用方钳制；
/// 动作无法完成（标记不存在、找不到字符、无匹配）时返回 None。
pub fn target(motion: &Motion, ctx: &MotionContext) -> Option<(usize, usize)> {
    let buffer = ctx.buffer;
    let (line, col) = ctx.cursor.position();
    let count = ctx.effective_count();
    let max_line = buffer.len_lines().saturating_sub(1);

    match motion {
        Motion::Left => Some((line, col.saturating_sub(count))),
        Motion::Right => {
            // 目标可以停在行尾之后一格，dl 才能删到行尾字符；普通移动由调用方钳制
            let max_col = buffer.line_len(line);
            Some((line, (col + count).min(max_col)))
        }
        Motion::Up => Some((line.saturating_sub(count), col)),
        Motion::Down => Some(((line + count).min(max_line), col)),
        Motion::LineStart => Some((line, 0)),
        Motion::FirstNonBlank => Some((line, buffer.first_non_blank(line))),
        Motion::LineEnd => {
            let target_line = (line + count - 1).min(max_line);
            Some((target_line, buffer.line_len(target_line).saturating_sub(1)))
        }
        Motion::Column => {
            let max_col = buffer.line_len(line).saturating_sub(1);
            Some((line, count.saturating_sub(1).min(max_col)))
        }
        Motion::WordForward { big } => {
            let mut pos = (line, col);
            for _ in 0..count {
                pos = word_forward_once(buffer, pos, *big);
            }
            Some(pos)
        }
        Motion::WordBackward { big } => {
            let mut pos = (line, col);
            for _ in 0..count {
                pos = word_backward_once(buffer, pos, *big);
            }
            Some(pos)
        }
        Motion::WordEnd { big } => {
            let mut pos = (line, col);
            for _ in 0..count {
                pos = word_end_once(buffer, pos, *big);
            }
            Some(pos)
        }
        Motion::GoToLine => {
            let target_line = if ctx.count > 0 {
                (ctx.count - 1).min(max_line)
            } else {
                max_line
            };
            Some((target_line, buffer.first_non_blank(target_line)))
        }
        Motion::GoToFirst => {
            let target_line = if ctx.count > 0 {
                (ctx.count - 1).min(max_line)
            } else {
                0
            };
            Some((target_line, buffer.first_non_blank(target_line)))
        }
        Motion::ScreenTop => Some((0, buffer.first_non_blank(0))),
        Motion::ScreenMiddle => {
            let mid = max_line / 2;
            Some((mid, buffer.first_non_blank(mid)))
        }
        Motion::ScreenBottom => Some((max_line, buffer.first_non_blank(max_line))),
        Motion::ParagraphForward => {
            let mut pos = line;
            for _ in 0..count {
                pos = paragraph_forward_once(buffer, pos);
            }
            Some((pos, 0))
        }
        Motion::ParagraphBackward => {
            let mut pos = line;
            for _ in 0..count {
                pos = paragraph_backward_once(buffer, pos);
            }
            Some((pos, 0))
        }
        Motion::SentenceForward => {
            let mut pos = (line, col);
            for _ in 0..count {
                pos = sentence_forward_once(buffer, pos);
            }
            Some(pos)
        }
        Motion::SentenceBackward => {
            let mut pos = (line, col);
            for _ in 0..count {
                pos = sentence_backward_once(buffer, pos);
            }
            Some(pos)
        }
        Motion::FindChar { ch, till, backward } => {
            find_char_on_line(buffer, line, col, *ch, *till, *backward, count)
        }
        Motion::MatchPair => match_pair(buffer, line, col),
        Motion::Mark { ch, exact } => {
            let &(mark_line, mark_col) = ctx.marks.get(ch)?;
            let mark_line = mark_line.min(max_line);
            if *exact {
                Some((mark_line, mark_col.min(buffer.line_len(mark_line).saturating_sub(1))))
            } else {
                Some((mark_line, buffer.first_non_blank(mark_line)))
            }
        }
        Motion::SearchRepeat { invert } => {
            let mut pos = (line, col);
            for _ in 0..count {
                pos = ctx.search.next_match(pos, *invert, ctx.options.wrapscan)?;
            }
            Some(pos)
        }
        Motion::SearchPattern { pattern, backward } => {
            let direction = if *backward {
                SearchDirection::Backward
            } else {
                SearchDirection::Forward
            };
            let (_, hit) = search::perform_search(
                &buffer.lines(),
                pattern,
                line,
                col,
                direction,
                ctx.options,
            );
            hit
        }
    }
}

/// 动作 + 光标位置 -> 操作符作用范围
///
/// 排他动作应用 Vim 的行首修正：终点落在某行第 1 列时回退到上一行行尾，
/// 此时若起点在首个非空白之前则整个范围提升为整行。
pub fn compute_motion_range(motion: &Motion, ctx: &MotionContext) -> Option<Span> {
    let end = target(motion, ctx)?;
    let start = ctx.cursor.position();

    if is_linewise(motion) {
        return Some(Span::linewise(start.0, end.0));
    }

    let (mut s, mut e) = if start <= end { (start, end) } else { (end, start) };

    if is_inclusive(motion) {
        e.1 += 1;
    } else if e.0 > s.0 {
        // w 的最后一跳只隔着空白跨行时，作用范围止于词尾所在的那一行
        if matches!(motion, Motion::WordForward { .. })
            && e.1 > 0
            && ctx
                .buffer
                .line(e.0)
                .map(|l| l.chars().take(e.1).all(char::is_whitespace))
                .unwrap_or(false)
        {
            while e.0 > s.0 + 1
                && ctx
                    .buffer
                    .line(e.0 - 1)
                    .map(|l| l.trim().is_empty())
                    .unwrap_or(false)
            {
                e.0 -= 1;
            }
            e.1 = 0;
        }
        if e.1 == 0 {
            // 排他动作终点落在第 1 列时回退到上一行行尾；
            // 起点又在首个非空白之前则提升为整行（w 不提升，dw 留下空行）
            e.0 -= 1;
            e.1 = ctx.buffer.line_len(e.0);
            let promote = !matches!(motion, Motion::WordForward { .. });
            if promote && s.1 <= ctx.buffer.first_non_blank(s.0) && e.1 > 0 {
                return Some(Span::linewise(s.0, e.0));
            }
        }
    }

    Some(Span::charwise(s, e))
}

// ==================== 字符类与单词动作 ====================

/// 0 = 空白, 1 = 单词字符, 2 = 其他标点
fn char_class(c: char, big: bool) -> u8 {
    if c.is_whitespace() {
        0
    } else if big {
        1
    } else if c.is_alphanumeric() || c == '_' {
        1
    } else {
        2
    }
}

fn class_at(buffer: &Buffer, line: usize, col: usize, big: bool) -> u8 {
    buffer
        .char_at(line, col)
        .map(|c| char_class(c, big))
        .unwrap_or(0)
}

fn word_forward_once(buffer: &Buffer, (mut line, mut col): (usize, usize), big: bool) -> (usize, usize) {
    let max_line = buffer.len_lines().saturating_sub(1);
    let cls = class_at(buffer, line, col, big);

    // 跳过当前词段
    if cls != 0 {
        let len = buffer.line_len(line);
        while col < len && class_at(buffer, line, col, big) == cls {
            col += 1;
        }
    }

    // 跳过空白；空行是一个停靠点
    loop {
        let len = buffer.line_len(line);
        if col >= len {
            if line >= max_line {
                return (line, len);
            }
            line += 1;
            col = 0;
            if buffer.line_len(line) == 0 {
                return (line, 0);
            }
            continue;
        }
        if class_at(buffer, line, col, big) == 0 {
            col += 1;
            continue;
        }
        return (line, col);
    }
}

fn word_backward_once(buffer: &Buffer, (mut line, mut col): (usize, usize), big: bool) -> (usize, usize) {
    if line == 0 && col == 0 {
        return (0, 0);
    }

    // 先后退一格
    if col == 0 {
        line -= 1;
        col = buffer.line_len(line);
        if col == 0 {
            return (line, 0);
        }
        col -= 1;
    } else {
        col -= 1;
    }

    // 跳过空白
    loop {
        if buffer.line_len(line) == 0 {
            return (line, 0);
        }
        if class_at(buffer, line, col, big) != 0 {
            break;
        }
        if col == 0 {
            if line == 0 {
                return (0, 0);
            }
            line -= 1;
            let len = buffer.line_len(line);
            if len == 0 {
                return (line, 0);
            }
            col = len - 1;
        } else {
            col -= 1;
        }
    }

    // 回到词段开头
    let cls = class_at(buffer, line, col, big);
    while col > 0 && class_at(buffer, line, col - 1, big) == cls {
        col -= 1;
    }
    (line, col)
}

fn word_end_once(buffer: &Buffer, (mut line, mut col): (usize, usize), big: bool) -> (usize, usize) {
    let max_line = buffer.len_lines().saturating_sub(1);

    // 先前进一格
    col += 1;

    // 跳过空白（空行对 e 不是停靠点）
    loop {
        let len = buffer.line_len(line);
        if col >= len {
            if line >= max_line {
                return (line, len.saturating_sub(1));
            }
            line += 1;
            col = 0;
            continue;
        }
        if class_at(buffer, line, col, big) == 0 {
            col += 1;
            continue;
        }
        break;
    }

    // 走到词段末尾
    let cls = class_at(buffer, line, col, big);
    let len = buffer.line_len(line);
    while col + 1 < len && class_at(buffer, line, col + 1, big) == cls {
        col += 1;
    }
    (line, col)
}

// ==================== 段落与句子 ====================

fn is_blank_line(buffer: &Buffer, line: usize) -> bool {
    buffer.line_len(line) == 0
}

fn paragraph_forward_once(buffer: &Buffer, mut line: usize) -> usize {
    let max_line = buffer.len_lines().saturating_sub(1);
    // 跳出当前空白段
    while line < max_line && is_blank_line(buffer, line) {
        line += 1;
    }
    while line < max_line && !is_blank_line(buffer, line) {
        line += 1;
    }
    line
}

fn paragraph_backward_once(buffer: &Buffer, mut line: usize) -> usize {
    while line > 0 && is_blank_line(buffer, line) {
        line -= 1;
    }
    while line > 0 && !is_blank_line(buffer, line) {
        line -= 1;
    }
    line
}

fn is_sentence_end(chars: &[char], idx: usize) -> bool {
    if !matches!(chars.get(idx), Some('.' | '!' | '?')) {
        return false;
    }
    let mut next = idx + 1;
    while matches!(chars.get(next), Some(')' | ']' | '"' | '\'')) {
        next += 1;
    }
    match chars.get(next) {
        None => true,
        Some(c) => c.is_whitespace(),
    }
}

fn sentence_forward_once(buffer: &Buffer, (line, col): (usize, usize)) -> (usize, usize) {
    let max_line = buffer.len_lines().saturating_sub(1);
    let mut l = line;
    let mut c = col;
    let mut seen_end = false;
    loop {
        let chars: Vec<char> = buffer.line(l).unwrap_or_default().chars().collect();
        while c < chars.len() {
            if seen_end && !chars[c].is_whitespace() {
                return (l, c);
            }
            if is_sentence_end(&chars, c) {
                seen_end = true;
                // 跳过收尾的引号括号
                while c + 1 < chars.len()
                    && matches!(chars[c + 1], ')' | ']' | '"' | '\'')
                {
                    c += 1;
                }
            }
            c += 1;
        }
        if l >= max_line {
            return (l, chars.len().saturating_sub(1));
        }
        // 空行是句子边界
        l += 1;
        c = 0;
        if buffer.line_len(l) == 0 {
            return (l, 0);
        }
        if seen_end {
            let fnb = buffer.first_non_blank(l);
            return (l, fnb);
        }
    }
}

fn sentence_backward_once(buffer: &Buffer, (line, col): (usize, usize)) -> (usize, usize) {
    // 收集从缓冲区开头到光标的所有句子起点，取光标之前最近的一个
    let mut starts: Vec<(usize, usize)> = vec![(0, 0)];
    for l in 0..=line {
        let chars: Vec<char> = buffer.line(l).unwrap_or_default().chars().collect();
        if chars.is_empty() && l > 0 {
            starts.push((l, 0));
            continue;
        }
        let limit = if l == line { col.min(chars.len()) } else { chars.len() };
        let mut idx = 0;
        while idx < chars.len() {
            if is_sentence_end(&chars, idx) {
                let mut next = idx + 1;
                while next < chars.len()
                    && matches!(chars[next], ')' | ']' | '"' | '\'')
                {
                    next += 1;
                }
                while next < chars.len() && chars[next].is_whitespace() {
                    next += 1;
                }
                if next < chars.len() && (l < line || next < limit) {
                    starts.push((l, next));
                } else if next >= chars.len() && l + 1 <= line {
                    let fnb = buffer.first_non_blank(l + 1);
                    if (l + 1, fnb) < (line, col) {
                        starts.push((l + 1, fnb));
                    }
                }
            }
            idx += 1;
        }
    }
    starts
        .into_iter()
        .rev()
        .find(|&p| p < (line, col))
        .unwrap_or((0, 0))
}

// ==================== 行内查找与括号匹配 ====================

fn find_char_on_line(
    buffer: &Buffer,
    line: usize,
    col: usize,
    ch: char,
    till: bool,
    backward: bool,
    count: usize,
) -> Option<(usize, usize)> {
    let chars: Vec<char> = buffer.line(line)?.chars().collect();
    let mut remaining = count;
    if backward {
        let mut idx = col;
        while idx > 0 {
            idx -= 1;
            if chars.get(idx) == Some(&ch) {
                remaining -= 1;
                if remaining == 0 {
                    let target = if till { idx + 1 } else { idx };
                    return Some((line, target.min(chars.len().saturating_sub(1))));
                }
            }
        }
        None
    } else {
        let mut idx = col;
        while idx + 1 < chars.len() {
            idx += 1;
            if chars.get(idx) == Some(&ch) {
                remaining -= 1;
                if remaining == 0 {
                    let target = if till { idx.saturating_sub(1) } else { idx };
                    return Some((line, target));
                }
            }
        }
        None
    }
}

const PAIRS: [(char, char); 3] = [('(', ')'), ('[', ']'), ('{', '}')];

fn bracket_kind(c: char) -> Option<(usize, bool)> {
    for (i, (open, close)) in PAIRS.iter().enumerate() {
        if c == *open {
            return Some((i, true));
        }
        if c == *close {
            return Some((i, false));
        }
    }
    None
}

fn match_pair(buffer: &Buffer, line: usize, col: usize) -> Option<(usize, usize)> {
    // 光标处或其后第一个括号
    let chars: Vec<char> = buffer.line(line)?.chars().collect();
    let (start_col, kind, opening) = (col..chars.len())
        .find_map(|i| bracket_kind(chars[i]).map(|(k, o)| (i, k, o)))?;

    let (open, close) = PAIRS[kind];
    let mut depth = 0usize;
    if opening {
        let mut l = line;
        let mut c = start_col;
        loop {
            let cs: Vec<char> = buffer.line(l)?.chars().collect();
            while c < cs.len() {
                if cs[c] == open {
                    depth += 1;
                } else if cs[c] == close {
                    depth -= 1;
                    if depth == 0 {
                        return Some((l, c));
                    }
                }
                c += 1;
            }
            if l + 1 >= buffer.len_lines() {
                return None;
            }
            l += 1;
            c = 0;
        }
    } else {
        let mut l = line;
        let mut c = start_col as isize;
        loop {
            let cs: Vec<char> = buffer.line(l)?.chars().collect();
            while c >= 0 {
                let ch = cs[c as usize];
                if ch == close {
                    depth += 1;
                } else if ch == open {
                    depth -= 1;
                    if depth == 0 {
                        return Some((l, c as usize));
                    }
                }
                c -= 1;
            }
            if l == 0 {
                return None;
            }
            l -= 1;
            c = buffer.line_len(l) as isize - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts(text: &str) -> (Buffer, HashMap<char, (usize, usize)>, SearchState, Options) {
        (
            Buffer::from_text(text),
            HashMap::new(),
            SearchState::new(),
            Options::default(),
        )
    }

    fn run_target(text: &str, cursor: (usize, usize), count: usize, motion: Motion) -> Option<(usize, usize)> {
        let (buffer, marks, search, options) = ctx_parts(text);
        let ctx = MotionContext {
            buffer: &buffer,
            cursor: Cursor::new(cursor.0, cursor.1),
            count,
            marks: &marks,
            search: &search,
            options: &options,
        };
        target(&motion, &ctx)
    }

    #[test]
    fn test_word_forward() {
        assert_eq!(
            run_target("hello world", (0, 0), 0, Motion::WordForward { big: false }),
            Some((0, 6))
        );
    }

    #[test]
    fn test_word_forward_crosses_lines() {
        assert_eq!(
            run_target("one\ntwo", (0, 0), 0, Motion::WordForward { big: false }),
            Some((1, 0))
        );
    }

    #[test]
    fn test_word_forward_punctuation_is_a_word() {
        assert_eq!(
            run_target("foo.bar", (0, 0), 0, Motion::WordForward { big: false }),
            Some((0, 3))
        );
        assert_eq!(
            run_target("foo.bar", (0, 0), 0, Motion::WordForward { big: true }),
            Some((0, 7))
        );
    }

    #[test]
    fn test_word_end() {
        assert_eq!(
            run_target("hello world", (0, 0), 0, Motion::WordEnd { big: false }),
            Some((0, 4))
        );
        assert_eq!(
            run_target("hello world", (0, 4), 0, Motion::WordEnd { big: false }),
            Some((0, 10))
        );
    }

    #[test]
    fn test_word_backward() {
        assert_eq!(
            run_target("hello world", (0, 6), 0, Motion::WordBackward { big: false }),
            Some((0, 0))
        );
        assert_eq!(
            run_target("hello world", (0, 8), 0, Motion::WordBackward { big: false }),
            Some((0, 6))
        );
    }

    #[test]
    fn test_find_char() {
        assert_eq!(
            run_target(
                "abcabc",
                (0, 0),
                0,
                Motion::FindChar { ch: 'c', till: false, backward: false }
            ),
            Some((0, 2))
        );
        assert_eq!(
            run_target(
                "abcabc",
                (0, 0),
                2,
                Motion::FindChar { ch: 'c', till: false, backward: false }
            ),
            Some((0, 5))
        );
        assert_eq!(
            run_target(
                "abcabc",
                (0, 0),
                0,
                Motion::FindChar { ch: 'c', till: true, backward: false }
            ),
            Some((0, 1))
        );
    }

    #[test]
    fn test_match_pair() {
        assert_eq!(run_target("(abc)", (0, 0), 0, Motion::MatchPair), Some((0, 4)));
        assert_eq!(run_target("(abc)", (0, 4), 0, Motion::MatchPair), Some((0, 0)));
        // 光标在括号之前：用其后第一个括号
        assert_eq!(run_target("a(b)c", (0, 0), 0, Motion::MatchPair), Some((0, 3)));
    }

    #[test]
    fn test_match_pair_across_lines() {
        assert_eq!(
            run_target("{\n  body\n}", (0, 0), 0, Motion::MatchPair),
            Some((2, 0))
        );
    }

    #[test]
    fn test_paragraph_forward() {
        assert_eq!(
            run_target("a\nb\n\nc", (0, 0), 0, Motion::ParagraphForward),
            Some((2, 0))
        );
    }

    #[test]
    fn test_goto_line() {
        assert_eq!(run_target("a\nb\nc", (0, 0), 0, Motion::GoToLine), Some((2, 0)));
        assert_eq!(run_target("a\nb\nc", (0, 0), 2, Motion::GoToLine), Some((1, 0)));
    }

    #[test]
    fn test_dw_range_stops_at_line_end() {
        let (buffer, marks, search, options) = ctx_parts("foo\nbar");
        let ctx = MotionContext {
            buffer: &buffer,
            cursor: Cursor::new(0, 0),
            count: 0,
            marks: &marks,
            search: &search,
            options: &options,
        };
        // w 的目标在下一行，但 dw 只删到本行行尾
        let span = compute_motion_range(&Motion::WordForward { big: false }, &ctx).unwrap();
        assert_eq!(span, Span::charwise((0, 0), (0, 3)));
    }

    #[test]
    fn test_exclusive_end_of_line_rule() {
        let (buffer, marks, search, options) = ctx_parts("para one\npara one\n\nnext");
        let ctx = MotionContext {
            buffer: &buffer,
            cursor: Cursor::new(0, 0),
            count: 0,
            marks: &marks,
            search: &search,
            options: &options,
        };
        // d} 从行首开始且 } 落在第 1 列：提升为整行范围
        let span = compute_motion_range(&Motion::ParagraphForward, &ctx).unwrap();
        assert!(span.linewise);
        assert_eq!((span.start_line, span.end_line), (0, 1));
    }

    #[test]
    fn test_inclusive_motion_range() {
        let (buffer, marks, search, options) = ctx_parts("hello world");
        let ctx = MotionContext {
            buffer: &buffer,
            cursor: Cursor::new(0, 0),
            count: 0,
            marks: &marks,
            search: &search,
            options: &options,
        };
        let span = compute_motion_range(&Motion::WordEnd { big: false }, &ctx).unwrap();
        assert_eq!(span, Span::charwise((0, 0), (0, 5)));
    }
}
