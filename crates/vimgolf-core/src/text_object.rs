use crate::buffer::Buffer;
use crate::motion::Span;

/// 文本对象（Text Objects）
///
/// `i`/`a` + 对象键 -> 范围，与操作符（d/y/c 等）配合使用。
/// 支持：单词 w/W、引号 " ' `、括号 ()b {}B [] <>、段落 p、句子 s、标签 t。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectScope {
    Inner,
    Around,
}

/// 解析对象范围；无法确定时返回 None（调用方按无操作处理）
pub fn object_range(
    buffer: &Buffer,
    cursor: (usize, usize),
    scope: ObjectScope,
    key: char,
) -> Option<Span> {
    match key {
        'w' => word_object(buffer, cursor, scope, false),
        'W' => word_object(buffer, cursor, scope, true),
        '"' | '\'' | '`' => quote_object(buffer, cursor, scope, key),
        '(' | ')' | 'b' => bracket_object(buffer, cursor, scope, '(', ')'),
        '{' | '}' | 'B' => bracket_object(buffer, cursor, scope, '{', '}'),
        '[' | ']' => bracket_object(buffer, cursor, scope, '[', ']'),
        '<' | '>' => bracket_object(buffer, cursor, scope, '<', '>'),
        'p' => paragraph_object(buffer, cursor.0, scope),
        's' => sentence_object(buffer, cursor, scope),
        't' => tag_object(buffer, cursor, scope),
        _ => None,
    }
}

// ==================== 单词 ====================

fn word_class(c: char, big: bool) -> u8 {
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

fn word_object(
    buffer: &Buffer,
    (line, col): (usize, usize),
    scope: ObjectScope,
    big: bool,
) -> Option<Span> {
    let chars: Vec<char> = buffer.line(line)?.chars().collect();
    if chars.is_empty() {
        return None;
    }
    let col = col.min(chars.len() - 1);
    let cls = word_class(chars[col], big);

    let mut start = col;
    while start > 0 && word_class(chars[start - 1], big) == cls {
        start -= 1;
    }
    let mut end = col + 1;
    while end < chars.len() && word_class(chars[end], big) == cls {
        end += 1;
    }

    if scope == ObjectScope::Around {
        if cls == 0 {
            // 光标在空白上：空白段加其后的单词
            let mut word_end = end;
            if word_end < chars.len() {
                let next_cls = word_class(chars[word_end], big);
                while word_end < chars.len() && word_class(chars[word_end], big) == next_cls {
                    word_end += 1;
                }
            }
            end = word_end;
        } else {
            let trailing_start = end;
            while end < chars.len() && word_class(chars[end], big) == 0 {
                end += 1;
            }
            if end == trailing_start {
                // 没有尾随空白：向前吞掉前导空白
                while start > 0 && word_class(chars[start - 1], big) == 0 {
                    start -= 1;
                }
            }
        }
    }

    Some(Span::charwise((line, start), (line, end)))
}

// ==================== 引号 ====================

fn quote_object(
    buffer: &Buffer,
    (line, col): (usize, usize),
    scope: ObjectScope,
    quote: char,
) -> Option<Span> {
    let chars: Vec<char> = buffer.line(line)?.chars().collect();
    let positions: Vec<usize> = chars
        .iter()
        .enumerate()
        .filter(|(_, &c)| c == quote)
        .map(|(i, _)| i)
        .collect();
    if positions.len() < 2 {
        return None;
    }

    // 顺序配对，取包含光标的一对；光标在所有引号之前时取其后第一对
    let mut chosen = None;
    for pair in positions.chunks(2) {
        if pair.len() < 2 {
            break;
        }
        let (open, close) = (pair[0], pair[1]);
        if col <= close {
            chosen = Some((open, close));
            break;
        }
    }
    let (open, close) = chosen?;

    match scope {
        ObjectScope::Inner => Some(Span::charwise((line, open + 1), (line, close))),
        ObjectScope::Around => {
            let mut start = open;
            let mut end = close + 1;
            let trailing = end;
            while end < chars.len() && chars[end] == ' ' {
                end += 1;
            }
            if end == trailing {
                while start > 0 && chars[start - 1] == ' ' {
                    start -= 1;
                }
            }
            Some(Span::charwise((line, start), (line, end)))
        }
    }
}

// ==================== 括号 ====================

fn bracket_object(
    buffer: &Buffer,
    (line, col): (usize, usize),
    scope: ObjectScope,
    open: char,
    close: char,
) -> Option<Span> {
    let open_pos = find_opening(buffer, (line, col), open, close)?;
    let close_pos = find_closing(buffer, open_pos, open, close)?;
    let (ol, oc) = open_pos;
    let (cl, cc) = close_pos;

    match scope {
        ObjectScope::Around => Some(Span::charwise((ol, oc), (cl, cc + 1))),
        ObjectScope::Inner => {
            if cl > ol {
                let open_line_rest_empty = oc + 1 >= buffer.line_len(ol);
                let close_line_head_blank = buffer
                    .line(cl)
                    .map(|l| l.chars().take(cc).all(|c| c.is_whitespace()))
                    .unwrap_or(false);
                // 内部恰为整行时按整行处理（保留括号各占一行的结构）
                if open_line_rest_empty && close_line_head_blank {
                    if ol + 1 <= cl.saturating_sub(1) && cl >= 1 {
                        return Some(Span::linewise(ol + 1, cl - 1));
                    }
                    return Some(Span::charwise((ol, oc + 1), (ol, oc + 1)));
                }
            }
            Some(Span::charwise((ol, oc + 1), (cl, cc)))
        }
    }
}

fn find_opening(
    buffer: &Buffer,
    (line, col): (usize, usize),
    open: char,
    close: char,
) -> Option<(usize, usize)> {
    let current = buffer.char_at(line, col);
    if current == Some(open) {
        return Some((line, col));
    }

    let mut depth = 0usize;
    let mut l = line;
    let mut c = col as isize;
    // 光标在闭括号上时从它的前一个字符开始向后找
    if current == Some(close) {
        c -= 1;
    } else {
        c = c.min(buffer.line_len(l) as isize - 1);
    }
    loop {
        let chars: Vec<char> = buffer.line(l)?.chars().collect();
        while c >= 0 {
            let ch = chars[c as usize];
            if ch == close {
                depth += 1;
            } else if ch == open {
                if depth == 0 {
                    return Some((l, c as usize));
                }
                depth -= 1;
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

fn find_closing(
    buffer: &Buffer,
    (line, col): (usize, usize),
    open: char,
    close: char,
) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut l = line;
    let mut c = col;
    loop {
        let chars: Vec<char> = buffer.line(l)?.chars().collect();
        while c < chars.len() {
            let ch = chars[c];
            if ch == open {
                depth += 1;
            } else if ch == close {
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
}

// ==================== 段落 ====================

fn paragraph_object(buffer: &Buffer, line: usize, scope: ObjectScope) -> Option<Span> {
    let blank = |l: usize| buffer.line_len(l) == 0;
    let max_line = buffer.len_lines().saturating_sub(1);
    let on_blank = blank(line);

    let mut start = line;
    while start > 0 && blank(start - 1) == on_blank {
        start -= 1;
    }
    let mut end = line;
    while end < max_line && blank(end + 1) == on_blank {
        end += 1;
    }

    if scope == ObjectScope::Around {
        if on_blank {
            // 空白段加其后的段落
            let mut e = end;
            while e < max_line && !blank(e + 1) {
                e += 1;
            }
            end = e;
        } else {
            let trailing = end;
            let mut e = end;
            while e < max_line && blank(e + 1) {
                e += 1;
            }
            if e != trailing {
                end = e;
            } else {
                let mut s = start;
                while s > 0 && blank(s - 1) {
                    s -= 1;
                }
                start = s;
            }
        }
    }

    Some(Span::linewise(start, end))
}

// ==================== 句子 ====================

fn sentence_object(buffer: &Buffer, (line, col): (usize, usize), scope: ObjectScope) -> Option<Span> {
    let chars: Vec<char> = buffer.line(line)?.chars().collect();
    if chars.is_empty() {
        return None;
    }
    let col = col.min(chars.len() - 1);

    // 本行内的句子起点
    let mut starts = vec![buffer.first_non_blank(line)];
    let mut idx = 0;
    while idx < chars.len() {
        if matches!(chars[idx], '.' | '!' | '?') {
            let mut next = idx + 1;
            while next < chars.len() && matches!(chars[next], ')' | ']' | '"' | '\'') {
                next += 1;
            }
            if next >= chars.len() || chars[next].is_whitespace() {
                let mut begin = next;
                while begin < chars.len() && chars[begin].is_whitespace() {
                    begin += 1;
                }
                if begin < chars.len() {
                    starts.push(begin);
                }
                idx = next;
                continue;
            }
        }
        idx += 1;
    }

    let sentence_idx = starts
        .iter()
        .rposition(|&s| s <= col)
        .unwrap_or(0);
    let start = starts[sentence_idx];
    let end = starts.get(sentence_idx + 1).copied().unwrap_or(chars.len());

    match scope {
        ObjectScope::Around => Some(Span::charwise((line, start), (line, end))),
        ObjectScope::Inner => {
            let mut inner_end = end;
            while inner_end > start && chars[inner_end - 1].is_whitespace() {
                inner_end -= 1;
            }
            Some(Span::charwise((line, start), (line, inner_end)))
        }
    }
}

// ==================== 标签 ====================

/// 扁平化偏移：行以 `\n`（占 1 个字符）连接
fn line_start_offsets(buffer: &Buffer) -> Vec<usize> {
    let mut starts = Vec::with_capacity(buffer.len_lines());
    let mut offset = 0;
    for i in 0..buffer.len_lines() {
        starts.push(offset);
        offset += buffer.line_len(i) + 1;
    }
    starts
}

fn pos_of(starts: &[usize], offset: usize) -> (usize, usize) {
    let line = match starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    };
    (line, offset - starts[line])
}

fn tag_object(buffer: &Buffer, (line, col): (usize, usize), scope: ObjectScope) -> Option<Span> {
    let flat: Vec<char> = buffer.lines().join("\n").chars().collect();
    let starts = line_start_offsets(buffer);
    let cursor_off = starts.get(line)? + col;

    // 全文扫描，配对 <tag>...</tag>
    let mut stack: Vec<(String, usize, usize)> = Vec::new();
    let mut pairs: Vec<(usize, usize, usize, usize)> = Vec::new();
    let mut i = 0;
    while i < flat.len() {
        if flat[i] != '<' {
            i += 1;
            continue;
        }
        let closing = flat.get(i + 1) == Some(&'/');
        let name_start = if closing { i + 2 } else { i + 1 };
        let mut j = name_start;
        while j < flat.len() && (flat[j].is_alphanumeric() || flat[j] == '-' || flat[j] == '_') {
            j += 1;
        }
        let name: String = flat[name_start..j].iter().collect();
        let mut gt = j;
        while gt < flat.len() && flat[gt] != '>' {
            gt += 1;
        }
        if gt >= flat.len() || name.is_empty() {
            i += 1;
            continue;
        }
        if closing {
            if let Some(top) = stack.iter().rposition(|(n, _, _)| *n == name) {
                let (_, open_start, open_end) = stack[top];
                stack.truncate(top);
                pairs.push((open_start, open_end, i, gt));
            }
        } else if flat.get(gt.saturating_sub(1)) != Some(&'/') {
            stack.push((name, i, gt));
        }
        i = gt + 1;
    }

    // 包含光标的最内层标签对
    let (open_start, open_end, close_start, close_end) = pairs
        .into_iter()
        .filter(|&(os, _, _, ce)| os <= cursor_off && cursor_off <= ce)
        .max_by_key(|&(os, _, _, _)| os)?;

    let (span_start, span_end) = match scope {
        ObjectScope::Inner => (open_end + 1, close_start),
        ObjectScope::Around => (open_start, close_end + 1),
    };
    let s = pos_of(&starts, span_start);
    let e = pos_of(&starts, span_end);
    Some(Span::charwise(s, e))
}
