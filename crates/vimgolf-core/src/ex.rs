use crate::editor::{Engine, EditorState};
use crate::pattern;
use crate::token::extract_keystroke;
use regex::Captures;
use thiserror::Error;

/// Ex 命令解释器
///
/// `[range]cmd[args]`。所有失败都被吸收为跳过整条命令，缓冲区和模式保持
/// 不变（错误策略见顶层文档）。

#[derive(Debug, Error)]
pub enum ExError {
    #[error("invalid range")]
    InvalidRange,
    #[error("invalid pattern")]
    InvalidPattern,
    #[error("missing argument")]
    MissingArgument,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// 执行一条 `:` 命令（不含开头的冒号也可）；失败静默跳过
pub fn execute(engine: &Engine, state: &mut EditorState, line: &str, depth: usize) {
    if let Err(err) = run(engine, state, line, depth) {
        tracing::debug!(command = %line, error = %err, "ex command skipped");
    }
}

fn run(engine: &Engine, state: &mut EditorState, line: &str, depth: usize) -> Result<(), ExError> {
    let input = line.strip_prefix(':').unwrap_or(line);
    let input = input.trim_end_matches('\n');
    if input.is_empty() {
        return Ok(());
    }

    let mut parser = Parser::new(input);
    let range = parser.parse_range(state)?;
    parser.skip_spaces();

    // 命令名：前导字母序列，后可跟 '!'
    let name = parser.take_while(|c| c.is_ascii_alphabetic());
    let bang = parser.eat('!');

    match name.as_str() {
        "" => goto_range(state, range),
        "d" | "delete" => delete_lines(state, range),
        "s" | "su" | "sub" | "substitute" => substitute(state, range, parser.rest()),
        "g" | "global" => global(state, range, parser.rest(), bang),
        "v" | "vglobal" => global(state, range, parser.rest(), true),
        "m" | "mo" | "move" => move_lines(state, range, parser.rest()),
        "t" | "co" | "copy" => copy_lines(state, range, parser.rest()),
        "sor" | "sort" => sort_lines(state, range, parser.rest()),
        "norm" | "normal" => normal(engine, state, range, parser.raw_rest(), depth),
        "pu" | "put" => put(state, range, parser.rest(), bang),
        "r" | "re" | "read" => read(engine, state, range, parser.rest()),
        other => Err(ExError::UnknownCommand(other.to_string())),
    }
}

// ==================== 地址与范围 ====================

/// 0 索引行号；-1 表示地址 0（首行之前），供 move/copy/put 使用
type Address = isize;

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().map(&pred).unwrap_or(false) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// 余下内容（去掉一个前导空格）
    fn rest(&self) -> String {
        let rest: String = self.chars[self.pos.min(self.chars.len())..].iter().collect();
        rest.strip_prefix(' ').unwrap_or(&rest).to_string()
    }

    /// 余下内容（保留空格，:normal 需要）
    fn raw_rest(&self) -> String {
        self.chars[self.pos.min(self.chars.len())..].iter().collect()
    }

    fn parse_number(&mut self) -> Option<usize> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            None
        } else {
            digits.parse().ok()
        }
    }

    fn parse_address(&mut self, state: &EditorState) -> Result<Option<Address>, ExError> {
        let last = state.buffer.len_lines() as isize - 1;
        let base: Option<Address> = match self.peek() {
            Some('.') => {
                self.pos += 1;
                Some(state.cursor.line as isize)
            }
            Some('$') => {
                self.pos += 1;
                Some(last)
            }
            Some('\'') => {
                self.pos += 1;
                let mark = self.peek().ok_or(ExError::InvalidRange)?;
                self.pos += 1;
                let &(line, _) = state.marks.get(&mark).ok_or(ExError::InvalidRange)?;
                Some(line as isize)
            }
            Some(c) if c.is_ascii_digit() => {
                let n = self.parse_number().ok_or(ExError::InvalidRange)?;
                Some(n as isize - 1)
            }
            _ => None,
        };

        // +n / -n 偏移；无基址时相对当前行
        let mut addr = base;
        while matches!(self.peek(), Some('+') | Some('-')) {
            let sign = if self.eat('+') {
                1
            } else {
                self.eat('-');
                -1
            };
            let n = self.parse_number().unwrap_or(1) as isize;
            let current = addr.unwrap_or(state.cursor.line as isize);
            addr = Some(current + sign * n);
        }

        Ok(addr.map(|a| a.clamp(-1, last)))
    }

    /// 返回 (start, end)；None 表示未给范围。地址 0（首行之前）保留为 -1
    fn parse_range(&mut self, state: &EditorState) -> Result<Option<(Address, Address)>, ExError> {
        let last = state.buffer.len_lines() as isize - 1;
        if self.eat('%') {
            return Ok(Some((0, last)));
        }
        let first = self.parse_address(state)?;
        let Some(first) = first else {
            return Ok(None);
        };
        if self.eat(',') || self.eat(';') {
            let second = self.parse_address(state)?.unwrap_or(state.cursor.line as isize);
            let (a, b) = if first <= second {
                (first, second)
            } else {
                (second, first)
            };
            Ok(Some((a, b)))
        } else {
            Ok(Some((first, first)))
        }
    }
}

fn clamp_range(state: &EditorState, range: (Address, Address)) -> (usize, usize) {
    let last = state.buffer.len_lines().saturating_sub(1);
    let a = (range.0.max(0) as usize).min(last);
    let b = (range.1.max(0) as usize).min(last);
    (a.min(b), b)
}

fn range_or_current(state: &EditorState, range: Option<(Address, Address)>) -> (usize, usize) {
    match range {
        Some(r) => clamp_range(state, r),
        None => (state.cursor.line, state.cursor.line),
    }
}

fn range_or_all(state: &EditorState, range: Option<(Address, Address)>) -> (usize, usize) {
    match range {
        Some(r) => clamp_range(state, r),
        None => (0, state.buffer.len_lines().saturating_sub(1)),
    }
}

// ==================== 单个命令 ====================

fn goto_range(state: &mut EditorState, range: Option<(Address, Address)>) -> Result<(), ExError> {
    let (_, end) = clamp_range(state, range.ok_or(ExError::MissingArgument)?);
    state.cursor.line = end.min(state.buffer.len_lines().saturating_sub(1));
    state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    Ok(())
}

fn delete_lines(state: &mut EditorState, range: Option<(Address, Address)>) -> Result<(), ExError> {
    let (start, end) = range_or_current(state, range);
    state.save_undo();
    let mut removed = Vec::new();
    for _ in start..=end {
        match state.buffer.remove_line(start) {
            Some(line) => removed.push(line),
            None => break,
        }
    }
    let mut text = removed.join("\n");
    text.push('\n');
    state.registers.set_delete(text, None, true);
    state.cursor.line = start.min(state.buffer.len_lines().saturating_sub(1));
    state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    Ok(())
}

// ==================== substitute ====================

fn split_fields(rest: &str) -> Result<(char, String, String, String), ExError> {
    let mut chars = rest.chars();
    let delim = chars.next().ok_or(ExError::MissingArgument)?;
    if delim.is_alphanumeric() || delim == ' ' || delim == '\\' {
        return Err(ExError::MissingArgument);
    }

    let mut fields: Vec<String> = vec![String::new()];
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                // 转义的分隔符是字面字符
                Some(d) if d == delim => fields.last_mut().unwrap().push(d),
                Some(d) => {
                    let field = fields.last_mut().unwrap();
                    field.push('\\');
                    field.push(d);
                }
                None => fields.last_mut().unwrap().push('\\'),
            }
        } else if c == delim {
            if fields.len() == 3 {
                break;
            }
            fields.push(String::new());
        } else {
            fields.last_mut().unwrap().push(c);
        }
    }
    let mut it = fields.into_iter();
    let pat = it.next().unwrap_or_default();
    let repl = it.next().unwrap_or_default();
    let flags = it.next().unwrap_or_default();
    Ok((delim, pat, repl, flags))
}

fn substitute(
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    rest: String,
) -> Result<(), ExError> {
    let (_, mut pat, repl, flags) = split_fields(&rest)?;
    let global = flags.contains('g');
    let ignorecase = flags.contains('i');

    if pat.is_empty() {
        pat = state.search.pattern.clone();
        if pat.is_empty() {
            return Err(ExError::InvalidPattern);
        }
    }

    let re = pattern::compile(&pat, ignorecase, &state.options).ok_or(ExError::InvalidPattern)?;
    let multiline = pattern::translate_vim_pattern(&pat).contains('\n');
    let (start, end) = range_or_current(state, range);
    let last_line = state.buffer.len_lines().saturating_sub(1);
    let (start, end) = (start.min(last_line), end.min(last_line));

    let mut lines = state.buffer.lines();
    let mut replaced = 0usize;
    let mut last_changed = start;

    if multiline {
        let mut joined = lines[start..=end].join("\n");
        let env = EvalEnv {
            current_line: state.cursor.line + 1,
            last_line: state.buffer.len_lines(),
        };
        // 模拟逐行处理：全局多行替换迭代到不动点
        for _ in 0..100 {
            let mut count = 0usize;
            let next = if global {
                re.replace_all(&joined, |caps: &Captures| {
                    count += 1;
                    expand_replacement(caps, &repl, &env)
                })
                .into_owned()
            } else {
                re.replace(&joined, |caps: &Captures| {
                    count += 1;
                    expand_replacement(caps, &repl, &env)
                })
                .into_owned()
            };
            replaced += count;
            let done = next == joined;
            joined = next;
            if done || !global {
                break;
            }
        }
        if replaced == 0 {
            return Ok(());
        }
        let new_lines: Vec<String> = joined.split('\n').map(String::from).collect();
        last_changed = (start + new_lines.len()).saturating_sub(1);
        lines.splice(start..=end, new_lines);
    } else {
        for idx in start..=end {
            let env = EvalEnv {
                current_line: idx + 1,
                last_line: lines.len(),
            };
            let mut count = 0usize;
            let line = &lines[idx];
            let new = if global {
                re.replace_all(line, |caps: &Captures| {
                    count += 1;
                    expand_replacement(caps, &repl, &env)
                })
                .into_owned()
            } else {
                re.replace(line, |caps: &Captures| {
                    count += 1;
                    expand_replacement(caps, &repl, &env)
                })
                .into_owned()
            };
            if count > 0 {
                replaced += count;
                last_changed = idx;
                lines[idx] = new;
            }
        }
        if replaced == 0 {
            return Ok(());
        }
        // 替换文本里的换行会产生新行
        lines = lines
            .into_iter()
            .flat_map(|l| {
                l.split('\n')
                    .map(String::from)
                    .collect::<Vec<_>>()
                    .into_iter()
            })
            .collect();
    }

    state.save_undo();
    state.buffer.set_lines(lines);
    let max_line = state.buffer.len_lines().saturating_sub(1);
    state.cursor.line = last_changed.min(max_line);
    state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    Ok(())
}

/// 替换模板展开：& 整个匹配，\1..\99 捕获组（多位数字按数值解析），
/// \U \L \u \l \E 大小写折叠，\r 换行，\=expr 表达式替换
fn expand_replacement(caps: &Captures, template: &str, env: &EvalEnv) -> String {
    if let Some(expr) = template.strip_prefix("\\=") {
        return eval_expr(expr, env).map(|v| v.to_text()).unwrap_or_default();
    }

    #[derive(Clone, Copy, PartialEq)]
    enum CaseMode {
        Plain,
        UpperAll,
        LowerAll,
        UpperNext,
        LowerNext,
    }
    let mut mode = CaseMode::Plain;
    let mut out = String::new();
    let push = |out: &mut String, mode: &mut CaseMode, text: &str| {
        for c in text.chars() {
            let mapped = match *mode {
                CaseMode::Plain => c,
                CaseMode::UpperAll => c.to_ascii_uppercase(),
                CaseMode::LowerAll => c.to_ascii_lowercase(),
                CaseMode::UpperNext => {
                    *mode = CaseMode::Plain;
                    c.to_ascii_uppercase()
                }
                CaseMode::LowerNext => {
                    *mode = CaseMode::Plain;
                    c.to_ascii_lowercase()
                }
            };
            out.push(mapped);
        }
    };

    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '&' {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("");
            push(&mut out, &mut mode, whole);
            i += 1;
        } else if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            i += 2;
            match next {
                '0'..='9' => {
                    let mut digits = String::from(next);
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        digits.push(chars[i]);
                        i += 1;
                    }
                    // 多位组号不存在时退回单个数字
                    let mut group: usize = digits.parse().unwrap_or(0);
                    let mut literal_tail = String::new();
                    if group >= caps.len() && digits.len() > 1 {
                        group = digits[..1].parse().unwrap_or(0);
                        literal_tail = digits[1..].to_string();
                    }
                    let text = caps.get(group).map(|m| m.as_str()).unwrap_or("");
                    push(&mut out, &mut mode, text);
                    push(&mut out, &mut mode, &literal_tail);
                }
                'U' => mode = CaseMode::UpperAll,
                'L' => mode = CaseMode::LowerAll,
                'E' | 'e' => mode = CaseMode::Plain,
                'u' => mode = CaseMode::UpperNext,
                'l' => mode = CaseMode::LowerNext,
                'r' | 'n' => out.push('\n'),
                't' => out.push('\t'),
                '&' => push(&mut out, &mut mode, "&"),
                other => push(&mut out, &mut mode, &other.to_string()),
            }
        } else {
            push(&mut out, &mut mode, &c.to_string());
            i += 1;
        }
    }
    out
}

// ==================== global ====================

fn global(
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    rest: String,
    invert: bool,
) -> Result<(), ExError> {
    let mut chars = rest.chars();
    let delim = chars.next().ok_or(ExError::MissingArgument)?;
    if delim.is_alphanumeric() {
        return Err(ExError::MissingArgument);
    }
    let mut pat = String::new();
    let mut cmd = String::new();
    let mut in_cmd = false;
    let mut escaped = false;
    for c in chars {
        if in_cmd {
            cmd.push(c);
        } else if escaped {
            if c != delim {
                pat.push('\\');
            }
            pat.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == delim {
            in_cmd = true;
        } else {
            pat.push(c);
        }
    }

    if pat.is_empty() {
        pat = state.search.pattern.clone();
    }
    let re = pattern::compile(&pat, false, &state.options).ok_or(ExError::InvalidPattern)?;
    let (start, end) = range_or_all(state, range);

    let lines = state.buffer.lines();
    let matched: Vec<usize> = (start..=end.min(lines.len().saturating_sub(1)))
        .filter(|&i| re.is_match(&lines[i]) != invert)
        .collect();
    if matched.is_empty() {
        return Ok(());
    }

    let cmd = cmd.trim().to_string();
    if cmd.is_empty() || cmd == "p" {
        // 无执行命令（打印在引擎里是空操作）：光标移到最后一个匹配行
        state.cursor.line = *matched.last().unwrap_or(&state.cursor.line);
        state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
        return Ok(());
    }

    if cmd == "d" || cmd == "delete" {
        state.save_undo();
        let mut removed = Vec::new();
        for &idx in matched.iter().rev() {
            if let Some(line) = state.buffer.remove_line(idx) {
                removed.push(line);
            }
        }
        removed.reverse();
        let mut text = removed.join("\n");
        text.push('\n');
        state.registers.set_delete(text, None, true);
        let max_line = state.buffer.len_lines().saturating_sub(1);
        state.cursor.line = matched[0].min(max_line);
        state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
        return Ok(());
    }

    if let Some(addr_text) = cmd.strip_prefix('m').map(|r| r.trim()) {
        // g/pat/m0 及其一般形式：按匹配顺序把每一行搬到目标地址
        let dest: isize = match addr_text {
            "0" => -1,
            "$" => state.buffer.len_lines() as isize - 1,
            n => n.parse::<isize>().map(|v| v - 1).map_err(|_| ExError::InvalidRange)?,
        };
        state.save_undo();
        let mut order: Vec<usize> = (0..state.buffer.len_lines()).collect();
        let mut lines = state.buffer.lines();
        for &orig in &matched {
            let Some(cur) = order.iter().position(|&id| id == orig) else {
                continue;
            };
            let id = order.remove(cur);
            let line = lines.remove(cur);
            let insert_at = ((dest + 1).max(0) as usize).min(lines.len());
            order.insert(insert_at, id);
            lines.insert(insert_at, line);
        }
        state.buffer.set_lines(lines);
        state.cursor.clamp_normal(&state.buffer);
        return Ok(());
    }

    if cmd.starts_with('s') {
        // 对每个匹配行跑一次替换
        let sub = cmd[1..].to_string();
        for &idx in matched.iter().rev() {
            let _ = substitute(state, Some((idx as isize, idx as isize)), sub.clone());
        }
        return Ok(());
    }

    Err(ExError::UnknownCommand(cmd))
}

// ==================== move / copy / sort ====================

fn parse_dest(state: &EditorState, rest: &str) -> Result<Address, ExError> {
    let mut parser = Parser::new(rest.trim());
    let addr = parser.parse_address(state)?.ok_or(ExError::InvalidRange)?;
    Ok(addr)
}

fn move_lines(
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    rest: String,
) -> Result<(), ExError> {
    let (start, end) = range_or_current(state, range);
    let dest = parse_dest(state, &rest)?;
    let dest_idx = (dest + 1).max(0) as usize;
    if dest_idx > start && dest_idx <= end {
        return Err(ExError::InvalidRange);
    }

    state.save_undo();
    let mut lines = state.buffer.lines();
    let moved: Vec<String> = lines.drain(start..=end.min(lines.len() - 1)).collect();
    let count = moved.len();
    let insert_at = if dest_idx > end {
        dest_idx - count
    } else {
        dest_idx
    }
    .min(lines.len());
    for (i, line) in moved.into_iter().enumerate() {
        lines.insert(insert_at + i, line);
    }
    state.buffer.set_lines(lines);
    state.cursor.line = (insert_at + count).saturating_sub(1);
    state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    Ok(())
}

fn copy_lines(
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    rest: String,
) -> Result<(), ExError> {
    let (start, end) = range_or_current(state, range);
    let dest = parse_dest(state, &rest)?;
    let insert_at = (dest + 1).max(0) as usize;

    state.save_undo();
    let mut lines = state.buffer.lines();
    let copied: Vec<String> = lines[start.min(lines.len() - 1)..=end.min(lines.len() - 1)].to_vec();
    let count = copied.len();
    let insert_at = insert_at.min(lines.len());
    for (i, line) in copied.into_iter().enumerate() {
        lines.insert(insert_at + i, line);
    }
    state.buffer.set_lines(lines);
    state.cursor.line = (insert_at + count).saturating_sub(1);
    state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    Ok(())
}

fn sort_lines(
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    rest: String,
) -> Result<(), ExError> {
    let (start, end) = range_or_all(state, range);
    let unique = rest.contains('u');

    let mut lines = state.buffer.lines();
    let mut section: Vec<String> = lines[start..=end.min(lines.len() - 1)].to_vec();
    section.sort();
    if unique {
        section.dedup();
    }
    if section == lines[start..=end.min(lines.len() - 1)] {
        return Ok(());
    }
    state.save_undo();
    lines.splice(start..=end.min(lines.len() - 1), section);
    state.buffer.set_lines(lines);
    state.cursor.clamp_normal(&state.buffer);
    Ok(())
}

// ==================== put / read / normal ====================

fn put(
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    rest: String,
    before: bool,
) -> Result<(), ExError> {
    let rest = rest.trim().to_string();
    let text = if let Some(expr) = rest.strip_prefix('=') {
        let env = EvalEnv {
            current_line: state.cursor.line + 1,
            last_line: state.buffer.len_lines(),
        };
        eval_expr(expr, &env).map(|v| v.to_text()).ok_or(ExError::MissingArgument)?
    } else if rest.is_empty() {
        state
            .registers
            .paste_content(None)
            .map(|(content, _)| content)
            .ok_or(ExError::MissingArgument)?
    } else {
        let reg = rest.chars().next().ok_or(ExError::MissingArgument)?;
        state
            .registers
            .paste_content(Some(reg))
            .map(|(content, _)| content)
            .ok_or(ExError::MissingArgument)?
    };

    let at_line = range
        .map(|(_, end)| end)
        .unwrap_or(state.cursor.line as isize);
    let mut insert_at = if before || at_line < 0 {
        at_line.max(0) as usize
    } else {
        at_line as usize + 1
    };

    state.save_undo();
    let mut new_lines: Vec<&str> = text.split('\n').collect();
    if new_lines.last() == Some(&"") {
        new_lines.pop();
    }
    for line in &new_lines {
        state.buffer.insert_line(insert_at, line);
        insert_at += 1;
    }
    state.cursor.line = insert_at.saturating_sub(1).min(state.buffer.len_lines().saturating_sub(1));
    state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    Ok(())
}

fn read(
    engine: &Engine,
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    rest: String,
) -> Result<(), ExError> {
    let Some(command) = rest.trim().strip_prefix('!') else {
        tracing::warn!(args = %rest, "only :r !cmd is supported, skipping");
        return Ok(());
    };
    let Some(output) = engine.run_shell(command.trim()) else {
        tracing::warn!(command = %command, "no shell runner configured, :r skipped");
        return Ok(());
    };

    let at_line = range
        .map(|(_, end)| end)
        .unwrap_or(state.cursor.line as isize);
    state.save_undo();
    let mut insert_at = (at_line + 1).max(0) as usize;
    for line in output.lines() {
        state.buffer.insert_line(insert_at, line);
        insert_at += 1;
    }
    state.cursor.line = insert_at.saturating_sub(1).min(state.buffer.len_lines().saturating_sub(1));
    state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    Ok(())
}

fn normal(
    engine: &Engine,
    state: &mut EditorState,
    range: Option<(Address, Address)>,
    raw: String,
    depth: usize,
) -> Result<(), ExError> {
    let keys = raw.strip_prefix(' ').unwrap_or(&raw).to_string();
    if keys.is_empty() {
        return Ok(());
    }

    match range {
        None => run_normal_keys(engine, state, &keys, depth),
        Some(raw) => {
            let (start, end) = clamp_range(state, raw);
            // 执行中行数会变化，按增量调整后续目标行
            let mut targets: Vec<isize> = (start as isize..=end as isize).collect();
            let mut idx = 0;
            while idx < targets.len() {
                let line = targets[idx];
                if line < 0 || line as usize >= state.buffer.len_lines() {
                    idx += 1;
                    continue;
                }
                let before_len = state.buffer.len_lines() as isize;
                state.cursor.line = line as usize;
                state.cursor.column = 0;
                state.cursor.clamp_normal(&state.buffer);
                run_normal_keys(engine, state, &keys, depth);
                let delta = state.buffer.len_lines() as isize - before_len;
                for t in targets.iter_mut().skip(idx + 1) {
                    *t += delta;
                }
                idx += 1;
            }
        }
    }
    Ok(())
}

fn run_normal_keys(engine: &Engine, state: &mut EditorState, keys: &str, depth: usize) {
    let expanded = expand_expression_registers(state, keys);
    let mut remaining = expanded.as_str();
    while !remaining.is_empty() {
        let Some(token) = extract_keystroke(remaining, state.mode) else {
            break;
        };
        remaining = &remaining[token.len()..];
        engine.dispatch(state, &token, depth + 1);
    }
    // :normal 结束时隐式回到 Normal 模式
    if state.mode.is_insert() || state.mode.is_visual() {
        engine.dispatch(state, "<Esc>", depth + 1);
    }
}

/// 把 `<C-R>=expr<CR>` 表达式寄存器语法展开为求值结果
fn expand_expression_registers(state: &EditorState, keys: &str) -> String {
    let mut result = keys.to_string();
    loop {
        let lower = result.to_lowercase();
        let Some(start) = lower.find("<c-r>=") else {
            break;
        };
        let after = start + "<c-r>=".len();
        // 命令行记号的结尾 <CR> 同时终结表达式，缺失时取到串尾
        let (end_rel, terminator) = match lower[after..].find("<cr>") {
            Some(pos) => (pos, "<cr>".len()),
            None => (result.len() - after, 0),
        };
        let expr = result[after..after + end_rel].to_string();
        let env = EvalEnv {
            current_line: state.cursor.line + 1,
            last_line: state.buffer.len_lines(),
        };
        let value = eval_expr(&expr, &env).map(|v| v.to_text()).unwrap_or_default();
        result.replace_range(start..after + end_rel + terminator, &value);
    }
    result
}

// ==================== 表达式求值 ====================

/// 极简 Vim 表达式：字符串/数字字面量、`.` 连接、`+`/`-`、
/// `line('.')`、`line('$')` 和桩实现的 `Pi()`
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(i64),
    Str(String),
}

impl Value {
    pub fn to_text(&self) -> String {
        match self {
            Value::Num(n) => n.to_string(),
            Value::Str(s) => s.clone(),
        }
    }

    fn to_num(&self) -> i64 {
        match self {
            Value::Num(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                let digits: String = trimmed
                    .chars()
                    .take_while(|c| c.is_ascii_digit() || *c == '-')
                    .collect();
                digits.parse().unwrap_or(0)
            }
        }
    }
}

pub struct EvalEnv {
    /// 1 索引当前行号
    pub current_line: usize,
    pub last_line: usize,
}

pub fn eval_expr(src: &str, env: &EvalEnv) -> Option<Value> {
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0;

    let value = eval_primary(&chars, &mut pos, env)?;
    let mut acc = value;
    loop {
        skip_ws(&chars, &mut pos);
        let Some(&op) = chars.get(pos) else {
            return Some(acc);
        };
        if op != '.' && op != '+' && op != '-' {
            return Some(acc);
        }
        pos += 1;
        let rhs = eval_primary(&chars, &mut pos, env)?;
        acc = match op {
            '.' => Value::Str(format!("{}{}", acc.to_text(), rhs.to_text())),
            '+' => Value::Num(acc.to_num() + rhs.to_num()),
            _ => Value::Num(acc.to_num() - rhs.to_num()),
        };
    }
}

fn skip_ws(chars: &[char], pos: &mut usize) {
    while chars.get(*pos) == Some(&' ') {
        *pos += 1;
    }
}

fn eval_primary(chars: &[char], pos: &mut usize, env: &EvalEnv) -> Option<Value> {
    skip_ws(chars, pos);
    let c = *chars.get(*pos)?;

    if c.is_ascii_digit() {
        let mut digits = String::new();
        while chars.get(*pos).map(|c| c.is_ascii_digit()).unwrap_or(false) {
            digits.push(chars[*pos]);
            *pos += 1;
        }
        return digits.parse().ok().map(Value::Num);
    }

    if c == '-' {
        *pos += 1;
        let inner = eval_primary(chars, pos, env)?;
        return Some(Value::Num(-inner.to_num()));
    }

    if c == '\'' || c == '"' {
        *pos += 1;
        let mut text = String::new();
        while let Some(&ch) = chars.get(*pos) {
            *pos += 1;
            if ch == c {
                // '' 内的两个引号是一个字面引号
                if c == '\'' && chars.get(*pos) == Some(&'\'') {
                    text.push('\'');
                    *pos += 1;
                    continue;
                }
                return Some(Value::Str(text));
            }
            if c == '"' && ch == '\\' {
                if let Some(&esc) = chars.get(*pos) {
                    *pos += 1;
                    text.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    continue;
                }
            }
            text.push(ch);
        }
        return Some(Value::Str(text));
    }

    if c.is_ascii_alphabetic() {
        let mut name = String::new();
        while chars
            .get(*pos)
            .map(|c| c.is_ascii_alphanumeric() || *c == '_')
            .unwrap_or(false)
        {
            name.push(chars[*pos]);
            *pos += 1;
        }
        skip_ws(chars, pos);
        if chars.get(*pos) != Some(&'(') {
            return None;
        }
        *pos += 1;
        let mut arg = String::new();
        let mut depth = 1;
        while let Some(&ch) = chars.get(*pos) {
            *pos += 1;
            if ch == '(' {
                depth += 1;
            } else if ch == ')' {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            arg.push(ch);
        }
        let arg = arg.trim().trim_matches('\'').trim_matches('"');
        return match name.as_str() {
            "line" => match arg {
                "." => Some(Value::Num(env.current_line as i64)),
                "$" => Some(Value::Num(env.last_line as i64)),
                _ => None,
            },
            "Pi" => Some(Value::Str(format!("{}", std::f64::consts::PI))),
            _ => {
                tracing::debug!(function = %name, "unknown expression function");
                None
            }
        };
    }

    None
}
