use crate::buffer::Buffer;
use crate::cursor::Cursor;
use crate::ex;
use crate::mode::Mode;
use crate::normal;
use crate::operator::PendingOperator;
use crate::options::Options;
use crate::register::RegisterManager;
use crate::search::{SearchDirection, SearchState};
use crate::text_object::ObjectScope;
use crate::token::{extract_keystroke, tokenize_keystrokes};
use std::collections::HashMap;

/// 重放递归深度上限（宏、:normal、dot-repeat）
const MAX_REPLAY_DEPTH: usize = 64;
/// 撤销栈容量
const UNDO_LIMIT: usize = 1000;

/// `:r !cmd` 的外壳命令能力；不注入时该命令降级为空操作
pub trait ShellRunner {
    fn run(&self, command: &str) -> Option<String>;
}

/// 解释器句柄
///
/// 引擎自身无状态，`execute_keystroke` 对输入状态做纯变换；
/// 宏、`:normal`、dot-repeat 需要的递归执行器就是它自己。
#[derive(Default)]
pub struct Engine {
    shell: Option<Box<dyn ShellRunner>>,
}

impl Engine {
    pub fn new() -> Self {
        Self { shell: None }
    }

    pub fn with_shell_runner(runner: Box<dyn ShellRunner>) -> Self {
        Self {
            shell: Some(runner),
        }
    }

    pub(crate) fn run_shell(&self, command: &str) -> Option<String> {
        self.shell.as_ref().and_then(|runner| runner.run(command))
    }

    /// 单个记号 -> 新状态
    pub fn execute_keystroke(&self, state: &EditorState, token: &str) -> EditorState {
        let mut next = state.clone();
        self.dispatch(&mut next, token, 0);
        next
    }

    /// 整串按键 -> 新状态（流式记号化，跟随模式变化）
    pub fn execute_keystrokes(&self, state: &EditorState, raw: &str) -> EditorState {
        let mut next = state.clone();
        let mut remaining = raw;
        while !remaining.is_empty() {
            let Some(token) = extract_keystroke(remaining, next.mode) else {
                break;
            };
            remaining = &remaining[token.len()..];
            self.dispatch(&mut next, &token, 0);
        }
        next
    }

    pub(crate) fn dispatch(&self, state: &mut EditorState, token: &str, depth: usize) {
        // <C-X> 与 <C-x> 是同一个按键，统一成小写形式
        let normalized;
        let token = match token.strip_prefix("<C-").and_then(|r| r.strip_suffix('>')) {
            Some(key) if key.len() == 1 && key.chars().all(|c| c.is_ascii_uppercase()) => {
                normalized = format!("<C-{}>", key.to_ascii_lowercase());
                normalized.as_str()
            }
            _ => token,
        };

        if depth > MAX_REPLAY_DEPTH {
            tracing::warn!(token, "replay depth limit reached, token dropped");
            return;
        }

        if depth == 0 {
            if state.recording_register.is_some() {
                let stops =
                    state.mode == Mode::Normal && state.pending.is_none() && token == "q";
                if !stops {
                    state.macro_buffer.push(token.to_string());
                }
            }
            state.no_repeat = false;
            let command_entry = is_command_entry(token)
                && (state.mode == Mode::Normal || state.mode.is_visual());
            if !state.mode.is_command() && !command_entry {
                state.change_record.push(token.to_string());
            }
        }

        let undo_before = state.undo_stack.len();

        match state.mode {
            Mode::Normal => normal::handle_normal(self, state, token, depth),
            Mode::Insert | Mode::Replace => self.handle_insert(state, token, depth),
            Mode::Visual | Mode::VisualLine | Mode::VisualBlock => {
                normal::handle_visual(self, state, token, depth)
            }
            Mode::Command => self.handle_command(state, token, depth),
        }

        if depth == 0 {
            if state.undo_stack.len() > undo_before && !state.no_repeat {
                state.change_mutated = true;
            }
            let in_flight = state.mode.is_insert()
                || state.mode.is_visual()
                || state.mode.is_command()
                || state.pending.is_some()
                || !state.count_buffer.is_empty();
            if !in_flight {
                if state.change_mutated && !state.no_repeat {
                    state.commit_last_change();
                }
                state.change_record.clear();
                state.change_mutated = false;
            }
        }
    }

    // ==================== Insert / Replace ====================

    fn handle_insert(&self, state: &mut EditorState, token: &str, depth: usize) {
        if state.insert_repeat > 1 {
            state.insert_record.push(token.to_string());
        }

        if state.pending == Some(Pending::InsertRegister) {
            state.pending = None;
            if token.chars().count() == 1 {
                let reg = token.chars().next().unwrap_or('"');
                if let Some((content, _)) = state.registers.paste_content(Some(reg)) {
                    insert_text_at_cursor(state, &content);
                }
            }
            return;
        }

        match token {
            "<Esc>" => self.leave_insert(state, depth),
            "<CR>" => {
                state.block_insert = None;
                let line = state.cursor.line;
                let col = state.cursor.column;
                let text = state.buffer.line(line).unwrap_or_default();
                let chars: Vec<char> = text.chars().collect();
                let col = col.min(chars.len());
                let head: String = chars[..col].iter().collect();
                let tail: String = chars[col..].iter().collect();
                let indent: String = if state.options.autoindent {
                    text.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
                } else {
                    String::new()
                };
                state.buffer.set_line(line, &head);
                state.buffer.insert_line(line + 1, &format!("{}{}", indent, tail));
                state.cursor.line = line + 1;
                state.cursor.column = indent.chars().count();
            }
            "<BS>" => {
                if let Some(block) = state.block_insert.as_mut() {
                    if block.inserted.pop().is_none() {
                        state.block_insert = None;
                    }
                }
                let line = state.cursor.line;
                let col = state.cursor.column;
                if col > 0 {
                    state.buffer.remove_in_line(line, col - 1, col);
                    state.cursor.column -= 1;
                } else if line > 0 {
                    let prev_len = state.buffer.line_len(line - 1);
                    let text = state.buffer.line(line).unwrap_or_default();
                    let prev = state.buffer.line(line - 1).unwrap_or_default();
                    state.buffer.set_line(line - 1, &format!("{}{}", prev, text));
                    state.buffer.remove_line(line);
                    state.cursor.line = line - 1;
                    state.cursor.column = prev_len;
                }
            }
            "<Del>" => {
                let line = state.cursor.line;
                let col = state.cursor.column;
                if col < state.buffer.line_len(line) {
                    state.buffer.remove_in_line(line, col, col + 1);
                }
            }
            "<Tab>" => {
                insert_text_at_cursor(state, "\t");
                if let Some(block) = state.block_insert.as_mut() {
                    block.inserted.push('\t');
                }
            }
            "<C-w>" => {
                let line = state.cursor.line;
                let col = state.cursor.column;
                let chars: Vec<char> = state
                    .buffer
                    .line(line)
                    .unwrap_or_default()
                    .chars()
                    .collect();
                let mut start = col.min(chars.len());
                while start > 0 && chars[start - 1].is_whitespace() {
                    start -= 1;
                }
                let is_word = |c: char| c.is_alphanumeric() || c == '_';
                if start > 0 {
                    let word = is_word(chars[start - 1]);
                    while start > 0
                        && !chars[start - 1].is_whitespace()
                        && is_word(chars[start - 1]) == word
                    {
                        start -= 1;
                    }
                }
                state.buffer.remove_in_line(line, start, col);
                state.cursor.column = start;
            }
            "<C-u>" => {
                let line = state.cursor.line;
                state.buffer.remove_in_line(line, 0, state.cursor.column);
                state.cursor.column = 0;
            }
            "<C-r>" => state.pending = Some(Pending::InsertRegister),
            "<lt>" => {
                insert_text_at_cursor(state, "<");
                if let Some(block) = state.block_insert.as_mut() {
                    block.inserted.push('<');
                }
            }
            "<Left>" => {
                state.block_insert = None;
                state.cursor.column = state.cursor.column.saturating_sub(1);
            }
            "<Right>" => {
                state.block_insert = None;
                state.cursor.column += 1;
                state.cursor.clamp_insert(&state.buffer);
            }
            "<Up>" => {
                state.block_insert = None;
                state.cursor.line = state.cursor.line.saturating_sub(1);
                state.cursor.clamp_insert(&state.buffer);
            }
            "<Down>" => {
                state.block_insert = None;
                state.cursor.line += 1;
                state.cursor.clamp_insert(&state.buffer);
            }
            _ => {
                if token.starts_with('<') && token.len() > 1 {
                    return;
                }
                let Some(c) = token.chars().next() else {
                    return;
                };
                if state.mode == Mode::Replace {
                    let line = state.cursor.line;
                    let col = state.cursor.column;
                    if col < state.buffer.line_len(line) {
                        state.buffer.remove_in_line(line, col, col + 1);
                    }
                    state.buffer.insert_in_line(line, col, &c.to_string());
                    state.cursor.column = col + 1;
                } else {
                    insert_text_at_cursor(state, &c.to_string());
                    if let Some(block) = state.block_insert.as_mut() {
                        block.inserted.push(c);
                    }
                }
            }
        }
    }

    fn leave_insert(&self, state: &mut EditorState, depth: usize) {
        // 可视块插入：把录入的文本复制到其余各行
        if let Some(block) = state.block_insert.take() {
            if !block.inserted.is_empty() {
                for line in block.top..=block.bottom {
                    if line == state.cursor.line {
                        continue;
                    }
                    let len = state.buffer.line_len(line);
                    if block.append && len < block.col {
                        let pad = " ".repeat(block.col - len);
                        state.buffer.insert_in_line(line, len, &pad);
                    } else if !block.append && len < block.col {
                        continue;
                    }
                    state.buffer.insert_in_line(line, block.col, &block.inserted);
                }
            }
        }

        state.mode = Mode::Normal;
        if state.cursor.column > 0 {
            state.cursor.column -= 1;
        }
        state.cursor.clamp_normal(&state.buffer);
        state.cursor.update_preferred_column();

        let repeat = state.insert_repeat;
        state.insert_repeat = 0;
        let mut tokens = std::mem::take(&mut state.insert_record);
        if repeat > 1 && !tokens.is_empty() {
            // 光标停在已插入文本的末字符上，重复从这里继续追加
            if matches!(tokens[0].as_str(), "i" | "I" | "a" | "A") {
                tokens[0] = "a".to_string();
            }
            // 整个计数插入会话只占一个撤销步
            let undo_len = state.undo_stack.len();
            for _ in 1..repeat {
                for token in &tokens {
                    self.dispatch(state, token, depth + 1);
                }
            }
            state.undo_stack.truncate(undo_len);
        }
    }

    // ==================== Command line ====================

    fn handle_command(&self, state: &mut EditorState, token: &str, depth: usize) {
        match token {
            "<CR>" => {
                let line = std::mem::take(&mut state.command_line);
                state.mode = Mode::Normal;
                self.run_command_line(state, &line, depth);
            }
            "<Esc>" => {
                state.command_line.clear();
                state.mode = Mode::Normal;
            }
            "<BS>" => {
                state.command_line.pop();
                if state.command_line.is_empty() {
                    state.mode = Mode::Normal;
                }
            }
            _ => {
                if token.chars().count() == 1 {
                    state.command_line.push_str(token);
                }
            }
        }
    }

    pub(crate) fn run_command_line(&self, state: &mut EditorState, line: &str, depth: usize) {
        if let Some(rest) = line.strip_prefix(':') {
            ex::execute(self, state, rest, depth);
        } else if let Some(pattern) = line.strip_prefix('/') {
            run_search(state, pattern, SearchDirection::Forward);
        } else if let Some(pattern) = line.strip_prefix('?') {
            run_search(state, pattern, SearchDirection::Backward);
        }
    }
}

fn is_command_entry(token: &str) -> bool {
    token.starts_with(':') || token.starts_with('/') || token.starts_with('?')
}

/// 可视块插入复制所需的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInsert {
    pub top: usize,
    pub bottom: usize,
    pub col: usize,
    pub append: bool,
    pub inserted: String,
}

/// 等待后续输入的单键命令状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    Operator(PendingOperator),
    /// f/F/t/T：(till, backward)
    Find { till: bool, backward: bool },
    ReplaceChar,
    Mark,
    GotoMark { exact: bool },
    Register,
    RecordRegister,
    PlayRegister,
    GPrefix,
    /// 可视模式里 i/a 等待对象键
    VisualScope(ObjectScope),
    /// 可视模式 r 等待替换字符
    VisualReplaceChar,
    /// 插入模式 <C-r> 等待寄存器名
    InsertRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastFind {
    pub ch: char,
    pub till: bool,
    pub backward: bool,
}

#[derive(Clone)]
pub struct Snapshot {
    pub buffer: Buffer,
    pub cursor: Cursor,
}

/// 编辑器聚合状态
///
/// 单一聚合值，`execute_keystroke` 克隆后变换；撤销快照持有独立的缓冲区
/// 拷贝（rope 克隆是廉价的持久结构共享）。
#[derive(Clone)]
pub struct EditorState {
    pub buffer: Buffer,
    pub cursor: Cursor,
    pub mode: Mode,
    pub pending: Option<Pending>,
    pub count_buffer: String,
    /// `"x` 选中的寄存器，供下一个操作使用
    pub selected_register: Option<char>,
    pub registers: RegisterManager,
    pub undo_stack: Vec<Snapshot>,
    pub redo_stack: Vec<Snapshot>,
    pub marks: HashMap<char, (usize, usize)>,
    pub visual_anchor: Option<(usize, usize)>,
    pub block_insert: Option<BlockInsert>,
    pub search: SearchState,
    pub last_find: Option<LastFind>,
    /// dot-repeat：上一次修改命令的记号序列与计数
    pub last_change: Vec<String>,
    pub last_change_count: usize,
    pub change_record: Vec<String>,
    pub change_mutated: bool,
    pub no_repeat: bool,
    pub insert_repeat: usize,
    pub insert_record: Vec<String>,
    pub recording_register: Option<char>,
    pub macro_buffer: Vec<String>,
    pub last_macro_register: Option<char>,
    pub command_line: String,
    pub options: Options,
}

impl EditorState {
    pub fn new(text: &str, options: Options) -> Self {
        Self {
            buffer: Buffer::from_text(text),
            cursor: Cursor::at_origin(),
            mode: Mode::Normal,
            pending: None,
            count_buffer: String::new(),
            selected_register: None,
            registers: RegisterManager::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            marks: HashMap::new(),
            visual_anchor: None,
            block_insert: None,
            search: SearchState::new(),
            last_find: None,
            last_change: Vec::new(),
            last_change_count: 0,
            change_record: Vec::new(),
            change_mutated: false,
            no_repeat: false,
            insert_repeat: 0,
            insert_record: Vec::new(),
            recording_register: None,
            macro_buffer: Vec::new(),
            last_macro_register: None,
            command_line: String::new(),
            options,
        }
    }

    /// 渲染缓冲区为文本（各行以 `\n` 连接，结尾单个换行）
    pub fn text(&self) -> String {
        self.buffer.to_text()
    }

    /// 修改前快照；每个修改命令的分支入口都显式调用
    pub fn save_undo(&mut self) {
        self.undo_stack.push(Snapshot {
            buffer: self.buffer.clone(),
            cursor: self.cursor,
        });
        if self.undo_stack.len() > UNDO_LIMIT {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    pub fn undo(&mut self) {
        if let Some(snapshot) = self.undo_stack.pop() {
            self.redo_stack.push(Snapshot {
                buffer: self.buffer.clone(),
                cursor: self.cursor,
            });
            self.buffer = snapshot.buffer;
            self.cursor = snapshot.cursor;
            self.cursor.clamp_normal(&self.buffer);
        }
    }

    pub fn redo(&mut self) {
        if let Some(snapshot) = self.redo_stack.pop() {
            self.undo_stack.push(Snapshot {
                buffer: self.buffer.clone(),
                cursor: self.cursor,
            });
            self.buffer = snapshot.buffer;
            self.cursor = snapshot.cursor;
            self.cursor.clamp_normal(&self.buffer);
        }
    }

    /// 取走累计的计数前缀；0 表示未给出
    pub fn take_count(&mut self) -> usize {
        let count = self.count_buffer.parse().unwrap_or(0);
        self.count_buffer.clear();
        count
    }

    fn commit_last_change(&mut self) {
        let mut tokens = std::mem::take(&mut self.change_record);
        let mut count = 0usize;
        while let Some(first) = tokens.first() {
            let is_digit = first.len() == 1
                && first.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
                && !(count == 0 && first == "0");
            if !is_digit {
                break;
            }
            let digit = first.chars().next().unwrap_or('0') as usize - '0' as usize;
            count = count * 10 + digit;
            tokens.remove(0);
        }
        if tokens.is_empty() {
            return;
        }
        self.last_change = tokens;
        self.last_change_count = count;
        self.marks.insert('.', self.cursor.position());
    }
}

// ==================== 共享编辑原语 ====================

/// 在光标处插入文本（可含换行），光标移到插入内容之后
pub(crate) fn insert_text_at_cursor(state: &mut EditorState, text: &str) {
    let line = state.cursor.line;
    let col = state.cursor.column.min(state.buffer.line_len(line));
    if !text.contains('\n') {
        state.buffer.insert_in_line(line, col, text);
        state.cursor.column = col + text.chars().count();
        return;
    }

    let current: Vec<char> = state.buffer.line(line).unwrap_or_default().chars().collect();
    let head: String = current[..col.min(current.len())].iter().collect();
    let tail: String = current[col.min(current.len())..].iter().collect();
    let mut parts = text.split('\n');
    let first = parts.next().unwrap_or_default();
    state.buffer.set_line(line, &format!("{}{}", head, first));
    let mut at = line + 1;
    let mut last_text = String::new();
    for part in parts {
        state.buffer.insert_line(at, part);
        last_text = part.to_string();
        at += 1;
    }
    let last_line = at - 1;
    let col_after = last_text.chars().count();
    state.buffer.set_line(
        last_line,
        &format!("{}{}", state.buffer.line(last_line).unwrap_or_default(), tail),
    );
    state.cursor.line = last_line;
    state.cursor.column = col_after;
}

/// p / P 粘贴
pub(crate) fn paste(state: &mut EditorState, before: bool, count: usize, register: Option<char>) {
    let Some((content, linewise)) = state.registers.paste_content(register) else {
        state.no_repeat = true;
        return;
    };
    let count = count.max(1);
    state.save_undo();

    if linewise {
        let mut lines: Vec<&str> = content.split('\n').collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }
        let insert_at = if before {
            state.cursor.line
        } else {
            state.cursor.line + 1
        };
        let mut at = insert_at;
        for _ in 0..count {
            for line in &lines {
                state.buffer.insert_line(at, line);
                at += 1;
            }
        }
        state.cursor.line = insert_at.min(state.buffer.len_lines().saturating_sub(1));
        state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
        return;
    }

    let text = content.repeat(count);
    let line = state.cursor.line;
    let line_len = state.buffer.line_len(line);
    let insert_col = if before || line_len == 0 {
        state.cursor.column.min(line_len)
    } else {
        (state.cursor.column + 1).min(line_len)
    };

    if text.contains('\n') {
        state.cursor.column = insert_col;
        insert_text_at_cursor(state, &text);
        // 多行字符粘贴后光标落在粘贴起点
        state.cursor.line = line;
        state.cursor.column = insert_col;
        state.cursor.clamp_normal(&state.buffer);
    } else {
        state.buffer.insert_in_line(line, insert_col, &text);
        state.cursor.column = insert_col + text.chars().count().saturating_sub(1);
        state.cursor.clamp_normal(&state.buffer);
    }
}

fn run_search(state: &mut EditorState, pattern: &str, direction: SearchDirection) {
    let raw = pattern.trim_end_matches("<CR>");
    let delim = match direction {
        SearchDirection::Forward => '/',
        SearchDirection::Backward => '?',
    };
    // `/pat/offset` 形式：未转义的分隔符之后是偏移段，引擎不承载偏移语义；
    // 因此 `//` 等价于空模式（重复上次搜索）
    let mut pat = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(n) if n == delim => pat.push(n),
                Some(n) => {
                    pat.push('\\');
                    pat.push(n);
                }
                None => pat.push('\\'),
            }
        } else if c == delim {
            break;
        } else {
            pat.push(c);
        }
    }
    let pattern = if pat.is_empty() {
        state.search.pattern.clone()
    } else {
        pat
    };
    if pattern.is_empty() {
        return;
    }
    let lines = state.buffer.lines();
    state.search.run(&lines, &pattern, direction, &state.options);
    state.registers.set_search(&pattern);
    if let Some((line, col)) =
        state
            .search
            .next_match(state.cursor.position(), false, state.options.wrapscan)
    {
        state.cursor.line = line;
        state.cursor.column = col;
        state.cursor.clamp_normal(&state.buffer);
        state.cursor.update_preferred_column();
    }
}

/// `*` / `#`：光标下的单词按词边界搜索
pub(crate) fn search_word_under_cursor(state: &mut EditorState, backward: bool) {
    let line = state.buffer.line(state.cursor.line).unwrap_or_default();
    let Some(word) = crate::search::word_under_cursor(&line, state.cursor.column) else {
        return;
    };
    if backward {
        // 向后搜索从单词起点出发，跳过光标所在的这一次出现
        let chars: Vec<char> = line.chars().collect();
        let is_word = |c: char| c.is_alphanumeric() || c == '_';
        let mut start = state.cursor.column.min(chars.len().saturating_sub(1));
        while start > 0 && is_word(chars[start.saturating_sub(1)]) && is_word(chars[start]) {
            start -= 1;
        }
        state.cursor.column = start;
    }
    let pattern = format!("\\<{}\\>", regex_literal(&word));
    let direction = if backward {
        SearchDirection::Backward
    } else {
        SearchDirection::Forward
    };
    run_search(state, &pattern, direction);
}

fn regex_literal(word: &str) -> String {
    // 单词字符无需转义，保险起见处理一下标点
    word.chars()
        .flat_map(|c| {
            if c.is_alphanumeric() || c == '_' {
                vec![c]
            } else {
                vec!['\\', c]
            }
        })
        .collect()
}

// ==================== 顶层 API ====================

pub fn create_initial_state(text: &str) -> EditorState {
    EditorState::new(text, Options::default())
}

pub fn create_initial_state_with_options(text: &str, options: Options) -> EditorState {
    EditorState::new(text, options)
}

/// 免句柄的便捷入口（无外壳命令能力）
pub fn execute_keystroke(state: &EditorState, token: &str) -> EditorState {
    Engine::new().execute_keystroke(state, token)
}

/// 宏播放：寄存器内容重新记号化后逐个重放
pub(crate) fn play_macro(
    engine: &Engine,
    state: &mut EditorState,
    register: char,
    count: usize,
    depth: usize,
) {
    let register = if register == '@' {
        match state.last_macro_register {
            Some(reg) => reg,
            None => {
                state.no_repeat = true;
                return;
            }
        }
    } else {
        register
    };
    let Some(content) = state.registers.get(register).map(|r| r.content.clone()) else {
        state.no_repeat = true;
        return;
    };
    if content.is_empty() {
        state.no_repeat = true;
        return;
    }
    state.last_macro_register = Some(register);
    let tokens = tokenize_keystrokes(&content);
    for _ in 0..count.max(1) {
        for token in &tokens {
            engine.dispatch(state, token, depth + 1);
        }
    }
    state.no_repeat = true;
}
