use crate::editor::{
    insert_text_at_cursor, paste, play_macro, search_word_under_cursor, BlockInsert, EditorState,
    Engine, LastFind, Pending,
};
use crate::mode::Mode;
use crate::motion::{self, Motion, MotionContext, Span};
use crate::operator::{self, CaseKind, Operator, PendingOperator};
use crate::text_object::{self, ObjectScope};

/// Normal 模式分发
///
/// 记号按优先级处理：等待中的子命令 -> 命令行/搜索入口 -> 计数 ->
/// 操作符/动作/独立命令。未知记号清掉计数后按无操作处理。
pub(crate) fn handle_normal(engine: &Engine, state: &mut EditorState, token: &str, depth: usize) {
    if let Some(pending) = state.pending.take() {
        handle_pending(engine, state, pending, token, depth);
        return;
    }

    if token.starts_with(':') || token.starts_with('/') || token.starts_with('?') {
        state.take_count();
        if let Some(line) = token.strip_suffix("<CR>") {
            engine.run_command_line(state, line, depth);
        } else {
            // 没有 <CR> 的命令行片段（宏内容逐字符重放时出现）
            state.mode = Mode::Command;
            state.command_line = token.to_string();
        }
        return;
    }

    let single = single_char(token);

    if let Some(c) = single {
        if c.is_ascii_digit() && !(c == '0' && state.count_buffer.is_empty()) {
            state.count_buffer.push(c);
            return;
        }
    }

    if let Some(op) = Operator::from_key(token) {
        let count = state.take_count();
        let register = state.selected_register.take();
        state.pending = Some(Pending::Operator(PendingOperator::new(op, count, register)));
        return;
    }

    match token {
        "\"" => state.pending = Some(Pending::Register),
        "g" => state.pending = Some(Pending::GPrefix),
        "f" => state.pending = Some(Pending::Find { till: false, backward: false }),
        "F" => state.pending = Some(Pending::Find { till: false, backward: true }),
        "t" => state.pending = Some(Pending::Find { till: true, backward: false }),
        "T" => state.pending = Some(Pending::Find { till: true, backward: true }),
        ";" => repeat_find(state, false),
        "," => repeat_find(state, true),
        "m" => state.pending = Some(Pending::Mark),
        "'" => state.pending = Some(Pending::GotoMark { exact: false }),
        "`" => state.pending = Some(Pending::GotoMark { exact: true }),
        "q" => {
            if let Some(register) = state.recording_register.take() {
                let content: String = state.macro_buffer.join("");
                state.registers.set_raw(register, content, false);
                state.macro_buffer.clear();
            } else {
                state.pending = Some(Pending::RecordRegister);
            }
            state.no_repeat = true;
        }
        "@" => state.pending = Some(Pending::PlayRegister),
        "." => dot_repeat(engine, state, depth),
        "u" => {
            let count = state.take_count().max(1);
            for _ in 0..count {
                state.undo();
            }
            state.no_repeat = true;
        }
        "<C-r>" => {
            let count = state.take_count().max(1);
            for _ in 0..count {
                state.redo();
            }
            state.no_repeat = true;
        }
        "i" => {
            let count = state.take_count();
            enter_insert(state, count, "i");
            state.cursor.clamp_insert(&state.buffer);
        }
        "I" => {
            let count = state.take_count();
            enter_insert(state, count, "I");
            state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
        }
        "a" => {
            let count = state.take_count();
            enter_insert(state, count, "a");
            let len = state.buffer.line_len(state.cursor.line);
            if len > 0 {
                state.cursor.column = (state.cursor.column + 1).min(len);
            }
        }
        "A" => {
            let count = state.take_count();
            enter_insert(state, count, "A");
            state.cursor.column = state.buffer.line_len(state.cursor.line);
        }
        "o" => {
            let count = state.take_count();
            enter_insert(state, count, "o");
            open_line(state, false);
        }
        "O" => {
            let count = state.take_count();
            enter_insert(state, count, "O");
            open_line(state, true);
        }
        "r" => state.pending = Some(Pending::ReplaceChar),
        "R" => {
            let count = state.take_count();
            state.save_undo();
            state.mode = Mode::Replace;
            state.insert_repeat = count.max(1);
            state.insert_record = if count > 1 {
                vec!["R".to_string()]
            } else {
                Vec::new()
            };
        }
        "x" | "<Del>" => delete_chars_forward(state),
        "X" => delete_chars_backward(state),
        "s" => {
            let register = state.selected_register.take();
            let count = state.take_count().max(1);
            let line = state.cursor.line;
            let col = state.cursor.column;
            let end = (col + count).min(state.buffer.line_len(line));
            state.save_undo();
            if end > col {
                let removed = state.buffer.remove_in_line(line, col, end);
                state.registers.set_delete(removed, register, false);
            }
            state.mode = Mode::Insert;
            state.insert_repeat = 1;
            state.insert_record.clear();
            state.cursor.clamp_insert(&state.buffer);
        }
        "S" => {
            let count = state.take_count();
            let register = state.selected_register.take();
            let span = Span::linewise(
                state.cursor.line,
                state.cursor.line + count.max(1) - 1,
            );
            apply_operator_span(
                state,
                &PendingOperator::new(Operator::Change, 0, register),
                span,
            );
        }
        "C" => {
            let register = state.selected_register.take();
            state.take_count();
            let line = state.cursor.line;
            let col = state.cursor.column;
            let len = state.buffer.line_len(line);
            state.save_undo();
            if len > col {
                let removed = state.buffer.remove_in_line(line, col, len);
                state.registers.set_delete(removed, register, false);
            }
            state.mode = Mode::Insert;
            state.insert_repeat = 1;
            state.insert_record.clear();
            state.cursor.clamp_insert(&state.buffer);
        }
        "D" => {
            let register = state.selected_register.take();
            state.take_count();
            let line = state.cursor.line;
            let col = state.cursor.column;
            let len = state.buffer.line_len(line);
            if len > col {
                state.save_undo();
                let removed = state.buffer.remove_in_line(line, col, len);
                state.registers.set_delete(removed, register, false);
                state.cursor.clamp_normal(&state.buffer);
            }
        }
        "Y" => {
            let register = state.selected_register.take();
            let count = state.take_count().max(1);
            let span = Span::linewise(state.cursor.line, state.cursor.line + count - 1);
            let text = operator::span_text(&state.buffer, &span);
            state.registers.set_yank(text, register, true);
        }
        "~" => toggle_case_chars(state),
        "J" => {
            let count = state.take_count();
            join_lines(state, count, true);
        }
        "p" => {
            let register = state.selected_register.take();
            let count = state.take_count();
            paste(state, false, count, register);
        }
        "P" => {
            let register = state.selected_register.take();
            let count = state.take_count();
            paste(state, true, count, register);
        }
        "v" => {
            state.take_count();
            state.visual_anchor = Some(state.cursor.position());
            state.mode = Mode::Visual;
        }
        "V" => {
            state.take_count();
            state.visual_anchor = Some(state.cursor.position());
            state.mode = Mode::VisualLine;
        }
        "<C-v>" => {
            state.take_count();
            state.visual_anchor = Some(state.cursor.position());
            state.mode = Mode::VisualBlock;
        }
        "*" => {
            state.take_count();
            search_word_under_cursor(state, false);
        }
        "#" => {
            state.take_count();
            search_word_under_cursor(state, true);
        }
        "<C-a>" => increment_number(state, 1),
        "<C-x>" => increment_number(state, -1),
        "<CR>" | "+" => {
            let count = state.take_count().max(1);
            state.cursor.move_down(&state.buffer, count);
            state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
        }
        "-" => {
            let count = state.take_count().max(1);
            state.cursor.move_up(&state.buffer, count);
            state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
        }
        "<Esc>" => {
            state.take_count();
            state.selected_register = None;
        }
        _ => {
            if let Some(m) = motion::parse_motion_key(token) {
                let count = state.take_count();
                move_cursor(state, &m, count);
            } else {
                state.take_count();
            }
        }
    }
}

fn single_char(token: &str) -> Option<char> {
    let mut chars = token.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        None
    } else {
        Some(first)
    }
}

// ==================== 等待态 ====================

fn handle_pending(
    engine: &Engine,
    state: &mut EditorState,
    pending: Pending,
    token: &str,
    depth: usize,
) {
    match pending {
        Pending::Operator(po) => handle_operator_pending(state, po, token),
        Pending::Find { till, backward } => {
            let count = state.take_count();
            if let Some(ch) = single_char(token) {
                state.last_find = Some(LastFind { ch, till, backward });
                move_cursor(state, &Motion::FindChar { ch, till, backward }, count);
            }
        }
        Pending::ReplaceChar => {
            let count = state.take_count().max(1);
            let Some(ch) = single_char(token) else { return };
            let line = state.cursor.line;
            let col = state.cursor.column;
            if col + count <= state.buffer.line_len(line) {
                state.save_undo();
                state.buffer.remove_in_line(line, col, col + count);
                let replacement: String = std::iter::repeat(ch).take(count).collect();
                state.buffer.insert_in_line(line, col, &replacement);
                state.cursor.column = col + count - 1;
            }
        }
        Pending::Mark => {
            if let Some(ch) = single_char(token) {
                state.marks.insert(ch, state.cursor.position());
            }
        }
        Pending::GotoMark { exact } => {
            state.take_count();
            if let Some(ch) = single_char(token) {
                move_cursor(state, &Motion::Mark { ch, exact }, 0);
            }
        }
        Pending::Register => {
            if let Some(ch) = single_char(token) {
                if ch.is_ascii_alphanumeric() || matches!(ch, '"' | '-' | '_' | '/') {
                    state.selected_register = Some(ch);
                }
            }
        }
        Pending::RecordRegister => {
            if let Some(ch) = single_char(token) {
                if ch.is_ascii_alphanumeric() {
                    state.recording_register = Some(ch);
                    state.macro_buffer.clear();
                }
            }
            state.no_repeat = true;
        }
        Pending::PlayRegister => {
            let count = state.take_count();
            if let Some(ch) = single_char(token) {
                play_macro(engine, state, ch, count.max(1), depth);
            }
        }
        Pending::GPrefix => handle_g_prefix(state, token),
        // 其余等待态只出现在别的模式
        _ => {}
    }
}

fn handle_g_prefix(state: &mut EditorState, token: &str) {
    match token {
        "g" => {
            let count = state.take_count();
            move_cursor(state, &Motion::GoToFirst, count);
        }
        "U" | "u" | "~" | "q" => {
            let operator = Operator::from_g_key(token).unwrap_or(Operator::ToggleCase);
            let count = state.take_count();
            let register = state.selected_register.take();
            state.pending = Some(Pending::Operator(PendingOperator::new(
                operator, count, register,
            )));
        }
        "J" => {
            let count = state.take_count();
            join_lines(state, count, false);
        }
        _ => {
            state.take_count();
        }
    }
}

fn handle_operator_pending(state: &mut EditorState, mut po: PendingOperator, token: &str) {
    if let Some((till, backward)) = po.find.take() {
        if let Some(ch) = single_char(token) {
            state.last_find = Some(LastFind { ch, till, backward });
            apply_operator_motion(state, po, Motion::FindChar { ch, till, backward });
        } else {
            state.take_count();
        }
        return;
    }

    if let Some(exact) = po.goto_mark.take() {
        if let Some(ch) = single_char(token) {
            apply_operator_motion(state, po, Motion::Mark { ch, exact });
        } else {
            state.take_count();
        }
        return;
    }

    if let Some(scope) = po.scope {
        if let Some(key) = single_char(token) {
            state.take_count();
            if let Some(span) =
                text_object::object_range(&state.buffer, state.cursor.position(), scope, key)
            {
                apply_operator_span(state, &po, span);
            }
        } else {
            state.take_count();
        }
        return;
    }

    if token == "<Esc>" {
        state.take_count();
        return;
    }

    if let Some(c) = single_char(token) {
        if c.is_ascii_digit() {
            if c == '0' && state.count_buffer.is_empty() {
                apply_operator_motion(state, po, Motion::LineStart);
            } else {
                state.count_buffer.push(c);
                state.pending = Some(Pending::Operator(po));
            }
            return;
        }
    }

    match token {
        "i" => {
            po.scope = Some(ObjectScope::Inner);
            state.pending = Some(Pending::Operator(po));
        }
        "a" => {
            po.scope = Some(ObjectScope::Around);
            state.pending = Some(Pending::Operator(po));
        }
        "g" if !po.g_prefix => {
            po.g_prefix = true;
            state.pending = Some(Pending::Operator(po));
        }
        "f" | "F" | "t" | "T" => {
            po.find = Some((token == "t" || token == "T", token == "F" || token == "T"));
            state.pending = Some(Pending::Operator(po));
        }
        "'" => {
            po.goto_mark = Some(false);
            state.pending = Some(Pending::Operator(po));
        }
        "`" => {
            po.goto_mark = Some(true);
            state.pending = Some(Pending::Operator(po));
        }
        ";" | "," => {
            if let Some(lf) = state.last_find {
                let backward = if token == "," { !lf.backward } else { lf.backward };
                apply_operator_motion(
                    state,
                    po,
                    Motion::FindChar { ch: lf.ch, till: lf.till, backward },
                );
            } else {
                state.take_count();
            }
        }
        _ if po.g_prefix => {
            if token == "g" {
                apply_operator_motion(state, po, Motion::GoToFirst);
            } else if token == po.operator.double_key() {
                apply_operator_double(state, po);
            } else {
                state.take_count();
            }
        }
        _ if token == po.operator.double_key() => apply_operator_double(state, po),
        _ if token.starts_with('/') || token.starts_with('?') => {
            let backward = token.starts_with('?');
            let pattern = token[1..].trim_end_matches("<CR>").to_string();
            if pattern.is_empty() {
                state.take_count();
                return;
            }
            apply_operator_motion(state, po, Motion::SearchPattern { pattern, backward });
        }
        _ => {
            if let Some(m) = motion::parse_motion_key(token) {
                apply_operator_motion(state, po, m);
            } else {
                state.take_count();
            }
        }
    }
}

fn combined_count(operator_count: usize, motion_count: usize) -> usize {
    if operator_count == 0 && motion_count == 0 {
        0
    } else {
        operator_count.max(1) * motion_count.max(1)
    }
}

fn apply_operator_motion(state: &mut EditorState, po: PendingOperator, m: Motion) {
    let motion_count = state.take_count();
    let count = combined_count(po.count, motion_count);

    // cw/cW 在非空白字符上表现为 ce/cE
    let m = if po.operator == Operator::Change {
        match m {
            Motion::WordForward { big } => {
                let on_blank = state
                    .buffer
                    .char_at(state.cursor.line, state.cursor.column)
                    .map(|c| c.is_whitespace())
                    .unwrap_or(true);
                if on_blank {
                    Motion::WordForward { big }
                } else {
                    Motion::WordEnd { big }
                }
            }
            other => other,
        }
    } else {
        m
    };

    let ctx = MotionContext {
        buffer: &state.buffer,
        cursor: state.cursor,
        count,
        marks: &state.marks,
        search: &state.search,
        options: &state.options,
    };
    if let Some(span) = motion::compute_motion_range(&m, &ctx) {
        apply_operator_span(state, &po, span);
    }
}

fn apply_operator_double(state: &mut EditorState, po: PendingOperator) {
    let motion_count = state.take_count();
    let count = combined_count(po.count, motion_count).max(1);
    let end = state.cursor.line + count - 1;
    let span = Span::linewise(state.cursor.line, end);
    apply_operator_span(state, &po, span);
}

pub(crate) fn apply_operator_span(state: &mut EditorState, po: &PendingOperator, span: Span) {
    let register = po.register;
    match po.operator {
        Operator::Delete => {
            state.save_undo();
            let (text, (line, col)) = operator::delete_span(&mut state.buffer, &span);
            if text.is_empty() && !span.linewise {
                // 空范围：撤销栈里不留无效快照
                state.undo_stack.pop();
                return;
            }
            state.registers.set_delete(text, register, span.linewise);
            state.cursor.line = line;
            state.cursor.column = col;
            state.cursor.clamp_normal(&state.buffer);
            state.cursor.update_preferred_column();
        }
        Operator::Change => {
            state.save_undo();
            if span.linewise {
                let indent: String = if state.options.autoindent {
                    state
                        .buffer
                        .line(span.start_line)
                        .unwrap_or_default()
                        .chars()
                        .take_while(|c| *c == ' ' || *c == '\t')
                        .collect()
                } else {
                    String::new()
                };
                let (text, _) = operator::delete_span(&mut state.buffer, &span);
                state.registers.set_delete(text, register, true);
                let at = span.start_line.min(state.buffer.len_lines());
                state.buffer.insert_line(at, &indent);
                // 原缓冲区只剩一个空行时 insert_line 会多出一行
                if state.buffer.line_len(at + 1) == 0 && state.buffer.len_lines() == 2 {
                    state.buffer.remove_line(at + 1);
                }
                state.cursor.line = at;
                state.cursor.column = indent.chars().count();
            } else {
                let (text, (line, col)) = operator::delete_span(&mut state.buffer, &span);
                state.registers.set_delete(text, register, false);
                state.cursor.line = line;
                state.cursor.column = col;
            }
            state.mode = Mode::Insert;
            state.insert_repeat = 1;
            state.insert_record.clear();
            state.cursor.clamp_insert(&state.buffer);
        }
        Operator::Yank => {
            let text = operator::span_text(&state.buffer, &span);
            if text.is_empty() {
                return;
            }
            state.registers.set_yank(text, register, span.linewise);
            if span.linewise {
                state.cursor.line = state.cursor.line.min(span.start_line);
            } else {
                state.cursor.line = span.start_line;
                state.cursor.column = span.start_col;
            }
            state.cursor.clamp_normal(&state.buffer);
        }
        Operator::Indent | Operator::Dedent => {
            state.save_undo();
            operator::indent_span(
                &mut state.buffer,
                &span,
                po.operator == Operator::Dedent,
                state.options.shiftwidth,
            );
            state.cursor.line = span.start_line;
            state.cursor.column = state.buffer.first_non_blank(span.start_line);
            state.cursor.clamp_normal(&state.buffer);
        }
        Operator::Reindent => {
            // 引擎没有缩进规则，= 只移动光标
            state.cursor.line = span.start_line;
            state.cursor.column = state.buffer.first_non_blank(span.start_line);
            state.cursor.clamp_normal(&state.buffer);
        }
        Operator::Uppercase | Operator::Lowercase | Operator::ToggleCase => {
            state.save_undo();
            let kind = match po.operator {
                Operator::Uppercase => CaseKind::Upper,
                Operator::Lowercase => CaseKind::Lower,
                _ => CaseKind::Toggle,
            };
            operator::case_span(&mut state.buffer, &span, kind);
            state.cursor.line = span.start_line;
            if !span.linewise {
                state.cursor.column = span.start_col;
            }
            state.cursor.clamp_normal(&state.buffer);
        }
        Operator::Format => {
            state.save_undo();
            operator::format_span(&mut state.buffer, &span, state.options.textwidth);
            state.cursor.line = span.start_line.min(state.buffer.len_lines().saturating_sub(1));
            state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
        }
    }
}

// ==================== 独立编辑命令 ====================

fn enter_insert(state: &mut EditorState, count: usize, entry: &str) {
    state.save_undo();
    state.mode = Mode::Insert;
    state.insert_repeat = count.max(1);
    state.insert_record = if count > 1 {
        vec![entry.to_string()]
    } else {
        Vec::new()
    };
}

fn open_line(state: &mut EditorState, above: bool) {
    let indent: String = if state.options.autoindent {
        state
            .buffer
            .line(state.cursor.line)
            .unwrap_or_default()
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    } else {
        String::new()
    };
    let at = if above {
        state.cursor.line
    } else {
        state.cursor.line + 1
    };
    state.buffer.insert_line(at, &indent);
    state.cursor.line = at;
    state.cursor.column = indent.chars().count();
    state.cursor.clamp_insert(&state.buffer);
}

fn delete_chars_forward(state: &mut EditorState) {
    let register = state.selected_register.take();
    let count = state.take_count().max(1);
    let line = state.cursor.line;
    let col = state.cursor.column;
    let end = (col + count).min(state.buffer.line_len(line));
    if end <= col {
        return;
    }
    state.save_undo();
    let removed = state.buffer.remove_in_line(line, col, end);
    state.registers.set_delete(removed, register, false);
    state.cursor.clamp_normal(&state.buffer);
    state.cursor.update_preferred_column();
}

fn delete_chars_backward(state: &mut EditorState) {
    let register = state.selected_register.take();
    let count = state.take_count().max(1);
    let line = state.cursor.line;
    let col = state.cursor.column;
    let start = col.saturating_sub(count);
    if start >= col {
        return;
    }
    state.save_undo();
    let removed = state.buffer.remove_in_line(line, start, col);
    state.registers.set_delete(removed, register, false);
    state.cursor.column = start;
    state.cursor.update_preferred_column();
}

fn toggle_case_chars(state: &mut EditorState) {
    let count = state.take_count().max(1);
    let line = state.cursor.line;
    let col = state.cursor.column;
    let len = state.buffer.line_len(line);
    if col >= len {
        return;
    }
    let end = (col + count).min(len);
    state.save_undo();
    operator::case_span(
        &mut state.buffer,
        &Span::charwise((line, col), (line, end)),
        CaseKind::Toggle,
    );
    state.cursor.column = end.min(len.saturating_sub(1));
    state.cursor.update_preferred_column();
}

/// J / gJ：连接 count 行（默认 2）
fn join_lines(state: &mut EditorState, count: usize, with_space: bool) {
    let joins = count.max(2) - 1;
    let line = state.cursor.line;
    if line + 1 >= state.buffer.len_lines() {
        return;
    }
    state.save_undo();
    let mut join_col = state.cursor.column;
    for _ in 0..joins {
        if line + 1 >= state.buffer.len_lines() {
            break;
        }
        let current = state.buffer.line(line).unwrap_or_default();
        let next = state.buffer.line(line + 1).unwrap_or_default();
        let joined = if with_space {
            let trimmed = next.trim_start();
            join_col = current.chars().count();
            if current.is_empty() {
                trimmed.to_string()
            } else if current.ends_with(' ') || trimmed.starts_with(')') || trimmed.is_empty() {
                format!("{}{}", current, trimmed)
            } else {
                format!("{} {}", current, trimmed)
            }
        } else {
            join_col = current.chars().count();
            format!("{}{}", current, next)
        };
        state.buffer.set_line(line, &joined);
        state.buffer.remove_line(line + 1);
    }
    state.cursor.column = join_col;
    state.cursor.clamp_normal(&state.buffer);
}

/// <C-a> / <C-x>：光标处或其后的十进制数加减
fn increment_number(state: &mut EditorState, sign: i64) {
    let count = state.take_count().max(1) as i64;
    let line = state.cursor.line;
    let chars: Vec<char> = state
        .buffer
        .line(line)
        .unwrap_or_default()
        .chars()
        .collect();
    let col = state.cursor.column.min(chars.len().saturating_sub(1));

    let Some(mut start) = (col..chars.len()).find(|&i| chars[i].is_ascii_digit()) else {
        return;
    };
    while start > 0 && chars[start - 1].is_ascii_digit() {
        start -= 1;
    }
    let negative = start > 0 && chars[start - 1] == '-';
    let num_start = if negative { start - 1 } else { start };
    let mut end = start;
    while end < chars.len() && chars[end].is_ascii_digit() {
        end += 1;
    }
    let text: String = chars[num_start..end].iter().collect();
    let Ok(value) = text.parse::<i64>() else { return };
    let new_value = value + sign * count;

    state.save_undo();
    state.buffer.remove_in_line(line, num_start, end);
    let rendered = new_value.to_string();
    state.buffer.insert_in_line(line, num_start, &rendered);
    state.cursor.column = num_start + rendered.chars().count() - 1;
}

fn repeat_find(state: &mut EditorState, invert: bool) {
    let count = state.take_count();
    let Some(lf) = state.last_find else {
        return;
    };
    let backward = if invert { !lf.backward } else { lf.backward };
    move_cursor(
        state,
        &Motion::FindChar {
            ch: lf.ch,
            till: lf.till,
            backward,
        },
        count,
    );
}

fn dot_repeat(engine: &Engine, state: &mut EditorState, depth: usize) {
    let count_override = state.take_count();
    if state.last_change.is_empty() {
        state.no_repeat = true;
        return;
    }
    let count = if count_override > 0 {
        count_override
    } else {
        state.last_change_count
    };
    let mut sequence: Vec<String> = Vec::new();
    if count > 0 {
        sequence.extend(count.to_string().chars().map(|c| c.to_string()));
    }
    sequence.extend(state.last_change.clone());
    for token in sequence {
        engine.dispatch(state, &token, depth + 1);
    }
    state.no_repeat = true;
}

pub(crate) fn move_cursor(state: &mut EditorState, m: &Motion, count: usize) {
    match m {
        Motion::Up => state.cursor.move_up(&state.buffer, count.max(1)),
        Motion::Down => state.cursor.move_down(&state.buffer, count.max(1)),
        _ => {
            let ctx = MotionContext {
                buffer: &state.buffer,
                cursor: state.cursor,
                count,
                marks: &state.marks,
                search: &state.search,
                options: &state.options,
            };
            let Some((line, col)) = motion::target(m, &ctx) else {
                return;
            };
            state.cursor.line = line.min(state.buffer.len_lines().saturating_sub(1));
            state.cursor.column = col;
            state.cursor.clamp_normal(&state.buffer);
            if matches!(m, Motion::LineEnd) {
                state.cursor.preferred_column = Some(usize::MAX);
            } else {
                state.cursor.update_preferred_column();
            }
        }
    }
}

// ==================== Visual 家族 ====================

pub(crate) fn handle_visual(engine: &Engine, state: &mut EditorState, token: &str, depth: usize) {
    if let Some(pending) = state.pending.take() {
        match pending {
            Pending::Find { till, backward } => {
                let count = state.take_count();
                if let Some(ch) = single_char(token) {
                    state.last_find = Some(LastFind { ch, till, backward });
                    move_cursor(state, &Motion::FindChar { ch, till, backward }, count);
                }
            }
            Pending::GotoMark { exact } => {
                state.take_count();
                if let Some(ch) = single_char(token) {
                    move_cursor(state, &Motion::Mark { ch, exact }, 0);
                }
            }
            Pending::Register => {
                if let Some(ch) = single_char(token) {
                    if ch.is_ascii_alphanumeric() || matches!(ch, '"' | '-' | '_' | '/') {
                        state.selected_register = Some(ch);
                    }
                }
            }
            Pending::VisualScope(scope) => {
                state.take_count();
                if let Some(key) = single_char(token) {
                    select_object(state, scope, key);
                }
            }
            Pending::VisualReplaceChar => {
                if let Some(ch) = single_char(token) {
                    visual_replace_char(state, ch);
                }
            }
            Pending::GPrefix => handle_visual_g(state, token),
            _ => {}
        }
        return;
    }

    if token.starts_with(':') {
        set_visual_marks(state);
        state.visual_anchor = None;
        state.mode = Mode::Normal;
        if let Some(line) = token.strip_suffix("<CR>") {
            engine.run_command_line(state, line, depth);
        } else {
            state.mode = Mode::Command;
            state.command_line = token.to_string();
        }
        return;
    }
    if token.starts_with('/') || token.starts_with('?') {
        if let Some(line) = token.strip_suffix("<CR>") {
            // 搜索扩展选区
            let backward = line.starts_with('?');
            let pattern = line[1..].to_string();
            if !pattern.is_empty() {
                move_cursor(
                    state,
                    &Motion::SearchPattern { pattern, backward },
                    0,
                );
            }
        }
        return;
    }

    if let Some(c) = single_char(token) {
        if c.is_ascii_digit() && !(c == '0' && state.count_buffer.is_empty()) {
            state.count_buffer.push(c);
            return;
        }
    }

    match token {
        "<Esc>" => exit_visual(state),
        "v" => {
            if state.mode == Mode::Visual {
                exit_visual(state);
            } else {
                state.mode = Mode::Visual;
            }
        }
        "V" => {
            if state.mode == Mode::VisualLine {
                exit_visual(state);
            } else {
                state.mode = Mode::VisualLine;
            }
        }
        "<C-v>" => {
            if state.mode == Mode::VisualBlock {
                exit_visual(state);
            } else {
                state.mode = Mode::VisualBlock;
            }
        }
        "o" => {
            if let Some(anchor) = state.visual_anchor {
                state.visual_anchor = Some(state.cursor.position());
                state.cursor.line = anchor.0;
                state.cursor.column = anchor.1;
                state.cursor.clamp_normal(&state.buffer);
            }
        }
        "\"" => state.pending = Some(Pending::Register),
        "i" if state.mode != Mode::VisualBlock => {
            state.pending = Some(Pending::VisualScope(ObjectScope::Inner));
        }
        "a" if state.mode != Mode::VisualBlock => {
            state.pending = Some(Pending::VisualScope(ObjectScope::Around));
        }
        "I" if state.mode == Mode::VisualBlock => block_insert(state, false),
        "A" if state.mode == Mode::VisualBlock => block_insert(state, true),
        "i" | "a" => {
            state.pending = Some(Pending::VisualScope(if token == "i" {
                ObjectScope::Inner
            } else {
                ObjectScope::Around
            }));
        }
        "d" | "x" | "<Del>" => visual_operator(state, Operator::Delete, false),
        "D" | "X" => visual_operator(state, Operator::Delete, true),
        "c" | "s" => visual_operator(state, Operator::Change, false),
        "C" | "S" | "R" => visual_operator(state, Operator::Change, true),
        "y" => visual_operator(state, Operator::Yank, false),
        "Y" => visual_operator(state, Operator::Yank, true),
        ">" => visual_operator(state, Operator::Indent, false),
        "<" => visual_operator(state, Operator::Dedent, false),
        "=" => visual_operator(state, Operator::Reindent, false),
        "u" => visual_operator(state, Operator::Lowercase, false),
        "U" => visual_operator(state, Operator::Uppercase, false),
        "~" => visual_operator(state, Operator::ToggleCase, false),
        "J" => {
            let span = visual_span(state);
            let top = span.start_line;
            let lines = span.end_line - span.start_line + 1;
            exit_visual(state);
            state.cursor.line = top;
            join_lines(state, lines.max(2), true);
        }
        "r" => state.pending = Some(Pending::VisualReplaceChar),
        "p" | "P" => visual_paste(state),
        "f" => state.pending = Some(Pending::Find { till: false, backward: false }),
        "F" => state.pending = Some(Pending::Find { till: false, backward: true }),
        "t" => state.pending = Some(Pending::Find { till: true, backward: false }),
        "T" => state.pending = Some(Pending::Find { till: true, backward: true }),
        ";" => repeat_find(state, false),
        "," => repeat_find(state, true),
        "'" => state.pending = Some(Pending::GotoMark { exact: false }),
        "`" => state.pending = Some(Pending::GotoMark { exact: true }),
        "g" => state.pending = Some(Pending::GPrefix),
        "*" => {
            state.take_count();
            search_word_under_cursor(state, false);
        }
        "#" => {
            state.take_count();
            search_word_under_cursor(state, true);
        }
        _ => {
            if let Some(m) = motion::parse_motion_key(token) {
                let count = state.take_count();
                move_cursor(state, &m, count);
            } else {
                state.take_count();
            }
        }
    }
}

fn handle_visual_g(state: &mut EditorState, token: &str) {
    match token {
        "g" => {
            let count = state.take_count();
            move_cursor(state, &Motion::GoToFirst, count);
        }
        "U" => visual_operator(state, Operator::Uppercase, false),
        "u" => visual_operator(state, Operator::Lowercase, false),
        "~" => visual_operator(state, Operator::ToggleCase, false),
        "q" => visual_operator(state, Operator::Format, false),
        "J" => {
            let span = visual_span(state);
            let top = span.start_line;
            let lines = span.end_line - span.start_line + 1;
            exit_visual(state);
            state.cursor.line = top;
            join_lines(state, lines.max(2), false);
        }
        _ => {
            state.take_count();
        }
    }
}

/// 当前选区；VisualBlock 之外的模式
fn visual_span(state: &EditorState) -> Span {
    let anchor = state.visual_anchor.unwrap_or(state.cursor.position());
    let cursor = state.cursor.position();
    match state.mode {
        Mode::VisualLine => Span::linewise(anchor.0, cursor.0),
        _ => {
            let (start, end) = if anchor <= cursor {
                (anchor, cursor)
            } else {
                (cursor, anchor)
            };
            Span::charwise(start, (end.0, end.1 + 1))
        }
    }
}

/// 可视块的按行片段 (行, 左列, 右列开区间)
fn block_segments(state: &EditorState) -> Vec<(usize, usize, usize)> {
    let anchor = state.visual_anchor.unwrap_or(state.cursor.position());
    let cursor = state.cursor.position();
    let (top, bottom) = if anchor.0 <= cursor.0 {
        (anchor.0, cursor.0)
    } else {
        (cursor.0, anchor.0)
    };
    let (left, right) = if anchor.1 <= cursor.1 {
        (anchor.1, cursor.1)
    } else {
        (cursor.1, anchor.1)
    };
    (top..=bottom)
        .map(|line| {
            let len = state.buffer.line_len(line);
            (line, left.min(len), (right + 1).min(len))
        })
        .collect()
}

fn set_visual_marks(state: &mut EditorState) {
    let anchor = state.visual_anchor.unwrap_or(state.cursor.position());
    let cursor = state.cursor.position();
    let (start, end) = if anchor <= cursor {
        (anchor, cursor)
    } else {
        (cursor, anchor)
    };
    state.marks.insert('<', start);
    state.marks.insert('>', end);
}

fn exit_visual(state: &mut EditorState) {
    set_visual_marks(state);
    state.visual_anchor = None;
    state.mode = Mode::Normal;
    state.take_count();
    state.cursor.clamp_normal(&state.buffer);
}

fn select_object(state: &mut EditorState, scope: ObjectScope, key: char) {
    let Some(span) = text_object::object_range(&state.buffer, state.cursor.position(), scope, key)
    else {
        return;
    };
    if span.linewise {
        state.mode = Mode::VisualLine;
        state.visual_anchor = Some((span.start_line, 0));
        state.cursor.line = span.end_line.min(state.buffer.len_lines().saturating_sub(1));
        state.cursor.column = 0;
    } else {
        if span.is_empty() {
            return;
        }
        state.visual_anchor = Some((span.start_line, span.start_col));
        state.cursor.line = span.end_line;
        state.cursor.column = span.end_col.saturating_sub(1);
    }
    state.cursor.clamp_normal(&state.buffer);
}

fn visual_operator(state: &mut EditorState, op: Operator, force_linewise: bool) {
    let register = state.selected_register.take();
    state.take_count();

    if state.mode == Mode::VisualBlock && matches!(op, Operator::Delete | Operator::Change | Operator::Yank) {
        block_operator(state, op, register);
        return;
    }

    let mut span = visual_span(state);
    if force_linewise && !span.linewise {
        span = Span::linewise(span.start_line, span.end_line);
    }
    set_visual_marks(state);
    state.visual_anchor = None;
    state.mode = Mode::Normal;
    apply_operator_span(state, &PendingOperator::new(op, 0, register), span);
}

fn block_operator(state: &mut EditorState, op: Operator, register: Option<char>) {
    let segments = block_segments(state);
    let text: Vec<String> = segments
        .iter()
        .map(|&(line, start, end)| {
            let chars: Vec<char> = state.buffer.line(line).unwrap_or_default().chars().collect();
            chars[start.min(chars.len())..end.min(chars.len())].iter().collect()
        })
        .collect();
    let text = text.join("\n");
    let (top, left) = segments
        .first()
        .map(|&(line, start, _)| (line, start))
        .unwrap_or(state.cursor.position());
    let bottom = segments.last().map(|&(line, _, _)| line).unwrap_or(top);

    set_visual_marks(state);
    state.visual_anchor = None;
    state.mode = Mode::Normal;

    match op {
        Operator::Yank => {
            state.registers.set_yank(text, register, false);
        }
        Operator::Delete | Operator::Change => {
            state.save_undo();
            for &(line, start, end) in &segments {
                state.buffer.remove_in_line(line, start, end);
            }
            state.registers.set_delete(text, register, false);
            if op == Operator::Change {
                state.mode = Mode::Insert;
                state.insert_repeat = 1;
                state.insert_record.clear();
                state.block_insert = Some(BlockInsert {
                    top,
                    bottom,
                    col: left,
                    append: false,
                    inserted: String::new(),
                });
            }
        }
        _ => {}
    }
    state.cursor.line = top;
    state.cursor.column = left;
    if state.mode == Mode::Insert {
        state.cursor.clamp_insert(&state.buffer);
    } else {
        state.cursor.clamp_normal(&state.buffer);
    }
}

fn block_insert(state: &mut EditorState, append: bool) {
    let segments = block_segments(state);
    let (top, left) = segments
        .first()
        .map(|&(line, start, _)| (line, start))
        .unwrap_or(state.cursor.position());
    let bottom = segments.last().map(|&(line, _, _)| line).unwrap_or(top);
    let anchor = state.visual_anchor.unwrap_or(state.cursor.position());
    let right = anchor.1.max(state.cursor.position().1) + 1;
    let col = if append { right } else { left };

    set_visual_marks(state);
    state.visual_anchor = None;
    state.save_undo();
    state.mode = Mode::Insert;
    state.insert_repeat = 1;
    state.insert_record.clear();

    // 追加时光标行不够长则补空格
    let cursor_line_len = state.buffer.line_len(top);
    if append && cursor_line_len < col {
        let pad = " ".repeat(col - cursor_line_len);
        state.buffer.insert_in_line(top, cursor_line_len, &pad);
    }

    state.block_insert = Some(BlockInsert {
        top,
        bottom,
        col,
        append,
        inserted: String::new(),
    });
    state.cursor.line = top;
    state.cursor.column = col;
    state.cursor.clamp_insert(&state.buffer);
}

fn visual_replace_char(state: &mut EditorState, ch: char) {
    state.take_count();
    state.save_undo();
    if state.mode == Mode::VisualBlock {
        for (line, start, end) in block_segments(state) {
            let count = end.saturating_sub(start);
            if count > 0 {
                state.buffer.remove_in_line(line, start, end);
                let text: String = std::iter::repeat(ch).take(count).collect();
                state.buffer.insert_in_line(line, start, &text);
            }
        }
    } else {
        let span = visual_span(state);
        replace_span_chars(state, &span, ch);
    }
    let span_start = state
        .visual_anchor
        .map(|a| {
            let c = state.cursor.position();
            if a <= c {
                a
            } else {
                c
            }
        })
        .unwrap_or(state.cursor.position());
    set_visual_marks(state);
    state.visual_anchor = None;
    state.mode = Mode::Normal;
    state.cursor.line = span_start.0;
    state.cursor.column = span_start.1;
    state.cursor.clamp_normal(&state.buffer);
}

fn replace_span_chars(state: &mut EditorState, span: &Span, ch: char) {
    let max_line = state.buffer.len_lines().saturating_sub(1);
    for line in span.start_line..=span.end_line.min(max_line) {
        let len = state.buffer.line_len(line);
        let (start, end) = if span.linewise {
            (0, len)
        } else if span.start_line == span.end_line {
            (span.start_col.min(len), span.end_col.min(len))
        } else if line == span.start_line {
            (span.start_col.min(len), len)
        } else if line == span.end_line {
            (0, span.end_col.min(len))
        } else {
            (0, len)
        };
        if end > start {
            state.buffer.remove_in_line(line, start, end);
            let text: String = std::iter::repeat(ch).take(end - start).collect();
            state.buffer.insert_in_line(line, start, &text);
        }
    }
}

/// 可视模式粘贴：寄存器内容替换选区
fn visual_paste(state: &mut EditorState) {
    let register = state.selected_register.take();
    state.take_count();
    let Some((content, linewise)) = state.registers.paste_content(register) else {
        exit_visual(state);
        return;
    };

    let span = visual_span(state);
    set_visual_marks(state);
    state.visual_anchor = None;
    state.mode = Mode::Normal;

    state.save_undo();
    let (deleted, (line, col)) = operator::delete_span(&mut state.buffer, &span);
    state.registers.set_delete(deleted, None, span.linewise);
    state.cursor.line = line;
    state.cursor.column = col;
    let emptied = state.buffer.len_lines() == 1 && state.buffer.line_len(0) == 0;

    if linewise {
        let mut lines: Vec<&str> = content.split('\n').collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }
        let at = if span.linewise {
            state.cursor.line
        } else {
            state.cursor.line + 1
        };
        let mut insert_at = at;
        for text in lines {
            state.buffer.insert_line(insert_at, text);
            insert_at += 1;
        }
        if emptied {
            // 整个缓冲区被选区清空时去掉残留的空行
            state.buffer.remove_line(insert_at);
        }
        state.cursor.line = at.min(state.buffer.len_lines().saturating_sub(1));
        state.cursor.column = state.buffer.first_non_blank(state.cursor.line);
    } else {
        insert_text_at_cursor(state, &content);
        state.cursor.line = line;
        state.cursor.column = col;
        state.cursor.clamp_normal(&state.buffer);
    }
}
