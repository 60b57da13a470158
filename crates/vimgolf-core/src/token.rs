use crate::mode::Mode;

/// 按键记号化
///
/// 三类记号：
/// - `<...>` 方括号记号（`<Esc>`、`<CR>`、`<C-a>` 等），整体算一次按键
/// - 以 `:`、`/`、`?` 开头的命令行记号，一直延伸到 `<CR>`（含）
/// - 其余均为单字符记号
///
/// 未闭合的方括号/命令行记号不是错误：流式调用方应等待更多输入。

/// 从剩余输入中提取下一个记号；返回 None 表示输入不完整
pub fn extract_keystroke(remaining: &str, mode: Mode) -> Option<String> {
    let first = remaining.chars().next()?;
    if first == '<' {
        return remaining
            .find('>')
            .map(|pos| remaining[..=pos].to_string());
    }
    let command_entry = matches!(
        mode,
        Mode::Normal | Mode::Visual | Mode::VisualLine | Mode::VisualBlock
    );
    if command_entry && (first == ':' || first == '/' || first == '?') {
        return remaining
            .find("<CR>")
            .map(|pos| remaining[..pos + 4].to_string());
    }
    Some(first.to_string())
}

/// 整串记号化
///
/// 批量变体不跟踪模式（见 extract_keystroke），命令行记号在任意位置都被
/// 识别。末尾未闭合的记号原样作为最后一个记号返回。
pub fn tokenize_keystrokes(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        match extract_keystroke(rest, Mode::Normal) {
            Some(token) => {
                rest = &rest[token.len()..];
                tokens.push(token);
            }
            None => {
                tokens.push(rest.to_string());
                break;
            }
        }
    }
    tokens
}

/// 按键计数（vimgolf 记分）
///
/// 方括号记号算 1；命令行记号按字符数计，结尾的 `<CR>` 算 1。
pub fn count_keystrokes(raw: &str) -> usize {
    tokenize_keystrokes(raw)
        .iter()
        .map(|token| {
            if token.starts_with('<') && token.ends_with('>') {
                1
            } else if (token.starts_with(':') || token.starts_with('/') || token.starts_with('?'))
                && token.ends_with("<CR>")
            {
                token[..token.len() - 4].chars().count() + 1
            } else {
                token.chars().count().max(1)
            }
        })
        .sum()
}

/// 文本规范化：行尾统一为 `\n`，非空文本以单个 `\n` 结尾
pub fn normalize_text(text: &str) -> String {
    let mut normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}
