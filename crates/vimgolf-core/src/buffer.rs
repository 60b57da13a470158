use ropey::Rope;

/// 行缓冲区
///
/// 内部用 rope 存储，行与行之间以 `\n` 分隔，末尾不带换行。
/// 不变量：至少有一行（可以为空行）。所有索引越界都被钳制，绝不 panic。
#[derive(Debug, Clone)]
pub struct Buffer {
    rope: Rope,
}

impl Buffer {
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// 从原始文本创建缓冲区
    ///
    /// 行尾统一为 `\n`，末尾的单个换行符不产生额外空行
    /// （与 Vim 读取文件的行为一致）。
    pub fn from_text(text: &str) -> Self {
        let mut normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        if normalized.ends_with('\n') {
            normalized.pop();
        }
        Self {
            rope: Rope::from_str(&normalized),
        }
    }

    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// 获取一行内容（不含换行符）
    pub fn line(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let mut text = self.rope.line(line_idx).to_string();
        if text.ends_with('\n') {
            text.pop();
        }
        Some(text)
    }

    /// 行长度（字符数，不含换行符）
    pub fn line_len(&self, line_idx: usize) -> usize {
        self.line(line_idx).map(|l| l.chars().count()).unwrap_or(0)
    }

    pub fn lines(&self) -> Vec<String> {
        (0..self.len_lines()).filter_map(|i| self.line(i)).collect()
    }

    /// 用新的行列表重建缓冲区
    pub fn set_lines(&mut self, lines: Vec<String>) {
        let lines = if lines.is_empty() {
            vec![String::new()]
        } else {
            lines
        };
        self.rope = Rope::from_str(&lines.join("\n"));
    }

    /// 整行替换
    pub fn set_line(&mut self, line_idx: usize, text: &str) {
        if line_idx >= self.rope.len_lines() {
            return;
        }
        let start = self.rope.line_to_char(line_idx);
        let len = self.line_len(line_idx);
        self.rope.remove(start..start + len);
        self.rope.insert(start, text);
    }

    /// 在 line_idx 之前插入一行；line_idx == len_lines 表示追加到末尾
    pub fn insert_line(&mut self, line_idx: usize, text: &str) {
        let total = self.rope.len_lines();
        if line_idx >= total {
            let end = self.rope.len_chars();
            self.rope.insert(end, "\n");
            self.rope.insert(end + 1, text);
        } else {
            let start = self.rope.line_to_char(line_idx);
            self.rope.insert(start, text);
            self.rope.insert(start + text.chars().count(), "\n");
        }
    }

    /// 删除一行并返回其内容；只剩一行时将其清空而不是删除
    pub fn remove_line(&mut self, line_idx: usize) -> Option<String> {
        let total = self.rope.len_lines();
        if line_idx >= total {
            return None;
        }
        let content = self.line(line_idx)?;
        if total == 1 {
            self.rope = Rope::new();
            return Some(content);
        }
        let start = self.rope.line_to_char(line_idx);
        if line_idx + 1 < total {
            let next = self.rope.line_to_char(line_idx + 1);
            self.rope.remove(start..next);
        } else {
            // 最后一行：连同前面的换行符一起删除
            self.rope
                .remove(start.saturating_sub(1)..self.rope.len_chars());
        }
        Some(content)
    }

    /// 在行内插入文本（text 不应包含换行符）
    pub fn insert_in_line(&mut self, line_idx: usize, col: usize, text: &str) {
        if let Some(line) = self.line(line_idx) {
            let mut chars: Vec<char> = line.chars().collect();
            let col = col.min(chars.len());
            let insert: Vec<char> = text.chars().collect();
            chars.splice(col..col, insert);
            self.set_line(line_idx, &chars.iter().collect::<String>());
        }
    }

    /// 删除行内 [start, end) 区间的字符，返回删除的文本
    pub fn remove_in_line(&mut self, line_idx: usize, start: usize, end: usize) -> String {
        if let Some(line) = self.line(line_idx) {
            let mut chars: Vec<char> = line.chars().collect();
            let start = start.min(chars.len());
            let end = end.min(chars.len()).max(start);
            let removed: String = chars.drain(start..end).collect();
            self.set_line(line_idx, &chars.iter().collect::<String>());
            removed
        } else {
            String::new()
        }
    }

    pub fn char_at(&self, line_idx: usize, col: usize) -> Option<char> {
        self.line(line_idx)?.chars().nth(col)
    }

    /// 当前行第一个非空白字符的列
    pub fn first_non_blank(&self, line_idx: usize) -> usize {
        self.line(line_idx)
            .map(|l| l.chars().position(|c| !c.is_whitespace()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// 渲染为规范文本：各行以 `\n` 连接并以单个 `\n` 结尾；
    /// 空缓冲区（单个空行）渲染为空串
    pub fn to_text(&self) -> String {
        if self.rope.len_chars() == 0 {
            return String::new();
        }
        let mut text = self.rope.to_string();
        text.push('\n');
        text
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_line_count() {
        let buffer = Buffer::from_text("Line 1\nLine 2\nLine 3");
        assert_eq!(buffer.len_lines(), 3);
        assert_eq!(buffer.line(0).unwrap(), "Line 1");
        assert_eq!(buffer.line(2).unwrap(), "Line 3");
    }

    #[test]
    fn test_trailing_newline_no_extra_line() {
        let buffer = Buffer::from_text("foo\nbar\n");
        assert_eq!(buffer.len_lines(), 2);
        assert_eq!(buffer.line(1).unwrap(), "bar");
    }

    #[test]
    fn test_empty_buffer_has_one_line() {
        let buffer = Buffer::from_text("");
        assert_eq!(buffer.len_lines(), 1);
        assert_eq!(buffer.line(0).unwrap(), "");
    }

    #[test]
    fn test_set_line() {
        let mut buffer = Buffer::from_text("aaa\nbbb\nccc");
        buffer.set_line(1, "BBB");
        assert_eq!(buffer.to_text(), "aaa\nBBB\nccc\n");
    }

    #[test]
    fn test_insert_and_remove_line() {
        let mut buffer = Buffer::from_text("a\nc");
        buffer.insert_line(1, "b");
        assert_eq!(buffer.to_text(), "a\nb\nc\n");

        let removed = buffer.remove_line(1);
        assert_eq!(removed, Some("b".to_string()));
        assert_eq!(buffer.to_text(), "a\nc\n");
    }

    #[test]
    fn test_remove_last_remaining_line_keeps_one_empty() {
        let mut buffer = Buffer::from_text("only");
        buffer.remove_line(0);
        assert_eq!(buffer.len_lines(), 1);
        assert_eq!(buffer.line(0).unwrap(), "");
    }

    #[test]
    fn test_line_edits() {
        let mut buffer = Buffer::from_text("hello");
        buffer.insert_in_line(0, 5, " world");
        assert_eq!(buffer.line(0).unwrap(), "hello world");

        let removed = buffer.remove_in_line(0, 0, 6);
        assert_eq!(removed, "hello ");
        assert_eq!(buffer.line(0).unwrap(), "world");
    }

    #[test]
    fn test_crlf_normalized() {
        let buffer = Buffer::from_text("a\r\nb\rc");
        assert_eq!(buffer.lines(), vec!["a", "b", "c"]);
    }
}
