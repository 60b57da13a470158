use crate::buffer::Buffer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
    pub preferred_column: Option<usize>,
}

impl Cursor {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            preferred_column: None,
        }
    }

    pub fn at_origin() -> Self {
        Self::new(0, 0)
    }

    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    pub fn update_preferred_column(&mut self) {
        self.preferred_column = Some(self.column);
    }

    /// Normal/Visual 模式钳制：列在 [0, line_len-1]
    pub fn clamp_normal(&mut self, buffer: &Buffer) {
        let max_line = buffer.len_lines().saturating_sub(1);
        self.line = self.line.min(max_line);
        let max_col = buffer.line_len(self.line).saturating_sub(1);
        self.column = self.column.min(max_col);
    }

    /// Insert 模式钳制：列可以停在行尾之后一格
    pub fn clamp_insert(&mut self, buffer: &Buffer) {
        let max_line = buffer.len_lines().saturating_sub(1);
        self.line = self.line.min(max_line);
        self.column = self.column.min(buffer.line_len(self.line));
    }

    pub fn move_left(&mut self, count: usize) {
        self.column = self.column.saturating_sub(count.max(1));
        self.update_preferred_column();
    }

    pub fn move_right(&mut self, buffer: &Buffer, count: usize) {
        let max_col = buffer.line_len(self.line).saturating_sub(1);
        self.column = (self.column + count.max(1)).min(max_col);
        self.update_preferred_column();
    }

    pub fn move_up(&mut self, buffer: &Buffer, count: usize) {
        self.line = self.line.saturating_sub(count.max(1));
        self.restore_preferred(buffer);
    }

    pub fn move_down(&mut self, buffer: &Buffer, count: usize) {
        let max_line = buffer.len_lines().saturating_sub(1);
        self.line = (self.line + count.max(1)).min(max_line);
        self.restore_preferred(buffer);
    }

    pub fn move_to_line_start(&mut self) {
        self.column = 0;
        self.update_preferred_column();
    }

    pub fn move_to_line_end(&mut self, buffer: &Buffer) {
        self.column = buffer.line_len(self.line).saturating_sub(1);
        // $ 之后继续 j/k 时停留在各行行尾
        self.preferred_column = Some(usize::MAX);
    }

    pub fn move_to_first_non_blank(&mut self, buffer: &Buffer) {
        self.column = buffer.first_non_blank(self.line);
        self.update_preferred_column();
    }

    /// j/k 之后按记忆列恢复
    fn restore_preferred(&mut self, buffer: &Buffer) {
        let max_col = buffer.line_len(self.line).saturating_sub(1);
        let preferred = self.preferred_column.unwrap_or(self.column);
        self.column = preferred.min(max_col);
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::at_origin()
    }
}
