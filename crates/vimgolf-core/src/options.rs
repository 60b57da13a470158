use serde::{Deserialize, Serialize};

/// 编辑器选项
///
/// 在一次按键分发过程中不可变；搜索和 Ex 命令模块按需读取。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub ignorecase: bool,
    pub smartcase: bool,
    pub hlsearch: bool,
    pub incsearch: bool,
    pub wrapscan: bool,
    pub autoindent: bool,
    pub scrolloff: usize,
    /// `>` / `<` 每次缩进的空格数
    pub shiftwidth: usize,
    /// `gq` 重排的目标宽度
    pub textwidth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignorecase: false,
            smartcase: false,
            hlsearch: true,
            incsearch: true,
            wrapscan: true,
            autoindent: false,
            scrolloff: 0,
            shiftwidth: 2,
            textwidth: 79,
        }
    }
}
