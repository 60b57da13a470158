use std::collections::HashMap;

/// 寄存器系统
///
/// 寄存器类型:
/// - `"` (unnamed): 默认寄存器，删除/复制操作自动使用
/// - `0`: 最近一次复制
/// - `1`-`9`: 删除历史环（1 最新，9 最旧）
/// - `-`: 小删除寄存器（行内字符删除）
/// - `a`-`z`: 命名寄存器；`A`-`Z` 追加到对应小写寄存器
/// - `_`: 黑洞寄存器，内容被丢弃
/// - `/`: 搜索寄存器
#[derive(Debug, Clone)]
pub struct Register {
    pub content: String,
    pub linewise: bool,
    pub from_delete: bool,
}

impl Register {
    pub fn new(content: impl Into<String>, linewise: bool, from_delete: bool) -> Self {
        Self {
            content: content.into(),
            linewise,
            from_delete,
        }
    }

    pub fn empty() -> Self {
        Self::new("", false, false)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn lines(&self) -> Vec<&str> {
        self.content.lines().collect()
    }
}

#[derive(Debug, Clone)]
pub struct RegisterManager {
    unnamed: Register,
    small_delete: Register,
    /// 0 是最近复制，1-9 是删除环
    numbered: Vec<Register>,
    named: HashMap<char, Register>,
    search: Register,
}

impl RegisterManager {
    pub fn new() -> Self {
        Self {
            unnamed: Register::empty(),
            small_delete: Register::empty(),
            numbered: (0..=9).map(|_| Register::empty()).collect(),
            named: HashMap::new(),
            search: Register::empty(),
        }
    }

    /// 读取寄存器；黑洞和未知名字返回 None
    pub fn get(&self, name: char) -> Option<&Register> {
        match name {
            '"' => Some(&self.unnamed),
            '-' => Some(&self.small_delete),
            '0'..='9' => self.numbered.get(name.to_digit(10).unwrap_or(0) as usize),
            'a'..='z' | 'A'..='Z' => self.named.get(&name.to_ascii_lowercase()),
            '/' => Some(&self.search),
            _ => None,
        }
    }

    /// 粘贴取值：返回 (内容, linewise)
    pub fn paste_content(&self, name: Option<char>) -> Option<(String, bool)> {
        let register = self.get(name.unwrap_or('"'))?;
        if register.is_empty() {
            return None;
        }
        Some((register.content.clone(), register.linewise))
    }

    /// 复制语义写入
    ///
    /// 指定命名寄存器时同步写入 `"`；任何复制都会更新 `0`。
    pub fn set_yank(&mut self, content: impl Into<String>, target: Option<char>, linewise: bool) {
        let content = content.into();
        let register = Register::new(content, linewise, false);
        match target {
            Some('_') => {}
            Some(c @ 'a'..='z') => {
                self.named.insert(c, register.clone());
                self.unnamed = register.clone();
                self.numbered[0] = register;
            }
            Some(c @ 'A'..='Z') => {
                self.append_named(c.to_ascii_lowercase(), &register);
                let merged = self.named[&c.to_ascii_lowercase()].clone();
                self.unnamed = merged.clone();
                self.numbered[0] = merged;
            }
            Some(c @ '0'..='9') => {
                let idx = c.to_digit(10).unwrap_or(0) as usize;
                self.numbered[idx] = register.clone();
                self.unnamed = register;
            }
            _ => {
                self.unnamed = register.clone();
                self.numbered[0] = register;
            }
        }
    }

    /// 删除语义写入
    ///
    /// 黑洞丢弃；显式寄存器写入该寄存器和 `"`；默认情形下整行/跨行删除
    /// 先把 1-9 环右移再写入 `1`，行内字符删除写入小删除寄存器 `-`。
    pub fn set_delete(&mut self, content: impl Into<String>, target: Option<char>, linewise: bool) {
        let content = content.into();
        let register = Register::new(content, linewise, true);
        match target {
            Some('_') => {}
            Some(c @ 'a'..='z') => {
                self.named.insert(c, register.clone());
                self.unnamed = register;
            }
            Some(c @ 'A'..='Z') => {
                self.append_named(c.to_ascii_lowercase(), &register);
                self.unnamed = self.named[&c.to_ascii_lowercase()].clone();
            }
            Some(c @ '0'..='9') => {
                let idx = c.to_digit(10).unwrap_or(0) as usize;
                self.numbered[idx] = register.clone();
                self.unnamed = register;
            }
            _ => {
                if linewise || register.content.contains('\n') {
                    for i in (2..=9).rev() {
                        self.numbered[i] = self.numbered[i - 1].clone();
                    }
                    self.numbered[1] = register.clone();
                } else {
                    self.small_delete = register.clone();
                }
                self.unnamed = register;
            }
        }
    }

    fn append_named(&mut self, lower: char, register: &Register) {
        let entry = self
            .named
            .entry(lower)
            .or_insert_with(Register::empty);
        if entry.linewise && !entry.content.ends_with('\n') && !entry.content.is_empty() {
            entry.content.push('\n');
        }
        entry.content.push_str(&register.content);
        entry.linewise = entry.linewise || register.linewise;
        entry.from_delete = register.from_delete;
    }

    /// 直接写入，不触碰无名寄存器（宏录制用；大写名追加）
    pub fn set_raw(&mut self, name: char, content: impl Into<String>, linewise: bool) {
        let register = Register::new(content, linewise, false);
        match name {
            '"' => self.unnamed = register,
            '-' => self.small_delete = register,
            '0'..='9' => {
                let idx = name.to_digit(10).unwrap_or(0) as usize;
                self.numbered[idx] = register;
            }
            'a'..='z' => {
                self.named.insert(name, register);
            }
            'A'..='Z' => self.append_named(name.to_ascii_lowercase(), &register),
            '/' => self.search = register,
            _ => {}
        }
    }

    pub fn set_search(&mut self, pattern: impl Into<String>) {
        self.search = Register::new(pattern, false, false);
    }

    pub fn get_search(&self) -> &str {
        &self.search.content
    }
}

impl Default for RegisterManager {
    fn default() -> Self {
        Self::new()
    }
}
