use crate::options::Options;
use crate::pattern;

/// 搜索功能模块
///
/// - `/pattern` 向前搜索，`?pattern` 向后搜索
/// - `n` / `N` 沿用/反转上次方向重复
/// - `*` / `#` 以光标下的单词构造 `\<word\>` 模式
///
/// 模式先经过 Vim 正则翻译；非法模式退回字面匹配，仍失败则无匹配。
#[derive(Debug, Clone)]
pub struct SearchState {
    pub pattern: String,
    pub direction: SearchDirection,
    /// 所有匹配位置 (行, 列)，按缓冲区顺序
    pub matches: Vec<(usize, usize)>,
    pub current: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

impl SearchState {
    pub fn new() -> Self {
        Self {
            pattern: String::new(),
            direction: SearchDirection::Forward,
            matches: Vec::new(),
            current: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.pattern.is_empty()
    }

    /// 设置模式并收集全缓冲区匹配
    pub fn run(
        &mut self,
        lines: &[String],
        pattern: &str,
        direction: SearchDirection,
        options: &Options,
    ) {
        self.pattern = pattern.to_string();
        self.direction = direction;
        self.current = None;
        self.matches = collect_matches(lines, pattern, options);
    }

    /// 从 from 位置出发找下一个匹配；invert 表示 N（反向重复）
    pub fn next_match(
        &self,
        from: (usize, usize),
        invert: bool,
        wrapscan: bool,
    ) -> Option<(usize, usize)> {
        if self.matches.is_empty() {
            return None;
        }
        let forward = match (self.direction, invert) {
            (SearchDirection::Forward, false) | (SearchDirection::Backward, true) => true,
            _ => false,
        };
        if forward {
            self.matches
                .iter()
                .find(|&&m| m > from)
                .copied()
                .or_else(|| {
                    if wrapscan {
                        self.matches.first().copied()
                    } else {
                        None
                    }
                })
        } else {
            self.matches
                .iter()
                .rev()
                .find(|&&m| m < from)
                .copied()
                .or_else(|| {
                    if wrapscan {
                        self.matches.last().copied()
                    } else {
                        None
                    }
                })
        }
    }

    pub fn clear(&mut self) {
        self.pattern.clear();
        self.matches.clear();
        self.current = None;
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_matches(lines: &[String], pattern: &str, options: &Options) -> Vec<(usize, usize)> {
    let Some(re) = pattern::compile(pattern, false, options) else {
        return Vec::new();
    };
    let mut matches = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        for m in re.find_iter(line) {
            let col = line[..m.start()].chars().count();
            matches.push((line_idx, col));
            // 空匹配防护
            if m.end() == m.start() && m.end() >= line.len() {
                break;
            }
        }
    }
    matches
}

/// 一次性搜索入口：返回搜索状态和命中的第一个位置
pub fn perform_search(
    lines: &[String],
    pattern: &str,
    from_line: usize,
    from_col: usize,
    direction: SearchDirection,
    options: &Options,
) -> (SearchState, Option<(usize, usize)>) {
    let mut state = SearchState::new();
    state.run(lines, pattern, direction, options);
    let hit = state.next_match((from_line, from_col), false, options.wrapscan);
    (state, hit)
}

/// 光标下（或其后）的单词，用于 `*` / `#`
pub fn word_under_cursor(line: &str, col: usize) -> Option<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return None;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut idx = col.min(chars.len() - 1);
    // 光标不在单词上时向后找最近的单词
    while idx < chars.len() && !is_word(chars[idx]) {
        idx += 1;
    }
    if idx >= chars.len() {
        return None;
    }
    let mut start = idx;
    while start > 0 && is_word(chars[start - 1]) {
        start -= 1;
    }
    let mut end = idx;
    while end + 1 < chars.len() && is_word(chars[end + 1]) {
        end += 1;
    }
    Some(chars[start..=end].iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.split('\n').map(String::from).collect()
    }

    #[test]
    fn test_collect_matches() {
        let lines = lines("hello world\nhello again");
        let (state, _) = perform_search(
            &lines,
            "hello",
            0,
            0,
            SearchDirection::Forward,
            &Options::default(),
        );
        assert_eq!(state.matches, vec![(0, 0), (1, 0)]);
    }

    #[test]
    fn test_forward_search_skips_cursor_position() {
        let lines = lines("hello hello hello");
        let (_, hit) = perform_search(
            &lines,
            "hello",
            0,
            0,
            SearchDirection::Forward,
            &Options::default(),
        );
        assert_eq!(hit, Some((0, 6)));
    }

    #[test]
    fn test_wraparound() {
        let lines = lines("target\nmiddle\nend");
        let (_, hit) = perform_search(
            &lines,
            "target",
            2,
            0,
            SearchDirection::Forward,
            &Options::default(),
        );
        assert_eq!(hit, Some((0, 0)));
    }

    #[test]
    fn test_no_wrap_when_disabled() {
        let mut options = Options::default();
        options.wrapscan = false;
        let lines = lines("target\nmiddle\nend");
        let (_, hit) = perform_search(&lines, "target", 2, 0, SearchDirection::Forward, &options);
        assert_eq!(hit, None);
    }

    #[test]
    fn test_backward_search() {
        let lines = lines("a b a b a");
        let (_, hit) = perform_search(
            &lines,
            "a",
            0,
            4,
            SearchDirection::Backward,
            &Options::default(),
        );
        assert_eq!(hit, Some((0, 0)));
    }

    #[test]
    fn test_invalid_regex_falls_back_to_literal() {
        let lines = lines("a)b");
        let (state, hit) = perform_search(
            &lines,
            ")",
            0,
            0,
            SearchDirection::Forward,
            &Options::default(),
        );
        assert_eq!(state.matches.len(), 1);
        assert_eq!(hit, Some((0, 1)));
    }

    #[test]
    fn test_word_under_cursor() {
        assert_eq!(word_under_cursor("foo bar", 5), Some("bar".to_string()));
        assert_eq!(word_under_cursor("foo bar", 1), Some("foo".to_string()));
        // 光标在空白上取其后的单词
        assert_eq!(word_under_cursor("foo bar", 3), Some("bar".to_string()));
        assert_eq!(word_under_cursor("   ", 1), None);
    }
}
