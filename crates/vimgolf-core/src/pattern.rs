use crate::options::Options;
use regex::Regex;

/// Vim 正则到 Rust 正则的翻译
///
/// 默认 "magic" 模式：裸的 `( ) { } + ? | =` 是字面字符，反斜杠形式
/// `\( \) \{ \} \+ \? \| \=` 才是元字符（与普通正则相反）；`.` `*` `[ ]`
/// `^` `$` 保持元字符含义。`\<` `\>` 翻译为 `\b`。
/// 前缀 `\v`（very magic）时其余部分基本原样透传，`<` `>` 翻译为 `\b`，
/// `=` 翻译为 `?`。
pub fn translate_vim_pattern(pattern: &str) -> String {
    if let Some(rest) = pattern.strip_prefix("\\v") {
        return translate_very_magic(rest);
    }
    translate_magic(pattern)
}

fn translate_magic(pattern: &str) -> String {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                // 反斜杠形式还原为正则元字符
                Some(c @ ('(' | ')' | '{' | '}' | '+' | '?' | '|')) => out.push(c),
                Some('=') => out.push('?'),
                Some('<') | Some('>') => out.push_str("\\b"),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                // 字面化的 magic 元字符
                Some(c @ ('.' | '*' | '^' | '$' | '[' | ']' | '/' | '~' | '\\')) => {
                    out.push('\\');
                    out.push(c);
                }
                // 字符类缩写原样透传
                Some(c @ ('w' | 'W' | 's' | 'S' | 'd' | 'D' | 'a' | 'A')) => match c {
                    'a' => out.push_str("[A-Za-z]"),
                    'A' => out.push_str("[^A-Za-z]"),
                    c => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some('h') => out.push_str("[A-Za-z_]"),
                // \zs / \ze 无法表达，丢弃
                Some('z') => {
                    chars.next();
                }
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                }
                None => out.push('\\'),
            }
        } else {
            match ch {
                // magic 模式下这些是字面字符
                '(' | ')' | '{' | '}' | '+' | '?' | '|' => {
                    out.push('\\');
                    out.push(ch);
                }
                _ => out.push(ch),
            }
        }
    }
    out
}

fn translate_very_magic(pattern: &str) -> String {
    let mut out = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(c) = chars.next() {
                    match c {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        _ => {
                            out.push('\\');
                            out.push(c);
                        }
                    }
                } else {
                    out.push('\\');
                }
            }
            '<' | '>' => out.push_str("\\b"),
            '=' => out.push('?'),
            _ => out.push(ch),
        }
    }
    out
}

/// 翻译并编译；失败时退回字面匹配，再失败返回 None
///
/// 大小写规则：模式里的 `\c`/`\C` 最优先，其次 smartcase（模式含大写字母
/// 时区分大小写），最后 ignorecase。
pub fn compile(pattern: &str, force_ignorecase: bool, options: &Options) -> Option<Regex> {
    let mut pattern = pattern.to_string();
    let mut ignore = force_ignorecase
        || (options.ignorecase
            && !(options.smartcase && pattern.chars().any(|c| c.is_ascii_uppercase())));
    if pattern.contains("\\c") {
        ignore = true;
        pattern = pattern.replace("\\c", "");
    } else if pattern.contains("\\C") {
        ignore = false;
        pattern = pattern.replace("\\C", "");
    }

    let translated = translate_vim_pattern(&pattern);
    let with_flags = |body: &str| {
        if ignore {
            format!("(?i){}", body)
        } else {
            body.to_string()
        }
    };

    match Regex::new(&with_flags(&translated)) {
        Ok(re) => Some(re),
        Err(_) => {
            tracing::debug!(pattern = %pattern, "pattern rejected, falling back to literal");
            Regex::new(&with_flags(&regex::escape(&pattern))).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_literal_parens() {
        assert_eq!(translate_vim_pattern("(a)"), "\\(a\\)");
        assert_eq!(translate_vim_pattern("\\(a\\)"), "(a)");
    }

    #[test]
    fn test_magic_quantifiers() {
        assert_eq!(translate_vim_pattern("a\\+b\\?"), "a+b?");
        assert_eq!(translate_vim_pattern("a+"), "a\\+");
        assert_eq!(translate_vim_pattern("a*"), "a*");
    }

    #[test]
    fn test_word_boundaries() {
        assert_eq!(translate_vim_pattern("\\<word\\>"), "\\bword\\b");
    }

    #[test]
    fn test_alternation() {
        assert_eq!(translate_vim_pattern("a\\|b"), "a|b");
        assert_eq!(translate_vim_pattern("a|b"), "a\\|b");
    }

    #[test]
    fn test_very_magic_passthrough() {
        assert_eq!(translate_vim_pattern("\\v(a|b)+"), "(a|b)+");
        assert_eq!(translate_vim_pattern("\\v<word>"), "\\bword\\b");
    }

    #[test]
    fn test_compile_smartcase() {
        let mut options = Options::default();
        options.ignorecase = true;
        options.smartcase = true;

        let re = compile("abc", false, &options).unwrap();
        assert!(re.is_match("ABC"));

        let re = compile("Abc", false, &options).unwrap();
        assert!(!re.is_match("abc"));
    }

    #[test]
    fn test_compile_invalid_falls_back_to_literal() {
        let options = Options::default();
        // `\q` 不是合法转义，字面回退后应当匹配字面文本
        let re = compile("a\\qb", false, &options);
        assert!(re.is_some());
    }
}
