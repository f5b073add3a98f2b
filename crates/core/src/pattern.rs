//! Package-name matching for the `--workspaces` filter.
//!
//! Supported syntax:
//! - `*` matches everything (as a whole pattern)
//! - `a,b,c` matches any of the comma-separated terms
//! - `*` / `?` match within one path segment, `**` across segments
//! - `[abc]`, `[a-z]`, `[!abc]` character classes
//! - `{a,b}` brace alternatives
//! - `(a|b)` / `@(a|b)` groups and `!(a|b)` negated groups
//! - a leading `!` negates the whole pattern

use std::cell::Cell;

/// Maximum number of recursive calls for one match. Bounds the work done by
/// patterns like `*a*a*a*a` against long names.
const MAX_MATCH_CALLS: usize = 100_000;

/// Whether `candidate` matches the filter `pattern`.
///
/// Empty candidates and empty patterns never match.
///
/// ```
/// use toolrig_core::pattern::is_match;
///
/// assert!(is_match("@scope/foo", "@scope/(foo|bar)"));
/// assert!(is_match("util", "core,util"));
/// assert!(!is_match("", "*"));
/// ```
#[must_use]
pub fn is_match(candidate: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    if candidate.is_empty() || pattern.is_empty() {
        return false;
    }

    if pattern == "*" {
        return true;
    }

    let terms = split_top_level(pattern, ',');
    if terms.len() > 1 {
        return terms
            .iter()
            .map(|term| term.trim())
            .filter(|term| !term.is_empty())
            .any(|term| term == candidate || glob_match(term, candidate));
    }

    glob_match(pattern, candidate)
}

/// Whether a string contains glob metacharacters.
///
/// ```
/// use toolrig_core::pattern::contains_glob;
///
/// assert!(contains_glob("src/**/*.ts"));
/// assert!(contains_glob("{a,b}.js"));
/// assert!(!contains_glob("src/index.ts"));
/// ```
#[must_use]
pub fn contains_glob(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Match a single glob term (no comma lists) against `input`.
#[must_use]
pub fn glob_match(pattern: &str, input: &str) -> bool {
    if let Some(negated) = pattern.strip_prefix('!')
        && !negated.starts_with('(')
    {
        return !glob_match(negated, input);
    }

    let input: Vec<char> = input.chars().collect();
    let calls = Cell::new(0usize);

    expand_braces(pattern).iter().any(|expanded| {
        let tokens = tokenize(&expanded.chars().collect::<Vec<_>>());
        match_tokens(&tokens, 0, &input, 0, &calls)
    })
}

/// Expand `{a,b}` groups into every alternative. Nested braces are supported.
///
/// ```
/// use toolrig_core::pattern::expand_braces;
///
/// assert_eq!(expand_braces("src/*.{js,ts}"), vec!["src/*.js", "src/*.ts"]);
/// ```
#[must_use]
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let chars: Vec<char> = pattern.chars().collect();

    let mut depth = 0usize;
    let mut start = None;
    let mut end = None;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    end = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }

    let (Some(start), Some(end)) = (start, end) else {
        return vec![pattern.to_string()];
    };

    let prefix: String = chars[..start].iter().collect();
    let suffix: String = chars[end + 1..].iter().collect();
    let content: String = chars[start + 1..end].iter().collect();

    split_top_level(&content, ',')
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}

/// Split on `sep` where it is not nested inside `{}`, `()` or `[]`.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in s.chars() {
        match c {
            '{' | '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            '}' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c == sep && depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(char),
    AnyChar,
    Star,
    GlobStar,
    Class {
        negated: bool,
        ranges: Vec<(char, char)>,
    },
    Group {
        negated: bool,
        optional: bool,
        alternatives: Vec<Vec<Self>>,
    },
}

fn tokenize(chars: &[char]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        // Extglob prefixes: !(..) @(..) ?(..)
        if matches!(c, '!' | '@' | '?')
            && next == Some('(')
            && let Some(close) = find_closing(chars, i + 1, '(', ')')
        {
            tokens.push(group(&chars[i + 2..close], c == '!', c == '?'));
            i = close + 1;
            continue;
        }

        match c {
            '(' => {
                if let Some(close) = find_closing(chars, i, '(', ')') {
                    tokens.push(group(&chars[i + 1..close], false, false));
                    i = close + 1;
                    continue;
                }
                tokens.push(Token::Literal(c));
            }
            '[' => {
                if let Some((token, len)) = parse_class(&chars[i..]) {
                    tokens.push(token);
                    i += len;
                    continue;
                }
                tokens.push(Token::Literal(c));
            }
            '*' => {
                if next == Some('*') {
                    tokens.push(Token::GlobStar);
                    while chars.get(i + 1) == Some(&'*') {
                        i += 1;
                    }
                } else {
                    tokens.push(Token::Star);
                }
            }
            '?' => tokens.push(Token::AnyChar),
            '\\' if next.is_some() => {
                tokens.push(Token::Literal(chars[i + 1]));
                i += 1;
            }
            c => tokens.push(Token::Literal(c)),
        }
        i += 1;
    }

    tokens
}

fn group(content: &[char], negated: bool, optional: bool) -> Token {
    let content: String = content.iter().collect();
    let alternatives = split_top_level(&content, '|')
        .iter()
        .map(|alt| tokenize(&alt.chars().collect::<Vec<_>>()))
        .collect();
    Token::Group {
        negated,
        optional,
        alternatives,
    }
}

fn find_closing(chars: &[char], open_at: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate().skip(open_at) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Parse `[...]`, returning the token and the number of chars consumed.
fn parse_class(chars: &[char]) -> Option<(Token, usize)> {
    let mut idx = 1;
    let negated = matches!(chars.get(idx), Some('!' | '^'));
    if negated {
        idx += 1;
    }

    let first = idx;
    let mut ranges = Vec::new();
    while idx < chars.len() {
        let c = chars[idx];
        if c == ']' && idx > first {
            return Some((Token::Class { negated, ranges }, idx + 1));
        }
        if idx + 2 < chars.len() && chars[idx + 1] == '-' && chars[idx + 2] != ']' {
            ranges.push((c, chars[idx + 2]));
            idx += 3;
        } else {
            ranges.push((c, c));
            idx += 1;
        }
    }

    None
}

fn match_tokens(tokens: &[Token], ti: usize, input: &[char], ii: usize, calls: &Cell<usize>) -> bool {
    let count = calls.get() + 1;
    calls.set(count);
    if count > MAX_MATCH_CALLS {
        return false;
    }

    let Some(token) = tokens.get(ti) else {
        return ii == input.len();
    };

    match token {
        Token::Literal(c) => {
            input.get(ii) == Some(c) && match_tokens(tokens, ti + 1, input, ii + 1, calls)
        }
        Token::AnyChar => {
            matches!(input.get(ii), Some(c) if *c != '/')
                && match_tokens(tokens, ti + 1, input, ii + 1, calls)
        }
        Token::Class { negated, ranges } => {
            let Some(&c) = input.get(ii) else {
                return false;
            };
            let hit = ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi);
            hit != *negated && match_tokens(tokens, ti + 1, input, ii + 1, calls)
        }
        Token::Star => {
            let segment_end = segment_end(input, ii);
            (ii..=segment_end).any(|end| match_tokens(tokens, ti + 1, input, end, calls))
        }
        Token::GlobStar => (ii..=input.len()).any(|end| match_tokens(tokens, ti + 1, input, end, calls)),
        Token::Group {
            negated,
            optional,
            alternatives,
        } => {
            if *optional && match_tokens(tokens, ti + 1, input, ii, calls) {
                return true;
            }
            let limit = if *negated {
                segment_end(input, ii)
            } else {
                input.len()
            };
            (ii..=limit).any(|end| {
                let slice = &input[ii..end];
                let hit = alternatives
                    .iter()
                    .any(|alt| match_tokens(alt, 0, slice, 0, calls));
                hit != *negated && match_tokens(tokens, ti + 1, input, end, calls)
            })
        }
    }
}

fn segment_end(input: &[char], from: usize) -> usize {
    input[from..]
        .iter()
        .position(|&c| c == '/')
        .map_or(input.len(), |offset| from + offset)
}
