// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glob matching with Redis PSUBSCRIBE rules: `*`, `?`, `[...]`, `\`

/// Whether `channel` matches the glob `pattern`
pub fn glob_match(pattern: &str, channel: &str) -> bool {
    matches(&tokenize(pattern.as_bytes()), channel.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Star,
    Any,
    /// Class body between the brackets
    Class(&'a [u8]),
    Byte(u8),
}

impl Token<'_> {
    fn accepts(&self, c: u8) -> bool {
        match self {
            Token::Star | Token::Any => true,
            Token::Class(body) => in_class(body, c),
            Token::Byte(b) => *b == c,
        }
    }
}

fn tokenize(pattern: &[u8]) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < pattern.len() {
        let token = match pattern[i] {
            b'*' => Token::Star,
            b'?' => Token::Any,
            b'[' => match class_end(&pattern[i + 1..]) {
                Some(end) => {
                    let body = &pattern[i + 1..i + 1 + end];
                    i += end + 1;
                    Token::Class(body)
                }
                // Unterminated class, treat `[` literally
                None => Token::Byte(b'['),
            },
            b'\\' if i + 1 < pattern.len() => {
                i += 1;
                Token::Byte(pattern[i])
            }
            c => Token::Byte(c),
        };
        // Consecutive stars match the same as one
        if !(token == Token::Star && tokens.last() == Some(&Token::Star)) {
            tokens.push(token);
        }
        i += 1;
    }
    tokens
}

/// Star backtracking: on a mismatch, resume after the most recent `*`
/// with it swallowing one more byte. Linear in the pattern per text byte.
fn matches(tokens: &[Token<'_>], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut resume: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Star) => {
                resume = Some((p + 1, t));
                p += 1;
                continue;
            }
            Some(token) if token.accepts(text[t]) => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }
        match resume {
            Some((after, from)) => {
                resume = Some((after, from + 1));
                p = after;
                t = from + 1;
            }
            None => return false,
        }
    }

    tokens[p..].iter().all(|token| *token == Token::Star)
}

/// Index of the `]` closing a class body
fn class_end(body: &[u8]) -> Option<usize> {
    let mut i = usize::from(body.first() == Some(&b'^'));
    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            b']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn in_class(body: &[u8], c: u8) -> bool {
    let (negate, body) = match body.split_first() {
        Some((b'^', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut hit = false;
    let mut i = 0;
    while i < body.len() {
        let start = if body[i] == b'\\' && i + 1 < body.len() {
            i += 1;
            body[i]
        } else {
            body[i]
        };
        if i + 2 < body.len() && body[i + 1] == b'-' {
            let end = body[i + 2];
            let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
            hit |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            hit |= start == c;
            i += 1;
        }
    }
    hit != negate
}

#[cfg(test)]
#[path = "pattern_tests.rs"]
mod tests;
