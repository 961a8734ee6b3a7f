//! RFC 6901 pointer tokenizing.

use crate::error::{Error, Result};

/// Split a pointer into unescaped reference tokens.
///
/// The empty pointer addresses the document root and yields no tokens.
pub fn parse(pointer: &str) -> Result<Vec<String>> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(Error::InvalidPointer {
            pointer: pointer.to_string(),
            message: "must be empty or start with '/'".to_string(),
        });
    };
    rest.split('/')
        .map(|token| {
            unescape(token).ok_or_else(|| Error::InvalidPointer {
                pointer: pointer.to_string(),
                message: format!("bad escape in token {token:?}"),
            })
        })
        .collect()
}

/// Escape a single reference token (`~` → `~0`, `/` → `~1`).
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Join tokens back into a pointer string.
pub fn join(tokens: &[String]) -> String {
    tokens.iter().map(|t| format!("/{}", escape(t))).collect()
}

fn unescape(token: &str) -> Option<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next()? {
                '0' => out.push('~'),
                '1' => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_escapes() {
        assert_eq!(
            parse("/a~1b/c~0d/0").unwrap(),
            vec!["a/b".to_string(), "c~d".to_string(), "0".to_string()]
        );
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(matches!(parse("a/b"), Err(Error::InvalidPointer { .. })));
        assert!(matches!(parse("/a~2"), Err(Error::InvalidPointer { .. })));
    }

    #[test]
    fn test_join_escapes() {
        let tokens = vec!["a/b".to_string(), "~".to_string()];
        assert_eq!(join(&tokens), "/a~1b/~0");
    }
}
