//! Structural decomposition of type tags.
//!
//! Grammar:
//!
//! ```text
//! tag   := named | tag '?' | '[' tag ']' | '[' tag ';' N ']'
//!        | '(' tag (',' tag)* ')' | '{' tag '=' tag '}'
//! named := [A-Za-z0-9_:]+
//! ```

/// One level of a decomposed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagShape<'t> {
    Named(&'t str),
    Optional(&'t str),
    Vector(&'t str),
    Array(&'t str, usize),
    /// Comma separated element tags, undecomposed.
    Tuple(&'t str),
    Map(&'t str, &'t str),
}

/// Split off the outermost layer of `tag`. `None` for malformed tags.
pub fn classify(tag: &str) -> Option<TagShape<'_>> {
    let tag = tag.trim();

    if let Some(inner) = tag.strip_suffix('?') {
        let inner = inner.trim_end();
        return (!inner.is_empty()).then_some(TagShape::Optional(inner));
    }

    if let Some(inner) = enclosed(tag, '[', ']') {
        return match split_once_top(inner, b';') {
            Some((elem, len)) => {
                let len = len.trim().parse().ok()?;
                non_empty(elem).map(|elem| TagShape::Array(elem, len))
            }
            None => non_empty(inner).map(TagShape::Vector),
        };
    }

    if let Some(inner) = enclosed(tag, '(', ')') {
        if split_top(inner, b',').any(|part| part.trim().is_empty()) {
            return None;
        }
        return Some(TagShape::Tuple(inner));
    }

    if let Some(inner) = enclosed(tag, '{', '}') {
        let (key, value) = split_once_top(inner, b'=')?;
        return Some(TagShape::Map(non_empty(key)?, non_empty(value)?));
    }

    let named = !tag.is_empty()
        && tag.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b':');
    named.then_some(TagShape::Named(tag))
}

/// Diagnostic family name for a tag. Does not consult any registry.
pub fn type_name(tag: &str) -> &str {
    match classify(tag) {
        Some(TagShape::Named(name)) => match name {
            "bool" => "bool",
            "char" => "char",
            "i8" | "i16" | "i32" | "i64" | "i128" | "isize" => "int",
            "u8" | "u16" | "u32" | "u64" | "u128" | "usize" => "uint",
            "f32" | "f64" => "float",
            "str" | "string" => "string",
            "hex" => "hex",
            "tail" => "tail",
            "context" => "context",
            "invocation" => "invocation",
            other => other,
        },
        Some(TagShape::Optional(_)) => "optional",
        Some(TagShape::Vector(_)) => "vector",
        Some(TagShape::Array(..)) => "array",
        Some(TagShape::Tuple(_)) => "tuple",
        Some(TagShape::Map(..)) => "map",
        None => "invalid",
    }
}

fn enclosed(tag: &str, open: char, close: char) -> Option<&str> {
    let inner = tag.strip_prefix(open)?.strip_suffix(close)?;
    // "[a] [b]" is not one bracketed tag
    depth_stays_positive(inner).then_some(inner)
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn depth_stays_positive(s: &str) -> bool {
    let mut depth = 0i32;
    for b in s.bytes() {
        match b {
            b'[' | b'(' | b'{' => depth += 1,
            b']' | b')' | b'}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Iterator over the pieces of `s` separated by `sep` at bracket depth zero.
pub fn split_top(s: &str, sep: u8) -> SplitTop<'_> {
    SplitTop { rest: Some(s), sep }
}

pub struct SplitTop<'t> {
    rest: Option<&'t str>,
    sep: u8,
}

impl<'t> Iterator for SplitTop<'t> {
    type Item = &'t str;

    fn next(&mut self) -> Option<&'t str> {
        let rest = self.rest?;
        match find_top(rest, self.sep) {
            Some(at) => {
                self.rest = Some(&rest[at + 1..]);
                Some(&rest[..at])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

fn split_once_top(s: &str, sep: u8) -> Option<(&str, &str)> {
    let at = find_top(s, sep)?;
    Some((&s[..at], &s[at + 1..]))
}

fn find_top(s: &str, sep: u8) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'[' | b'(' | b'{' => depth += 1,
            b']' | b')' | b'}' => depth = depth.saturating_sub(1),
            _ if b == sep && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}
