//! Zero-copy tokenizer for single command lines.
//!
//! The tokenizer walks a borrowed `&str` and hands out sub-slices of it. Nothing
//! is copied or unescaped: a backslash keeps the following character from being
//! interpreted, but both characters stay in the emitted token.
//!
//! Rules, decided on the first character after the separators:
//!
//! | First char      | Token                                                         |
//! |-----------------|---------------------------------------------------------------|
//! | end of input    | none                                                          |
//! | `;`             | none, the tokenizer stays parked on the `;`                   |
//! | `"` or `'`      | quoted string up to the matching unescaped quote              |
//! | `{` or `[`      | block up to the matching closer, nesting both families        |
//! | `=`             | the single character `=`                                      |
//! | anything else   | identifier up to the next terminator                          |
//!
//! Whitespace (any byte `<= ' '`) and `,` are interchangeable separators.
//! An unterminated string or block, a mismatched or stray closing bracket, or an
//! unescaped `;` inside a block poisons the tokenizer: the call returns `None`
//! and so does every later call.
//!
//! Examples:
//! - `a b, c`            -> `a`, `b`, `c`
//! - `'a b c'`           -> `a b c`
//! - `a {b c {d e} f} g` -> `a`, `b c {d e} f`, `g`
//! - `a {b '{c d}' e} f` -> `a`, `b '{c d}' e`, `f`
//! - `x=1 y;rest`        -> `x`, `=`, `1`, `y`

use dispatch_config::MAX_BLOCK_NESTING;
use heapless::Vec;

/// Shape of the source text a token was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word.
    Identifier,
    /// Quoted string, with the quote character used.
    Quoted(char),
    /// Bracketed block, with the opening bracket used.
    Block(char),
    /// The `=` key/value delimiter.
    Equals,
}

/// One token borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Content without enclosing quotes or brackets.
    pub text: &'a str,
    /// Exact source span, delimiters included.
    pub raw: &'a str,
    pub kind: TokenKind,
}

/// Bytes skipped between tokens.
#[inline(always)]
pub const fn is_separator(b: u8) -> bool {
    b <= b' ' || b == b','
}

/// Bytes that end an identifier token.
#[inline(always)]
pub const fn is_ident_term(b: u8) -> bool {
    is_separator(b) || matches!(b, b';' | b'=' | b'"' | b'\'' | b'{' | b'}' | b'[' | b']')
}

/// Splits a line into [`Token`]s on demand.
///
/// The tokenizer is `Copy`: taking a copy snapshots the position, which is how
/// the dispatcher restarts argument binding for every overload candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tokenizer<'a> {
    text: &'a str,
    count: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub const fn new(text: &'a str) -> Self {
        Self { text, count: 0, failed: false }
    }

    /// Unconsumed input. Starts with `;` when parked on a terminator.
    pub fn remaining(&self) -> &'a str {
        self.text
    }

    /// Number of tokens produced so far.
    pub fn consumed(&self) -> usize {
        self.count
    }

    /// `true` once the input is used up or poisoned.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// `true` once a malformed token poisoned the tokenizer.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// `true` when the tokenizer stopped at a top-level `;`.
    pub fn at_terminator(&self) -> bool {
        self.text.as_bytes().first() == Some(&b';')
    }

    /// Text following the top-level `;` the tokenizer is parked on.
    pub fn after_terminator(&self) -> Option<&'a str> {
        if self.at_terminator() {
            Some(&self.text[1..])
        } else {
            None
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&self) -> Option<Token<'a>> {
        let mut probe = *self;
        probe.next_token()
    }

    /// Consume the next token if it is the `=` delimiter.
    pub fn consume_equals(&mut self) -> bool {
        let mut probe = *self;
        match probe.next_token() {
            Some(Token { kind: TokenKind::Equals, .. }) => {
                *self = probe;
                true
            }
            _ => false,
        }
    }

    /// Produce the next token, or `None` at the end of the command.
    pub fn next_token(&mut self) -> Option<Token<'a>> {
        self.skip_separators();

        let first = *self.text.as_bytes().first()?;
        let scanned = match first {
            b';' => return None,
            b'"' | b'\'' => self.scan_quoted(first),
            b'{' | b'[' => self.scan_block(),
            b'}' | b']' => None,
            b'=' => {
                let eq = &self.text[..1];
                Some((1, Token { text: eq, raw: eq, kind: TokenKind::Equals }))
            }
            _ => Some(self.scan_identifier()),
        };

        match scanned {
            Some((consumed, token)) => {
                self.text = &self.text[consumed..];
                self.count += 1;
                self.skip_separators();
                Some(token)
            }
            None => {
                self.text = "";
                self.failed = true;
                None
            }
        }
    }

    fn skip_separators(&mut self) {
        let skip = self
            .text
            .as_bytes()
            .iter()
            .take_while(|&&b| is_separator(b))
            .count();
        self.text = &self.text[skip..];
    }

    fn scan_identifier(&self) -> (usize, Token<'a>) {
        let bytes = self.text.as_bytes();
        let mut escaped = false;
        let mut end = 0usize;

        while end < bytes.len() {
            let b = bytes[end];
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if is_ident_term(b) {
                break;
            }
            end += 1;
        }

        let text = &self.text[..end];
        (end, Token { text, raw: text, kind: TokenKind::Identifier })
    }

    fn scan_quoted(&self, quote: u8) -> Option<(usize, Token<'a>)> {
        let bytes = self.text.as_bytes();
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(1) {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == quote {
                return Some((
                    i + 1,
                    Token {
                        text: &self.text[1..i],
                        raw: &self.text[..=i],
                        kind: TokenKind::Quoted(quote as char),
                    },
                ));
            }
        }

        None
    }

    fn scan_block(&self) -> Option<(usize, Token<'a>)> {
        let bytes = self.text.as_bytes();
        let mut closers: Vec<u8, MAX_BLOCK_NESTING> = Vec::new();
        let mut quote: Option<u8> = None;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate() {
            if escaped {
                escaped = false;
                continue;
            }
            if b == b'\\' {
                escaped = true;
                continue;
            }
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
                continue;
            }

            match b {
                b'"' | b'\'' => quote = Some(b),
                b'{' => closers.push(b'}').ok()?,
                b'[' => closers.push(b']').ok()?,
                b'}' | b']' => {
                    if closers.pop()? != b {
                        return None;
                    }
                    if closers.is_empty() {
                        return Some((
                            i + 1,
                            Token {
                                text: &self.text[1..i],
                                raw: &self.text[..=i],
                                kind: TokenKind::Block(bytes[0] as char),
                            },
                        ));
                    }
                }
                // premature end of command inside a block
                b';' => return None,
                _ => {}
            }
        }

        None
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        self.next_token().map(|t| t.text)
    }
}
