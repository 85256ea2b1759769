//! Descriptor strings: one character per parameter, compound forms in brackets.

use std::iter::Peekable;
use std::str::Chars;

use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;

/// One parameter (or result) described by a descriptor string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desc {
    /// Integers, floats, `bool` and `char`: tag and Rust type share the name.
    Scalar(&'static str),
    Str,
    Hex,
    Tail,
    Context,
    Invocation,
    Named(String),
    Vector(Box<Desc>),
    Array(Box<Desc>, usize),
    Tuple(Vec<Desc>),
    Map(Box<Desc>, Box<Desc>),
    Optional(Box<Desc>),
}

impl Desc {
    /// Registry type tag for this parameter.
    pub fn tag(&self) -> String {
        match self {
            Desc::Scalar(name) => (*name).to_string(),
            Desc::Str => "str".into(),
            Desc::Hex => "hex".into(),
            Desc::Tail => "tail".into(),
            Desc::Context => "context".into(),
            Desc::Invocation => "invocation".into(),
            Desc::Named(name) => name.clone(),
            Desc::Vector(elem) => format!("[{}]", elem.tag()),
            Desc::Array(elem, len) => format!("[{};{}]", elem.tag(), len),
            Desc::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(Desc::tag).collect();
                format!("({})", parts.join(","))
            }
            Desc::Map(key, value) => format!("{{{}={}}}", key.tag(), value.tag()),
            Desc::Optional(inner) => format!("{}?", inner.tag()),
        }
    }

    /// Supplied by the dispatcher, not read from the line.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Desc::Context | Desc::Invocation)
    }

    /// Parameter type for the generated signature check. `_` stands where
    /// more than one Rust type converts from the same value.
    pub fn rust_type(&self, top: bool) -> TokenStream2 {
        match self {
            Desc::Scalar(name) => {
                let ident = syn::Ident::new(name, Span::call_site());
                quote! { #ident }
            }
            Desc::Str if top => quote! { &str },
            Desc::Hex if top => quote! { &[u8] },
            Desc::Hex => quote! { ::dispatch_core::HexBytes },
            Desc::Tail => quote! { ::dispatch_core::Tokenizer<'_> },
            Desc::Context => quote! { &mut dyn ::core::any::Any },
            Desc::Invocation => quote! { ::dispatch_core::Invocation<'_> },
            Desc::Vector(elem) => {
                let elem = elem.rust_type(false);
                quote! { ::std::vec::Vec<#elem> }
            }
            Desc::Array(elem, len) => {
                let elem = elem.rust_type(false);
                quote! { [#elem; #len] }
            }
            Desc::Tuple(elems) => {
                let elems = elems.iter().map(|e| e.rust_type(false));
                quote! { ( #( #elems, )* ) }
            }
            Desc::Optional(inner) => {
                let inner = inner.rust_type(false);
                quote! { ::core::option::Option<#inner> }
            }
            Desc::Str | Desc::Named(_) | Desc::Map(..) => quote! { _ },
        }
    }
}

/// Parse a parameter descriptor. `"v"` declares no parameters.
pub fn parse_params(text: &str) -> Result<Vec<Desc>, String> {
    if text.trim() == "v" {
        return Ok(Vec::new());
    }
    let mut cursor = Cursor::new(text);
    let mut params = Vec::new();
    while !cursor.at_end() {
        params.push(cursor.element(true)?);
    }
    if params.is_empty() {
        return Err("empty descriptor, use `v` for no parameters".into());
    }

    let context = params.iter().filter(|p| **p == Desc::Context).count();
    if context > 1 {
        return Err("at most one `u` per command".into());
    }
    let invocation = params.iter().filter(|p| **p == Desc::Invocation).count();
    if invocation > 1 {
        return Err("at most one `I` per command".into());
    }
    let mut positional = params.iter().filter(|p| !p.is_hidden());
    if positional.by_ref().any(|p| *p == Desc::Tail) && positional.next().is_some() {
        return Err("`T` must be the last parameter".into());
    }
    Ok(params)
}

/// Parse a result descriptor. `"v"` means the command yields nothing.
pub fn parse_return(text: &str) -> Result<Option<Desc>, String> {
    if text.trim() == "v" {
        return Ok(None);
    }
    let mut cursor = Cursor::new(text);
    let desc = cursor.element(false)?;
    if !cursor.at_end() {
        return Err(format!("a result descriptor names one type, got `{text}`"));
    }
    Ok(Some(desc))
}

struct Cursor<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { chars: text.chars().peekable() }
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.chars.peek().is_none()
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        self.chars.next_if_eq(&expected).is_some()
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!("expected `{expected}`"))
        }
    }

    fn element(&mut self, top: bool) -> Result<Desc, String> {
        self.skip_ws();
        let c = self.chars.next().ok_or("unexpected end of descriptor")?;
        let mut desc = match c {
            'B' => Desc::Scalar("u8"),
            'W' => Desc::Scalar("u16"),
            'D' => Desc::Scalar("u32"),
            'Q' => Desc::Scalar("u64"),
            'X' => Desc::Scalar("u128"),
            'b' => Desc::Scalar("i8"),
            'w' => Desc::Scalar("i16"),
            'd' => Desc::Scalar("i32"),
            'q' => Desc::Scalar("i64"),
            'x' => Desc::Scalar("i128"),
            'Z' => Desc::Scalar("usize"),
            'z' => Desc::Scalar("isize"),
            'f' => Desc::Scalar("f32"),
            'F' => Desc::Scalar("f64"),
            't' => Desc::Scalar("bool"),
            'c' => Desc::Scalar("char"),
            's' => Desc::Str,
            'h' => Desc::Hex,
            'T' | 'u' | 'I' if !top => return Err(format!("`{c}` only stands for a whole parameter")),
            'T' => return Ok(Desc::Tail),
            'u' => return Ok(Desc::Context),
            'I' => return Ok(Desc::Invocation),
            '[' => {
                let elem = Box::new(self.element(false)?);
                let desc = if self.eat(';') { Desc::Array(elem, self.number()?) } else { Desc::Vector(elem) };
                self.expect(']')?;
                desc
            }
            '(' => {
                let mut elems = Vec::new();
                while !self.eat(')') {
                    elems.push(self.element(false)?);
                }
                if elems.is_empty() {
                    return Err("empty tuple".into());
                }
                Desc::Tuple(elems)
            }
            '{' => {
                let key = Box::new(self.element(false)?);
                self.expect('=')?;
                let value = Box::new(self.element(false)?);
                self.expect('}')?;
                Desc::Map(key, value)
            }
            '<' => {
                let mut name = String::new();
                while let Some(c) = self.chars.next_if(|c| *c != '>') {
                    name.push(c);
                }
                self.expect('>')?;
                let name = name.trim();
                let valid = !name.is_empty()
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
                if !valid {
                    return Err(format!("invalid type name `<{name}>`"));
                }
                Desc::Named(name.to_string())
            }
            'v' => return Err("`v` must be the whole descriptor".into()),
            other => return Err(format!("unknown descriptor character `{other}`")),
        };
        while self.eat('?') {
            desc = Desc::Optional(Box::new(desc));
        }
        Ok(desc)
    }

    fn number(&mut self) -> Result<usize, String> {
        self.skip_ws();
        let mut digits = String::new();
        while let Some(c) = self.chars.next_if(char::is_ascii_digit) {
            digits.push(c);
        }
        digits.parse().map_err(|_| "expected an array length".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &str) -> Vec<String> {
        parse_params(text).unwrap().iter().map(Desc::tag).collect()
    }

    #[test]
    fn scalars_map_to_builtin_tags() {
        assert_eq!(tags("BWDQX"), ["u8", "u16", "u32", "u64", "u128"]);
        assert_eq!(tags("bwdqx"), ["i8", "i16", "i32", "i64", "i128"]);
        assert_eq!(tags("Zz fF tcsh"), ["usize", "isize", "f32", "f64", "bool", "char", "str", "hex"]);
        assert_eq!(tags("dT"), ["i32", "tail"]);
        assert!(parse_params("v").unwrap().is_empty());
    }

    #[test]
    fn compound_forms() {
        assert_eq!(tags("[d]"), ["[i32]"]);
        assert_eq!(tags("[F;3]d?"), ["[f64;3]", "i32?"]);
        assert_eq!(tags("{s=q}"), ["{str=i64}"]);
        assert_eq!(tags("(ds)<point>?"), ["(i32,str)", "point?"]);
        assert_eq!(tags("[<geo::point>]"), ["[geo::point]"]);
    }

    #[test]
    fn hidden_params_sit_anywhere_but_tail_must_close() {
        assert_eq!(tags("udT"), ["context", "i32", "tail"]);
        assert_eq!(tags("dTu"), ["i32", "tail", "context"]);
        assert!(parse_params("Td").is_err());
        assert!(parse_params("uu").is_err());
        assert_eq!(tags("Is?"), ["invocation", "str?"]);
        assert_eq!(tags("dTI"), ["i32", "tail", "invocation"]);
        assert!(parse_params("II").is_err());
        assert!(parse_params("[I]").is_err());
    }

    #[test]
    fn malformed_descriptors() {
        for bad in ["", "y", "[d", "[d;]", "{d}", "<>", "()", "[T]", "dv", "T?", "<a b>"] {
            assert!(parse_params(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn result_descriptors() {
        assert_eq!(parse_return("v"), Ok(None));
        assert_eq!(parse_return("d?"), Ok(Some(Desc::Optional(Box::new(Desc::Scalar("i32"))))));
        assert!(parse_return("dd").is_err());
        assert!(parse_return("u").is_err());
    }
}
