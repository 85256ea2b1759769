//! Type registry: textual type tags mapped to parse/format converters.
//!
//! Named tags (`i32`, `str`, `point`, ...) resolve to registered entries.
//! Compound tags (`[T]`, `[T; N]`, `(A, B)`, `{K=V}`, `T?`) are decomposed
//! structurally and each element is converted through the registry again, so
//! any registered type can be nested inside any compound shape.

pub mod builtins;
mod tags;
mod writer;

pub use tags::{classify, split_top, type_name, SplitTop, TagShape};
pub use writer::OutBuf;

use core::fmt;

use dispatch_config::MAX_REGISTERED_TYPES;
use log::debug;
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::tokenizer::{TokenKind, Tokenizer};
use crate::value::Value;

pub type ParseFn = for<'a> fn(&TypeRegistry, &'a str) -> Option<Value<'a>>;
pub type FormatFn = fn(&TypeRegistry, &Value<'_>, &mut OutBuf<'_>) -> fmt::Result;

/// Parse/format pair for one named type.
#[derive(Clone, Copy)]
pub struct Converter {
    /// Family name shown in diagnostics.
    pub type_name: &'static str,
    pub parse: ParseFn,
    pub format: FormatFn,
}

#[derive(Clone, Copy)]
enum Entry {
    Converter(Converter),
    /// Field tags in declaration order.
    Struct { fields: &'static [&'static str] },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("type `{0}` is already registered")]
    Duplicate(&'static str),
    #[error("type registry is full")]
    Full,
    #[error("`{0}` is not a valid name for a registered type")]
    InvalidName(&'static str),
    #[error("field type `{field}` of struct `{name}` is not known")]
    UnknownFieldType { name: &'static str, field: &'static str },
    #[error("a global type registry is already installed")]
    AlreadyInstalled,
}

static GLOBAL: OnceCell<TypeRegistry> = OnceCell::new();

const _: () = assert!(builtins::BUILTINS.len() <= MAX_REGISTERED_TYPES);

pub struct TypeRegistry {
    entries: heapless::Vec<(&'static str, Entry), MAX_REGISTERED_TYPES>,
}

impl TypeRegistry {
    /// An empty registry, without even the built-in types.
    pub const fn new() -> Self {
        Self { entries: heapless::Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for &(name, converter) in builtins::BUILTINS {
            if registry.entries.push((name, Entry::Converter(converter))).is_err() {
                break;
            }
        }
        registry
    }

    /// Process-wide registry. Holds the built-ins unless [`TypeRegistry::install`]
    /// published another one first.
    pub fn global() -> &'static TypeRegistry {
        GLOBAL.get_or_init(TypeRegistry::with_builtins)
    }

    /// Publish this registry as the process-wide one. Works once, and only
    /// before anything has called [`TypeRegistry::global`].
    pub fn install(self) -> Result<&'static TypeRegistry, RegistryError> {
        let count = self.entries.len();
        GLOBAL.set(self).map_err(|_| RegistryError::AlreadyInstalled)?;
        debug!("installed global type registry with {count} types");
        Ok(Self::global())
    }

    pub fn register(&mut self, name: &'static str, converter: Converter) -> Result<(), RegistryError> {
        self.insert(name, Entry::Converter(converter))
    }

    /// Register a struct type read and written as a block of its fields.
    pub fn register_struct(
        &mut self,
        name: &'static str,
        fields: &'static [&'static str],
    ) -> Result<(), RegistryError> {
        if let Some(field) = fields.iter().copied().find(|field| !self.knows(field)) {
            return Err(RegistryError::UnknownFieldType { name, field });
        }
        self.insert(name, Entry::Struct { fields })
    }

    fn insert(&mut self, name: &'static str, entry: Entry) -> Result<(), RegistryError> {
        let is_named = matches!(classify(name), Some(TagShape::Named(n)) if n == name);
        if !is_named || matches!(name, "tail" | "context") {
            return Err(RegistryError::InvalidName(name));
        }
        if self.lookup(name).is_some() {
            return Err(RegistryError::Duplicate(name));
        }
        self.entries.push((name, entry)).map_err(|_| RegistryError::Full)?;
        debug!("registered type `{name}`");
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, entry)| entry)
    }

    /// Whether every named part of `tag` resolves in this registry.
    pub fn knows(&self, tag: &str) -> bool {
        match classify(tag) {
            Some(TagShape::Named(name)) => self.lookup(name).is_some(),
            Some(TagShape::Optional(inner) | TagShape::Vector(inner) | TagShape::Array(inner, _)) => {
                self.knows(inner)
            }
            Some(TagShape::Tuple(parts)) => split_top(parts, b',').all(|part| self.knows(part)),
            Some(TagShape::Map(key, value)) => self.knows(key) && self.knows(value),
            None => false,
        }
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    /// Diagnostic family name, preferring the registered converter's own.
    pub fn type_name<'t>(&self, tag: &'t str) -> &'t str {
        match classify(tag) {
            Some(TagShape::Named(name)) => match self.lookup(name) {
                Some(Entry::Converter(c)) => c.type_name,
                _ => type_name(tag),
            },
            _ => type_name(tag),
        }
    }

    /// Convert one token into a value of type `tag`.
    pub fn parse<'a>(&self, tag: &str, token: &'a str) -> Option<Value<'a>> {
        match classify(tag)? {
            TagShape::Named(name) => match self.lookup(name)? {
                Entry::Converter(c) => (c.parse)(self, token),
                Entry::Struct { fields } => self.parse_fields(fields.iter().copied(), token),
            },
            TagShape::Optional(inner) => match self.parse(inner, token) {
                Some(value) => Some(Value::Optional(Some(Box::new(value)))),
                None if token.trim().is_empty() => Some(Value::Optional(None)),
                None => None,
            },
            TagShape::Vector(elem) => self.parse_elements(elem, token).map(Value::List),
            TagShape::Array(elem, len) => self
                .parse_elements(elem, token)
                .filter(|items| items.len() == len)
                .map(Value::List),
            TagShape::Tuple(parts) => self.parse_fields(split_top(parts, b','), token),
            TagShape::Map(key, value) => self.parse_map(key, value, token),
        }
    }

    fn parse_elements<'a>(&self, elem: &str, token: &'a str) -> Option<Vec<Value<'a>>> {
        let mut tokens = Tokenizer::new(token);
        let mut items = Vec::new();
        while let Some(t) = tokens.next_token() {
            items.push(self.parse(elem, t.text)?);
        }
        tokens.is_empty().then_some(items)
    }

    fn parse_fields<'a, 't>(
        &self,
        tags: impl Iterator<Item = &'t str>,
        token: &'a str,
    ) -> Option<Value<'a>> {
        let mut tokens = Tokenizer::new(token);
        let mut items = Vec::new();
        for tag in tags {
            let t = tokens.next_token()?;
            items.push(self.parse(tag, t.text)?);
        }
        if tokens.next_token().is_some() || !tokens.is_empty() {
            return None;
        }
        Some(Value::List(items))
    }

    fn parse_map<'a>(&self, key_tag: &str, value_tag: &str, token: &'a str) -> Option<Value<'a>> {
        let mut tokens = Tokenizer::new(token);
        let mut pairs = Vec::new();
        while let Some(key) = tokens.next_token() {
            if key.kind == TokenKind::Equals || !tokens.consume_equals() {
                return None;
            }
            let value = tokens.next_token()?;
            pairs.push((self.parse(key_tag, key.text)?, self.parse(value_tag, value.text)?));
        }
        tokens.is_empty().then_some(Value::Map(pairs))
    }

    /// Format `value` into `buffer`, NUL-terminated. Returns the text length,
    /// or `None` if the tag is unknown, the value has the wrong shape, or the
    /// text plus terminator does not fit.
    pub fn format(&self, tag: &str, value: &Value<'_>, buffer: &mut [u8]) -> Option<usize> {
        let mut out = OutBuf::new(buffer);
        self.write(tag, value, &mut out).ok()?;
        out.finish()
    }

    /// Append the textual form of `value` to `out`.
    pub fn write(&self, tag: &str, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
        let shape = classify(tag).ok_or(fmt::Error)?;

        match (shape, value) {
            (_, Value::Optional(None)) => Ok(()),
            (TagShape::Optional(inner), Value::Optional(Some(v))) => self.write(inner, v, out),
            (_, Value::Optional(Some(v))) => self.write(tag, v, out),
            (TagShape::Optional(inner), v) => self.write(inner, v, out),
            (TagShape::Named(name), v) => match self.lookup(name).ok_or(fmt::Error)? {
                Entry::Converter(c) => (c.format)(self, v, out),
                Entry::Struct { fields } => match v {
                    Value::List(items) if items.len() == fields.len() => {
                        self.write_block(fields.iter().copied(), items, out)
                    }
                    _ => Err(fmt::Error),
                },
            },
            (TagShape::Vector(elem), Value::List(items)) => {
                self.write_block(core::iter::repeat(elem), items, out)
            }
            (TagShape::Array(elem, len), Value::List(items)) if items.len() == len => {
                self.write_block(core::iter::repeat(elem), items, out)
            }
            (TagShape::Tuple(parts), Value::List(items))
                if split_top(parts, b',').count() == items.len() =>
            {
                self.write_block(split_top(parts, b','), items, out)
            }
            (TagShape::Map(key_tag, value_tag), Value::Map(pairs)) => {
                out.push(b'{')?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push(b' ')?;
                    }
                    self.write(key_tag, k, out)?;
                    out.push(b'=')?;
                    self.write(value_tag, v, out)?;
                }
                out.push(b'}')
            }
            _ => Err(fmt::Error),
        }
    }

    fn write_block<'t>(
        &self,
        tags: impl Iterator<Item = &'t str>,
        items: &[Value<'_>],
        out: &mut OutBuf<'_>,
    ) -> fmt::Result {
        out.push(b'{')?;
        for (i, (tag, item)) in tags.zip(items).enumerate() {
            if i > 0 {
                out.push(b' ')?;
            }
            self.write(tag, item, out)?;
        }
        out.push(b'}')
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(registry: &TypeRegistry, tag: &str, value: &Value<'_>) -> Option<String> {
        let mut buf = [0xaau8; 128];
        let len = registry.format(tag, value, &mut buf)?;
        assert_eq!(buf[len], 0);
        Some(std::str::from_utf8(&buf[..len]).unwrap().to_owned())
    }

    fn parse_point<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
        let (x, y) = token.split_once(':')?;
        Some(Value::List(vec![
            Value::Int(builtins::parse_signed(x)?),
            Value::Int(builtins::parse_signed(y)?),
        ]))
    }

    fn format_point(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
        use core::fmt::Write;
        match value {
            Value::List(items) => match items.as_slice() {
                [Value::Int(x), Value::Int(y)] => write!(out, "{x}:{y}"),
                _ => Err(fmt::Error),
            },
            _ => Err(fmt::Error),
        }
    }

    #[test]
    fn builtins_are_all_present() {
        let r = TypeRegistry::with_builtins();
        for (name, _) in builtins::BUILTINS {
            assert!(r.knows(name), "{name}");
        }
        assert!(!r.knows("point"));
        assert!(!TypeRegistry::new().knows("i32"));
    }

    #[test]
    fn vectors_and_arrays() {
        let r = TypeRegistry::with_builtins();
        assert_eq!(
            r.parse("[i32]", "1 2,3"),
            Some(Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(r.parse("[i32]", ""), Some(Value::List(vec![])));
        assert_eq!(r.parse("[i32]", "1 x"), None);
        assert_eq!(r.parse("[u8; 2]", "1 2").map(|_| ()), Some(()));
        assert_eq!(r.parse("[u8; 2]", "1"), None);
        assert_eq!(r.parse("[u8; 2]", "1 2 3"), None);
        assert_eq!(r.parse("[[u8]]", "{1 2} {} {3}").map(|v| format(&r, "[[u8]]", &v)), Some(Some("{{1 2} {} {3}}".into())));
    }

    #[test]
    fn tuples_and_maps() {
        let r = TypeRegistry::with_builtins();
        let t = r.parse("(str, f64)", "'a b' 2.5").unwrap();
        assert_eq!(t, Value::List(vec![Value::Str("a b"), Value::Float(2.5)]));
        assert_eq!(format(&r, "(str, f64)", &t).as_deref(), Some("{\"a b\" 2.5}"));
        assert_eq!(r.parse("(str, f64)", "a"), None);

        let m = r.parse("{str=u8}", "x=1, y = 2").unwrap();
        assert_eq!(
            m,
            Value::Map(vec![(Value::Str("x"), Value::UInt(1)), (Value::Str("y"), Value::UInt(2))])
        );
        assert_eq!(format(&r, "{str=u8}", &m).as_deref(), Some("{x=1 y=2}"));
        assert_eq!(r.parse("{str=u8}", "x 1"), None);
        assert_eq!(r.parse("{str=u8}", "x="), None);
        assert_eq!(r.parse("{str=u8}", "=1"), None);
    }

    #[test]
    fn optionals() {
        let r = TypeRegistry::with_builtins();
        assert_eq!(r.parse("i32?", "5"), Some(Value::Optional(Some(Box::new(Value::Int(5))))));
        assert_eq!(r.parse("i32?", ""), Some(Value::Optional(None)));
        assert_eq!(r.parse("i32?", "x"), None);
        assert_eq!(format(&r, "i32?", &Value::Optional(None)).as_deref(), Some(""));
        assert_eq!(format(&r, "i32", &Value::Optional(Some(Box::new(Value::Int(3))))).as_deref(), Some("3"));
    }

    #[test]
    fn structs_are_field_blocks() {
        let mut r = TypeRegistry::with_builtins();
        r.register_struct("pair", &["i32", "str"]).unwrap();
        let v = r.parse("pair", "4 four").unwrap();
        assert_eq!(v, Value::List(vec![Value::Int(4), Value::Str("four")]));
        assert_eq!(format(&r, "[pair]", &Value::List(vec![v])).as_deref(), Some("{{4 four}}"));
        assert_eq!(r.parse("pair", "4"), None);
        assert_eq!(r.parse("pair", "4 four five"), None);
        assert_eq!(
            r.register_struct("bad", &["i32", "nope"]),
            Err(RegistryError::UnknownFieldType { name: "bad", field: "nope" })
        );
    }

    #[test]
    fn custom_converters() {
        let mut r = TypeRegistry::with_builtins();
        let point = Converter { type_name: "point", parse: parse_point, format: format_point };
        r.register("point", point).unwrap();
        assert_eq!(r.register("point", point).unwrap_err(), RegistryError::Duplicate("point"));
        assert_eq!(r.register("[point]", point).unwrap_err(), RegistryError::InvalidName("[point]"));
        assert_eq!(r.register("tail", point).unwrap_err(), RegistryError::InvalidName("tail"));

        let v = r.parse("[point]", "1:2 -3:4").unwrap();
        assert_eq!(format(&r, "[point]", &v).as_deref(), Some("{1:2 -3:4}"));
        assert_eq!(r.type_name("point"), "point");
        assert_eq!(r.type_name("u8"), "uint");
    }

    #[test]
    fn registry_capacity_is_bounded() {
        let mut r = TypeRegistry::new();
        let leaked: Vec<&'static str> = (0..=MAX_REGISTERED_TYPES)
            .map(|i| &*Box::leak(format!("t{i}").into_boxed_str()))
            .collect();
        let point = Converter { type_name: "point", parse: parse_point, format: format_point };
        for &name in &leaked[..MAX_REGISTERED_TYPES] {
            r.register(name, point).unwrap();
        }
        assert_eq!(r.register(leaked[MAX_REGISTERED_TYPES], point), Err(RegistryError::Full));
    }

    #[test]
    fn format_respects_buffer_size() {
        let r = TypeRegistry::with_builtins();
        let mut small = [0u8; 3];
        assert_eq!(r.format("u16", &Value::UInt(579), &mut small), None);
        let mut exact = [0u8; 4];
        assert_eq!(r.format("u16", &Value::UInt(579), &mut exact), Some(3));
        assert_eq!(&exact, b"579\0");
        assert_eq!(r.format("u16", &Value::Str("x"), &mut exact), None);
        assert_eq!(r.format("nope", &Value::UInt(1), &mut exact), None);
    }
}
