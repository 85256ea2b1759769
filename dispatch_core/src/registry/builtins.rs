//! Built-in converters for scalars, strings and hex strings.

use core::fmt::{self, Write};

use dispatch_config::MAX_HEXSTR_LEN;

use super::{Converter, OutBuf, TypeRegistry};
use crate::tokenizer::is_ident_term;
use crate::value::{HexBytes, Value};

macro_rules! converter {
    ($family:expr, $parse:expr, $format:expr) => {
        Converter { type_name: $family, parse: $parse, format: $format }
    };
}

macro_rules! signed_parser {
    ($name:ident, $ty:ty) => {
        fn $name<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
            let n = parse_signed(token.trim())?;
            <$ty>::try_from(n).ok().map(|_| Value::Int(n))
        }
    };
}

macro_rules! unsigned_parser {
    ($name:ident, $ty:ty) => {
        fn $name<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
            let n = parse_unsigned(token.trim())?;
            <$ty>::try_from(n).ok().map(|_| Value::UInt(n))
        }
    };
}

signed_parser!(parse_i8, i8);
signed_parser!(parse_i16, i16);
signed_parser!(parse_i32, i32);
signed_parser!(parse_i64, i64);
signed_parser!(parse_i128, i128);
signed_parser!(parse_isize, isize);

unsigned_parser!(parse_u8, u8);
unsigned_parser!(parse_u16, u16);
unsigned_parser!(parse_u32, u32);
unsigned_parser!(parse_u64, u64);
unsigned_parser!(parse_u128, u128);
unsigned_parser!(parse_usize, usize);

/// Every built-in tag with its converter, in registration order.
pub const BUILTINS: &[(&str, Converter)] = &[
    ("bool", converter!("bool", parse_bool, format_bool)),
    ("char", converter!("char", parse_char, format_char)),
    ("i8", converter!("int", parse_i8, format_int)),
    ("i16", converter!("int", parse_i16, format_int)),
    ("i32", converter!("int", parse_i32, format_int)),
    ("i64", converter!("int", parse_i64, format_int)),
    ("i128", converter!("int", parse_i128, format_int)),
    ("isize", converter!("int", parse_isize, format_int)),
    ("u8", converter!("uint", parse_u8, format_int)),
    ("u16", converter!("uint", parse_u16, format_int)),
    ("u32", converter!("uint", parse_u32, format_int)),
    ("u64", converter!("uint", parse_u64, format_int)),
    ("u128", converter!("uint", parse_u128, format_int)),
    ("usize", converter!("uint", parse_usize, format_int)),
    ("f32", converter!("float", parse_f32, format_f32)),
    ("f64", converter!("float", parse_f64, format_f64)),
    ("str", converter!("string", parse_str, format_str)),
    ("string", converter!("string", parse_str, format_str)),
    ("hex", converter!("hex", parse_hex, format_hex)),
];

/// Digits with an optional `0x`, `0b` or `0o` radix prefix, no sign.
fn parse_magnitude(s: &str) -> Option<u128> {
    let (radix, digits) = if let Some(d) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, d)
    } else if let Some(d) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (2, d)
    } else if let Some(d) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        (8, d)
    } else {
        (10, s)
    };

    if digits.starts_with(['+', '-']) {
        return None;
    }
    u128::from_str_radix(digits, radix).ok()
}

pub fn parse_signed(s: &str) -> Option<i128> {
    match s.strip_prefix('-') {
        Some(rest) => 0i128.checked_sub_unsigned(parse_magnitude(rest)?),
        None => i128::try_from(parse_magnitude(s.strip_prefix('+').unwrap_or(s))?).ok(),
    }
}

pub fn parse_unsigned(s: &str) -> Option<u128> {
    parse_magnitude(s.strip_prefix('+').unwrap_or(s))
}

pub fn parse_bool_word(s: &str) -> Option<bool> {
    match s {
        "1" | "true" | "True" | "TRUE" => Some(true),
        "0" | "false" | "False" | "FALSE" => Some(false),
        #[cfg(feature = "extended-bools")]
        "yes" | "Yes" | "YES" | "on" | "On" | "ON" => Some(true),
        #[cfg(feature = "extended-bools")]
        "no" | "No" | "NO" | "off" | "Off" | "OFF" => Some(false),
        _ => None,
    }
}

fn parse_bool<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
    parse_bool_word(token.trim()).map(Value::Bool)
}

fn parse_char<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
    let mut chars = token.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(Value::Char(c))
}

fn parse_f32<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
    token.trim().parse::<f32>().ok().map(|f| Value::Float(f as f64))
}

fn parse_f64<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
    token.trim().parse::<f64>().ok().map(Value::Float)
}

fn parse_str<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
    Some(Value::Str(token))
}

fn parse_hex<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
    let token = token.trim();
    if token.is_empty() || token.len() % 2 != 0 || token.len() / 2 > MAX_HEXSTR_LEN {
        return None;
    }
    let mut raw = [0u8; MAX_HEXSTR_LEN];
    let bytes = &mut raw[..token.len() / 2];
    hex::decode_to_slice(token, bytes).ok()?;
    HexBytes::from_slice(bytes).ok().map(Value::Bytes)
}

fn format_bool(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    match value {
        Value::Bool(b) => out.write_str(if *b { "true" } else { "false" }),
        _ => Err(fmt::Error),
    }
}

fn format_char(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    match value {
        Value::Char(c) => write_text(out, c.encode_utf8(&mut [0u8; 4])),
        _ => Err(fmt::Error),
    }
}

fn format_int(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    match value {
        Value::Int(n) => write!(out, "{n}"),
        Value::UInt(n) => write!(out, "{n}"),
        _ => Err(fmt::Error),
    }
}

fn format_f32(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    match value {
        Value::Float(f) => write!(out, "{}", *f as f32),
        _ => Err(fmt::Error),
    }
}

fn format_f64(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    match value {
        Value::Float(f) => write!(out, "{f}"),
        _ => Err(fmt::Error),
    }
}

fn format_str(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    match value.as_str() {
        Some(s) => write_text(out, s),
        None => Err(fmt::Error),
    }
}

fn format_hex(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    let Value::Bytes(bytes) = value else {
        return Err(fmt::Error);
    };
    let mut digits = [0u8; 2 * MAX_HEXSTR_LEN];
    let digits = &mut digits[..2 * bytes.len()];
    hex::encode_to_slice(bytes, digits).map_err(|_| fmt::Error)?;
    out.write_bytes(digits)
}

/// Write `s` so that the tokenizer reads it back as a single token.
///
/// Text holding terminator or quote characters is wrapped in whichever quote
/// character needs fewer escapes; the quote and backslashes get a `\` prefix.
pub fn write_text(out: &mut OutBuf<'_>, s: &str) -> fmt::Result {
    let mut has_terminator = false;
    let mut double_quotes = 0usize;
    let mut single_quotes = 0usize;

    for b in s.bytes() {
        has_terminator |= is_ident_term(b);
        double_quotes += usize::from(b == b'"');
        single_quotes += usize::from(b == b'\'');
    }

    if !has_terminator {
        return out.write_str(s);
    }

    let quote = if double_quotes <= single_quotes { b'"' } else { b'\'' };
    out.push(quote)?;
    for b in s.bytes() {
        if b == quote || b == b'\\' {
            out.push(b'\\')?;
        }
        out.push(b)?;
    }
    out.push(quote)
}
