//! Dynamic values exchanged between the type registry and command handlers.
//!
//! The registry parses tokens into [`Value`]s, the generated invokers pull typed
//! arguments out of them through [`FromValue`], and handler results travel back
//! through [`IntoValue`] before being formatted.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use dispatch_config::MAX_HEXSTR_LEN;

use crate::tokenizer::Tokenizer;

/// Decoded hex string, bounded by [`MAX_HEXSTR_LEN`].
pub type HexBytes = heapless::Vec<u8, MAX_HEXSTR_LEN>;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value<'a> {
    /// No value: void results and unbound parameters.
    #[default]
    Unit,
    Bool(bool),
    Int(i128),
    UInt(u128),
    Float(f64),
    Char(char),
    /// Raw token text, escapes retained.
    Str(&'a str),
    /// Owned text produced by a handler.
    String(String),
    Bytes(HexBytes),
    /// Arrays, vectors, tuples and struct fields, in order.
    List(Vec<Value<'a>>),
    Map(Vec<(Value<'a>, Value<'a>)>),
    Optional(Option<Box<Value<'a>>>),
    /// Unconsumed remainder of the command line.
    Tail(Tokenizer<'a>),
}

impl Value<'_> {
    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    /// Borrow textual content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Typed extraction out of a [`Value`]. Returns `None` on a shape or range mismatch.
pub trait FromValue<'a>: Sized {
    fn from_value(value: Value<'a>) -> Option<Self>;
}

/// Conversion of a handler result into a [`Value`].
pub trait IntoValue<'a> {
    fn into_value(self) -> Value<'a>;
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl<'a> FromValue<'a> for $t {
            fn from_value(value: Value<'a>) -> Option<Self> {
                match value {
                    Value::Int(n) => <$t>::try_from(n).ok(),
                    Value::UInt(n) => <$t>::try_from(n).ok(),
                    _ => None,
                }
            }
        }
        impl<'a> IntoValue<'a> for $t {
            fn into_value(self) -> Value<'a> {
                Value::Int(self as i128)
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl<'a> FromValue<'a> for $t {
            fn from_value(value: Value<'a>) -> Option<Self> {
                match value {
                    Value::UInt(n) => <$t>::try_from(n).ok(),
                    Value::Int(n) => <$t>::try_from(n).ok(),
                    _ => None,
                }
            }
        }
        impl<'a> IntoValue<'a> for $t {
            fn into_value(self) -> Value<'a> {
                Value::UInt(self as u128)
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, i128, isize);
impl_unsigned!(u8, u16, u32, u64, u128, usize);

impl<'a> FromValue<'a> for f64 {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl<'a> FromValue<'a> for f32 {
    fn from_value(value: Value<'a>) -> Option<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl<'a> IntoValue<'a> for f64 {
    fn into_value(self) -> Value<'a> {
        Value::Float(self)
    }
}

impl<'a> IntoValue<'a> for f32 {
    fn into_value(self) -> Value<'a> {
        Value::Float(self as f64)
    }
}

impl<'a> FromValue<'a> for bool {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl<'a> IntoValue<'a> for bool {
    fn into_value(self) -> Value<'a> {
        Value::Bool(self)
    }
}

impl<'a> FromValue<'a> for char {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Char(c) => Some(c),
            _ => None,
        }
    }
}

impl<'a> IntoValue<'a> for char {
    fn into_value(self) -> Value<'a> {
        Value::Char(self)
    }
}

impl<'a> FromValue<'a> for &'a str {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl<'a> IntoValue<'a> for &'a str {
    fn into_value(self) -> Value<'a> {
        Value::Str(self)
    }
}

impl<'a> FromValue<'a> for String {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s.to_owned()),
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl<'a> IntoValue<'a> for String {
    fn into_value(self) -> Value<'a> {
        Value::String(self)
    }
}

impl<'a> FromValue<'a> for HexBytes {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl<'a> IntoValue<'a> for HexBytes {
    fn into_value(self) -> Value<'a> {
        Value::Bytes(self)
    }
}

impl<'a> FromValue<'a> for Tokenizer<'a> {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Tail(t) => Some(t),
            _ => None,
        }
    }
}

impl<'a> FromValue<'a> for Value<'a> {
    fn from_value(value: Value<'a>) -> Option<Self> {
        Some(value)
    }
}

impl<'a> IntoValue<'a> for Value<'a> {
    fn into_value(self) -> Value<'a> {
        self
    }
}

impl<'a> FromValue<'a> for () {
    fn from_value(value: Value<'a>) -> Option<Self> {
        value.is_unit().then_some(())
    }
}

impl<'a> IntoValue<'a> for () {
    fn into_value(self) -> Value<'a> {
        Value::Unit
    }
}

impl<'a, T: FromValue<'a>> FromValue<'a> for Vec<T> {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<'a, T: IntoValue<'a>> IntoValue<'a> for Vec<T> {
    fn into_value(self) -> Value<'a> {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<'a, T: FromValue<'a>, const N: usize> FromValue<'a> for [T; N] {
    fn from_value(value: Value<'a>) -> Option<Self> {
        Vec::<T>::from_value(value)?.try_into().ok()
    }
}

impl<'a, T: IntoValue<'a>, const N: usize> IntoValue<'a> for [T; N] {
    fn into_value(self) -> Value<'a> {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<'a, T: FromValue<'a>> FromValue<'a> for Option<T> {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Optional(None) => Some(None),
            Value::Optional(Some(inner)) => T::from_value(*inner).map(Some),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<'a, T: IntoValue<'a>> IntoValue<'a> for Option<T> {
    fn into_value(self) -> Value<'a> {
        Value::Optional(self.map(|v| Box::new(v.into_value())))
    }
}

impl<'a, K: FromValue<'a> + Ord, V: FromValue<'a>> FromValue<'a> for BTreeMap<K, V> {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            _ => None,
        }
    }
}

impl<'a, K: IntoValue<'a>, V: IntoValue<'a>> IntoValue<'a> for BTreeMap<K, V> {
    fn into_value(self) -> Value<'a> {
        Value::Map(self.into_iter().map(|(k, v)| (k.into_value(), v.into_value())).collect())
    }
}

impl<'a, K: FromValue<'a> + Eq + Hash, V: FromValue<'a>> FromValue<'a> for HashMap<K, V> {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Some((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            _ => None,
        }
    }
}

impl<'a, K: IntoValue<'a>, V: IntoValue<'a>> IntoValue<'a> for HashMap<K, V> {
    fn into_value(self) -> Value<'a> {
        Value::Map(self.into_iter().map(|(k, v)| (k.into_value(), v.into_value())).collect())
    }
}

impl<'a, A: FromValue<'a>, B: FromValue<'a>> FromValue<'a> for (A, B) {
    fn from_value(value: Value<'a>) -> Option<Self> {
        let Value::List(items) = value else { return None };
        let [a, b]: [Value<'a>; 2] = items.try_into().ok()?;
        Some((A::from_value(a)?, B::from_value(b)?))
    }
}

impl<'a, A: IntoValue<'a>, B: IntoValue<'a>> IntoValue<'a> for (A, B) {
    fn into_value(self) -> Value<'a> {
        Value::List(vec![self.0.into_value(), self.1.into_value()])
    }
}

impl<'a, A: FromValue<'a>, B: FromValue<'a>, C: FromValue<'a>> FromValue<'a> for (A, B, C) {
    fn from_value(value: Value<'a>) -> Option<Self> {
        let Value::List(items) = value else { return None };
        let [a, b, c]: [Value<'a>; 3] = items.try_into().ok()?;
        Some((A::from_value(a)?, B::from_value(b)?, C::from_value(c)?))
    }
}

impl<'a, A: IntoValue<'a>, B: IntoValue<'a>, C: IntoValue<'a>> IntoValue<'a> for (A, B, C) {
    fn into_value(self) -> Value<'a> {
        Value::List(vec![self.0.into_value(), self.1.into_value(), self.2.into_value()])
    }
}

/// Implement [`FromValue`] and [`IntoValue`] for a plain struct whose fields
/// are listed in declaration order.
///
/// ```
/// use dispatch_core::{value_struct, FromValue, IntoValue, Value};
///
/// #[derive(Debug, PartialEq)]
/// struct Point { x: i32, y: i32 }
/// value_struct!(Point { x, y });
///
/// let v = Point { x: 1, y: 2 }.into_value();
/// assert_eq!(v, Value::List(vec![Value::Int(1), Value::Int(2)]));
/// assert_eq!(Point::from_value(v), Some(Point { x: 1, y: 2 }));
/// ```
#[macro_export]
macro_rules! value_struct {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl<'a> $crate::FromValue<'a> for $ty {
            fn from_value(value: $crate::Value<'a>) -> ::core::option::Option<Self> {
                let $crate::Value::List(items) = value else {
                    return ::core::option::Option::None;
                };
                let mut items = items.into_iter();
                let out = Self {
                    $($field: $crate::FromValue::from_value(items.next()?)?,)+
                };
                items.next().is_none().then_some(out)
            }
        }

        impl<'a> $crate::IntoValue<'a> for $ty {
            fn into_value(self) -> $crate::Value<'a> {
                $crate::Value::List(::std::vec![$($crate::IntoValue::into_value(self.$field)),+])
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(u8::from_value(Value::UInt(255)), Some(255));
        assert_eq!(u8::from_value(Value::UInt(256)), None);
        assert_eq!(i8::from_value(Value::Int(-128)), Some(-128));
        assert_eq!(u32::from_value(Value::Int(-1)), None);
        assert_eq!(i64::from_value(Value::UInt(7)), Some(7));
        assert_eq!(i32::from_value(Value::Float(1.0)), None);
    }

    #[test]
    fn strings_borrow_or_own() {
        assert_eq!(<&str>::from_value(Value::Str("abc")), Some("abc"));
        assert_eq!(<&str>::from_value(Value::String("abc".into())), None);
        assert_eq!(String::from_value(Value::Str("abc")), Some("abc".to_owned()));
    }

    #[test]
    fn collections() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(Vec::<i32>::from_value(list.clone()), Some(vec![1, 2, 3]));
        assert_eq!(<[i32; 3]>::from_value(list.clone()), Some([1, 2, 3]));
        assert_eq!(<[i32; 2]>::from_value(list.clone()), None);
        assert_eq!(<(i32, i32, i32)>::from_value(list), Some((1, 2, 3)));

        let map = Value::Map(vec![(Value::Str("a"), Value::UInt(1)), (Value::Str("b"), Value::UInt(2))]);
        let parsed = BTreeMap::<&str, u8>::from_value(map).unwrap();
        assert_eq!(parsed.get("b"), Some(&2));
    }

    #[test]
    fn optionals() {
        assert_eq!(Option::<i32>::from_value(Value::Optional(None)), Some(None));
        assert_eq!(
            Option::<i32>::from_value(Value::Optional(Some(Box::new(Value::Int(4))))),
            Some(Some(4))
        );
        assert_eq!(Option::<i32>::from_value(Value::Int(5)), Some(Some(5)));
        assert_eq!(Some(3u8).into_value(), Value::Optional(Some(Box::new(Value::UInt(3)))));
    }

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }
    value_struct!(Point { x, y });

    #[test]
    fn struct_macro_requires_exact_field_count() {
        let ok = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Point::from_value(ok), Some(Point { x: 1, y: 2 }));

        let short = Value::List(vec![Value::Int(1)]);
        assert_eq!(Point::from_value(short), None);

        let long = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(Point::from_value(long), None);
    }
}
