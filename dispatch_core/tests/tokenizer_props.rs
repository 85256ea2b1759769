//! Property-based tests for the tokenizer and value round trips.

use dispatch_core::config::MAX_BLOCK_NESTING;
use dispatch_core::{TokenKind, Tokenizer, TypeRegistry, Value};
use proptest::prelude::*;

fn format(registry: &TypeRegistry, tag: &str, value: &Value<'_>) -> String {
    let mut buf = [0u8; 512];
    let len = registry.format(tag, value, &mut buf).expect("result fits");
    String::from_utf8(buf[..len].to_vec()).unwrap()
}

proptest! {
    /// Plain words separated by any mix of separators come back unchanged
    #[test]
    fn words_split_on_separators(
        words in prop::collection::vec("[A-Za-z0-9_.:-]{1,12}", 0..12),
        seps in prop::collection::vec("[ ,\t]{1,3}", 12),
    ) {
        let mut line = String::new();
        for (word, sep) in words.iter().zip(&seps) {
            line.push_str(sep);
            line.push_str(word);
        }
        let tokens: Vec<&str> = Tokenizer::new(&line).collect();
        prop_assert_eq!(tokens, words.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// The tokenizer never panics and only hands out slices of its input
    #[test]
    fn tokens_borrow_from_input(line in any::<String>()) {
        let range = line.as_ptr() as usize..=line.as_ptr() as usize + line.len();
        let mut tokens = Tokenizer::new(&line);
        while let Some(token) = tokens.next_token() {
            let start = token.raw.as_ptr() as usize;
            prop_assert!(range.contains(&start));
            prop_assert!(range.contains(&(start + token.raw.len())));
            prop_assert!(token.raw.contains(token.text));
        }
        prop_assert!(tokens.next_token().is_none());
    }

    /// Tokenizing a copy of the same state yields the same sequence
    #[test]
    fn retokenizing_is_idempotent(line in "[a-z0-9 ,{}\\[\\]\"';=]{0,48}") {
        let mut first = Tokenizer::new(&line);
        first.next();
        let copy = first;
        let a: Vec<&str> = first.collect();
        let b: Vec<&str> = copy.collect();
        prop_assert_eq!(a, b);
    }

    /// A formatted string is read back as exactly one token with the same text
    #[test]
    fn formatted_strings_tokenize_back(s in "[^\"'\\\\]{0,40}") {
        prop_assume!(!s.is_empty());
        let registry = TypeRegistry::with_builtins();
        let text = format(&registry, "str", &Value::Str(&s));
        let mut tokens = Tokenizer::new(&text);
        prop_assert_eq!(tokens.next(), Some(s.as_str()));
        prop_assert_eq!(tokens.next(), None);
    }

    /// Integers survive format then parse for every width
    #[test]
    fn integers_round_trip(n in any::<i64>(), m in any::<u128>()) {
        let registry = TypeRegistry::with_builtins();
        let text = format(&registry, "i64", &Value::Int(n.into()));
        prop_assert_eq!(registry.parse("i64", &text), Some(Value::Int(n.into())));
        let text = format(&registry, "u128", &Value::UInt(m));
        prop_assert_eq!(registry.parse("u128", &text), Some(Value::UInt(m)));
    }

    /// Nesting up to the limit yields one block, beyond it the tokenizer fails
    #[test]
    fn nesting_depth(depth in 1..=MAX_BLOCK_NESTING + 4) {
        let line = format!("{}x{} tail", "{".repeat(depth), "}".repeat(depth));
        let mut tokens = Tokenizer::new(&line);
        if depth <= MAX_BLOCK_NESTING {
            let token = tokens.next_token().unwrap();
            prop_assert_eq!(token.kind, TokenKind::Block('{'));
            prop_assert_eq!(token.text.len(), 2 * (depth - 1) + 1);
            prop_assert_eq!(tokens.next(), Some("tail"));
        } else {
            prop_assert!(tokens.next_token().is_none());
            prop_assert!(tokens.failed());
        }
    }
}
