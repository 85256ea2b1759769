use core::any::Any;
use std::collections::BTreeMap;

use dispatch_core::{value_struct, Invocation, Tokenizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}
value_struct!(Point { x, y });

pub fn init() {
    println!("init | no-args");
}

pub fn add(a: i64, b: i64) -> i64 {
    a + b
}

pub fn add_floats(a: f64, b: f64) -> f64 {
    a + b
}

pub fn add_points(a: Point, b: Point) -> Point {
    Point { x: a.x + b.x, y: a.y + b.y }
}

pub fn greeting(name: &str, salutation: &str) -> String {
    format!("{salutation}, {name}!")
}

pub fn led(onoff: bool) -> &'static str {
    if onoff { "ON" } else { "OFF" }
}

pub fn send(port: &str, baud: u32, data: &[u8]) -> usize {
    println!("send | port: {} baudrate: {}, data:{:02X?}", port, baud, data);
    data.len()
}

pub fn sum(rest: Tokenizer<'_>) -> i64 {
    rest.filter_map(|token| token.parse::<i64>().ok()).sum()
}

pub fn minmax(values: Vec<f64>) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(values.iter().fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))))
}

pub fn lookup(table: BTreeMap<String, i64>, key: &str) -> Option<i64> {
    table.get(key).copied()
}

/// Names every command the shell knows, or only those starting with `prefix`.
pub fn commands(invocation: Invocation<'_>, prefix: Option<&str>) -> String {
    let prefix = prefix.unwrap_or("");
    let names: Vec<&str> = invocation.table.names().into_iter().filter(|n| n.starts_with(prefix)).collect();
    names.join(" ")
}

/// Counts how many commands the session has run so far.
pub fn count(ctx: &mut dyn Any) -> u32 {
    ctx.downcast_mut::<u32>().map_or(0, |calls| *calls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minmax_of_empty_is_none() {
        assert_eq!(minmax(vec![]), None);
        assert_eq!(minmax(vec![3.0, -1.5, 8.0]), Some((-1.5, 8.0)));
    }

    #[test]
    fn sum_skips_words() {
        assert_eq!(sum(Tokenizer::new("1 two 3")), 4);
    }
}
