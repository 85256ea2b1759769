//! The process-wide registry. Kept in its own test binary since installing
//! only works before the first dispatch.

use core::fmt;

use dispatch_core::{
    execute_with_buffer, CommandDescriptor, Converter, OutBuf, RegistryError, Status, TypeRegistry, Value,
};

fn parse_celsius<'a>(_: &TypeRegistry, token: &'a str) -> Option<Value<'a>> {
    let degrees = token.strip_suffix('C')?.parse::<f64>().ok()?;
    Some(Value::Float(degrees))
}

fn format_celsius(_: &TypeRegistry, value: &Value<'_>, out: &mut OutBuf<'_>) -> fmt::Result {
    use core::fmt::Write;
    match value {
        Value::Float(f) => write!(out, "{f}C"),
        _ => Err(fmt::Error),
    }
}

fn warmer<'l>(call: &mut dispatch_core::Call<'l, '_>) -> Option<Value<'l>> {
    let t: f64 = call.take(0)?;
    Some(Value::Float(t + 1.5))
}

static COMMANDS: [CommandDescriptor<'static>; 1] =
    [CommandDescriptor::new("warmer t", &["celsius"], Some("celsius"), &warmer)];

#[test]
fn installed_registry_serves_free_functions() {
    let mut registry = TypeRegistry::with_builtins();
    registry
        .register(
            "celsius",
            Converter { type_name: "temperature", parse: parse_celsius, format: format_celsius },
        )
        .unwrap();
    let installed = registry.install().unwrap();
    assert_eq!(installed.type_name("celsius"), "temperature");
    assert!(std::ptr::eq(installed, TypeRegistry::global()));

    let mut buf = [0u8; 32];
    assert_eq!(execute_with_buffer(&COMMANDS, "warmer 20C", &mut buf), Status::Success);
    assert_eq!(&buf[..6], b"21.5C\0");
    assert_eq!(execute_with_buffer(&COMMANDS, "warmer 20F", &mut buf), Status::ArgumentParsingError);

    assert_eq!(TypeRegistry::with_builtins().install().unwrap_err(), RegistryError::AlreadyInstalled);
}
