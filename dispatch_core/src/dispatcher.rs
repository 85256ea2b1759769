//! Line execution: name lookup, argument binding, overload fallback and
//! result formatting.

use core::any::Any;
use core::fmt;

use log::{debug, trace};
use thiserror::Error;

use crate::command::{error_bit, Call, CommandDescriptor, Invocation, ParamKind};
use crate::output::OutputReport;
use crate::registry::TypeRegistry;
use crate::table::CommandTable;
use crate::tokenizer::Tokenizer;
use crate::value::Value;

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    CommandNotFound,
    ArgumentParsingError,
    NotEnoughArguments,
    NoMatchingOverload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum DispatchError {
    #[error("command not found")]
    CommandNotFound,
    #[error("argument parsing error")]
    ArgumentParsing,
    #[error("not enough arguments")]
    NotEnoughArguments,
    #[error("no matching overload")]
    NoMatchingOverload,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn into_result(self) -> Result<(), DispatchError> {
        match self {
            Status::Success => Ok(()),
            Status::CommandNotFound => Err(DispatchError::CommandNotFound),
            Status::ArgumentParsingError => Err(DispatchError::ArgumentParsing),
            Status::NotEnoughArguments => Err(DispatchError::NotEnoughArguments),
            Status::NoMatchingOverload => Err(DispatchError::NoMatchingOverload),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::CommandNotFound => "command_not_found",
            Status::ArgumentParsingError => "argument_parsing_error",
            Status::NotEnoughArguments => "not_enough_arguments",
            Status::NoMatchingOverload => "no_matching_overload",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command table bound to the type registry used for its arguments.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'t, 'r> {
    table: CommandTable<'t>,
    registry: &'r TypeRegistry,
}

impl<'t> Dispatcher<'t, 'static> {
    /// Dispatch through [`TypeRegistry::global`].
    pub fn new(commands: &'t [CommandDescriptor<'t>]) -> Self {
        Self::with_registry(commands, TypeRegistry::global())
    }
}

impl<'t, 'r> Dispatcher<'t, 'r> {
    pub fn with_registry(commands: &'t [CommandDescriptor<'t>], registry: &'r TypeRegistry) -> Self {
        Self { table: CommandTable::new(commands), registry }
    }

    pub fn table(&self) -> CommandTable<'t> {
        self.table
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    pub fn execute(&self, line: &str, out: &mut OutputReport<'_, 't>) -> Status {
        self.execute_with_context(line, out, None)
    }

    /// Run `line`, handing `context` to handlers that take a context parameter.
    pub fn execute_with_context(
        &self,
        line: &str,
        out: &mut OutputReport<'_, 't>,
        mut context: Option<&mut dyn Any>,
    ) -> Status {
        out.reset();

        let mut tokens = Tokenizer::new(line);
        let Some(name) = tokens.next() else {
            debug!("no command name in {line:?}");
            return Status::CommandNotFound;
        };

        let mut tried = 0usize;
        for candidate in self.table.find_name_group(name) {
            tried += 1;
            out.reset();
            out.command = Some(candidate);

            let invocation = Invocation { table: self.table, line, command: candidate };
            let mut call = Call::new(context.as_deref_mut()).with_invocation(invocation);
            if !self.bind(candidate, tokens, &mut call, out) {
                trace!(
                    "`{candidate}` rejected: mask={:#b} not_enough={}",
                    out.arg_error_mask, out.not_enough_arguments
                );
                continue;
            }

            let Some(result) = candidate.invoke(&mut call) else {
                out.arg_error_mask |= call.mismatch_mask();
                trace!("`{candidate}` declined by invoker: mask={:#b}", out.arg_error_mask);
                continue;
            };

            self.store_result(candidate, &result, out);
            debug!("`{name}` dispatched to `{candidate}`");
            return Status::Success;
        }

        let status = match tried {
            0 => Status::CommandNotFound,
            1 if out.not_enough_arguments => Status::NotEnoughArguments,
            1 => Status::ArgumentParsingError,
            _ => Status::NoMatchingOverload,
        };
        debug!("`{name}` failed after {tried} candidate(s): {status}");
        status
    }

    /// Bind every parameter of `candidate` into `call`. Returns `false` when an
    /// argument failed to convert or ran out.
    fn bind<'l>(
        &self,
        candidate: &CommandDescriptor<'l>,
        mut args: Tokenizer<'l>,
        call: &mut Call<'l, '_>,
        out: &mut OutputReport<'_, '_>,
    ) -> bool {
        let mut position = 0usize;

        for param in candidate.params() {
            let value = match param.kind {
                ParamKind::Context | ParamKind::Invocation => Some(Value::Unit),
                ParamKind::Tail => Some(Value::Tail(args)),
                ParamKind::Positional => None,
            };
            if let Some(value) = value {
                if call.push(value, None).is_err() {
                    debug!("`{candidate}` has more parameters than a call can hold");
                    return false;
                }
                continue;
            }

            let bit = position;
            position += 1;

            if out.not_enough_arguments {
                if call.push(Value::Unit, Some(bit)).is_err() {
                    return false;
                }
                continue;
            }

            let token = args
                .next_token()
                .or_else(|| param.default.and_then(|text| Tokenizer::new(text).next_token()));

            let value = match token {
                Some(token) => self.registry.parse(param.tag, token.text).unwrap_or_else(|| {
                    out.arg_error_mask |= error_bit(bit);
                    Value::Unit
                }),
                None if param.is_optional() => Value::Optional(None),
                None => {
                    out.not_enough_arguments = true;
                    Value::Unit
                }
            };
            if call.push(value, Some(bit)).is_err() {
                debug!("`{candidate}` has more parameters than a call can hold");
                return false;
            }
        }

        !out.has_error()
    }

    fn store_result(&self, candidate: &CommandDescriptor<'_>, result: &Value<'_>, out: &mut OutputReport<'_, '_>) {
        match candidate.returns() {
            Some(tag) if !out.buffer.is_empty() => match self.registry.format(tag, result, out.buffer) {
                Some(written) => out.written = written,
                None => {
                    out.result_error = true;
                    debug!("result of `{candidate}` does not fit in {} bytes", out.buffer.len());
                }
            },
            _ => {
                if let Some(first) = out.buffer.first_mut() {
                    *first = 0;
                }
            }
        }
    }
}

/// Execute `line` against `commands` using the global type registry.
pub fn execute<'t>(
    commands: &'t [CommandDescriptor<'t>],
    line: &str,
    out: &mut OutputReport<'_, 't>,
    context: Option<&mut dyn Any>,
) -> Status {
    Dispatcher::new(commands).execute_with_context(line, out, context)
}

/// Execute `line` with a fresh [`OutputReport`] over `buffer`.
pub fn execute_with_buffer(commands: &[CommandDescriptor<'_>], line: &str, buffer: &mut [u8]) -> Status {
    let mut out = OutputReport::new(buffer);
    execute(commands, line, &mut out, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::invoker;

    fn sum<'l>(call: &mut Call<'l, '_>) -> Option<Value<'l>> {
        let a: i32 = call.take(0)?;
        let b: i32 = call.take(1)?;
        Some(Value::Int(i128::from(a + b)))
    }

    fn ping<'l>(_: &mut Call<'l, '_>) -> Option<Value<'l>> {
        Some(Value::Unit)
    }

    static COMMANDS: [CommandDescriptor<'static>; 2] = [
        CommandDescriptor::new("sum a b", &["i32", "i32"], Some("i32"), &sum),
        CommandDescriptor::new("ping", &[], None, &ping),
    ];

    #[test]
    fn status_maps_to_errors() {
        assert!(Status::Success.is_success());
        assert_eq!(Status::Success.into_result(), Ok(()));
        assert_eq!(Status::NoMatchingOverload.into_result(), Err(DispatchError::NoMatchingOverload));
        assert_eq!(Status::ArgumentParsingError.to_string(), "argument_parsing_error");
        assert_eq!(DispatchError::NotEnoughArguments.to_string(), "not enough arguments");
    }

    #[test]
    fn sum_writes_result() {
        let mut buf = [0xffu8; 16];
        let mut out = OutputReport::new(&mut buf);
        assert_eq!(execute(&COMMANDS, "sum 123 456", &mut out, None), Status::Success);
        assert_eq!(out.result(), Some("579"));
        assert_eq!(out.command.map(|c| c.name()), Some("sum"));
        assert_eq!(buf[3], 0);
    }

    #[test]
    fn void_result_clears_buffer() {
        let mut buf = [b'x'; 4];
        assert_eq!(execute_with_buffer(&COMMANDS, "ping", &mut buf), Status::Success);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn unknown_and_empty_lines() {
        let mut buf = [0u8; 8];
        assert_eq!(execute_with_buffer(&COMMANDS, "", &mut buf), Status::CommandNotFound);
        assert_eq!(execute_with_buffer(&COMMANDS, "   ;sum 1 2", &mut buf), Status::CommandNotFound);
        assert_eq!(execute_with_buffer(&COMMANDS, "summ 1 2", &mut buf), Status::CommandNotFound);
    }

    #[test]
    fn result_overflow_is_still_success() {
        let mut buf = [0u8; 3];
        let mut out = OutputReport::new(&mut buf);
        assert_eq!(execute(&COMMANDS, "sum 500 500", &mut out, None), Status::Success);
        assert!(out.result_error);
        assert_eq!(out.result(), None);

        let mut empty: [u8; 0] = [];
        let mut out = OutputReport::new(&mut empty);
        assert_eq!(execute(&COMMANDS, "sum 1 1", &mut out, None), Status::Success);
        assert!(!out.result_error);
    }

    #[test]
    fn invoker_mismatch_falls_through() {
        let wants_bool = invoker(|call| {
            let flag: bool = call.take(0)?;
            Some(Value::Bool(!flag))
        });
        let commands = [CommandDescriptor::new("neg v", &["str"], Some("bool"), &wants_bool)];
        let registry = TypeRegistry::with_builtins();
        let dispatcher = Dispatcher::with_registry(&commands, &registry);

        let mut buf = [0u8; 8];
        let mut out = OutputReport::new(&mut buf);
        assert_eq!(dispatcher.execute("neg true", &mut out), Status::ArgumentParsingError);
        assert_eq!(out.arg_error_mask, 0b1);
    }
}
