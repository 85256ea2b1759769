//! Text-command dispatcher.
//!
//! A line such as `add_points {1 2} {3 4}` is split by the [`Tokenizer`], its
//! first token picks an overload group from a [`CommandTable`], each candidate
//! gets its arguments converted through the [`TypeRegistry`], and the first
//! candidate that binds is invoked. Its result is formatted into a
//! caller-owned buffer carried by an [`OutputReport`].
//!
//! Handler tables are normally generated by `dispatch_macros::define_commands!`,
//! but [`CommandDescriptor`]s can be written by hand as well.

pub mod command;
pub mod dispatcher;
pub mod output;
pub mod registry;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use command::{
    invoker, Call, CommandDescriptor, Invocation, Invoker, ParamDecl, ParamKind, ParameterSpec,
    Registration, RegistrationError, CONTEXT_TAG, INVOCATION_TAG, MAX_CALL_SLOTS, TAIL_TAG,
};
pub use dispatcher::{execute, execute_with_buffer, DispatchError, Dispatcher, Status};
pub use output::OutputReport;
pub use registry::{type_name, Converter, OutBuf, RegistryError, TypeRegistry};
pub use table::{CommandTable, Shadowing, TableError};
pub use tokenizer::{Token, TokenKind, Tokenizer};
pub use value::{FromValue, HexBytes, IntoValue, Value};

/// Re-exported for generated code.
pub use dispatch_config as config;
