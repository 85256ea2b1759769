//! Compile-time capacities for the dispatcher crates.
//!
//! Every fixed-size buffer in the workspace is sized from this file, so a
//! constrained target only has to tune the numbers here.

#![no_std]

/// Highest number of textual arguments a single command may declare.
/// Bounded by the width of the per-call error bitmask (`u32`).
pub const MAX_ARGS: usize = 32;

/// Maximum decoded length, in bytes, of a `hex` argument.
pub const MAX_HEXSTR_LEN: usize = 64;

/// Deepest bracket nesting the tokenizer follows inside one block token.
pub const MAX_BLOCK_NESTING: usize = 32;

/// Number of named types a `TypeRegistry` can hold (built-ins included).
pub const MAX_REGISTERED_TYPES: usize = 64;

/// Size of the result buffer used by the demo shell.
pub const RESULT_BUFFER_LEN: usize = 256;

/// Maximum input line accepted by the demo shell.
pub const INPUT_MAX_LEN: usize = 256;

/// Prompt printed by the demo shell.
pub const PROMPT: &str = "> ";
