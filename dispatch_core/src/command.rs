//! Command descriptors and the registration string grammar.
//!
//! A registration string names a command, optionally names its parameters with
//! default values, and optionally carries a description after `;`:
//!
//! ```text
//! add_points p1 p2={10 20};adds two points
//! ```
//!
//! Defaults keep their delimiters (`{10 20}`, `"a b"`) so the dispatcher can run
//! them through the tokenizer exactly like typed input.

use core::any::Any;
use core::fmt;

use dispatch_config::MAX_ARGS;
use thiserror::Error;

use crate::registry::{classify, TagShape};
use crate::table::CommandTable;
use crate::tokenizer::{Token, TokenKind, Tokenizer};
use crate::value::{FromValue, Value};

/// Tag of a parameter that receives the unconsumed rest of the line.
pub const TAIL_TAG: &str = "tail";
/// Tag of a parameter that receives the caller's user context.
pub const CONTEXT_TAG: &str = "context";
/// Tag of a parameter that receives the running [`Invocation`].
pub const INVOCATION_TAG: &str = "invocation";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("registration does not start with a command name")]
    MissingName,
    #[error("unexpected `{0}` where a parameter name was expected")]
    UnexpectedToken(String),
    #[error("parameter `{0}` has `=` but no default value")]
    MissingDefault(String),
    #[error("unterminated quote or bracket")]
    Malformed,
}

/// Parameter name and raw default text from a registration string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDecl<'t> {
    pub name: &'t str,
    pub default: Option<&'t str>,
}

/// View over a registration string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration<'t> {
    text: &'t str,
}

impl<'t> Registration<'t> {
    /// Wrap `text` without checking it. Malformed parts read as absent.
    pub const fn new_unchecked(text: &'t str) -> Self {
        Self { text }
    }

    /// Check the whole registration string.
    pub fn parse(text: &'t str) -> Result<Self, RegistrationError> {
        let mut tokens = Tokenizer::new(text);
        match tokens.next_token() {
            Some(Token { kind: TokenKind::Identifier, .. }) => {}
            _ if tokens.failed() => return Err(RegistrationError::Malformed),
            _ => return Err(RegistrationError::MissingName),
        }

        while let Some(param) = tokens.next_token() {
            if param.kind != TokenKind::Identifier {
                return Err(RegistrationError::UnexpectedToken(param.raw.to_owned()));
            }
            if tokens.consume_equals() {
                match tokens.next_token() {
                    Some(value) if value.kind != TokenKind::Equals => {}
                    _ if tokens.failed() => return Err(RegistrationError::Malformed),
                    _ => return Err(RegistrationError::MissingDefault(param.text.to_owned())),
                }
            }
        }

        if tokens.failed() {
            return Err(RegistrationError::Malformed);
        }
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &'t str {
        self.text
    }

    /// Identifier portion only, up to the first terminator.
    pub fn name(&self) -> &'t str {
        match Tokenizer::new(self.text).next_token() {
            Some(Token { kind: TokenKind::Identifier, text, .. }) => text,
            _ => "",
        }
    }

    pub fn params(&self) -> ParamDecls<'t> {
        let mut tokens = Tokenizer::new(self.text);
        let started = matches!(tokens.next_token(), Some(Token { kind: TokenKind::Identifier, .. }));
        ParamDecls { tokens, done: !started }
    }

    /// Free text after the first top-level `;`, trimmed.
    pub fn description(&self) -> Option<&'t str> {
        let mut decls = self.params();
        decls.by_ref().for_each(drop);
        decls.tokens.after_terminator().map(str::trim).filter(|d| !d.is_empty())
    }
}

pub struct ParamDecls<'t> {
    tokens: Tokenizer<'t>,
    done: bool,
}

impl<'t> Iterator for ParamDecls<'t> {
    type Item = ParamDecl<'t>;

    fn next(&mut self) -> Option<ParamDecl<'t>> {
        if self.done {
            return None;
        }
        let decl = match self.tokens.next_token() {
            Some(Token { kind: TokenKind::Identifier, text, .. }) => {
                let default = if self.tokens.consume_equals() {
                    self.tokens.next_token().map(|t| t.raw)
                } else {
                    None
                };
                Some(ParamDecl { name: text, default })
            }
            _ => None,
        };
        self.done = decl.is_none();
        decl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Bound from one token of the line or from its default.
    Positional,
    /// Bound to the live tokenizer.
    Tail,
    /// Bound to the caller's user context.
    Context,
    /// Bound to the dispatcher's view of the running call.
    Invocation,
}

impl ParamKind {
    pub fn of(tag: &str) -> Self {
        match tag.trim() {
            TAIL_TAG => ParamKind::Tail,
            CONTEXT_TAG => ParamKind::Context,
            INVOCATION_TAG => ParamKind::Invocation,
            _ => ParamKind::Positional,
        }
    }

    /// Supplied by the dispatcher rather than named in the registration.
    pub fn is_hidden(self) -> bool {
        matches!(self, ParamKind::Context | ParamKind::Invocation)
    }
}

/// One handler parameter: its type tag plus what the registration declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec<'t> {
    pub tag: &'t str,
    pub name: Option<&'t str>,
    /// Raw default text, delimiters included.
    pub default: Option<&'t str>,
    pub kind: ParamKind,
}

impl ParameterSpec<'_> {
    pub fn is_optional(&self) -> bool {
        matches!(classify(self.tag), Some(TagShape::Optional(_)))
    }

    /// Whether the dispatcher can bind this parameter without a token.
    pub fn is_required(&self) -> bool {
        self.kind == ParamKind::Positional && self.default.is_none() && !self.is_optional()
    }
}

/// Parameter tags joined with the declared names, hidden parameters skipped
/// when handing out names.
pub struct Params<'t> {
    tags: core::slice::Iter<'t, &'t str>,
    decls: ParamDecls<'t>,
}

impl<'t> Iterator for Params<'t> {
    type Item = ParameterSpec<'t>;

    fn next(&mut self) -> Option<ParameterSpec<'t>> {
        let tag = *self.tags.next()?;
        let kind = ParamKind::of(tag);
        let decl = if kind.is_hidden() { None } else { self.decls.next() };
        Some(ParameterSpec {
            tag,
            name: decl.map(|d| d.name),
            default: decl.and_then(|d| d.default).filter(|_| kind == ParamKind::Positional),
            kind,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tags.size_hint()
    }
}

/// Slots a [`Call`] holds: every positional parameter plus one tail, one
/// context and one invocation parameter.
pub const MAX_CALL_SLOTS: usize = MAX_ARGS + 3;

/// What the dispatcher is running: the table being searched, the full input
/// line and the candidate that bound.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'l> {
    pub table: CommandTable<'l>,
    pub line: &'l str,
    pub command: &'l CommandDescriptor<'l>,
}

/// Arguments bound for one invocation.
///
/// Typed extraction goes through [`Call::take`]; a value of the wrong shape
/// marks its position in [`Call::mismatch_mask`].
pub struct Call<'l, 'c> {
    slots: heapless::Vec<(Value<'l>, Option<usize>), MAX_CALL_SLOTS>,
    context: Option<&'c mut dyn Any>,
    invocation: Option<Invocation<'l>>,
    mismatch: u32,
}

impl<'l, 'c> Call<'l, 'c> {
    pub fn new(context: Option<&'c mut dyn Any>) -> Self {
        Self { slots: heapless::Vec::new(), context, invocation: None, mismatch: 0 }
    }

    pub fn with_invocation(mut self, invocation: Invocation<'l>) -> Self {
        self.invocation = Some(invocation);
        self
    }

    /// Append a bound value. `position` is its bit in the error mask.
    /// Hands the value back when every slot is taken.
    pub fn push(&mut self, value: Value<'l>, position: Option<usize>) -> Result<(), Value<'l>> {
        self.slots.push((value, position)).map_err(|(value, _)| value)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value<'l>> {
        self.slots.get(index).map(|(value, _)| value)
    }

    /// Move parameter `index` out as a `T`.
    pub fn take<T: FromValue<'l>>(&mut self, index: usize) -> Option<T> {
        let (value, position) = self.slots.get_mut(index)?;
        let taken = T::from_value(core::mem::take(value));
        if taken.is_none() {
            if let Some(bit) = position {
                self.mismatch |= error_bit(*bit);
            }
        }
        taken
    }

    pub fn context(&mut self) -> Option<&mut dyn Any> {
        self.context.as_deref_mut()
    }

    pub fn context_as<T: Any>(&mut self) -> Option<&mut T> {
        self.context.as_deref_mut()?.downcast_mut()
    }

    pub fn invocation(&self) -> Option<Invocation<'l>> {
        self.invocation
    }

    pub fn mismatch_mask(&self) -> u32 {
        self.mismatch
    }
}

/// Error-mask bit for a positional parameter. Positions past 31 have none.
pub(crate) fn error_bit(position: usize) -> u32 {
    u32::try_from(position)
        .ok()
        .and_then(|p| 1u32.checked_shl(p))
        .unwrap_or(0)
}

pub type Invoker<'t> = &'t (dyn for<'l, 'c> Fn(&mut Call<'l, 'c>) -> Option<Value<'l>> + Sync);

/// Pin a closure to the invoker signature, so its lifetimes stay generic.
pub fn invoker<F>(f: F) -> F
where
    F: for<'l, 'c> Fn(&mut Call<'l, 'c>) -> Option<Value<'l>> + Sync,
{
    f
}

/// A registered command: registration text, parameter type tags, result tag
/// and the invoker that calls the handler.
#[derive(Clone, Copy)]
pub struct CommandDescriptor<'t> {
    registration: &'t str,
    tags: &'t [&'t str],
    returns: Option<&'t str>,
    invoker: Invoker<'t>,
}

impl<'t> CommandDescriptor<'t> {
    pub const fn new(
        registration: &'t str,
        tags: &'t [&'t str],
        returns: Option<&'t str>,
        invoker: Invoker<'t>,
    ) -> Self {
        Self { registration, tags, returns, invoker }
    }

    pub fn registration(&self) -> Registration<'t> {
        Registration::new_unchecked(self.registration)
    }

    pub fn name(&self) -> &'t str {
        self.registration().name()
    }

    pub fn description(&self) -> Option<&'t str> {
        self.registration().description()
    }

    pub fn tags(&self) -> &'t [&'t str] {
        self.tags
    }

    pub fn params(&self) -> Params<'t> {
        Params { tags: self.tags.iter(), decls: self.registration().params() }
    }

    /// All handler parameters, hidden ones included.
    pub fn arg_count(&self) -> usize {
        self.tags.len()
    }

    /// Parameters bound from tokens of the command line.
    pub fn command_arg_count(&self) -> usize {
        self.params().filter(|p| p.kind == ParamKind::Positional).count()
    }

    pub fn has_tail_args(&self) -> bool {
        self.params().any(|p| p.kind == ParamKind::Tail)
    }

    pub fn has_context(&self) -> bool {
        self.params().any(|p| p.kind == ParamKind::Context)
    }

    pub fn has_invocation(&self) -> bool {
        self.params().any(|p| p.kind == ParamKind::Invocation)
    }

    pub fn has_result(&self) -> bool {
        self.returns.is_some()
    }

    pub fn returns(&self) -> Option<&'t str> {
        self.returns
    }

    pub fn invoke<'l>(&self, call: &mut Call<'l, '_>) -> Option<Value<'l>> {
        (self.invoker)(call)
    }
}

impl fmt::Debug for CommandDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("registration", &self.registration)
            .field("tags", &self.tags)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

/// `name(a: i32, b: i32 = 2) -> i32`
impl fmt::Display for CommandDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        let visible = self.params().filter(|p| !p.kind.is_hidden());
        for (i, param) in visible.enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match param.name {
                Some(name) => write!(f, "{name}: {}", param.tag)?,
                None => f.write_str(param.tag)?,
            }
            if param.kind == ParamKind::Tail {
                f.write_str("...")?;
            }
            if let Some(default) = param.default {
                write!(f, " = {default}")?;
            }
        }
        f.write_str(")")?;
        if let Some(ret) = self.returns {
            write!(f, " -> {ret}")?;
        }
        Ok(())
    }
}
