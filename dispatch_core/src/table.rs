//! Ordered command tables and overload groups.
//!
//! Same-named descriptors form an overload group. The dispatcher tries the
//! group in table order and commits to the first candidate that binds, so
//! registration order decides which overload wins.

use dispatch_config::MAX_ARGS;
use log::warn;
use thiserror::Error;

use crate::command::{CommandDescriptor, ParamKind, ParameterSpec, Registration, RegistrationError};
use crate::registry::TypeRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("command #{index}: {source}")]
    Registration { index: usize, source: RegistrationError },
    #[error("command `{name}`: unknown type `{tag}`")]
    UnknownType { name: String, tag: String },
    #[error("command `{name}`: tail parameter must come last")]
    MisplacedTail { name: String },
    #[error("command `{name}`: too many positional parameters ({count})")]
    TooManyParameters { name: String, count: usize },
    #[error("command `{name}`: {declared} parameter names for {expected} parameters")]
    TooManyNames { name: String, declared: usize, expected: usize },
    #[error("command `{name}`: more than one context parameter")]
    DuplicateContext { name: String },
    #[error("command `{name}`: more than one invocation parameter")]
    DuplicateInvocation { name: String },
}

/// An earlier overload that binds every line the later one would bind.
#[derive(Debug, Clone, Copy)]
pub struct Shadowing<'t> {
    pub earlier: usize,
    pub later: usize,
    pub name: &'t str,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandTable<'t> {
    commands: &'t [CommandDescriptor<'t>],
}

impl<'t> CommandTable<'t> {
    pub const fn new(commands: &'t [CommandDescriptor<'t>]) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &'t [CommandDescriptor<'t>] {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Every descriptor named `name`, in table order.
    pub fn find_name_group<'n>(
        &self,
        name: &'n str,
    ) -> impl Iterator<Item = &'t CommandDescriptor<'t>> + use<'t, 'n> {
        self.commands.iter().filter(move |c| c.name() == name)
    }

    /// Distinct command names, first occurrence order.
    pub fn names(&self) -> Vec<&'t str> {
        let mut names: Vec<&'t str> = Vec::new();
        for command in self.commands {
            let name = command.name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Check every descriptor against `registry`.
    pub fn validate(&self, registry: &TypeRegistry) -> Result<(), TableError> {
        for (index, command) in self.commands.iter().enumerate() {
            Registration::parse(command.registration().as_str())
                .map_err(|source| TableError::Registration { index, source })?;
            validate_command(command, registry)?;
        }
        Ok(())
    }

    /// Overload pairs where the earlier descriptor hides the later one.
    ///
    /// Conservative: an earlier overload is reported when it needs at most as
    /// many tokens as the later one, has no more positional parameters, and at
    /// each of its positions takes the same type or a string. An earlier
    /// overload that needs a user context never hides one that does not.
    pub fn shadowed_overloads(&self) -> Vec<Shadowing<'t>> {
        let mut found = Vec::new();
        for (later, l) in self.commands.iter().enumerate() {
            let name = l.name();
            let earlier = self.commands[..later]
                .iter()
                .position(|e| e.name() == name && shadows(e, l));
            if let Some(earlier) = earlier {
                found.push(Shadowing { earlier, later, name });
            }
        }
        found
    }

    /// Log every shadowed overload. Returns how many were found.
    pub fn lint(&self) -> usize {
        let found = self.shadowed_overloads();
        for s in &found {
            warn!(
                "`{}` is never reached: `{}` is registered earlier and binds the same input",
                self.commands[s.later], self.commands[s.earlier]
            );
        }
        found.len()
    }

    /// One line per descriptor: signature and description.
    pub fn help(&self) -> String {
        let mut text = String::new();
        for command in self.commands {
            text.push_str(&command.to_string());
            if let Some(description) = command.description() {
                text.push_str(" ; ");
                text.push_str(description);
            }
            text.push('\n');
        }
        text
    }
}

fn validate_command(command: &CommandDescriptor<'_>, registry: &TypeRegistry) -> Result<(), TableError> {
    let name = || command.name().to_owned();
    let params: Vec<ParameterSpec<'_>> = command.params().collect();

    let mut tail_seen = false;
    let mut contexts = 0usize;
    let mut invocations = 0usize;
    for param in &params {
        match param.kind {
            ParamKind::Positional => {
                if tail_seen {
                    return Err(TableError::MisplacedTail { name: name() });
                }
                if !registry.knows(param.tag) {
                    return Err(TableError::UnknownType { name: name(), tag: param.tag.to_owned() });
                }
            }
            ParamKind::Tail => {
                if tail_seen {
                    return Err(TableError::MisplacedTail { name: name() });
                }
                tail_seen = true;
            }
            ParamKind::Context => contexts += 1,
            ParamKind::Invocation => invocations += 1,
        }
    }
    if contexts > 1 {
        return Err(TableError::DuplicateContext { name: name() });
    }
    if invocations > 1 {
        return Err(TableError::DuplicateInvocation { name: name() });
    }

    let count = params.iter().filter(|p| p.kind == ParamKind::Positional).count();
    if count > MAX_ARGS {
        return Err(TableError::TooManyParameters { name: name(), count });
    }

    let declared = command.registration().params().count();
    let expected = params.iter().filter(|p| !p.kind.is_hidden()).count();
    if declared > expected {
        return Err(TableError::TooManyNames { name: name(), declared, expected });
    }

    if let Some(tag) = command.returns() {
        if !registry.knows(tag) {
            return Err(TableError::UnknownType { name: name(), tag: tag.to_owned() });
        }
    }
    Ok(())
}

fn shadows(earlier: &CommandDescriptor<'_>, later: &CommandDescriptor<'_>) -> bool {
    // without a user context the earlier one declines and the later one still runs
    if earlier.has_context() && !later.has_context() {
        return false;
    }
    fn positional<'t>(c: &CommandDescriptor<'t>) -> Vec<ParameterSpec<'t>> {
        c.params().filter(|p| p.kind == ParamKind::Positional).collect()
    }
    let e = positional(earlier);
    let l = positional(later);

    let required = |ps: &[ParameterSpec<'_>]| ps.iter().filter(|p| p.is_required()).count();

    e.len() <= l.len()
        && required(&e) <= required(&l)
        && e.iter().zip(&l).all(|(ep, lp)| {
            let tag = ep.tag.trim();
            tag == lp.tag.trim() || matches!(tag, "str" | "string")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Call;
    use crate::value::Value;

    fn unit<'l>(_: &mut Call<'l, '_>) -> Option<Value<'l>> {
        Some(Value::Unit)
    }

    macro_rules! cmd {
        ($reg:expr, [$($tag:expr),*]) => {
            CommandDescriptor::new($reg, &[$($tag),*], None, &unit)
        };
        ($reg:expr, [$($tag:expr),*] -> $ret:expr) => {
            CommandDescriptor::new($reg, &[$($tag),*], Some($ret), &unit)
        };
    }

    #[test]
    fn name_groups_keep_table_order() {
        let commands = [
            cmd!("compute x y", ["i32", "i32"]),
            cmd!("other", []),
            cmd!("compute;strings", ["str"]),
            cmd!("computex", []),
        ];
        let table = CommandTable::new(&commands);
        let group: Vec<_> = table.find_name_group("compute").map(|c| c.tags().len()).collect();
        assert_eq!(group, [2, 1]);
        assert_eq!(table.find_name_group("comp").count(), 0);
        assert_eq!(table.names(), ["compute", "other", "computex"]);
    }

    #[test]
    fn validation_catches_bad_tables() {
        let registry = TypeRegistry::with_builtins();

        let ok = [cmd!("sum a b;adds", ["i32", "i32"] -> "i32"), cmd!("all rest", ["tail", "context"])];
        assert_eq!(CommandTable::new(&ok).validate(&registry), Ok(()));

        let bad_reg = [cmd!("sum a=", ["i32"])];
        assert!(matches!(
            CommandTable::new(&bad_reg).validate(&registry),
            Err(TableError::Registration { index: 0, .. })
        ));

        let unknown = [cmd!("draw p", ["point"])];
        assert_eq!(
            CommandTable::new(&unknown).validate(&registry),
            Err(TableError::UnknownType { name: "draw".into(), tag: "point".into() })
        );

        let bad_ret = [cmd!("draw", [] -> "point")];
        assert!(CommandTable::new(&bad_ret).validate(&registry).is_err());

        let tail_first = [cmd!("f", ["tail", "i32"])];
        assert_eq!(
            CommandTable::new(&tail_first).validate(&registry),
            Err(TableError::MisplacedTail { name: "f".into() })
        );

        let two_ctx = [cmd!("f", ["context", "context"])];
        assert_eq!(
            CommandTable::new(&two_ctx).validate(&registry),
            Err(TableError::DuplicateContext { name: "f".into() })
        );

        let extra_names = [cmd!("f a b", ["i32"])];
        assert_eq!(
            CommandTable::new(&extra_names).validate(&registry),
            Err(TableError::TooManyNames { name: "f".into(), declared: 2, expected: 1 })
        );
    }

    #[test]
    fn too_many_positionals() {
        static TAGS: [&str; MAX_ARGS + 1] = ["u8"; MAX_ARGS + 1];
        let commands = [CommandDescriptor::new("wide", &TAGS, None, &unit)];
        assert_eq!(
            CommandTable::new(&commands).validate(&TypeRegistry::with_builtins()),
            Err(TableError::TooManyParameters { name: "wide".into(), count: MAX_ARGS + 1 })
        );
    }

    #[test]
    fn general_overload_first_is_reported() {
        let commands = [
            cmd!("compute a", ["str"]),
            cmd!("compute x y=100", ["i32", "i32"]),
            cmd!("echo a", ["i32"]),
            cmd!("echo a b", ["i64", "i64"]),
        ];
        let table = CommandTable::new(&commands);
        let found = table.shadowed_overloads();
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].earlier, found[0].later, found[0].name), (0, 1, "compute"));
        assert_eq!(table.lint(), 1);
    }

    #[test]
    fn context_overload_does_not_hide_plain_one() {
        let commands = [cmd!("h x", ["context", "i32"]), cmd!("h x", ["i32"])];
        assert!(CommandTable::new(&commands).shadowed_overloads().is_empty());

        let both = [cmd!("h x", ["context", "i32"]), cmd!("h x", ["i32", "context"])];
        assert_eq!(CommandTable::new(&both).shadowed_overloads().len(), 1);
    }

    #[test]
    fn invocation_parameters_are_hidden() {
        let registry = TypeRegistry::with_builtins();
        let ok = [cmd!("list filter", ["invocation", "str?"])];
        assert_eq!(CommandTable::new(&ok).validate(&registry), Ok(()));
        assert_eq!(CommandTable::new(&ok).help(), "list(filter: str?)\n");

        let twice = [cmd!("list", ["invocation", "invocation"])];
        assert_eq!(
            CommandTable::new(&twice).validate(&registry),
            Err(TableError::DuplicateInvocation { name: "list".into() })
        );
    }

    #[test]
    fn specific_overload_first_is_clean() {
        let commands = [
            cmd!("compute x y=100", ["i32", "i32"]),
            cmd!("compute a", ["str"]),
        ];
        assert!(CommandTable::new(&commands).shadowed_overloads().is_empty());
    }

    #[test]
    fn help_lists_signatures() {
        let commands = [cmd!("sum a b=2;adds two numbers", ["i32", "i32"] -> "i32"), cmd!("ping", [])];
        assert_eq!(
            CommandTable::new(&commands).help(),
            "sum(a: i32, b: i32 = 2) -> i32 ; adds two numbers\nping()\n"
        );
    }
}
