//! Sample handlers for the demo shell. `src/commands.cfg` maps them to
//! command names and descriptors.

pub mod commands;

use dispatch_core::{RegistryError, TypeRegistry};

/// Add the types the sample commands use on top of the built-ins.
pub fn register_types(registry: &mut TypeRegistry) -> Result<(), RegistryError> {
    registry.register_struct("point", &["i32", "i32"])
}
