extern crate proc_macro;

mod commandsgen;

use commandsgen::define_commands_impl;
use proc_macro::TokenStream;

/// Generate a module holding a static `dispatch_core` command table.
///
/// ```ignore
/// define_commands! {
///     mod commands;
///     "dd" -> "d" : crate::handlers::add  => "add a b=1 ; adds two numbers",
///     "s"         : crate::handlers::echo => "echo text",
/// }
/// ```
#[proc_macro]
pub fn define_commands(input: TokenStream) -> TokenStream {
    define_commands_impl(input)
}
