//! # Command Table Macro
//!
//! Generates a static `dispatch_core` command table from a compact list of
//! entries, each naming a parameter descriptor, an optional result descriptor,
//! the handler path and its registration text.
//!
//! ## Input
//! - Inline: `define_commands!(mod m; "dd" -> "d" : crate::path::to::add => "add a b=1 ; adds", ...);`
//! - File:   `define_commands!(mod m; path = "src/commands.cfg");` where the file holds
//!   the same entry list. The path is resolved against the invoking crate's manifest dir.
//!   Handler paths are resolved inside the generated module, so use `crate::` or
//!   extern crate paths.
//!
//! ## Descriptor Table
//!
//! +------+-------+   +------+------+   +------+------+   +------+------+   +------+------+
//! | Char | Type  |   | Char | Type |   | Char | Type |   | Char | Type |   | Char | Type |
//! +------+-------+   +------+------+   +------+------+   +------+------+   +------+------+
//! | B    | u8    |   | W    | u16  |   | D    | u32  |   | Q    | u64  |   | X    | u128 |
//! | b    | i8    |   | w    | i16  |   | d    | i32  |   | q    | i64  |   | x    | i128 |
//! | Z    | usize |   | f    | f32  |   | t    | bool |   | s    | &str |   | T    | tail |
//! | z    | isize |   | F    | f64  |   | c    | char |   | h    | &[u8]|   | u    | ctx  |
//! |      |       |   |      |      |   |      |      |   |      |      |   | I    | call |
//! +------+-------+   +------+------+   +------+------+   +------+------+   +------+------+
//!
//! Compound forms: `[e]` vector, `[e;N]` array, `(e e)` tuple, `{k=v}` map,
//! `<name>` a type registered at run time, suffix `?` optional. `v` alone means
//! no parameters (or no result).
//!
//! ## Generated items
//! `COMMANDS`, `table()`, `dispatch()`, `dispatch_with()`, `get_commands()`,
//! `get_datatypes()`, `DESCRIPTOR_HELP`, `NUM_COMMANDS`, `MAX_FUNCTION_NAME_LEN`.

mod descriptor;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream, Parser};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Ident, LitStr, Result, Token};

use dispatch_core::Registration;
use descriptor::{parse_params, parse_return, Desc};

const DESCRIPTOR_HELP: &str = "B:u8    | W:u16  | D:u32 | Q:u64 | X:u128 | Z:usize | F:f64\n\
b:i8    | w:i16  | d:i32 | q:i64 | x:i128 | z:isize | f:f32\n\
c:char  | s:str  | t:bool | h:hex | T:tail | u:context | I:invocation | v:void\n\
[e]:vector | [e;N]:array | (e e):tuple | {k=v}:map | <name>:registered | e?:optional\n";

/// `"<params>" [-> "<result>"] : <path> => "<registration>"`
struct EntrySource {
    params: LitStr,
    returns: Option<LitStr>,
    path: syn::Path,
    registration: LitStr,
}

impl Parse for EntrySource {
    fn parse(input: ParseStream) -> Result<Self> {
        let params = input.parse()?;
        let returns = if input.peek(Token![->]) {
            input.parse::<Token![->]>()?;
            Some(input.parse()?)
        } else {
            None
        };
        input.parse::<Token![:]>()?;
        let path = input.parse()?;
        input.parse::<Token![=>]>()?;
        let registration = input.parse()?;
        Ok(EntrySource { params, returns, path, registration })
    }
}

type EntryList = Punctuated<EntrySource, Token![,]>;

/// Parsed macro input: `mod <ident>;` followed by entries or `path = "<file>"`.
struct CommandMacroInput {
    mod_ident: Ident,
    entries: Vec<EntrySource>,
}

impl Parse for CommandMacroInput {
    fn parse(input: ParseStream) -> Result<Self> {
        input.parse::<Token![mod]>()?;
        let mod_ident: Ident = input.parse()?;
        input.parse::<Token![;]>()?;

        let entries = if input.peek(Ident) && input.peek2(Token![=]) {
            let key: Ident = input.parse()?;
            if key != "path" {
                return Err(syn::Error::new(key.span(), "unexpected identifier, expected `path`"));
            }
            input.parse::<Token![=]>()?;
            let file: LitStr = input.parse()?;
            if input.peek(Token![;]) {
                input.parse::<Token![;]>()?;
            }
            read_entry_file(&file)?
        } else {
            EntryList::parse_terminated(input)?.into_iter().collect()
        };

        Ok(CommandMacroInput { mod_ident, entries })
    }
}

/// Load an entry list from a file relative to the invoking crate.
fn read_entry_file(file: &LitStr) -> Result<Vec<EntrySource>> {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
        .map_err(|_| syn::Error::new(file.span(), "CARGO_MANIFEST_DIR is not set"))?;
    let full_path = std::path::Path::new(&manifest_dir).join(file.value());
    let raw = std::fs::read_to_string(&full_path)
        .map_err(|e| syn::Error::new(file.span(), format!("failed to read {}: {e}", full_path.display())))?;
    let entries = EntryList::parse_terminated
        .parse_str(&raw)
        .map_err(|e| syn::Error::new(file.span(), format!("{}: {e}", full_path.display())))?;
    Ok(entries.into_iter().collect())
}

/// One validated entry.
struct FnEntry {
    name: String,
    spec: String,
    path: syn::Path,
    registration: String,
    params: Vec<Desc>,
    returns: Option<Desc>,
}

fn validate(source: EntrySource) -> Result<FnEntry> {
    let spec = source.params.value();
    let params = parse_params(&spec).map_err(|e| syn::Error::new(source.params.span(), e))?;

    let returns = match &source.returns {
        Some(lit) => parse_return(&lit.value()).map_err(|e| syn::Error::new(lit.span(), e))?,
        None => None,
    };

    let registration = source.registration.value();
    let parsed = Registration::parse(&registration)
        .map_err(|e| syn::Error::new(source.registration.span(), e.to_string()))?;
    let named = params.iter().filter(|p| !p.is_hidden()).count();
    let declared = parsed.params().count();
    if declared > named {
        return Err(syn::Error::new(
            source.registration.span(),
            format!("`{}` declares {declared} parameter names for {named} parameters", parsed.name()),
        ));
    }

    Ok(FnEntry {
        name: parsed.name().to_string(),
        spec,
        path: source.path,
        registration,
        params,
        returns,
    })
}

/// Make a valid identifier for wrapper functions (replace non-ASCII-alnum with `_`).
fn sanitize_ident(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect()
}

/// Signature check and invoker wrapper for one entry.
fn wrapper(pos: usize, e: &FnEntry) -> (Ident, TokenStream2) {
    let wrapper_ident = format_ident!("__call_{}_{}", pos, sanitize_ident(&e.name));
    let path = &e.path;

    let arg_types = e.params.iter().map(|p| p.rust_type(true));
    // a handler without a result descriptor must return `()`
    let ret_type = match &e.returns {
        Some(_) => quote! { _ },
        None => quote! { () },
    };
    let sig_check = quote! {
        const _: fn() = || {
            let _check: fn( #( #arg_types ),* ) -> #ret_type = #path;
            let _ = _check;
        };
    };

    let mut takes: Vec<TokenStream2> = Vec::new();
    let mut args: Vec<TokenStream2> = Vec::new();
    let mut context: Option<Ident> = None;
    for (i, p) in e.params.iter().enumerate() {
        let arg = format_ident!("a{}", i);
        match p {
            Desc::Context => context = Some(arg.clone()),
            Desc::Invocation => takes.push(quote! { let #arg = call.invocation()?; }),
            Desc::Hex => takes.push(quote! { let #arg: ::dispatch_core::HexBytes = call.take(#i)?; }),
            _ => takes.push(quote! { let #arg = call.take(#i)?; }),
        }
        args.push(match p {
            Desc::Hex => quote! { &#arg },
            _ => quote! { #arg },
        });
    }
    // The context borrows `call`, so it is fetched after every owned value.
    if let Some(arg) = &context {
        takes.push(quote! { let #arg = call.context()?; });
    }

    let body = if e.returns.is_some() {
        quote! { Some(::dispatch_core::IntoValue::into_value(#path( #( #args ),* ))) }
    } else {
        quote! {
            #path( #( #args ),* );
            Some(::dispatch_core::Value::Unit)
        }
    };

    let tokens = quote! {
        #sig_check

        /// Wrapper that extracts arguments from the bound call and invokes the handler.
        fn #wrapper_ident<'l>(call: &mut ::dispatch_core::Call<'l, '_>) -> Option<::dispatch_core::Value<'l>> {
            #( #takes )*
            #body
        }
    };
    (wrapper_ident, tokens)
}

/// Generate a command table module from the entry list.
pub fn define_commands_impl(input: TokenStream) -> TokenStream {
    let CommandMacroInput { mod_ident, entries } = parse_macro_input!(input as CommandMacroInput);

    let entries: Vec<FnEntry> = match entries.into_iter().map(validate).collect::<Result<_>>() {
        Ok(entries) => entries,
        Err(e) => return e.to_compile_error().into(),
    };

    let num_commands = entries.len();
    let function_name_max_len = entries.iter().map(|e| e.name.len()).max().unwrap_or(0) + 1;
    let descriptor_help = DESCRIPTOR_HELP;

    let mut wrappers: Vec<TokenStream2> = Vec::new();
    let mut descriptor_inits: Vec<TokenStream2> = Vec::new();
    let mut name_spec_pairs: Vec<TokenStream2> = Vec::new();

    for (pos, e) in entries.iter().enumerate() {
        let (wrapper_ident, tokens) = wrapper(pos, e);
        wrappers.push(tokens);

        let registration = LitStr::new(&e.registration, Span::call_site());
        let tags = e.params.iter().map(|p| LitStr::new(&p.tag(), Span::call_site()));
        let returns = match &e.returns {
            Some(desc) => {
                let tag = LitStr::new(&desc.tag(), Span::call_site());
                quote! { Some(#tag) }
            }
            None => quote! { None },
        };
        descriptor_inits.push(quote! {
            ::dispatch_core::CommandDescriptor::new(#registration, &[ #( #tags ),* ], #returns, &#wrapper_ident)
        });

        let name_lit = LitStr::new(&e.name, Span::call_site());
        let spec_lit = LitStr::new(&e.spec, Span::call_site());
        name_spec_pairs.push(quote! { (#name_lit, #spec_lit) });
    }

    let out = quote! {
        #[allow(dead_code, non_snake_case, unused_imports, unused_variables)]
        pub mod #mod_ident {
            //! Generated by `define_commands!`. See the macro docs for the descriptor table.

            use ::dispatch_core::{CommandDescriptor, CommandTable, OutputReport, Status};

            /// Number of registered commands, overloads counted separately.
            pub const NUM_COMMANDS: usize = #num_commands;

            /// Longest command name plus one.
            pub const MAX_FUNCTION_NAME_LEN: usize = #function_name_max_len;

            pub static DESCRIPTOR_HELP: &str = #descriptor_help;

            #( #wrappers )*

            /// Static command table in registration order.
            pub static COMMANDS: &[CommandDescriptor<'static>] = &[
                #( #descriptor_inits ),*
            ];

            /// Static pairs of (command name, parameter descriptor).
            pub static NAME_AND_SPEC: &[(&'static str, &'static str)] = &[
                #( #name_spec_pairs ),*
            ];

            #[inline(always)]
            pub fn table() -> CommandTable<'static> {
                CommandTable::new(COMMANDS)
            }

            /// Execute `line`, writing the formatted result into `buffer`.
            pub fn dispatch(line: &str, buffer: &mut [u8]) -> Status {
                ::dispatch_core::execute_with_buffer(COMMANDS, line, buffer)
            }

            /// Execute `line` with a caller-held report and an optional user context.
            pub fn dispatch_with(
                line: &str,
                out: &mut OutputReport<'_, 'static>,
                context: Option<&mut dyn ::core::any::Any>,
            ) -> Status {
                ::dispatch_core::execute(COMMANDS, line, out, context)
            }

            /// Return (command name, descriptor) pairs. No allocations.
            #[inline(always)]
            pub fn get_commands() -> &'static [(&'static str, &'static str)] {
                NAME_AND_SPEC
            }

            /// Return descriptor help string (character to type mapping).
            #[inline(always)]
            pub fn get_datatypes() -> &'static str {
                DESCRIPTOR_HELP
            }
        }
    };

    out.into()
}
