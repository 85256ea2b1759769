use std::io::{self, BufRead, Write};

use dispatch_core::config::{INPUT_MAX_LEN, PROMPT, RESULT_BUFFER_LEN};
use dispatch_core::{OutputReport, Status, TypeRegistry};
use dispatch_macros::define_commands;
use log::{error, info, warn};

define_commands! {
    mod commands;
    path = "../usercode/src/commands.cfg"
}

fn main() -> io::Result<()> {
    env_logger::init();

    let mut registry = TypeRegistry::with_builtins();
    let installed = usercode::register_types(&mut registry).and_then(|()| registry.install());
    let registry = match installed {
        Ok(registry) => registry,
        Err(e) => {
            error!("type registry setup failed: {e}");
            return Ok(());
        }
    };
    info!("{} types registered", registry.names().count());

    let table = commands::table();
    if let Err(e) = table.validate(registry) {
        error!("command table rejected: {e}");
        return Ok(());
    }
    let shadowed = table.lint();
    if shadowed > 0 {
        warn!("{shadowed} overload(s) can never be selected");
    }

    println!("Items:{}", commands::NUM_COMMANDS);
    print!("\n❗Type '#q' to exit, '##' to list the commands❗\n");

    let mut buffer = [0u8; RESULT_BUFFER_LEN];
    let mut out = OutputReport::new(&mut buffer);
    let mut calls: u32 = 0;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{PROMPT}");
        io::stdout().flush()?;

        let input = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let input = input.trim();

        match input {
            "" => continue,
            "#q" => break,
            "##" => {
                print!("{}", table.help());
                print!("\n{}", commands::get_datatypes());
                continue;
            }
            _ if input.len() > INPUT_MAX_LEN => {
                warn!("line longer than {INPUT_MAX_LEN} bytes ignored");
                continue;
            }
            _ => {}
        }

        calls += 1;
        match commands::dispatch_with(input, &mut out, Some(&mut calls)) {
            Status::Success => match out.result() {
                Some(result) if !result.is_empty() => println!("✅ Success: {result}"),
                _ if out.result_error => println!("✅ Success: result does not fit in {RESULT_BUFFER_LEN} bytes"),
                _ => println!("✅ Success: {input}"),
            },
            status => println!(
                "❌ Error: {status} (argument mask {:#b}) for line '{input}'",
                out.arg_error_mask
            ),
        }
    }

    println!("⛔ Shell exited...");
    Ok(())
}
