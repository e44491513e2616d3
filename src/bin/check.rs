//! Command-declaration checker.
//!
//! Compiles a DSL file against the builtin type registry, an empty host,
//! and an empty variable table, then prints either the compiled tree
//! outline or every diagnostic rendered against the source. Chains cannot
//! resolve without a real host, so this checks grammar, types, and scope
//! rather than host wiring.
//!
//! ```bash
//! cmdtree-check command.cmd
//! cmdtree-check --json command.cmd   # diagnostics as JSON
//! ```

use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};

use cmdtree::{compile_source, default_registry, CapabilityTable, CompileContext};

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let json = if let Some(pos) = args.iter().position(|a| a == "--json") {
        args.remove(pos);
        true
    } else {
        false
    };
    let [path] = args.as_slice() else {
        eprintln!("Usage: cmdtree-check [--json] <dsl-file>");
        return Ok(false);
    };

    let source =
        fs::read_to_string(path).with_context(|| format!("reading '{}'", path))?;

    let ctx = CompileContext::new().with_host(CapabilityTable::empty("Host"));
    match compile_source(&source, &ctx, default_registry()) {
        Ok(tree) => {
            print!("{}", tree.outline());
            Ok(true)
        }
        Err(err) if json => {
            println!("{}", serde_json::to_string_pretty(err.diagnostics())?);
            Ok(false)
        }
        Err(err) => {
            eprint!("{}", err.render(&source));
            eprintln!("{}", err);
            Ok(false)
        }
    }
}
