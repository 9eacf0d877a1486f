//! Crashsym.
//!
//! Crashsym symbolicates textual Apple crash reports: it resolves the raw
//! addresses left in stack-frame lines into function names, using locally
//! stored debug symbols and an external address-to-symbol tool such as
//! `atos`. The symbolicated report is written to stdout; diagnostics and a
//! resolution summary go to stderr.

#![warn(
    missing_docs,
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

use console::style;

mod cli;
mod logging;
mod settings;

fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            eprintln!("{}: {}", style("error").red().bold(), error);
            for cause in error.chain().skip(1) {
                eprintln!("{}", style(format!("  caused by {cause}")).dim());
            }
            std::process::exit(1);
        }
    }
}
