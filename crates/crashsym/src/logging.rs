//! Diagnostic output on stderr.

use std::env;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;

fn get_rust_log(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "",
        LevelFilter::ERROR => "ERROR",
        LevelFilter::WARN => "WARN",
        LevelFilter::INFO => "INFO",
        LevelFilter::DEBUG => {
            "INFO,\
             crashsym=DEBUG,\
             crashsym_service=DEBUG"
        }
        LevelFilter::TRACE => {
            "INFO,\
             crashsym=TRACE,\
             crashsym_service=TRACE"
        }
    }
}

/// Initializes logging on stderr.
///
/// Verbose runs use the pretty format, which separates records with blank lines and echoes
/// every resolver command line before it is spawned. Other runs use a compact single-line
/// format at info level. The `RUST_LOG` environment variable overrides the level derived
/// from the command line.
///
/// Logs always go to stderr, since stdout carries the symbolicated report.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| get_rust_log(level).to_string());

    let fmt_layer = {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(UtcTime::rfc_3339())
            .with_target(true);

        match (verbose, console::user_attended_stderr()) {
            (true, _) => layer.pretty().boxed(),
            (false, true) => layer.compact().boxed(),
            (false, false) => layer.compact().with_ansi(false).boxed(),
        }
    }
    .with_filter(EnvFilter::new(&rust_log));

    tracing_subscriber::registry().with(fmt_layer).init();
}
