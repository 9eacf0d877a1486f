//! Invocation of the external address-to-symbol tool.
//!
//! The tool is expected to behave like `atos`: given an architecture, a
//! debug-symbol artifact, a load address and a list of frame addresses, it
//! prints one resolved symbol per address on stdout, in request order. All
//! addresses sharing a binary are resolved in a single invocation.

use std::ffi::OsString;
use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::Config;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An error from a single resolver invocation.
///
/// These are local failures: the engine records them for the affected
/// addresses and moves on to the next binary.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The resolver executable could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        /// The configured resolver program.
        program: String,
        #[source]
        source: io::Error,
    },
    /// Waiting for the resolver process failed.
    #[error("failed to wait for the resolver process")]
    Wait(#[source] io::Error),
    /// The resolver did not finish within the configured timeout.
    #[error("resolver timed out after {0:?}")]
    TimedOut(Duration),
    /// The resolver exited with a nonzero status.
    #[error("resolver exited with {0}")]
    Exit(ExitStatus),
    /// The resolver printed something that is not UTF-8 text.
    #[error("resolver produced non-UTF-8 output")]
    MalformedOutput,
}

/// Runs the configured resolver tool synchronously.
#[derive(Clone, Debug)]
pub struct SymbolResolver {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl SymbolResolver {
    /// Creates a resolver invoking the tool configured in `config`.
    pub fn new(config: &Config) -> Self {
        SymbolResolver {
            program: config.resolver.clone(),
            timeout: config.resolver_timeout,
        }
    }

    /// Resolves `addresses` against one binary's debug-symbol artifact.
    ///
    /// The returned list is aligned positionally with `addresses`. An empty
    /// output line, or a missing one when the tool prints fewer lines than
    /// requested, yields `None` for that address.
    pub fn resolve(
        &self,
        arch: &str,
        symbol_file: &Path,
        load_address: &str,
        addresses: &[String],
    ) -> Result<Vec<Option<String>>, ResolverError> {
        let mut args: Vec<OsString> = vec![
            "-arch".into(),
            arch.into(),
            "-o".into(),
            symbol_file.into(),
            "-l".into(),
            load_address.into(),
        ];
        args.extend(addresses.iter().map(OsString::from));

        tracing::debug!("running {}", format_command(&self.program, &args));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ResolverError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Drain both pipes on their own threads so a chatty tool cannot
        // deadlock against a full pipe buffer while we wait on it.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_reader = std::thread::spawn(move || read_pipe(stdout_pipe));
        let stderr_reader = std::thread::spawn(move || read_pipe(stderr_pipe));

        let status = self.wait(&mut child);

        // Surface stderr on every outcome, including a killed or timed-out
        // child; that is where the tool explains what went wrong.
        let stderr = stderr_reader.join().unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr);
        if !stderr.trim().is_empty() {
            tracing::warn!(program = %self.program.display(), "resolver stderr: {}", stderr.trim_end());
        }

        let status = status?;
        if !status.success() {
            return Err(ResolverError::Exit(status));
        }

        let stdout = stdout_reader.join().unwrap_or_default();
        let stdout = String::from_utf8(stdout).map_err(|_| ResolverError::MalformedOutput)?;

        let symbols = align_output(&stdout, addresses.len());
        tracing::debug!(
            requested = addresses.len(),
            resolved = symbols.iter().filter(|symbol| symbol.is_some()).count(),
            "resolver batch finished"
        );
        Ok(symbols)
    }

    /// Waits for the child, killing it when the timeout expires.
    ///
    /// In every outcome the child has exited afterwards, so its pipe ends are
    /// closed and the output reader threads can be joined without blocking.
    fn wait(&self, child: &mut Child) -> Result<ExitStatus, ResolverError> {
        let result = match self.timeout {
            None => child.wait().map_err(ResolverError::Wait),
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break Ok(status),
                        Ok(None) if Instant::now() >= deadline => {
                            break Err(ResolverError::TimedOut(limit));
                        }
                        Ok(None) => std::thread::sleep(POLL_INTERVAL),
                        Err(source) => break Err(ResolverError::Wait(source)),
                    }
                }
            }
        };

        if result.is_err() {
            child.kill().ok();
            child.wait().ok();
        }

        result
    }
}

fn read_pipe(pipe: Option<impl Read>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).ok();
    }
    buf
}

/// Maps output lines back onto the requested addresses.
fn align_output(stdout: &str, requested: usize) -> Vec<Option<String>> {
    let mut lines = stdout.lines();
    (0..requested)
        .map(|_| match lines.next() {
            Some(line) if !line.trim().is_empty() => Some(line.trim().to_owned()),
            _ => None,
        })
        .collect()
}

/// Renders the command line the way a shell user would type it.
fn format_command(program: &Path, args: &[OsString]) -> String {
    let mut rendered = quote_argument(&program.to_string_lossy());
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&quote_argument(&arg.to_string_lossy()));
    }
    rendered
}

fn quote_argument(arg: &str) -> String {
    if arg.chars().any(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_owned()
    }
}
