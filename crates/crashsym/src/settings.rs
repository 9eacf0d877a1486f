//! Settings parsed from the command line and the configuration files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crashsym_service::config::Config;
use serde::Deserialize;

/// The name of the configuration file.
pub const CONFIG_RC_FILE_NAME: &str = ".crashsymrc";

/// Symbolicates textual Apple crash reports.
///
/// The report is read from FILE and the symbolicated version is written to
/// stdout; diagnostics and a resolution summary go to stderr. Debug symbols
/// are looked up by binary name in the configured symbol directories,
/// preferring paths that mention the crashed process's version and build.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    /// The crash report to symbolicate.
    #[arg(value_name = "FILE")]
    pub report: PathBuf,

    /// A directory containing debug symbols. Can be passed multiple times.
    ///
    /// Directories are scanned recursively for `<binary>.dSYM` entries;
    /// directories given on the command line take precedence over those
    /// from `.crashsymrc`.
    #[arg(long = "symbols", short = 's', value_name = "PATH")]
    pub symbols: Vec<PathBuf>,

    /// Rewrite the report file in place instead of printing to stdout.
    #[arg(long)]
    pub in_place: bool,

    /// The address-to-symbol tool to invoke.
    ///
    /// Defaults to `atos`, resolved via `PATH`.
    #[arg(long, value_name = "PROGRAM")]
    pub resolver: Option<PathBuf>,

    /// Timeout for a single resolver invocation, e.g. `30s` or `2m`.
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub resolver_timeout: Option<Duration>,

    /// The architecture passed to the resolver.
    ///
    /// Defaults to the report's `Code Type`, lowercased and with `-`
    /// replaced by `_` (e.g. `X86-64` becomes `x86_64`).
    #[arg(long, value_name = "ARCH")]
    pub arch: Option<String>,

    /// Resolve distinct binaries in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Echo every resolver command line and all per-frame diagnostics.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    pub symbols: Vec<PathBuf>,
    pub resolver: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub resolver_timeout: Option<Duration>,
    pub arch: Option<String>,
    pub parallel: Option<bool>,
}

impl ConfigFile {
    pub fn parse(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(buf) => toml::from_str(&buf).context("Could not parse configuration file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Configuration file not found");
                Ok(Self::default())
            }
            Err(e) => Err(e).context(format!(
                "Could not read configuration file at {}",
                path.display()
            )),
        }
    }
}

/// The fully merged invocation settings.
#[derive(Clone, Debug)]
pub struct Settings {
    /// The crash report file.
    pub report: PathBuf,
    /// Rewrite the report file instead of printing to stdout.
    pub in_place: bool,
    /// Symbol store roots, in precedence order.
    pub symbol_dirs: Vec<PathBuf>,
    /// The assembled pipeline configuration.
    pub service_config: Config,
    /// Verbose diagnostics requested.
    pub verbose: bool,
}

impl Settings {
    /// Parses the command line and merges it with the configuration files.
    ///
    /// Command-line arguments win over the project `.crashsymrc` (or
    /// `crashsym.toml`), which wins over `~/.crashsymrc`. Logging is
    /// initialized right after the command line is parsed, before the rc
    /// files are read, so their diagnostics are not lost.
    pub fn get() -> Result<Self> {
        let cli = Cli::parse();
        crate::logging::init_logging(cli.verbose);

        let global_config_path = find_global_config_file()?;
        let global_config_file = ConfigFile::parse(&global_config_path)?;
        let project_config_file = match find_project_config_file() {
            Some(path) if path != global_config_path => ConfigFile::parse(&path)?,
            _ => ConfigFile::default(),
        };

        Ok(Self::merge(cli, project_config_file, global_config_file))
    }

    fn merge(cli: Cli, mut project: ConfigFile, mut global: ConfigFile) -> Self {
        let mut symbol_dirs = cli.symbols;
        symbol_dirs.append(&mut project.symbols);
        symbol_dirs.append(&mut global.symbols);

        let defaults = Config::default();
        let service_config = Config {
            resolver: cli
                .resolver
                .or_else(|| project.resolver.take())
                .or_else(|| global.resolver.take())
                .unwrap_or(defaults.resolver),
            resolver_timeout: cli
                .resolver_timeout
                .or(project.resolver_timeout)
                .or(global.resolver_timeout)
                .or(defaults.resolver_timeout),
            arch: cli
                .arch
                .or_else(|| project.arch.take())
                .or_else(|| global.arch.take()),
            parallel: cli.parallel
                || project
                    .parallel
                    .or(global.parallel)
                    .unwrap_or(defaults.parallel),
        };

        Settings {
            report: cli.report,
            in_place: cli.in_place,
            symbol_dirs,
            service_config,
            verbose: cli.verbose,
        }
    }
}

fn find_global_config_file() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home dir"))
        .map(|mut path| {
            path.push(CONFIG_RC_FILE_NAME);
            path
        })
}

fn find_project_config_file() -> Option<PathBuf> {
    std::env::current_dir().ok().and_then(|mut path| {
        loop {
            path.push(CONFIG_RC_FILE_NAME);
            if path.exists() {
                return Some(path);
            }
            path.set_file_name("crashsym.toml");
            if path.exists() {
                return Some(path);
            }
            path.pop();
            if !path.pop() {
                return None;
            }
        }
    })
}
