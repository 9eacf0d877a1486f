//! Configuration for the symbolication pipeline.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Pipeline configuration.
///
/// All fields have defaults, so `Config::default()` yields a working setup
/// for a machine that has `atos` on its `PATH`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The address-to-symbol tool to invoke.
    ///
    /// Anything with an `atos`-compatible command line works here.
    pub resolver: PathBuf,

    /// How long a single resolver invocation may run before it is killed.
    ///
    /// `None` disables the limit.
    #[serde(with = "humantime_serde")]
    pub resolver_timeout: Option<Duration>,

    /// Overrides the architecture detected from the report's `Code Type:`.
    ///
    /// Passed to the resolver verbatim.
    pub arch: Option<String>,

    /// Resolve distinct binaries on a rayon pool instead of sequentially.
    ///
    /// The output is identical either way; frames are patched in report
    /// order regardless of which resolver invocation finishes first.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            resolver: PathBuf::from("atos"),
            resolver_timeout: Some(Duration::from_secs(30)),
            arch: None,
            parallel: false,
        }
    }
}
