//! Helpers for testing the symbolication pipeline.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`tempdir`], make sure that the handle to the temp directory is held for the
//!    entire lifetime of the test. When dropped too early, scripts and symbol stores created
//!    inside it disappear while the pipeline still refers to them. To avoid this, assign it to
//!    a variable in the test function (e.g. `let store_dir = tempdir()`).
//!
//!  - The resolver fakes are shell scripts and only work on Unix. Gate tests that spawn them
//!    with `#[cfg(unix)]`.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use tempfile::TempDir;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `crashsym_service` crate and
///    mutes all other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("crashsym_service=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Runs `f` with a subscriber that records every event and returns the log output.
///
/// The subscriber is installed only for the current thread, so this composes with the global
/// one installed by [`setup`] and with other tests running in parallel. Use it to assert that
/// a code path emits a particular diagnostic.
pub fn capture_logs(f: impl FnOnce()) -> String {
    let buffer: Arc<Mutex<Vec<u8>>> = Arc::default();
    let writer = buffer.clone();
    let subscriber = fmt()
        .with_max_level(tracing::level_filters::LevelFilter::TRACE)
        .with_target(false)
        .with_ansi(false)
        .with_writer(move || BufferWriter(writer.clone()))
        .finish();

    tracing::subscriber::with_default(subscriber, f);

    let buffer = buffer.lock().unwrap();
    String::from_utf8_lossy(&buffer).into_owned()
}

struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Creates a temporary directory.
///
/// The directory is deleted when the [`TempDir`] instance is dropped, unless
/// [`keep`](TempDir::keep) is called. Use it as a guard to automatically clean up after tests.
pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}

/// Returns the absolute path to the given fixture.
///
/// Fixtures are located in the `tests/fixtures` directory, located from the workspace root.
/// Fixtures can be either files, or directories.
///
/// # Panics
///
/// Panics if the fixture path does not exist on the file system.
pub fn fixture(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let mut full_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    full_path.pop(); // to /crates/
    full_path.pop(); // to /
    full_path.push("./tests/fixtures/");
    full_path.push(path);

    assert!(full_path.exists(), "'{}' does not exist", path.display());

    full_path
}

/// Returns the contents of a UTF-8 fixture.
///
/// Fixtures are located in the `tests/fixtures` directory, located from the workspace root. The
/// fixture must be a readable text file.
///
/// # Panics
///
/// Panics if the fixture does not exist or cannot be read.
pub fn read_fixture(path: impl AsRef<Path>) -> String {
    std::fs::read_to_string(fixture(path)).unwrap()
}

/// Writes an executable shell script that stands in for the symbolication tool.
///
/// The script receives the real resolver command line, i.e. `-arch <arch> -o <file>
/// -l <base>` followed by the frame addresses. `body` runs with those arguments; prepend
/// `shift 6` to iterate over just the addresses.
#[cfg(unix)]
pub fn fake_resolver(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();

    let mut permissions = std::fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).unwrap();

    path
}

/// A resolver fake that answers every address.
///
/// Each output line is `<bundle>_sym <address>`, where `<bundle>` is the basename of the
/// symbol file passed via `-o`. Tests can thus check both that an address went to the right
/// binary and that output lines line up with frames.
#[cfg(unix)]
pub fn echo_resolver(dir: &Path) -> PathBuf {
    fake_resolver(
        dir,
        "echo-resolver",
        r#"bundle=$(basename "$4" .dSYM)
shift 6
for addr in "$@"; do
    printf '%s_sym %s\n' "$bundle" "$addr"
done"#,
    )
}

/// A resolver fake that prints to stderr and exits with a non-zero status.
#[cfg(unix)]
pub fn failing_resolver(dir: &Path) -> PathBuf {
    fake_resolver(
        dir,
        "failing-resolver",
        r#"echo "unsupported architecture" >&2
exit 1"#,
    )
}

/// A resolver fake that never answers within any reasonable test timeout.
#[cfg(unix)]
pub fn hanging_resolver(dir: &Path) -> PathBuf {
    fake_resolver(dir, "hanging-resolver", "sleep 30")
}
