//! Locating debug-symbol artifacts for the binaries named in a report.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// How deep [`DirectorySymbolStore`] descends into a store root.
const MAX_SCAN_DEPTH: usize = 6;

/// Maps a binary to its debug-symbol artifact.
///
/// The symbolication engine calls [`locate`](Self::locate) at most once per
/// distinct binary per run and treats `None` as a local failure for all
/// frames referencing that binary.
pub trait SymbolProvider {
    /// Returns the artifact path for `binary` at the given version, if any.
    ///
    /// The returned path is handed to the resolver tool as its `-o`
    /// argument, so it may point at a dSYM bundle directory or at a plain
    /// DWARF file.
    fn locate(&self, binary: &str, version: &str, build: &str) -> Option<PathBuf>;
}

impl<F> SymbolProvider for F
where
    F: Fn(&str, &str, &str) -> Option<PathBuf>,
{
    fn locate(&self, binary: &str, version: &str, build: &str) -> Option<PathBuf> {
        self(binary, version, build)
    }
}

/// A [`SymbolProvider`] backed by one or more on-disk store directories.
///
/// `locate` walks each root looking for entries named `<binary>.dSYM`. An
/// entry whose path below the root mentions both the requested version and
/// build wins over a bare name match, which lets a store keep artifacts for
/// several releases side by side, e.g.
/// `store/MyApp 1.0 (42)/MyApp.dSYM`.
#[derive(Clone, Debug)]
pub struct DirectorySymbolStore {
    roots: Vec<PathBuf>,
}

impl DirectorySymbolStore {
    /// Creates a store over `roots`, searched in order.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        DirectorySymbolStore { roots }
    }
}

impl SymbolProvider for DirectorySymbolStore {
    fn locate(&self, binary: &str, version: &str, build: &str) -> Option<PathBuf> {
        let wanted = format!("{binary}.dSYM");
        let mut fallback = None;

        for root in &self.roots {
            let mut walker = WalkDir::new(root).max_depth(MAX_SCAN_DEPTH).into_iter();
            while let Some(entry) = walker.next() {
                let Ok(entry) = entry else { continue };
                if entry.file_name().to_str() != Some(wanted.as_str()) {
                    continue;
                }
                // A dSYM bundle is itself a directory; its contents cannot
                // contain another store entry.
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }

                let path = entry.into_path();
                let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                if mentions(&relative, version) && mentions(&relative, build) {
                    tracing::debug!(binary, path = %path.display(), "located debug symbols");
                    return Some(path);
                }
                fallback.get_or_insert(path);
            }
        }

        match &fallback {
            Some(path) => {
                tracing::debug!(binary, path = %path.display(), "located debug symbols by name only");
            }
            None => {
                tracing::debug!(binary, version, build, "no debug symbols in any store root");
            }
        }
        fallback
    }
}

fn mentions(path: &Path, needle: &str) -> bool {
    path.to_string_lossy().contains(needle)
}
