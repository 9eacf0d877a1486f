//! Exposes the command line application.
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use tempfile::NamedTempFile;

use crashsym_service::symbolicate::{SymbolicationStats, Symbolicator};
use crashsym_service::symbols::DirectorySymbolStore;

use crate::settings::Settings;

/// Runs the main application.
pub fn execute() -> Result<()> {
    let settings = Settings::get()?;

    if settings.symbol_dirs.is_empty() {
        tracing::warn!("no symbol directories configured, every symbol lookup will fail");
    }

    let report = fs::read_to_string(&settings.report)
        .with_context(|| format!("failed to read crash report {}", settings.report.display()))?;

    let provider = DirectorySymbolStore::new(settings.symbol_dirs);
    let symbolicator = Symbolicator::new(settings.service_config, provider);
    let response = symbolicator
        .process_report(&report)
        .context("failed to symbolicate crash report")?;

    if settings.in_place {
        replace_file(&settings.report, response.report.as_bytes())
            .with_context(|| format!("failed to write {}", settings.report.display()))?;
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(response.report.as_bytes())?;
        stdout.flush()?;
    }

    print_summary(&response.stats);

    Ok(())
}

/// Replaces the contents of `path` without a window of partial content.
///
/// The report is the user's input file, so a failed in-place write must not
/// leave it truncated. The new contents go to a temporary file in the same
/// directory, which is renamed over the original once fully written.
fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.persist(path)?;
    Ok(())
}

fn print_summary(stats: &SymbolicationStats) {
    eprintln!();
    eprintln!(
        "Symbolicated {} of {} frames",
        style(stats.frames_resolved).yellow().bold(),
        style(stats.frames_selected).bold(),
    );

    for (count, reason) in [
        (stats.frames_no_symbol, "returned no symbol"),
        (stats.frames_missing_base, "had no base address"),
        (stats.frames_missing_symbols, "had no debug symbols"),
        (stats.frames_failed, "hit resolver failures"),
    ] {
        if count > 0 {
            eprintln!("{}", style(format!("  {count} frames {reason}")).dim());
        }
    }
}
