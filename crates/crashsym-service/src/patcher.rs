//! Writing resolved symbols back into the report text.

use crate::symbolicate::FrameResolution;

/// Applies per-frame resolutions to the report, in report order.
///
/// For every resolved frame the raw line is rewritten as its text up to the
/// trailing column plus the resolved symbol, and the first remaining
/// occurrence of the original line is replaced with that. Replacing one
/// occurrence at a time means reports with textually identical frame lines
/// (recursive calls) have each occurrence patched independently.
///
/// Frames without a symbol are left untouched; everything that is not a
/// patched line survives byte for byte.
pub fn apply_resolutions(report: &str, resolutions: &[FrameResolution]) -> String {
    let mut patched = report.to_owned();

    for resolution in resolutions {
        let candidate = &resolution.candidate;
        match resolution.outcome.symbol() {
            Some(symbol) => {
                let replacement =
                    format!("{}{}", &candidate.line[..candidate.symbol_column], symbol);
                patched = patched.replacen(candidate.line.as_str(), &replacement, 1);
            }
            None => {
                tracing::warn!(
                    binary = %candidate.binary,
                    address = %candidate.address,
                    "frame not symbolicated: {}",
                    resolution.outcome.describe()
                );
            }
        }
    }

    patched
}
