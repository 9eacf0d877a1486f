//! Parsing of Apple-style crash report text.
//!
//! A report is treated as plain text throughout. This module extracts the
//! process header fields, enumerates stack-frame lines that still carry a raw
//! hex address in their trailing column, and looks up per-binary load
//! addresses in the `Binary Images:` listing. Nothing here mutates the
//! report; patching happens in [`crate::patcher`].

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Header line of the form `Process: MyApp [1234]`.
static PROCESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Process:[ \t]+(?P<name>.+?)[ \t]*\[").unwrap());

/// Header line of the form `Identifier: com.example.MyApp`.
static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Identifier:[ \t]+(?P<identifier>\S+)").unwrap());

/// Header line of the form `Version: 1.0 (42)`.
static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^Version:[ \t]+(?P<version>\S+)[ \t]+\((?P<build>[^()\s]+)\)").unwrap()
});

/// Header line of the form `Code Type: X86-64 (Native)`.
static CODE_TYPE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Code Type:[ \t]+(?P<code_type>\S+)").unwrap());

/// A stack-frame line: index, binary name, frame address, trailing column.
///
/// The binary name may contain internal whitespace, so it is matched
/// non-greedily up to the first hex address token.
static FRAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*\d+[ \t]+(?P<binary>\S.*?)[ \t]+(?P<addr>0x[0-9a-fA-F]+)[ \t]+(?P<symbol>\S.*)$")
        .unwrap()
});

/// Marker character used by the crash reporter for unidentifiable binaries.
const AMBIGUOUS_BINARY_MARKER: char = '?';

/// An error extracting mandatory metadata from a crash report.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    /// One of the mandatory header fields is absent.
    #[error("crash report is missing the `{0}:` header field")]
    MissingField(&'static str),
}

/// Process metadata extracted from a crash report header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessInfo {
    /// The process name, without the bracketed pid.
    pub name: String,
    /// The bundle identifier.
    pub identifier: String,
    /// The short version string.
    pub version: String,
    /// The build number.
    pub build: String,
    /// The architecture as reported, e.g. `X86-64`.
    pub code_type: String,
}

impl ProcessInfo {
    /// Extracts process metadata from report text.
    ///
    /// All four header fields are mandatory. If any one is absent this fails
    /// with [`ReportError::MissingField`] naming the field, and no partial
    /// result is returned.
    pub fn parse(report: &str) -> Result<Self, ReportError> {
        let name = capture(&PROCESS_REGEX, "name", report)
            .ok_or(ReportError::MissingField("Process"))?;
        let identifier = capture(&IDENTIFIER_REGEX, "identifier", report)
            .ok_or(ReportError::MissingField("Identifier"))?;
        let version_captures = VERSION_REGEX
            .captures(report)
            .ok_or(ReportError::MissingField("Version"))?;
        let code_type = capture(&CODE_TYPE_REGEX, "code_type", report)
            .ok_or(ReportError::MissingField("Code Type"))?;

        let info = ProcessInfo {
            name,
            identifier,
            version: version_captures["version"].to_owned(),
            build: version_captures["build"].to_owned(),
            code_type,
        };

        tracing::info!(
            name = %info.name,
            identifier = %info.identifier,
            version = %info.version,
            build = %info.build,
            code_type = %info.code_type,
            "detected crashed process"
        );

        Ok(info)
    }

    /// The architecture in the form the resolver tool expects.
    ///
    /// Lowercased, with `-` replaced by `_`: `X86-64` becomes `x86_64`.
    pub fn normalized_arch(&self) -> String {
        self.code_type.to_lowercase().replace('-', "_")
    }
}

fn capture(regex: &Regex, group: &str, report: &str) -> Option<String> {
    regex
        .captures(report)
        .and_then(|captures| captures.name(group))
        .map(|m| m.as_str().to_owned())
}

/// A stack-frame line whose trailing column is still a raw address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameCandidate {
    /// The raw line text exactly as matched.
    pub line: String,
    /// The binary name, trimmed.
    pub binary: String,
    /// The frame address, including the `0x` prefix.
    pub address: String,
    /// Byte offset of the trailing column within [`line`](Self::line).
    pub symbol_column: usize,
}

/// Scans report text for frame lines that have not been symbolicated yet.
///
/// A frame line is selected only if its trailing column starts with `0x`,
/// i.e. the crash reporter emitted a raw `<load address> + <offset>` pair
/// instead of a symbol name. Candidates are returned in the order they
/// appear in the report.
pub fn select_unresolved_frames(report: &str) -> Vec<FrameCandidate> {
    FRAME_REGEX
        .captures_iter(report)
        .filter_map(|captures| {
            let symbol = captures.name("symbol")?;
            if !symbol.as_str().starts_with("0x") {
                return None;
            }
            let matched = captures.get(0)?;
            Some(FrameCandidate {
                line: matched.as_str().to_owned(),
                binary: captures.name("binary")?.as_str().trim().to_owned(),
                address: captures.name("addr")?.as_str().to_owned(),
                symbol_column: symbol.start() - matched.start(),
            })
        })
        .collect()
}

/// Finds the load address of `binary` in the report's image listing.
///
/// Image lines have the shape `<low> - <high> +MyApp (...) <uuid> /path`,
/// where the `+` prefix is optional. The binary name is matched literally;
/// names containing the crash reporter's `?` placeholder cannot be looked
/// up and immediately resolve to `None`.
pub fn find_image_base(report: &str, binary: &str) -> Option<String> {
    if binary.contains(AMBIGUOUS_BINARY_MARKER) {
        tracing::debug!(binary, "binary name is ambiguous, skipping image lookup");
        return None;
    }

    let pattern = format!(
        r"(?m)^[ \t]*(?P<base>0x[0-9a-fA-F]+)[ \t]*-[ \t]*0x[0-9a-fA-F]+[ \t]+\+?{}(?:[ \t]|$)",
        regex::escape(binary)
    );
    let regex = Regex::new(&pattern).ok()?;

    match regex.captures(report) {
        Some(captures) => Some(captures["base"].to_owned()),
        None => {
            tracing::warn!(binary, "no entry in the binary image list");
            None
        }
    }
}
