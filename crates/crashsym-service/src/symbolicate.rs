//! The symbolication engine.
//!
//! [`Symbolicator`] owns no state beyond its configuration and the injected
//! [`SymbolProvider`], so one instance can process any number of reports.
//! Each run parses the header, selects unresolved frames, resolves them one
//! binary at a time and patches the results back into the text.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::config::Config;
use crate::patcher;
use crate::report::{self, FrameCandidate, ProcessInfo, ReportError};
use crate::resolver::SymbolResolver;
use crate::symbols::SymbolProvider;

/// The outcome of resolving one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The resolver produced a symbol for this frame.
    Resolved(String),
    /// The resolver ran but returned nothing for this address.
    NoSymbol,
    /// The binary has no entry in the report's image listing.
    MissingBaseAddress,
    /// The symbol provider has no artifact for the binary.
    MissingDebugSymbols,
    /// The resolver invocation for the binary failed.
    ResolverFailed,
}

impl FrameOutcome {
    /// The symbol to patch into the report, if there is one.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            FrameOutcome::Resolved(symbol) if !symbol.is_empty() => Some(symbol),
            _ => None,
        }
    }

    /// A short reason for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            FrameOutcome::Resolved(_) => "resolved",
            FrameOutcome::NoSymbol => "resolver returned no symbol",
            FrameOutcome::MissingBaseAddress => "no base address in the binary image list",
            FrameOutcome::MissingDebugSymbols => "no debug symbols located",
            FrameOutcome::ResolverFailed => "resolver invocation failed",
        }
    }
}

/// A selected frame together with its resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameResolution {
    /// The frame as selected from the report.
    pub candidate: FrameCandidate,
    /// What resolving it produced.
    pub outcome: FrameOutcome,
}

/// Aggregate counters for one run.
///
/// Every selected frame is counted in exactly one of the non-`selected`
/// fields, so consumers can detect systemically bad runs (a store that is
/// missing everything, a broken resolver install) without parsing
/// diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SymbolicationStats {
    /// Frames with an unresolved trailing column.
    pub frames_selected: usize,
    /// Frames patched with a resolved symbol.
    pub frames_resolved: usize,
    /// Frames the resolver returned no symbol for.
    pub frames_no_symbol: usize,
    /// Frames whose binary has no base address in the report.
    pub frames_missing_base: usize,
    /// Frames whose binary has no debug-symbol artifact.
    pub frames_missing_symbols: usize,
    /// Frames lost to failed resolver invocations.
    pub frames_failed: usize,
}

impl SymbolicationStats {
    fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Resolved(symbol) if !symbol.is_empty() => self.frames_resolved += 1,
            FrameOutcome::Resolved(_) | FrameOutcome::NoSymbol => self.frames_no_symbol += 1,
            FrameOutcome::MissingBaseAddress => self.frames_missing_base += 1,
            FrameOutcome::MissingDebugSymbols => self.frames_missing_symbols += 1,
            FrameOutcome::ResolverFailed => self.frames_failed += 1,
        }
    }
}

/// The result of one pipeline run.
#[derive(Clone, Debug)]
pub struct SymbolicationResponse {
    /// The report text with resolved frames patched in.
    pub report: String,
    /// The process metadata extracted from the header.
    pub process: ProcessInfo,
    /// Counters for this run.
    pub stats: SymbolicationStats,
}

/// One resolver invocation: all selected frames of a single binary.
#[derive(Debug)]
struct BinaryBatch {
    binary: String,
    indexes: Vec<usize>,
    addresses: Vec<String>,
}

/// The symbolication engine.
pub struct Symbolicator<P> {
    config: Config,
    resolver: SymbolResolver,
    provider: P,
}

impl<P> Symbolicator<P>
where
    P: SymbolProvider + Sync,
{
    /// Creates an engine with the given configuration and symbol provider.
    pub fn new(config: Config, provider: P) -> Self {
        let resolver = SymbolResolver::new(&config);
        Symbolicator {
            config,
            resolver,
            provider,
        }
    }

    /// Runs the full pipeline over one report.
    ///
    /// The only fatal error is a header with a missing mandatory field; any
    /// failure local to a binary or frame is recorded in the stats and the
    /// affected lines are passed through unchanged.
    #[tracing::instrument(skip_all)]
    pub fn process_report(&self, report: &str) -> Result<SymbolicationResponse, ReportError> {
        let process = ProcessInfo::parse(report)?;
        let arch = match &self.config.arch {
            Some(arch) => arch.clone(),
            None => process.normalized_arch(),
        };

        let candidates = report::select_unresolved_frames(report);
        tracing::debug!(frames = candidates.len(), "selected unresolved frames");

        let batches = group_by_binary(&candidates);
        let batch_outcomes: Vec<Vec<FrameOutcome>> = if self.config.parallel {
            batches
                .par_iter()
                .map(|batch| self.resolve_batch(report, &arch, &process, batch))
                .collect()
        } else {
            batches
                .iter()
                .map(|batch| self.resolve_batch(report, &arch, &process, batch))
                .collect()
        };

        // Scatter the per-batch outcomes back into report order.
        let mut indexed: Vec<(usize, FrameOutcome)> = batches
            .iter()
            .zip(batch_outcomes)
            .flat_map(|(batch, outcomes)| batch.indexes.iter().copied().zip(outcomes))
            .collect();
        indexed.sort_unstable_by_key(|(index, _)| *index);

        let resolutions: Vec<FrameResolution> = indexed
            .into_iter()
            .map(|(index, outcome)| FrameResolution {
                candidate: candidates[index].clone(),
                outcome,
            })
            .collect();

        let mut stats = SymbolicationStats {
            frames_selected: candidates.len(),
            ..Default::default()
        };
        for resolution in &resolutions {
            stats.record(&resolution.outcome);
        }

        let patched = patcher::apply_resolutions(report, &resolutions);
        tracing::debug!(
            resolved = stats.frames_resolved,
            selected = stats.frames_selected,
            "symbolication finished"
        );

        Ok(SymbolicationResponse {
            report: patched,
            process,
            stats,
        })
    }

    fn resolve_batch(
        &self,
        report: &str,
        arch: &str,
        process: &ProcessInfo,
        batch: &BinaryBatch,
    ) -> Vec<FrameOutcome> {
        let Some(base) = report::find_image_base(report, &batch.binary) else {
            return vec![FrameOutcome::MissingBaseAddress; batch.addresses.len()];
        };

        let Some(symbol_file) =
            self.provider
                .locate(&batch.binary, &process.version, &process.build)
        else {
            tracing::warn!(
                binary = %batch.binary,
                version = %process.version,
                build = %process.build,
                "no debug-symbol artifact located"
            );
            return vec![FrameOutcome::MissingDebugSymbols; batch.addresses.len()];
        };

        match self
            .resolver
            .resolve(arch, &symbol_file, &base, &batch.addresses)
        {
            Ok(symbols) => symbols
                .into_iter()
                .map(|symbol| match symbol {
                    Some(symbol) => FrameOutcome::Resolved(symbol),
                    None => FrameOutcome::NoSymbol,
                })
                .collect(),
            Err(error) => {
                tracing::error!(binary = %batch.binary, error = %error, "resolver invocation failed");
                vec![FrameOutcome::ResolverFailed; batch.addresses.len()]
            }
        }
    }
}

/// Groups candidates by binary, in first-appearance order.
///
/// Duplicate addresses within a binary stay duplicated so the resolver's
/// output lines keep their positional alignment with the frames.
fn group_by_binary(candidates: &[FrameCandidate]) -> Vec<BinaryBatch> {
    let mut batches: Vec<BinaryBatch> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for (index, candidate) in candidates.iter().enumerate() {
        let slot = match slots.get(&candidate.binary) {
            Some(slot) => *slot,
            None => {
                batches.push(BinaryBatch {
                    binary: candidate.binary.clone(),
                    indexes: Vec::new(),
                    addresses: Vec::new(),
                });
                slots.insert(candidate.binary.clone(), batches.len() - 1);
                batches.len() - 1
            }
        };
        batches[slot].indexes.push(index);
        batches[slot].addresses.push(candidate.address.clone());
    }

    batches
}
