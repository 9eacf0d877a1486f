//! Symbolication of textual Apple crash reports.
//!
//! The pipeline extracts process metadata from a report header, selects the
//! stack frames whose symbol column is still a raw address, resolves those
//! addresses through an external symbolication tool and patches the symbols
//! back into the report text. Everything outside the patched columns is
//! preserved byte for byte.
//!
//! Debug-symbol lookup is behind the [`SymbolProvider`] trait so callers can
//! plug in their own artifact storage; [`DirectorySymbolStore`] covers the
//! common case of dSYM bundles on the local filesystem.

pub mod config;
pub mod patcher;
pub mod report;
pub mod resolver;
pub mod symbolicate;
pub mod symbols;

pub use crate::config::Config;
pub use crate::report::{ProcessInfo, ReportError};
pub use crate::symbolicate::{SymbolicationResponse, SymbolicationStats, Symbolicator};
pub use crate::symbols::{DirectorySymbolStore, SymbolProvider};
