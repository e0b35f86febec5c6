//! Error taxonomy for the analyzer (spec §7).
//!
//! Every variant is a distinct tag, never a bare string match target —
//! callers are expected to `match` on `AnalysisErrorKind`, not parse
//! `Display` output.

use std::fmt;

/// Distinct error kinds the analyzer can surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisErrorKind {
    #[error("ELF machine is not x86_64")]
    UnsupportedArchitecture,

    #[error(".text section missing")]
    NoTextSection,

    #[error("runtime function-table section missing")]
    NoFunctionTable,

    #[error("unsupported function-table format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid function-table format: {0}")]
    InvalidFormat(String),

    #[error("not a regular file")]
    NotRegularFile,

    #[error("file too large ({size} bytes, limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("I/O error: {0}")]
    IoFailure(String),

    #[error("ELF parse failure: {0}")]
    ParseFailure(String),

    /// Conversion-time only: syscall analysis yielded indeterminate
    /// syscall numbers. Per spec this must be treated as network-capable.
    #[error("high risk: indeterminate syscall numbers")]
    HighRisk,
}

/// An `AnalysisError` as carried inside `AnalysisOutcome::AnalysisError`.
///
/// Pairs the typed kind with the human-readable reasons accumulated
/// during syscall analysis (empty outside the `HighRisk` conversion
/// path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisError {
    pub kind: AnalysisErrorKind,
    pub reasons: Vec<String>,
}

impl AnalysisError {
    pub fn new(kind: AnalysisErrorKind) -> Self {
        Self {
            kind,
            reasons: Vec::new(),
        }
    }

    pub fn with_reasons(kind: AnalysisErrorKind, reasons: Vec<String>) -> Self {
        Self { kind, reasons }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for AnalysisError {}
