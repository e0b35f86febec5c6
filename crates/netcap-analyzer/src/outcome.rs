//! The public result surface (spec §3): `AnalysisOutcome` and the
//! records it carries.

use crate::error::AnalysisError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Category of a detected network-capable symbol (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Category {
    Socket,
    Http,
    Tls,
    Dns,
    /// Used when the detection came from the static path; `name` on the
    /// owning `DetectedSymbol` is then a syscall name (e.g. `socket`).
    Syscall,
}

/// A single network-relevant symbol found during analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectedSymbol {
    pub name: String,
    pub category: Category,
}

/// The five-valued outcome spec §3 defines for one analysis invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    NetworkDetected(Vec<DetectedSymbol>),
    NoNetworkSymbols,
    NotELFBinary,
    StaticBinary,
    AnalysisError(AnalysisError),
}

impl AnalysisOutcome {
    /// `NetworkDetected` or `AnalysisError` — errors count as
    /// potentially-network for safety (spec §3, §7).
    pub fn is_network_capable(&self) -> bool {
        matches!(
            self,
            AnalysisOutcome::NetworkDetected(_) | AnalysisOutcome::AnalysisError(_)
        )
    }

    /// `StaticBinary` or `AnalysisError` — "I could not decide."
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            AnalysisOutcome::StaticBinary | AnalysisOutcome::AnalysisError(_)
        )
    }
}

impl std::fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisOutcome::NetworkDetected(syms) => {
                write!(f, "network-detected ({} symbol(s))", syms.len())
            }
            AnalysisOutcome::NoNetworkSymbols => write!(f, "no-network-symbols"),
            AnalysisOutcome::NotELFBinary => write!(f, "not-elf-binary"),
            AnalysisOutcome::StaticBinary => write!(f, "static-binary"),
            AnalysisOutcome::AnalysisError(e) => write!(f, "analysis-error ({e})"),
        }
    }
}
