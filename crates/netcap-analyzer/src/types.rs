//! Static-path result types (spec §3): `SyscallRecord`,
//! `SyscallAnalysisResult`, and the tags they carry.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a syscall number was (or was not) recovered (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeterminationMethod {
    /// Direct `mov`-immediate (or self-xor-zero) into `EAX`/`RAX`
    /// immediately preceding a `syscall` instruction.
    Immediate,
    /// Immediate into `EAX`/`RAX` preceding a call into a known
    /// runtime syscall wrapper.
    GoWrapper,
    UnknownDecodeFailed,
    UnknownControlFlowBoundary,
    UnknownIndirectSetting,
    UnknownScanLimitExceeded,
    UnknownInvalidOffset,
}

impl DeterminationMethod {
    /// `true` for [`DeterminationMethod::Immediate`] and
    /// [`DeterminationMethod::GoWrapper`] — the two methods that ever
    /// accompany a recovered (non-`-1`) number (spec §8 property 2).
    pub fn is_resolved(&self) -> bool {
        matches!(self, DeterminationMethod::Immediate | DeterminationMethod::GoWrapper)
    }
}

impl std::fmt::Display for DeterminationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeterminationMethod::Immediate => "immediate",
            DeterminationMethod::GoWrapper => "go_wrapper",
            DeterminationMethod::UnknownDecodeFailed => "unknown:decode_failed",
            DeterminationMethod::UnknownControlFlowBoundary => "unknown:control_flow_boundary",
            DeterminationMethod::UnknownIndirectSetting => "unknown:indirect_setting",
            DeterminationMethod::UnknownScanLimitExceeded => "unknown:scan_limit_exceeded",
            DeterminationMethod::UnknownInvalidOffset => "unknown:invalid_offset",
        };
        write!(f, "{s}")
    }
}

/// One syscall site and the outcome of recovering its number.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyscallRecord {
    /// Signed; `-1` means unknown.
    pub number: i64,
    /// Empty when `number` is unknown or not in the syscall table.
    pub name: String,
    pub is_network: bool,
    pub location: u64,
    pub determination_method: DeterminationMethod,
}

/// Aggregate counters derived from a `SyscallAnalysisResult`'s records
/// (spec §3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    pub total_events: usize,
    pub network_count: usize,
    pub has_network: bool,
    pub is_high_risk: bool,
}

/// Decode bookkeeping from Pass 1's and Pass 2's linear scans (spec
/// §4.6 tie-break: the windowed backward scan does not contribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecodeStats {
    pub failure_count: u64,
    pub bytes_analyzed: u64,
}

/// Full result of static-binary syscall analysis (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyscallAnalysisResult {
    pub records: Vec<SyscallRecord>,
    pub has_unknown: bool,
    pub high_risk_reasons: Vec<String>,
    pub summary: Summary,
    pub decode_stats: DecodeStats,
}

impl SyscallAnalysisResult {
    /// Appends `record`, updating `has_unknown` / `high_risk_reasons`
    /// and the running summary counters (spec §4.6 aggregation).
    ///
    /// `reason` is the already-formatted human string for an unknown
    /// record; callers pass `None` for resolved records.
    pub(crate) fn push(&mut self, record: SyscallRecord, reason: Option<String>) {
        if record.number == -1 {
            self.has_unknown = true;
            if let Some(r) = reason {
                self.high_risk_reasons.push(r);
            }
        }
        if record.is_network {
            self.summary.network_count += 1;
        }
        self.records.push(record);
        self.summary.total_events = self.records.len();
        self.summary.has_network = self.summary.network_count > 0;
        self.summary.is_high_risk = self.has_unknown;
    }
}
