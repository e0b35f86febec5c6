//! Analysis-time tunables (SPEC_FULL §4.8).
//!
//! The core takes no environment variables (spec §6). Every tunable is a
//! field on `AnalyzerConfig`, constructed by the embedding host and
//! threaded through the public entry points, mirroring how `QemuConfig`
//! in the teacher daemon carries its own defaults rather than reading
//! the environment mid-flight.

/// Default backward-scan depth for Pass 1's syscall-number recovery.
pub const DEFAULT_MAX_BACKWARD_SCAN: usize = 50;

/// Worst-case x86_64 instruction length in bytes.
pub const DEFAULT_MAX_INSTRUCTION_LENGTH: usize = 15;

/// Inclusive upper bound on a recoverable syscall number (spec §3).
pub const MAX_VALID_SYSCALL_NUMBER: i64 = 500;

/// Default cap on analyzed file size (spec §4.7 step 2).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 30; // 1 GiB

/// How the wrapper resolver matches a symbol name against the known
/// runtime wrapper names (spec §9 Open Question).
///
/// `Exact` is the default and matches the spec's base behavior. Some
/// toolchains prefix vendored wrapper symbols with a `.`- or
/// `/`-delimited path component; `SuffixBoundary` accepts those too.
/// Left opt-in because the spec notes this is ambiguous across inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapperNameMatch {
    #[default]
    Exact,
    SuffixBoundary,
}

/// Tunables threaded through the syscall analyzer and wrapper resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Max instructions counted during Pass 1's backward scan.
    /// Non-positive values are clamped to [`DEFAULT_MAX_BACKWARD_SCAN`].
    pub max_backward_scan: usize,
    /// Used only to size the backward-scan window
    /// (`max_backward_scan * max_instruction_length` bytes); not a
    /// correctness parameter (spec §9).
    pub max_instruction_length: usize,
    pub wrapper_name_match: WrapperNameMatch,
    /// Files larger than this are rejected as `FileTooLarge`.
    pub max_file_size: u64,
}

impl AnalyzerConfig {
    /// `max_backward_scan`, clamped to the default when non-positive.
    pub fn effective_max_backward_scan(&self) -> usize {
        if self.max_backward_scan == 0 {
            DEFAULT_MAX_BACKWARD_SCAN
        } else {
            self.max_backward_scan
        }
    }

    pub fn effective_max_instruction_length(&self) -> usize {
        if self.max_instruction_length == 0 {
            DEFAULT_MAX_INSTRUCTION_LENGTH
        } else {
            self.max_instruction_length
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_backward_scan: DEFAULT_MAX_BACKWARD_SCAN,
            max_instruction_length: DEFAULT_MAX_INSTRUCTION_LENGTH,
            wrapper_name_match: WrapperNameMatch::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}
