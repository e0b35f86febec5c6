//! Wrapper resolver (spec §4.5): finds calls into known runtime
//! syscall wrappers and recovers the syscall-number immediate that
//! precedes them.

use std::collections::HashMap;

use tracing::debug;

use crate::config::MAX_VALID_SYSCALL_NUMBER;
use crate::decode::{DecodedInstruction, InstructionDecoder};
use crate::error::AnalysisErrorKind;
use crate::functable::{self, SymbolInfo};
use crate::types::DeterminationMethod;

/// Exact symbol names the resolver recognizes as syscall wrappers
/// (spec §4.5). Matching is name-exact by default; see
/// [`crate::config::WrapperNameMatch`].
pub const KNOWN_WRAPPERS: &[&str] = &[
    "syscall.Syscall",
    "syscall.Syscall6",
    "syscall.RawSyscall",
    "syscall.RawSyscall6",
    "runtime.syscall",
    "runtime.syscall6",
];

/// How many trailing instructions [`WrapperResolver::scan`] considers
/// when resolving the immediate before a matched call (spec §4.5).
const CALL_BACKWARD_WINDOW: usize = 10;
/// How many instructions the backward-immediate-resolution walk
/// considers before giving up (spec §4.5).
const IMMEDIATE_BACKWARD_LIMIT: usize = 6;

/// One resolved (or unresolved) call into a known wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperCall {
    pub call_site_va: u64,
    pub wrapper_name: String,
    pub number: i64,
    pub resolved: bool,
    pub determination_method: DeterminationMethod,
}

fn matches_wrapper(name: &str, mode: crate::config::WrapperNameMatch) -> bool {
    use crate::config::WrapperNameMatch::*;
    match mode {
        Exact => KNOWN_WRAPPERS.contains(&name),
        SuffixBoundary => KNOWN_WRAPPERS.iter().any(|w| {
            name == *w
                || name
                    .strip_suffix(w)
                    .map(|prefix| prefix.ends_with('.') || prefix.ends_with('/'))
                    .unwrap_or(false)
        }),
    }
}

/// Locates calls into known syscall wrappers within one ELF. Single-use
/// per binary: `load` rebuilds `symbols` and `wrapper_addresses` from
/// scratch and any prior state is discarded (spec §3 lifecycle, §8
/// property 6).
pub struct WrapperResolver {
    symbols: HashMap<String, SymbolInfo>,
    wrapper_addresses: HashMap<u64, String>,
    has_symbols: bool,
    wrapper_name_match: crate::config::WrapperNameMatch,
}

impl WrapperResolver {
    pub fn new(wrapper_name_match: crate::config::WrapperNameMatch) -> Self {
        Self {
            symbols: HashMap::new(),
            wrapper_addresses: HashMap::new(),
            has_symbols: false,
            wrapper_name_match,
        }
    }

    pub fn has_symbols(&self) -> bool {
        self.has_symbols
    }

    #[cfg(test)]
    pub fn symbols(&self) -> &HashMap<String, SymbolInfo> {
        &self.symbols
    }

    #[cfg(test)]
    pub fn wrapper_addresses(&self) -> &HashMap<u64, String> {
        &self.wrapper_addresses
    }

    /// Parses the runtime function table and populates `symbols` and
    /// `wrapper_addresses`. On failure the resolver is left with both
    /// maps empty and `has_symbols = false` — never partially
    /// populated (spec §4.5, §5, §8 property 6).
    pub fn load(&mut self, table_section: &[u8]) -> Result<(), AnalysisErrorKind> {
        self.symbols.clear();
        self.wrapper_addresses.clear();
        self.has_symbols = false;

        let parsed = match functable::parse(table_section) {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "wrapper resolver: function-table parse failed, continuing with no wrappers");
                return Err(e);
            }
        };

        for (name, info) in &parsed {
            if matches_wrapper(name, self.wrapper_name_match) {
                self.wrapper_addresses.insert(info.entry_va, name.clone());
            }
        }
        self.symbols = parsed;
        self.has_symbols = true;
        Ok(())
    }

    /// Scans `code` (based at `base_va`) for calls into a loaded
    /// wrapper address, returning one [`WrapperCall`] per hit in
    /// ascending code order (spec §4.5, §5 ordering guarantee) plus
    /// this scan's own decode bookkeeping — this is a linear scan of
    /// `code`, so unlike the per-call backward immediate resolution it
    /// does contribute to `decode_stats` (spec §4.6 tie-break).
    pub fn scan(
        &self,
        code: &[u8],
        base_va: u64,
        decoder: &dyn InstructionDecoder,
    ) -> (Vec<WrapperCall>, crate::types::DecodeStats) {
        if self.wrapper_addresses.is_empty() {
            return (Vec::new(), crate::types::DecodeStats::default());
        }

        let mut decoded = Vec::new();
        let mut stats = crate::types::DecodeStats::default();
        let mut pos: usize = 0;
        while pos < code.len() {
            let va = base_va.wrapping_add(pos as u64);
            match decoder.decode(&code[pos..], va) {
                Ok(inst) => {
                    assert!(inst.length > 0, "decoder returned non-positive length on success");
                    let len = inst.length as usize;
                    stats.bytes_analyzed += len as u64;
                    decoded.push(inst);
                    pos += len;
                }
                Err(_) => {
                    stats.failure_count += 1;
                    stats.bytes_analyzed += 1;
                    pos += 1;
                }
            }
        }

        let mut calls = Vec::new();
        for (idx, inst) in decoded.iter().enumerate() {
            if inst.opcode != crate::decode::Opcode::Call {
                continue;
            }
            let Some(target) = compute_call_target(inst) else {
                continue;
            };
            let Some(wrapper_name) = self.wrapper_addresses.get(&target) else {
                continue;
            };

            let window_start = idx.saturating_sub(CALL_BACKWARD_WINDOW);
            let window = &decoded[window_start..idx];
            let (number, resolved, method) = resolve_wrapper_immediate(window);

            calls.push(WrapperCall {
                call_site_va: inst.va,
                wrapper_name: wrapper_name.clone(),
                number,
                resolved,
                determination_method: method,
            });
        }
        (calls, stats)
    }
}

/// Computes a `CALL`'s absolute target address, rejecting anything
/// that cannot legally arise from decoding a real x86_64 binary (spec
/// §4.5 "Overflow & safety").
fn compute_call_target(inst: &DecodedInstruction) -> Option<u64> {
    if inst.length <= 0 {
        return None;
    }
    let Some(crate::decode::Operand::Immediate(disp)) = inst.operands.first() else {
        return None;
    };

    let next_va = inst.va.checked_add(inst.length as u64)?;
    let next_va_signed = i64::try_from(next_va).ok()?;
    let target_signed = next_va_signed.checked_add(*disp)?;
    if target_signed < 0 {
        return None;
    }
    Some(target_signed as u64)
}

/// Walks backward from (but not including) the call, up to
/// [`IMMEDIATE_BACKWARD_LIMIT`] instructions, resolving the
/// syscall-number immediate (spec §4.5 "Backward immediate
/// resolution").
fn resolve_wrapper_immediate(window: &[DecodedInstruction]) -> (i64, bool, DeterminationMethod) {
    if window.len() < 2 {
        return (-1, false, DeterminationMethod::UnknownDecodeFailed);
    }

    let start = window.len().saturating_sub(IMMEDIATE_BACKWARD_LIMIT);
    for inst in window[start..].iter().rev() {
        if inst.is_control_flow() {
            return (-1, false, DeterminationMethod::UnknownControlFlowBoundary);
        }
        let (is_imm, value) = inst.is_immediate_move();
        if is_imm {
            if (0..=MAX_VALID_SYSCALL_NUMBER).contains(&value) {
                return (value, true, DeterminationMethod::GoWrapper);
            }
            return (-1, false, DeterminationMethod::UnknownIndirectSetting);
        }
    }
    (-1, false, DeterminationMethod::UnknownScanLimitExceeded)
}
