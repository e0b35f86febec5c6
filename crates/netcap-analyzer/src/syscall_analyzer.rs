//! Syscall analyzer (spec §4.6): produces a [`SyscallAnalysisResult`]
//! from a static binary's code section by running Pass 1 (direct
//! `syscall` sites) and Pass 2 (calls into known runtime wrappers),
//! then aggregating both into the shared result shape.

use tracing::debug;

use crate::config::{AnalyzerConfig, MAX_VALID_SYSCALL_NUMBER};
use crate::decode::InstructionDecoder;
use crate::elf_util::ParsedElf;
use crate::error::AnalysisErrorKind;
use crate::syscall_table::SyscallTable;
use crate::types::{DeterminationMethod, SyscallAnalysisResult, SyscallRecord};
use crate::wrapper::WrapperResolver;

/// Decode failures are logged individually only up to this many times
/// per analysis; the rest are counted silently (spec §4.6).
const MAX_DECODE_FAILURE_LOGS: usize = 10;
/// The raw bytes of a direct syscall instruction (spec GLOSSARY).
const SYSCALL_OPCODE_BYTES: [u8; 2] = [0x0F, 0x05];

/// Runs Pass 1 and Pass 2 against one ELF's code section.
pub struct SyscallAnalyzer<'a> {
    decoder: &'a dyn InstructionDecoder,
    syscall_table: &'a dyn SyscallTable,
    config: &'a AnalyzerConfig,
}

impl<'a> SyscallAnalyzer<'a> {
    pub fn new(
        decoder: &'a dyn InstructionDecoder,
        syscall_table: &'a dyn SyscallTable,
        config: &'a AnalyzerConfig,
    ) -> Self {
        Self { decoder, syscall_table, config }
    }

    /// Spec §4.6 entry point. Rejects non-x86_64 ELFs and ELFs with no
    /// `.text`; everything else is recovered into the result's
    /// `high_risk_reasons` rather than propagated as an error.
    pub fn analyze(&self, elf: &ParsedElf) -> Result<SyscallAnalysisResult, AnalysisErrorKind> {
        if !elf.is_x86_64 {
            return Err(AnalysisErrorKind::UnsupportedArchitecture);
        }
        let (base_va, code) = elf
            .text
            .as_ref()
            .ok_or(AnalysisErrorKind::NoTextSection)?;

        let mut result = SyscallAnalysisResult::default();

        let mut resolver = WrapperResolver::new(self.config.wrapper_name_match);
        if let Some(section) = &elf.function_table_section {
            if let Err(e) = resolver.load(section) {
                debug!(error = %e, "syscall analyzer: wrapper resolver load failed, running Pass 2 with no wrappers");
            }
        }

        self.run_pass1(code, *base_va, &mut result);

        if resolver.has_symbols() {
            self.run_pass2(&resolver, code, *base_va, &mut result);
        }

        Ok(result)
    }

    fn run_pass1(&self, code: &[u8], base_va: u64, result: &mut SyscallAnalysisResult) {
        let mut pos: usize = 0;
        let mut failure_logs = 0usize;
        let mut sites = Vec::new();

        while pos < code.len() {
            let va = base_va.wrapping_add(pos as u64);
            match self.decoder.decode(&code[pos..], va) {
                Ok(inst) => {
                    assert!(
                        inst.length > 0,
                        "decoder returned non-positive length on success at VA {va:#x}"
                    );
                    let len = inst.length as usize;
                    result.decode_stats.bytes_analyzed += len as u64;
                    if len == 2 && inst.bytes == SYSCALL_OPCODE_BYTES {
                        sites.push(pos);
                    }
                    pos += len;
                }
                Err(_) => {
                    result.decode_stats.failure_count += 1;
                    result.decode_stats.bytes_analyzed += 1;
                    if failure_logs < MAX_DECODE_FAILURE_LOGS {
                        let preview_end = (pos + 4).min(code.len());
                        debug!(offset = pos, preview = ?&code[pos..preview_end], "pass1: decode failure");
                        failure_logs += 1;
                    }
                    pos += 1;
                }
            }
        }

        for site in sites {
            let site_va = base_va.wrapping_add(site as u64);
            let (number, method) = self.recover_backward(code, base_va, site);
            self.push_direct_record(result, site_va, number, method);
        }
    }

    /// Backward register-dataflow recovery for one syscall site (spec
    /// §4.6 "For every syscall site..."). `site` is the syscall's byte
    /// offset within `code`.
    fn recover_backward(
        &self,
        code: &[u8],
        base_va: u64,
        site: usize,
    ) -> (i64, DeterminationMethod) {
        if site > code.len().saturating_sub(2) {
            return (-1, DeterminationMethod::UnknownInvalidOffset);
        }

        let window_bytes =
            self.config.effective_max_backward_scan() * self.config.effective_max_instruction_length();
        let window_start = site.saturating_sub(window_bytes);

        // Forward-decode the window; x86 decoding self-synchronizes
        // within a few bytes, so only the tail near `site` needs to be
        // trustworthy (spec §4.6 "this is intentional").
        let mut decoded = Vec::new();
        let mut pos = window_start;
        while pos < site {
            let va = base_va.wrapping_add(pos as u64);
            match self.decoder.decode(&code[pos..site], va) {
                Ok(inst) => {
                    let len = inst.length as usize;
                    decoded.push(inst);
                    pos += len;
                }
                Err(_) => {
                    pos += 1;
                }
            }
        }

        if decoded.is_empty() {
            return (-1, DeterminationMethod::UnknownDecodeFailed);
        }

        // Slicing to the last `max_scan` decoded instructions already
        // enforces the count limit; if nothing in that window
        // terminates the scan, running out falls through to
        // `scan_limit_exceeded` below (spec §4.6).
        let max_scan = self.config.effective_max_backward_scan();
        let start = decoded.len().saturating_sub(max_scan);
        for inst in decoded[start..].iter().rev() {
            if inst.is_control_flow() {
                return (-1, DeterminationMethod::UnknownControlFlowBoundary);
            }
            if !inst.modifies_eax_or_rax() {
                continue;
            }
            let (is_imm, value) = inst.is_immediate_move();
            if is_imm {
                if (0..=MAX_VALID_SYSCALL_NUMBER).contains(&value) {
                    return (value, DeterminationMethod::Immediate);
                }
                return (-1, DeterminationMethod::UnknownIndirectSetting);
            }
            return (-1, DeterminationMethod::UnknownIndirectSetting);
        }
        (-1, DeterminationMethod::UnknownScanLimitExceeded)
    }

    fn run_pass2(
        &self,
        resolver: &WrapperResolver,
        code: &[u8],
        base_va: u64,
        result: &mut SyscallAnalysisResult,
    ) {
        let (calls, stats) = resolver.scan(code, base_va, self.decoder);
        result.decode_stats.bytes_analyzed += stats.bytes_analyzed;
        result.decode_stats.failure_count += stats.failure_count;

        for call in calls {
            let name = self.syscall_table.name_of(call.number);
            let is_network = call.number >= 0 && self.syscall_table.is_network(call.number);
            let record = SyscallRecord {
                number: call.number,
                name,
                is_network,
                location: call.call_site_va,
                determination_method: call.determination_method.clone(),
            };
            let reason = if record.number == -1 {
                Some(format!(
                    "go wrapper call at {:#x}: {}",
                    call.call_site_va, call.determination_method
                ))
            } else {
                None
            };
            result.push(record, reason);
        }
    }

    fn push_direct_record(
        &self,
        result: &mut SyscallAnalysisResult,
        site_va: u64,
        number: i64,
        method: DeterminationMethod,
    ) {
        let name = self.syscall_table.name_of(number);
        let is_network = number >= 0 && self.syscall_table.is_network(number);
        let record = SyscallRecord {
            number,
            name,
            is_network,
            location: site_va,
            determination_method: method.clone(),
        };
        let reason = if record.number == -1 {
            Some(format!("syscall at {site_va:#x}: number could not be determined ({method})"))
        } else {
            None
        };
        result.push(record, reason);
    }
}
