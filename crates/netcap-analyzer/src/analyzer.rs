//! Top-level dispatch (spec §4.7): takes a file path, decides dynamic
//! vs. static handling, and converts whatever it finds into the
//! public [`AnalysisOutcome`].

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, warn};

use crate::collaborators::{ContentHasher, FileOpener, NoStore, ResultStore, StdFileOpener};
use crate::config::AnalyzerConfig;
use crate::decode::{InstructionDecoder, X86Decoder};
use crate::elf_util::{self, ParsedElf};
use crate::error::{AnalysisError, AnalysisErrorKind};
use crate::outcome::{AnalysisOutcome, Category, DetectedSymbol};
use crate::registry::{NetworkSymbolRegistry, SymbolRegistry};
use crate::syscall_analyzer::SyscallAnalyzer;
use crate::syscall_table::{LinuxX86_64SyscallTable, SyscallTable};
use crate::types::SyscallAnalysisResult;

const ELF_MAGIC: [u8; 4] = [0x7F, 0x45, 0x4C, 0x46];

/// The network-capability analyzer (spec §4.7). Owns its collaborator
/// references for the lifetime of the analysis calls made through it;
/// construct one per embedding host, not per file (the collaborators
/// it references are safe to share across threads — spec §5).
pub struct NetworkAnalyzer<'a> {
    file_opener: &'a dyn FileOpener,
    registry: &'a dyn SymbolRegistry,
    decoder: &'a dyn InstructionDecoder,
    syscall_table: &'a dyn SyscallTable,
    result_store: &'a dyn ResultStore,
    content_hasher: Option<&'a dyn ContentHasher>,
    config: AnalyzerConfig,
}

/// Owned defaults for [`NetworkAnalyzer`], for callers who don't need
/// to inject their own collaborators (mirrors the teacher's pattern of
/// a `Default`-constructible top-level type backed by concrete impls).
pub struct DefaultCollaborators {
    pub file_opener: StdFileOpener,
    pub registry: NetworkSymbolRegistry,
    pub decoder: X86Decoder,
    pub syscall_table: LinuxX86_64SyscallTable,
    pub result_store: NoStore,
    pub config: AnalyzerConfig,
}

impl Default for DefaultCollaborators {
    fn default() -> Self {
        Self {
            file_opener: StdFileOpener,
            registry: NetworkSymbolRegistry::default(),
            decoder: X86Decoder::new(),
            syscall_table: LinuxX86_64SyscallTable,
            result_store: NoStore,
            config: AnalyzerConfig::default(),
        }
    }
}

impl DefaultCollaborators {
    pub fn analyzer(&self) -> NetworkAnalyzer<'_> {
        NetworkAnalyzer {
            file_opener: &self.file_opener,
            registry: &self.registry,
            decoder: &self.decoder,
            syscall_table: &self.syscall_table,
            result_store: &self.result_store,
            content_hasher: None,
            config: self.config.clone(),
        }
    }
}

impl<'a> NetworkAnalyzer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_opener: &'a dyn FileOpener,
        registry: &'a dyn SymbolRegistry,
        decoder: &'a dyn InstructionDecoder,
        syscall_table: &'a dyn SyscallTable,
        result_store: &'a dyn ResultStore,
        content_hasher: Option<&'a dyn ContentHasher>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            file_opener,
            registry,
            decoder,
            syscall_table,
            result_store,
            content_hasher,
            config,
        }
    }

    /// Spec §4.7 top-level operation.
    pub fn analyze(&self, path: &Path) -> AnalysisOutcome {
        match self.analyze_inner(path) {
            Ok(outcome) => outcome,
            // A non-regular handle (pipe, socket, char device) is a
            // rejection, not an analysis error (spec §4.7 step 2).
            Err(AnalysisErrorKind::NotRegularFile) => AnalysisOutcome::NotELFBinary,
            Err(kind) => AnalysisOutcome::AnalysisError(AnalysisError::new(kind)),
        }
    }

    fn analyze_inner(&self, path: &Path) -> Result<AnalysisOutcome, AnalysisErrorKind> {
        // Step 1-2: open + stat. Privilege-escalation retry and
        // symlink safety live in the injected FileOpener (spec §1 "out
        // of scope"). The regular-file check stats the opened handle
        // itself, so a pipe/socket/char device is rejected before
        // anything tries to seek it (which would otherwise fail with
        // an ESPIPE-style I/O error).
        let mut handle = self.file_opener.open(path)?;
        match handle.is_regular_file() {
            Ok(true) => {}
            Ok(false) => return Err(AnalysisErrorKind::NotRegularFile),
            Err(e) => return Err(AnalysisErrorKind::IoFailure(e.to_string())),
        }

        let size = handle
            .seek(SeekFrom::End(0))
            .map_err(|e| AnalysisErrorKind::IoFailure(e.to_string()))?;
        handle
            .seek(SeekFrom::Start(0))
            .map_err(|e| AnalysisErrorKind::IoFailure(e.to_string()))?;
        if size > self.config.max_file_size {
            return Err(AnalysisErrorKind::FileTooLarge { size, limit: self.config.max_file_size });
        }

        // Step 3: magic check.
        let mut magic = [0u8; 4];
        if handle.read_exact(&mut magic).is_err() {
            return Ok(AnalysisOutcome::NotELFBinary);
        }
        if magic != ELF_MAGIC {
            return Ok(AnalysisOutcome::NotELFBinary);
        }
        handle
            .seek(SeekFrom::Start(0))
            .map_err(|e| AnalysisErrorKind::IoFailure(e.to_string()))?;

        let mut bytes = Vec::with_capacity(size as usize);
        handle
            .read_to_end(&mut bytes)
            .map_err(|e| AnalysisErrorKind::IoFailure(e.to_string()))?;

        // Step 4: parse.
        let elf = elf_util::parse(&bytes)?;

        // Step 5-6: dynamic path.
        if elf.has_dynamic_symbol_table && !elf.dynamic_symbols.is_empty() {
            return Ok(self.analyze_dynamic(&elf));
        }

        // Step 7: static handling.
        self.analyze_static(path, &mut handle, &elf)
    }

    fn analyze_dynamic(&self, elf: &ParsedElf) -> AnalysisOutcome {
        let mut detected = Vec::new();
        for sym in &elf.dynamic_symbols {
            if !sym.is_undefined {
                continue;
            }
            if let Some(category) = self.registry.is_network_symbol(&sym.name) {
                detected.push(DetectedSymbol { name: sym.name.clone(), category });
            }
        }
        if detected.is_empty() {
            AnalysisOutcome::NoNetworkSymbols
        } else {
            AnalysisOutcome::NetworkDetected(detected)
        }
    }

    fn analyze_static(
        &self,
        path: &Path,
        handle: &mut Box<dyn crate::collaborators::ReadSeek>,
        elf: &ParsedElf,
    ) -> Result<AnalysisOutcome, AnalysisErrorKind> {
        let Some(hasher) = self.content_hasher else {
            return Ok(AnalysisOutcome::StaticBinary);
        };

        handle
            .seek(SeekFrom::Start(0))
            .map_err(|e| AnalysisErrorKind::IoFailure(e.to_string()))?;
        let hash = match hasher.sum(handle.as_mut()) {
            Ok(h) => format!("{}:{}", hasher.name(), h),
            Err(e) => {
                warn!(error = %e, "content hash computation failed, falling back to static-binary");
                return Ok(AnalysisOutcome::StaticBinary);
            }
        };

        match self.result_store.load(path, &hash) {
            Ok(Some(result)) => Ok(self.convert_syscall_result(result)),
            Ok(None) => Ok(AnalysisOutcome::StaticBinary),
            Err(e) => {
                debug!(error = %e, "result store lookup failed, falling back to static-binary");
                Ok(AnalysisOutcome::StaticBinary)
            }
        }
    }

    /// Runs the in-scope syscall analyzer directly against an ELF that
    /// has already been parsed, for callers that want the full
    /// [`SyscallAnalysisResult`] (e.g. to populate the store) rather
    /// than just the outcome (spec §6 "Return surface").
    pub fn analyze_static_elf(
        &self,
        elf: &ParsedElf,
    ) -> Result<SyscallAnalysisResult, AnalysisErrorKind> {
        let analyzer = SyscallAnalyzer::new(self.decoder, self.syscall_table, &self.config);
        analyzer.analyze(elf)
    }

    /// Converts a `SyscallAnalysisResult` into the outcome taxonomy
    /// (spec §4.7 "Result conversion from syscall analysis"). Public
    /// so a caller that populated the store itself (or is just running
    /// `analyze_static_elf` for diagnostics) can reuse the same
    /// conversion the dispatcher applies to a cache hit.
    pub fn convert_syscall_result(&self, result: SyscallAnalysisResult) -> AnalysisOutcome {
        if result.summary.has_network {
            let detected = result
                .records
                .iter()
                .filter(|r| r.is_network)
                .map(|r| DetectedSymbol { name: r.name.clone(), category: Category::Syscall })
                .collect();
            AnalysisOutcome::NetworkDetected(detected)
        } else if result.summary.is_high_risk {
            AnalysisOutcome::AnalysisError(AnalysisError::with_reasons(
                AnalysisErrorKind::HighRisk,
                result.high_risk_reasons,
            ))
        } else {
            AnalysisOutcome::NoNetworkSymbols
        }
    }
}
