//! Capability traits for the collaborators spec §1/§6 call out as
//! external to the core: safe file opening, content hashing, and the
//! optional syscall-analysis result store. The core depends only on
//! these traits; production wiring (TOCTOU-safe opens, privilege
//! escalation, a real cache) lives outside this crate.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek};
use std::path::Path;

use crate::error::AnalysisErrorKind;
use crate::types::SyscallAnalysisResult;

/// A readable, seekable handle — what the core needs from an opened
/// file regardless of how it was opened (spec §6 "File-open
/// collaborator").
///
/// `is_regular_file` lets the core stat the *handle* rather than the
/// path (spec §4.7 step 2), so a non-regular file (a named pipe,
/// socket, or char device) is rejected without ever trying to seek it.
pub trait ReadSeek: Read + Seek {
    fn is_regular_file(&self) -> io::Result<bool>;
}

impl ReadSeek for File {
    fn is_regular_file(&self) -> io::Result<bool> {
        Ok(self.metadata()?.file_type().is_file())
    }
}

/// An in-memory handle is always treated as a regular file — it stands
/// in for one in tests.
impl ReadSeek for Cursor<Vec<u8>> {
    fn is_regular_file(&self) -> io::Result<bool> {
        Ok(true)
    }
}

/// Opens a path into a [`ReadSeek`] handle. Implementations are
/// expected to resolve symlinks and guard against TOCTOU races; this
/// crate trusts whatever bytes the handle returns (spec §1 "out of
/// scope: the file-opening layer").
pub trait FileOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ReadSeek>, AnalysisErrorKind>;
}

/// Opens files with a plain [`std::fs::File`]. No symlink or privilege
/// handling — callers that need those wrap a different `FileOpener`
/// around the real collaborator described in spec §6.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOpener;

impl FileOpener for StdFileOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ReadSeek>, AnalysisErrorKind> {
        let file = File::open(path).map_err(|e| AnalysisErrorKind::IoFailure(e.to_string()))?;
        Ok(Box::new(file))
    }
}

/// A streaming content hash (spec §6 "Hash algorithm"). `sum` consumes
/// the stream from its current position; callers seek to 0 first.
pub trait ContentHasher {
    /// Short algorithm name used as the `"<name>:<hex>"` store-key
    /// prefix.
    fn name(&self) -> &'static str;
    fn sum(&self, stream: &mut dyn ReadSeek) -> Result<String, AnalysisErrorKind>;
}

/// The optional precomputed-result store (spec §6 "Syscall-analysis
/// store"). Absence or error is non-fatal: the dispatcher falls back
/// to `StaticBinary` either way (spec §4.7 step 7).
pub trait ResultStore {
    fn load(
        &self,
        path: &Path,
        content_hash: &str,
    ) -> Result<Option<SyscallAnalysisResult>, AnalysisErrorKind>;
}

/// A store that never has anything cached — the default when no real
/// cache collaborator is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl ResultStore for NoStore {
    fn load(
        &self,
        _path: &Path,
        _content_hash: &str,
    ) -> Result<Option<SyscallAnalysisResult>, AnalysisErrorKind> {
        Ok(None)
    }
}
