//! Runtime function-table parser (spec §4.4).
//!
//! Parses the PC↔name table a managed-runtime ELF keeps around for
//! stack traces even after stripping, so the wrapper resolver can find
//! known syscall wrappers by name in a static binary. Two header
//! families are recognized, dispatched on a four-byte magic; every
//! offset is bounds-checked against the section length before any read
//! and every address sum is overflow-checked, because this parses
//! untrusted input (spec §4.4 "hard correctness requirements").

use std::collections::HashMap;
use std::convert::TryFrom;

use crate::error::AnalysisErrorKind;

/// One function recovered from the table (spec §3 `SymbolInfo`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: String,
    pub entry_va: u64,
    pub end_va: u64,
}

/// Older, fully explicit header: both the function-name-table offset
/// and the function-table offset are present as distinct fields.
const MAGIC_V1: [u8; 4] = [0xf0, 0xff, 0xff, 0xff];
/// Newer, shorter header: the function-table-offset field was dropped;
/// the one offset field present is the function-table base, and the
/// name table immediately follows the function-table array.
const MAGIC_V2: [u8; 4] = [0xf1, 0xff, 0xff, 0xff];

const HEADER_V1_LEN: u64 = 40;
const HEADER_V2_LEN: u64 = 32;
/// Each function-table entry is `{entry_offset: u32, func_offset: u32}`.
const ENTRY_LEN: u64 = 8;

fn invalid(reason: impl Into<String>) -> AnalysisErrorKind {
    AnalysisErrorKind::InvalidFormat(reason.into())
}

fn checked_usize(v: u64, what: &str) -> Result<usize, AnalysisErrorKind> {
    usize::try_from(v).map_err(|_| invalid(format!("{what} does not fit in usize: {v}")))
}

fn read_u32(section: &[u8], at: u64, what: &str) -> Result<u32, AnalysisErrorKind> {
    let start = checked_usize(at, what)?;
    let end = start.checked_add(4).ok_or_else(|| invalid(format!("{what} offset overflow")))?;
    let slice = section
        .get(start..end)
        .ok_or_else(|| invalid(format!("{what} out of bounds at {at}")))?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_u64(section: &[u8], at: u64, what: &str) -> Result<u64, AnalysisErrorKind> {
    let start = checked_usize(at, what)?;
    let end = start.checked_add(8).ok_or_else(|| invalid(format!("{what} offset overflow")))?;
    let slice = section
        .get(start..end)
        .ok_or_else(|| invalid(format!("{what} out of bounds at {at}")))?;
    Ok(u64::from_le_bytes(slice.try_into().unwrap()))
}

fn read_cstr(section: &[u8], at: u64) -> Result<String, AnalysisErrorKind> {
    let start = checked_usize(at, "name offset")?;
    let rest = section
        .get(start..)
        .ok_or_else(|| invalid(format!("name offset out of bounds at {at}")))?;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| invalid("function name runs off end of section (unterminated)"))?;
    Ok(String::from_utf8_lossy(&rest[..nul]).into_owned())
}

struct Header {
    func_count: u64,
    text_start: u64,
    funcname_base: u64,
    functab_base: u64,
}

fn parse_header(section: &[u8]) -> Result<Header, AnalysisErrorKind> {
    if section.len() < 4 {
        return Err(AnalysisErrorKind::UnsupportedFormat("section too short for magic".into()));
    }
    let magic: [u8; 4] = section[..4].try_into().unwrap();

    if magic == MAGIC_V1 {
        if (section.len() as u64) < HEADER_V1_LEN {
            return Err(invalid("section shorter than v1 header"));
        }
        let func_count = read_u64(section, 8, "func_count")?;
        let text_start = read_u64(section, 16, "text_start")?;
        let funcname_base = read_u64(section, 24, "funcname_offset")?;
        let functab_base = read_u64(section, 32, "functab_offset")?;
        Ok(Header { func_count, text_start, funcname_base, functab_base })
    } else if magic == MAGIC_V2 {
        if (section.len() as u64) < HEADER_V2_LEN {
            return Err(invalid("section shorter than v2 header"));
        }
        let func_count = read_u64(section, 8, "func_count")?;
        let text_start = read_u64(section, 16, "text_start")?;
        let offset_field = read_u64(section, 24, "offset_field")?;
        // spec §4.4: the shorter header is recognized by its single
        // offset field being below the older header's fixed size —
        // that field holds the function-table base, not a
        // funcname-table offset, in this family.
        if offset_field < HEADER_V1_LEN {
            return Err(invalid("v2 offset field implausibly small"));
        }
        let entries_len = func_count
            .checked_add(1)
            .and_then(|n| n.checked_mul(ENTRY_LEN))
            .ok_or_else(|| invalid("function count overflow"))?;
        let funcname_base = offset_field
            .checked_add(entries_len)
            .ok_or_else(|| invalid("funcname base overflow"))?;
        Ok(Header {
            func_count,
            text_start,
            funcname_base,
            functab_base: offset_field,
        })
    } else {
        Err(AnalysisErrorKind::UnsupportedFormat(format!("unrecognized magic {magic:02x?}")))
    }
}

/// Parses the table in `section` (the table section's raw bytes) into
/// a `name → SymbolInfo` map. `text_start` is used only as a fallback
/// when a caller wants to assert the parsed header's value against the
/// ELF's own `.text` virtual address; the table's own header field is
/// authoritative here. Only 64-bit layouts are supported.
pub fn parse(section: &[u8]) -> Result<HashMap<String, SymbolInfo>, AnalysisErrorKind> {
    let header = parse_header(section)?;

    // The table always carries one more entry than `func_count` — a
    // trailing sentinel whose `entry_offset` gives the last real
    // function's end VA.
    header
        .func_count
        .checked_add(1)
        .ok_or_else(|| invalid("function count overflow"))?;

    let mut out = HashMap::with_capacity(checked_usize(header.func_count, "func_count")?);

    for i in 0..header.func_count {
        let this_entry_at = header
            .functab_base
            .checked_add(i.checked_mul(ENTRY_LEN).ok_or_else(|| invalid("entry index overflow"))?)
            .ok_or_else(|| invalid("entry offset overflow"))?;
        let next_entry_at = header
            .functab_base
            .checked_add(
                (i + 1)
                    .checked_mul(ENTRY_LEN)
                    .ok_or_else(|| invalid("entry index overflow"))?,
            )
            .ok_or_else(|| invalid("entry offset overflow"))?;

        let entry_offset = read_u32(section, this_entry_at, "entry_offset")? as u64;
        let func_offset = read_u32(section, this_entry_at + 4, "func_offset")? as u64;
        let next_entry_offset = read_u32(section, next_entry_at, "next entry_offset")? as u64;

        let entry_va = header
            .text_start
            .checked_add(entry_offset)
            .ok_or_else(|| invalid("entry VA overflow"))?;
        let end_va = header
            .text_start
            .checked_add(next_entry_offset)
            .ok_or_else(|| invalid("end VA overflow"))?;

        let name_offset_field = read_u32(section, func_offset, "name_offset")? as u64;
        let name_at = header
            .funcname_base
            .checked_add(name_offset_field)
            .ok_or_else(|| invalid("name offset overflow"))?;
        let name = read_cstr(section, name_at)?;

        out.insert(name.clone(), SymbolInfo { name, entry_va, end_va });
    }

    Ok(out)
}
