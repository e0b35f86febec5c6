//! ELF section/symbol extraction, thin over `goblin` (spec §4.6, §4.7
//! "ELF inputs").
//!
//! Everything here is read-only slicing of the caller-supplied bytes —
//! no file I/O. The file-layer concerns (open, stat, magic check) live
//! in [`crate::collaborators`] and [`crate::analyzer`].

use goblin::elf::Elf;

use crate::error::AnalysisErrorKind;

/// The section the runtime function-table parser reads from (spec
/// §4.4: "a dedicated section of the ELF").
const FUNCTION_TABLE_SECTION: &str = ".rtfunctab";

/// One dynamic-symbol-table entry relevant to the dynamic path (spec
/// §4.7 step 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynSymbol {
    pub name: String,
    /// True when the symbol's section index is `SHN_UNDEF` — imported
    /// from a shared library rather than defined locally.
    pub is_undefined: bool,
}

/// The pieces of a parsed ELF this crate's analyzers need.
pub struct ParsedElf {
    pub is_64: bool,
    pub is_x86_64: bool,
    /// `(base VA, bytes)` of `.text`, if present.
    pub text: Option<(u64, Vec<u8>)>,
    pub function_table_section: Option<Vec<u8>>,
    pub has_dynamic_symbol_table: bool,
    pub dynamic_symbols: Vec<DynSymbol>,
}

fn section_bytes(bytes: &[u8], elf: &Elf, name: &str) -> Option<(u64, Vec<u8>)> {
    for shdr in &elf.section_headers {
        let Some(section_name) = elf.shdr_strtab.get_at(shdr.sh_name) else {
            continue;
        };
        if section_name != name {
            continue;
        }
        let start = shdr.sh_offset as usize;
        let end = start.checked_add(shdr.sh_size as usize)?;
        let data = bytes.get(start..end)?.to_vec();
        return Some((shdr.sh_addr, data));
    }
    None
}

/// Parses `bytes` as an ELF and extracts the sections/symbols this
/// crate cares about. Does not itself enforce architecture/format
/// rules — callers (the syscall analyzer, the network analyzer) apply
/// those per spec §4.6/§4.7 so the right error kind is attached at the
/// right layer.
pub fn parse(bytes: &[u8]) -> Result<ParsedElf, AnalysisErrorKind> {
    let elf = Elf::parse(bytes).map_err(|e| AnalysisErrorKind::ParseFailure(e.to_string()))?;

    let is_x86_64 = elf.header.e_machine == goblin::elf::header::EM_X86_64;
    let text = section_bytes(bytes, &elf, ".text");
    let function_table_section =
        section_bytes(bytes, &elf, FUNCTION_TABLE_SECTION).map(|(_, data)| data);

    let has_dynamic_symbol_table = !elf.dynsyms.is_empty();
    let mut dynamic_symbols = Vec::new();
    for sym in elf.dynsyms.iter() {
        let name = elf.dynstrtab.get_at(sym.st_name).unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }
        dynamic_symbols.push(DynSymbol {
            name,
            is_undefined: sym.st_shndx == goblin::elf::section_header::SHN_UNDEF as usize,
        });
    }

    Ok(ParsedElf {
        is_64: elf.is_64,
        is_x86_64,
        text,
        function_table_section,
        has_dynamic_symbol_table,
        dynamic_symbols,
    })
}
