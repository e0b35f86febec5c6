//! Hand-assembled minimal ELF64 fixtures for the scenario tests.
//!
//! Only what `elf_util::parse` reads: the ELF header, a `.dynsym` +
//! `.dynstr` pair when the binary is "dynamically linked", and a
//! `.text` section when it's "static". No program headers — nothing
//! here needs to be loadable, only parseable.

const EM_X86_64: u16 = 62;
const ET_DYN: u16 = 3;
const SHT_NULL: u32 = 0;
const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHT_DYNSYM: u32 = 11;
const SHN_UNDEF: u16 = 0;

struct Section {
    name: String,
    sh_type: u32,
    flags: u64,
    addr: u64,
    data: Vec<u8>,
    link: u32,
    entsize: u64,
}

pub struct ElfBuilder {
    sections: Vec<Section>,
}

impl ElfBuilder {
    pub fn new() -> Self {
        Self { sections: Vec::new() }
    }

    pub fn add_text(mut self, base_va: u64, code: &[u8]) -> Self {
        self.sections.push(Section {
            name: ".text".to_string(),
            sh_type: SHT_PROGBITS,
            flags: 0x6, // SHF_ALLOC | SHF_EXECINSTR
            addr: base_va,
            data: code.to_vec(),
            link: 0,
            entsize: 0,
        });
        self
    }

    pub fn add_rtfunctab(mut self, data: &[u8]) -> Self {
        self.sections.push(Section {
            name: ".rtfunctab".to_string(),
            sh_type: SHT_PROGBITS,
            flags: 0x2, // SHF_ALLOC
            addr: 0,
            data: data.to_vec(),
            link: 0,
            entsize: 0,
        });
        self
    }

    /// `imports`: imported (undefined) dynamic symbol names.
    pub fn add_dynsym(mut self, imports: &[&str]) -> Self {
        let mut dynstr = vec![0u8]; // index 0 is always the empty string
        let mut sym_bytes = vec![0u8; 24]; // index 0 is always the null symbol

        for name in imports {
            let name_off = dynstr.len() as u32;
            dynstr.extend_from_slice(name.as_bytes());
            dynstr.push(0);

            sym_bytes.extend_from_slice(&name_off.to_le_bytes()); // st_name
            sym_bytes.push(0x12); // st_info: GLOBAL | FUNC
            sym_bytes.push(0); // st_other
            sym_bytes.extend_from_slice(&SHN_UNDEF.to_le_bytes()); // st_shndx
            sym_bytes.extend_from_slice(&0u64.to_le_bytes()); // st_value
            sym_bytes.extend_from_slice(&0u64.to_le_bytes()); // st_size
        }

        // .dynstr must exist before .dynsym references it via sh_link,
        // but order in the file doesn't matter — we push both now and
        // wire sh_link up when building the header table.
        self.sections.push(Section {
            name: ".dynstr".to_string(),
            sh_type: SHT_STRTAB,
            flags: 0x2,
            addr: 0,
            data: dynstr,
            link: 0,
            entsize: 0,
        });
        let dynstr_idx = self.sections.len() as u32 - 1 + 1; // +1 for the NULL section at index 0

        self.sections.push(Section {
            name: ".dynsym".to_string(),
            sh_type: SHT_DYNSYM,
            flags: 0x2,
            addr: 0,
            data: sym_bytes,
            link: dynstr_idx,
            entsize: 24,
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut shstrtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for s in &self.sections {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(s.name.as_bytes());
            shstrtab.push(0);
        }
        let shstrtab_name_off = shstrtab.len() as u32;
        shstrtab.extend_from_slice(b".shstrtab");
        shstrtab.push(0);

        const EHDR_LEN: u64 = 64;
        const SHDR_LEN: u64 = 64;

        let mut body = Vec::new();
        let mut offsets = Vec::new();
        for s in &self.sections {
            offsets.push(EHDR_LEN + body.len() as u64);
            body.extend_from_slice(&s.data);
        }
        let shstrtab_offset = EHDR_LEN + body.len() as u64;
        body.extend_from_slice(&shstrtab);

        let total_sections = self.sections.len() + 2; // NULL + real sections + .shstrtab
        let shoff = EHDR_LEN + body.len() as u64;
        let shstrndx = (total_sections - 1) as u16;

        let mut out = Vec::new();
        // e_ident
        out.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
        out.push(2); // ELFCLASS64
        out.push(1); // ELFDATA2LSB
        out.push(1); // EI_VERSION
        out.push(0); // EI_OSABI
        out.extend_from_slice(&[0u8; 8]); // padding

        out.extend_from_slice(&ET_DYN.to_le_bytes());
        out.extend_from_slice(&EM_X86_64.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes()); // e_version
        out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
        out.extend_from_slice(&0u64.to_le_bytes()); // e_phoff
        out.extend_from_slice(&shoff.to_le_bytes()); // e_shoff
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&(EHDR_LEN as u16).to_le_bytes()); // e_ehsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_phentsize
        out.extend_from_slice(&0u16.to_le_bytes()); // e_phnum
        out.extend_from_slice(&(SHDR_LEN as u16).to_le_bytes()); // e_shentsize
        out.extend_from_slice(&(total_sections as u16).to_le_bytes()); // e_shnum
        out.extend_from_slice(&shstrndx.to_le_bytes()); // e_shstrndx

        assert_eq!(out.len() as u64, EHDR_LEN);
        out.extend_from_slice(&body);

        // NULL section header (index 0).
        out.extend_from_slice(&[0u8; 64]);

        for (i, s) in self.sections.iter().enumerate() {
            out.extend_from_slice(&name_offsets[i].to_le_bytes());
            out.extend_from_slice(&s.sh_type.to_le_bytes());
            out.extend_from_slice(&s.flags.to_le_bytes());
            out.extend_from_slice(&s.addr.to_le_bytes());
            out.extend_from_slice(&offsets[i].to_le_bytes());
            out.extend_from_slice(&(s.data.len() as u64).to_le_bytes());
            out.extend_from_slice(&s.link.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes()); // sh_info
            out.extend_from_slice(&1u64.to_le_bytes()); // sh_addralign
            out.extend_from_slice(&s.entsize.to_le_bytes());
        }

        // .shstrtab section header.
        out.extend_from_slice(&shstrtab_name_off.to_le_bytes());
        out.extend_from_slice(&SHT_STRTAB.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&shstrtab_offset.to_le_bytes());
        out.extend_from_slice(&(shstrtab.len() as u64).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&1u64.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());

        let _ = SHT_NULL;
        out
    }
}
