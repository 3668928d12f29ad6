//! Minimal ELF64 writer for tests.
//!
//! Produces a RISC-V executable with `PT_LOAD` segments and an optional
//! symbol table, enough for the loader and the HTIF driver to consume.

use std::path::Path;

use crate::constants::*;

struct SegmentSpec {
    vaddr: u64,
    data: Vec<u8>,
    memsz: u64,
    flags: u32,
}

/// Builder for small RISC-V ELF64 images.
pub struct ElfBuilder {
    entry: u64,
    segments: Vec<SegmentSpec>,
    symbols: Vec<(String, u64)>,
}

impl ElfBuilder {
    /// Start an image with the given entry point.
    pub fn new(entry: u64) -> Self {
        Self {
            entry,
            segments: Vec::new(),
            symbols: Vec::new(),
        }
    }

    /// Add an executable segment holding `data` at `vaddr`.
    pub fn segment(self, vaddr: u64, data: &[u8]) -> Self {
        let memsz = data.len() as u64;
        self.segment_with_bss(vaddr, data, memsz)
    }

    /// Add a segment whose memory size exceeds its file data.
    pub fn segment_with_bss(mut self, vaddr: u64, data: &[u8], memsz: u64) -> Self {
        self.segments.push(SegmentSpec {
            vaddr,
            data: data.to_vec(),
            memsz,
            flags: PF_R | PF_W | PF_X,
        });
        self
    }

    /// Add a global symbol.
    pub fn symbol(mut self, name: &str, value: u64) -> Self {
        self.symbols.push((name.to_string(), value));
        self
    }

    /// Serialize the image.
    pub fn build(&self) -> Vec<u8> {
        let phnum = self.segments.len();
        let mut out = vec![0u8; EHDR_SIZE_64 + phnum * PHDR_SIZE_64];

        let mut phdrs = Vec::with_capacity(phnum);
        for seg in &self.segments {
            let offset = out.len() as u64;
            out.extend_from_slice(&seg.data);
            phdrs.push(offset);
        }

        let mut shoff = 0u64;
        let mut shnum = 0u16;
        if !self.symbols.is_empty() {
            let mut strtab = vec![0u8];
            let mut symtab = vec![0u8; SYM_SIZE_64];
            for (name, value) in &self.symbols {
                let name_off = strtab.len() as u32;
                strtab.extend_from_slice(name.as_bytes());
                strtab.push(0);

                let mut sym = [0u8; SYM_SIZE_64];
                sym[0..4].copy_from_slice(&name_off.to_le_bytes());
                sym[4] = 0x11; // STB_GLOBAL | STT_OBJECT
                sym[6..8].copy_from_slice(&1u16.to_le_bytes());
                sym[8..16].copy_from_slice(&value.to_le_bytes());
                sym[16..24].copy_from_slice(&8u64.to_le_bytes());
                symtab.extend_from_slice(&sym);
            }

            let symtab_off = out.len() as u64;
            out.extend_from_slice(&symtab);
            let strtab_off = out.len() as u64;
            out.extend_from_slice(&strtab);

            shoff = out.len() as u64;
            shnum = 3;
            out.extend_from_slice(&[0u8; SHDR_SIZE_64]);
            out.extend_from_slice(&section_header(
                SHT_SYMTAB,
                symtab_off,
                symtab.len() as u64,
                2,
                SYM_SIZE_64 as u64,
            ));
            out.extend_from_slice(&section_header(
                SHT_STRTAB,
                strtab_off,
                strtab.len() as u64,
                0,
                0,
            ));
        }

        out[0..4].copy_from_slice(&ELF_MAGIC.to_le_bytes());
        out[4] = ELF_CLASS_64;
        out[5] = ELF_DATA_LSB;
        out[6] = 1;
        out[16..18].copy_from_slice(&ELF_TYPE_EXEC.to_le_bytes());
        out[18..20].copy_from_slice(&ELF_MACHINE_RISCV.to_le_bytes());
        out[20..24].copy_from_slice(&1u32.to_le_bytes());
        out[24..32].copy_from_slice(&self.entry.to_le_bytes());
        out[32..40].copy_from_slice(&(EHDR_SIZE_64 as u64).to_le_bytes());
        out[40..48].copy_from_slice(&shoff.to_le_bytes());
        out[52..54].copy_from_slice(&(EHDR_SIZE_64 as u16).to_le_bytes());
        out[54..56].copy_from_slice(&(PHDR_SIZE_64 as u16).to_le_bytes());
        out[56..58].copy_from_slice(&(phnum as u16).to_le_bytes());
        out[58..60].copy_from_slice(&(SHDR_SIZE_64 as u16).to_le_bytes());
        out[60..62].copy_from_slice(&shnum.to_le_bytes());

        for (i, (seg, offset)) in self.segments.iter().zip(phdrs).enumerate() {
            let base = EHDR_SIZE_64 + i * PHDR_SIZE_64;
            let ph = &mut out[base..base + PHDR_SIZE_64];
            ph[0..4].copy_from_slice(&PT_LOAD.to_le_bytes());
            ph[4..8].copy_from_slice(&seg.flags.to_le_bytes());
            ph[8..16].copy_from_slice(&offset.to_le_bytes());
            ph[16..24].copy_from_slice(&seg.vaddr.to_le_bytes());
            ph[24..32].copy_from_slice(&seg.vaddr.to_le_bytes());
            ph[32..40].copy_from_slice(&(seg.data.len() as u64).to_le_bytes());
            ph[40..48].copy_from_slice(&seg.memsz.to_le_bytes());
            ph[48..56].copy_from_slice(&8u64.to_le_bytes());
        }

        out
    }

    /// Serialize the image to `path`.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }
}

fn section_header(sh_type: u32, offset: u64, size: u64, link: u32, entsize: u64) -> [u8; SHDR_SIZE_64] {
    let mut sh = [0u8; SHDR_SIZE_64];
    sh[4..8].copy_from_slice(&sh_type.to_le_bytes());
    sh[24..32].copy_from_slice(&offset.to_le_bytes());
    sh[32..40].copy_from_slice(&size.to_le_bytes());
    sh[40..44].copy_from_slice(&link.to_le_bytes());
    sh[48..56].copy_from_slice(&1u64.to_le_bytes());
    sh[56..64].copy_from_slice(&entsize.to_le_bytes());
    sh
}
