//! Raw ELF file parser.
//!
//! Handles both ELF32 and ELF64 at runtime; every address and size is widened
//! to `u64` so callers never care about the class.

use crate::constants::*;
use crate::{ImageError, Result};

/// ELF class of a parsed file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    /// Register width in bits.
    pub const fn xlen(self) -> u8 {
        match self {
            Self::Elf32 => 32,
            Self::Elf64 => 64,
        }
    }
}

/// Bounds-checked little-endian reader over the file bytes.
#[derive(Clone, Copy)]
struct Reader<'a> {
    data: &'a [u8],
    class: ElfClass,
}

impl<'a> Reader<'a> {
    fn bytes<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        let end = offset.checked_add(N)?;
        self.data.get(offset..end)?.try_into().ok()
    }

    fn u16(&self, offset: usize) -> Option<u16> {
        self.bytes(offset).map(u16::from_le_bytes)
    }

    fn u32(&self, offset: usize) -> Option<u32> {
        self.bytes(offset).map(u32::from_le_bytes)
    }

    fn u64(&self, offset: usize) -> Option<u64> {
        self.bytes(offset).map(u64::from_le_bytes)
    }

    /// Read a class-sized word (4 bytes for ELF32, 8 for ELF64).
    fn word(&self, offset: usize) -> Option<u64> {
        match self.class {
            ElfClass::Elf32 => self.u32(offset).map(u64::from),
            ElfClass::Elf64 => self.u64(offset),
        }
    }

    fn c_str(&self, offset: usize) -> String {
        let Some(tail) = self.data.get(offset..) else {
            return String::new();
        };
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        String::from_utf8_lossy(&tail[..end]).into_owned()
    }
}

/// ELF header fields needed for loading.
#[derive(Clone, Debug)]
pub struct ElfHeader {
    pub class: ElfClass,
    pub e_type: u16,
    pub machine: u16,
    pub entry: u64,
    pub phoff: u64,
    pub shoff: u64,
    pub flags: u32,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
}

/// Program header.
#[derive(Clone, Debug)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub flags: u32,
    pub offset: u64,
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
}

/// Section header (only the fields used for symbol lookup).
#[derive(Clone, Debug)]
pub struct SectionHeader {
    pub sh_type: u32,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub entsize: u64,
}

/// ELF symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub value: u64,
    pub size: u64,
}

/// Parsed ELF file.
#[derive(Clone, Debug)]
pub struct ElfFile {
    pub header: ElfHeader,
    pub program_headers: Vec<ProgramHeader>,
    pub symbols: Vec<Symbol>,
}

impl ElfFile {
    /// Parse an ELF file from raw bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = parse_header(data)?;
        let reader = Reader {
            data,
            class: header.class,
        };
        let program_headers = parse_program_headers(reader, &header)?;
        let sections = parse_sections(reader, &header)?;
        let symbols = parse_symbols(reader, &sections);

        Ok(Self {
            header,
            program_headers,
            symbols,
        })
    }
}

/// Detect the ELF class without parsing the rest of the file.
pub fn elf_class(data: &[u8]) -> Result<ElfClass> {
    if data.len() < 16 {
        return Err(ImageError::TooSmall);
    }
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if magic != ELF_MAGIC {
        return Err(ImageError::InvalidMagic);
    }
    match data[4] {
        ELF_CLASS_32 => Ok(ElfClass::Elf32),
        ELF_CLASS_64 => Ok(ElfClass::Elf64),
        other => Err(ImageError::UnsupportedClass(other)),
    }
}

fn parse_header(data: &[u8]) -> Result<ElfHeader> {
    let class = elf_class(data)?;
    if data[5] != ELF_DATA_LSB {
        return Err(ImageError::NotLittleEndian);
    }
    let min_size = match class {
        ElfClass::Elf32 => EHDR_SIZE_32,
        ElfClass::Elf64 => EHDR_SIZE_64,
    };
    if data.len() < min_size {
        return Err(ImageError::TooSmall);
    }

    let r = Reader { data, class };
    // Offsets past e_entry shift by the word size difference.
    let (entry, phoff, shoff, tail) = match class {
        ElfClass::Elf32 => (r.word(24), r.word(28), r.word(32), 36),
        ElfClass::Elf64 => (r.word(24), r.word(32), r.word(40), 48),
    };
    let header = ElfHeader {
        class,
        e_type: r.u16(16).ok_or(ImageError::TooSmall)?,
        machine: r.u16(18).ok_or(ImageError::TooSmall)?,
        entry: entry.ok_or(ImageError::TooSmall)?,
        phoff: phoff.ok_or(ImageError::TooSmall)?,
        shoff: shoff.ok_or(ImageError::TooSmall)?,
        flags: r.u32(tail).ok_or(ImageError::TooSmall)?,
        phentsize: r.u16(tail + 6).ok_or(ImageError::TooSmall)?,
        phnum: r.u16(tail + 8).ok_or(ImageError::TooSmall)?,
        shentsize: r.u16(tail + 10).ok_or(ImageError::TooSmall)?,
        shnum: r.u16(tail + 12).ok_or(ImageError::TooSmall)?,
    };

    if header.machine != ELF_MACHINE_RISCV {
        return Err(ImageError::NotRiscv(header.machine));
    }
    Ok(header)
}

fn table_offset(base: u64, index: u16, entsize: u16) -> Option<usize> {
    let offset = base.checked_add(u64::from(index) * u64::from(entsize))?;
    usize::try_from(offset).ok()
}

fn parse_program_headers(r: Reader<'_>, header: &ElfHeader) -> Result<Vec<ProgramHeader>> {
    let min_entsize = match r.class {
        ElfClass::Elf32 => PHDR_SIZE_32,
        ElfClass::Elf64 => PHDR_SIZE_64,
    };
    if header.phnum > 0 && usize::from(header.phentsize) < min_entsize {
        return Err(ImageError::ProgramOutOfBounds);
    }

    (0..header.phnum)
        .map(|i| {
            let off = table_offset(header.phoff, i, header.phentsize)
                .ok_or(ImageError::ProgramOutOfBounds)?;
            parse_program_header(r, off).ok_or(ImageError::ProgramOutOfBounds)
        })
        .collect()
}

fn parse_program_header(r: Reader<'_>, off: usize) -> Option<ProgramHeader> {
    match r.class {
        ElfClass::Elf32 => Some(ProgramHeader {
            p_type: r.u32(off)?,
            offset: r.word(off + 4)?,
            vaddr: r.word(off + 8)?,
            paddr: r.word(off + 12)?,
            filesz: r.word(off + 16)?,
            memsz: r.word(off + 20)?,
            flags: r.u32(off + 24)?,
        }),
        ElfClass::Elf64 => Some(ProgramHeader {
            p_type: r.u32(off)?,
            flags: r.u32(off + 4)?,
            offset: r.word(off + 8)?,
            vaddr: r.word(off + 16)?,
            paddr: r.word(off + 24)?,
            filesz: r.word(off + 32)?,
            memsz: r.word(off + 40)?,
        }),
    }
}

fn parse_sections(r: Reader<'_>, header: &ElfHeader) -> Result<Vec<SectionHeader>> {
    // Stripped images may carry no section table at all.
    if header.shoff == 0 || header.shnum == 0 {
        return Ok(Vec::new());
    }
    let min_entsize = match r.class {
        ElfClass::Elf32 => SHDR_SIZE_32,
        ElfClass::Elf64 => SHDR_SIZE_64,
    };
    if usize::from(header.shentsize) < min_entsize {
        return Err(ImageError::SectionOutOfBounds);
    }

    (0..header.shnum)
        .map(|i| {
            let off = table_offset(header.shoff, i, header.shentsize)
                .ok_or(ImageError::SectionOutOfBounds)?;
            parse_section_header(r, off).ok_or(ImageError::SectionOutOfBounds)
        })
        .collect()
}

fn parse_section_header(r: Reader<'_>, off: usize) -> Option<SectionHeader> {
    match r.class {
        ElfClass::Elf32 => Some(SectionHeader {
            sh_type: r.u32(off + 4)?,
            offset: r.word(off + 16)?,
            size: r.word(off + 20)?,
            link: r.u32(off + 24)?,
            entsize: r.word(off + 36)?,
        }),
        ElfClass::Elf64 => Some(SectionHeader {
            sh_type: r.u32(off + 4)?,
            offset: r.word(off + 24)?,
            size: r.word(off + 32)?,
            link: r.u32(off + 40)?,
            entsize: r.word(off + 56)?,
        }),
    }
}

fn parse_symbols(r: Reader<'_>, sections: &[SectionHeader]) -> Vec<Symbol> {
    let Some(symtab) = sections.iter().find(|s| s.sh_type == SHT_SYMTAB) else {
        return Vec::new();
    };
    let Some(strtab) = sections
        .get(symtab.link as usize)
        .filter(|s| s.sh_type == SHT_STRTAB)
    else {
        return Vec::new();
    };

    let min_entsize = match r.class {
        ElfClass::Elf32 => SYM_SIZE_32,
        ElfClass::Elf64 => SYM_SIZE_64,
    } as u64;
    if symtab.entsize < min_entsize {
        return Vec::new();
    }

    let count = symtab.size / symtab.entsize;
    (0..count)
        .filter_map(|i| {
            let off = usize::try_from(symtab.offset + i * symtab.entsize).ok()?;
            parse_symbol(r, off, strtab.offset)
        })
        .filter(|sym| !sym.name.is_empty())
        .collect()
}

fn parse_symbol(r: Reader<'_>, off: usize, strtab_offset: u64) -> Option<Symbol> {
    let name_off = r.u32(off)?;
    let (value, size) = match r.class {
        ElfClass::Elf32 => (r.word(off + 4)?, r.word(off + 8)?),
        ElfClass::Elf64 => (r.word(off + 8)?, r.word(off + 16)?),
    };
    let name_pos = usize::try_from(strtab_offset.checked_add(u64::from(name_off))?).ok()?;
    Some(Symbol {
        name: r.c_str(name_pos),
        value,
        size,
    })
}
