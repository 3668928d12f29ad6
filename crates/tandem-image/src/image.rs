//! Workload image with loadable segments.

use std::path::Path;

use tracing::debug;

use crate::constants::*;
use crate::file::{ElfClass, ElfFile, Symbol};
use crate::{ImageError, Result};

/// A loadable segment.
///
/// `data` holds the file bytes only; anything between `data.len()` and
/// `memsz` is BSS and must be zero-filled by the loader.
#[derive(Clone, Debug)]
pub struct Segment {
    pub vaddr: u64,
    pub memsz: u64,
    pub data: Vec<u8>,
    pub flags: u32,
}

impl Segment {
    /// Size of file data (non-BSS).
    pub fn filesz(&self) -> u64 {
        self.data.len() as u64
    }

    /// Size of the zero-filled tail.
    pub fn bss_size(&self) -> u64 {
        self.memsz - self.filesz()
    }

    /// First address past the segment.
    pub fn end(&self) -> u64 {
        self.vaddr + self.memsz
    }

    pub fn is_executable(&self) -> bool {
        (self.flags & PF_X) != 0
    }
}

/// Workload image ready to be written into target memory.
#[derive(Clone, Debug)]
pub struct WorkloadImage {
    pub class: ElfClass,
    pub entry_point: u64,
    pub e_flags: u32,
    pub segments: Vec<Segment>,
    symbols: Vec<Symbol>,
}

impl WorkloadImage {
    /// Parse a workload image from raw ELF bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let elf = ElfFile::parse(data)?;
        let segments = load_segments(&elf, data)?;
        debug!(
            xlen = elf.header.class.xlen(),
            entry = format_args!("{:#x}", elf.header.entry),
            segments = segments.len(),
            symbols = elf.symbols.len(),
            "parsed workload image"
        );

        Ok(Self {
            class: elf.header.class,
            entry_point: elf.header.entry,
            e_flags: elf.header.flags,
            segments,
            symbols: elf.symbols,
        })
    }

    /// Read and parse a workload image from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&data)
    }

    /// Register width of the workload.
    pub fn xlen(&self) -> u8 {
        self.class.xlen()
    }

    /// Look up a symbol address by name.
    pub fn lookup_symbol(&self, name: &str) -> Option<u64> {
        self.symbols
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.value)
    }

    /// Address of the HTIF `tohost` word, if the image exports one.
    pub fn tohost(&self) -> Option<u64> {
        self.lookup_symbol(TOHOST_SYMBOL)
    }

    /// Address of the HTIF `fromhost` word, if the image exports one.
    pub fn fromhost(&self) -> Option<u64> {
        self.lookup_symbol(FROMHOST_SYMBOL)
    }

    /// Total bytes occupied in target memory, BSS included.
    pub fn total_size(&self) -> u64 {
        self.segments.iter().map(|s| s.memsz).sum()
    }
}

fn load_segments(elf: &ElfFile, data: &[u8]) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();

    for phdr in &elf.program_headers {
        if phdr.p_type != PT_LOAD || phdr.memsz == 0 {
            continue;
        }
        if phdr.filesz > phdr.memsz {
            return Err(ImageError::SegmentBeyondFile);
        }
        let start = usize::try_from(phdr.offset).map_err(|_| ImageError::SegmentBeyondFile)?;
        let len = usize::try_from(phdr.filesz).map_err(|_| ImageError::SegmentBeyondFile)?;
        let bytes = start
            .checked_add(len)
            .and_then(|end| data.get(start..end))
            .ok_or(ImageError::SegmentBeyondFile)?;
        if phdr.vaddr.checked_add(phdr.memsz).is_none() {
            return Err(ImageError::VirtualAddressOverflow);
        }

        // Bare-metal workloads are linked physical == virtual; prefer paddr
        // when the two differ since the platform loads physical memory.
        let vaddr = if phdr.paddr != 0 { phdr.paddr } else { phdr.vaddr };
        segments.push(Segment {
            vaddr,
            memsz: phdr.memsz,
            data: bytes.to_vec(),
            flags: phdr.flags,
        });
    }

    if segments.is_empty() {
        return Err(ImageError::NoLoadableSegments);
    }
    if segments.len() > MAX_SEGMENTS {
        return Err(ImageError::TooManySegments);
    }

    for (i, a) in segments.iter().enumerate() {
        for b in segments.iter().skip(i + 1) {
            if a.vaddr < b.end() && b.vaddr < a.end() {
                return Err(ImageError::OverlappingSegments);
            }
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ElfBuilder;

    #[test]
    fn test_parse_single_segment() {
        let code = [0x13, 0x00, 0x00, 0x00]; // nop
        let bytes = ElfBuilder::new(0x8000_0000).segment(0x8000_0000, &code).build();

        let image = WorkloadImage::parse(&bytes).unwrap();
        assert_eq!(image.xlen(), 64);
        assert_eq!(image.entry_point, 0x8000_0000);
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].data, code);
        assert!(image.segments[0].is_executable());
        assert_eq!(image.tohost(), None);
    }

    #[test]
    fn test_bss_tail() {
        let bytes = ElfBuilder::new(0x8000_0000)
            .segment_with_bss(0x8000_0000, &[1, 2, 3, 4], 0x100)
            .build();

        let image = WorkloadImage::parse(&bytes).unwrap();
        let seg = &image.segments[0];
        assert_eq!(seg.filesz(), 4);
        assert_eq!(seg.bss_size(), 0xfc);
        assert_eq!(image.total_size(), 0x100);
    }

    #[test]
    fn test_htif_symbols() {
        let bytes = ElfBuilder::new(0x8000_0000)
            .segment(0x8000_0000, &[0; 16])
            .symbol("tohost", 0x8000_1000)
            .symbol("fromhost", 0x8000_1040)
            .build();

        let image = WorkloadImage::parse(&bytes).unwrap();
        assert_eq!(image.tohost(), Some(0x8000_1000));
        assert_eq!(image.fromhost(), Some(0x8000_1040));
        assert_eq!(image.lookup_symbol("missing"), None);
    }

    #[test]
    fn test_overlapping_segments_rejected() {
        let bytes = ElfBuilder::new(0x8000_0000)
            .segment(0x8000_0000, &[0; 32])
            .segment(0x8000_0010, &[0; 32])
            .build();

        assert!(matches!(
            WorkloadImage::parse(&bytes),
            Err(ImageError::OverlappingSegments)
        ));
    }

    #[test]
    fn test_no_loadable_segments() {
        let bytes = ElfBuilder::new(0x8000_0000).build();
        assert!(matches!(
            WorkloadImage::parse(&bytes),
            Err(ImageError::NoLoadableSegments)
        ));
    }

    #[test]
    fn test_truncated_segment_rejected() {
        let mut bytes = ElfBuilder::new(0x8000_0000)
            .segment(0x8000_0000, &[0; 64])
            .build();
        bytes.truncate(bytes.len() - 8);
        assert!(matches!(
            WorkloadImage::parse(&bytes),
            Err(ImageError::SegmentBeyondFile)
        ));
    }

    #[test]
    fn test_non_riscv_rejected() {
        let mut bytes = ElfBuilder::new(0).segment(0, &[0; 4]).build();
        bytes[18..20].copy_from_slice(&62u16.to_le_bytes()); // x86-64
        assert!(matches!(
            WorkloadImage::parse(&bytes),
            Err(ImageError::NotRiscv(62))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = WorkloadImage::load(&dir.path().join("nope.elf")).unwrap_err();
        assert!(matches!(err, ImageError::Io { .. }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prog.elf");
        ElfBuilder::new(0x8000_0000)
            .segment(0x8000_0000, &[0x6f, 0, 0, 0])
            .write_to(&path)
            .unwrap();
        let image = WorkloadImage::load(&path).unwrap();
        assert_eq!(image.entry_point, 0x8000_0000);
    }
}
