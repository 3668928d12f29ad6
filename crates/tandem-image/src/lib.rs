//! Workload image loader for the tandem harness.
//!
//! Parses RISC-V ELF32/ELF64 executables into loadable segments and exposes
//! the HTIF `tohost`/`fromhost` symbols the run driver needs.

mod constants;
mod file;
mod image;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use constants::*;
pub use file::{ElfClass, ElfFile, Symbol, elf_class};
pub use image::{Segment, WorkloadImage};

use std::path::PathBuf;

use thiserror::Error;

/// Workload image errors.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("ELF data too small")]
    TooSmall,
    #[error("Invalid ELF magic number")]
    InvalidMagic,
    #[error("Only little-endian ELF supported")]
    NotLittleEndian,
    #[error("Unsupported ELF class: {0}")]
    UnsupportedClass(u8),
    #[error("Not a RISC-V executable (e_machine {0})")]
    NotRiscv(u16),
    #[error("Section header out of bounds")]
    SectionOutOfBounds,
    #[error("Program header out of bounds")]
    ProgramOutOfBounds,
    #[error("Segment extends beyond file")]
    SegmentBeyondFile,
    #[error("Virtual address overflow")]
    VirtualAddressOverflow,
    #[error("No loadable segments found")]
    NoLoadableSegments,
    #[error("Too many loadable segments")]
    TooManySegments,
    #[error("Overlapping virtual address ranges")]
    OverlappingSegments,
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ImageError>;
