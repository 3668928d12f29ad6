//! Platform collaborators of the tandem harness.
//!
//! The harness drives a processor under test through a small set of
//! traits: [`ClockControl`], [`Platform`], [`ProcControl`], [`PerfMonitor`]
//! and [`ExternalMmio`], bundled by a [`Backend`]. The [`sim`] module
//! provides a backend whose device is a simulator process.

mod backend;
mod host_counters;
mod memory;
pub mod mmio;
mod perf;
mod platform;
mod proc;
pub mod sim;

pub use backend::Backend;
pub use host_counters::PerfCounters;
pub use memory::{DEFAULT_RAM_SIZE, DEFAULT_ROM_SIZE, MemoryRegion, RAM_BASE, ROM_BASE};
pub use mmio::{ConsoleMmio, ExternalMmio, MmioRequest, MmioResponse};
pub use perf::{HostPerfMonitor, PerfMonitor, PerformanceReport, RunCounters};
pub use platform::{ClockControl, ClockGrant, Platform};
pub use proc::{Launch, ProcControl, ProcEvent, VerificationPacketConfig};

use std::path::PathBuf;

use thiserror::Error;

/// Platform and transport errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("platform not initialized")]
    NotInitialized,
    #[error("platform already initialized")]
    AlreadyInitialized,
    #[error("access of {len} bytes at {addr:#x} is outside RAM and ROM")]
    OutOfRange { addr: u64, len: u64 },
    #[error("memory region of {0:#x} bytes cannot be allocated")]
    RegionTooLarge(u64),
    #[error("processor already started")]
    AlreadyStarted,
    #[error("processor not started")]
    NotStarted,
    #[error("failed to start simulator {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlatformError>;
