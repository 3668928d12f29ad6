//! External MMIO bridge.
//!
//! Device loads and stores outside RAM and ROM are forwarded to the host and
//! answered by an [`ExternalMmio`] implementation.

use std::io::{self, Write};

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// Console data register: a byte written here is printed.
pub const CONSOLE_DATA: u64 = 0x6000_0000;
/// Console status register: always reads as ready.
pub const CONSOLE_STATUS: u64 = 0x6000_0008;
/// Scratch register file base.
pub const SCRATCH_BASE: u64 = 0x6000_1000;
/// Scratch register file size in bytes.
pub const SCRATCH_SIZE: u64 = 0x1000;

/// One MMIO access from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioRequest {
    pub addr: u64,
    /// Access width in bytes.
    pub size: u8,
    /// Stored data; `None` for loads.
    pub write: Option<u64>,
}

/// Host answer to an [`MmioRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmioResponse {
    /// Loaded data (zero for stores).
    pub data: u64,
    /// False if the address is not backed by any device.
    pub mapped: bool,
}

/// Bridge serving external MMIO requests.
pub trait ExternalMmio: Send {
    fn request(&mut self, req: MmioRequest) -> MmioResponse;
}

/// Parse a request line of the form `mmio rd <addr> <size>` or
/// `mmio wr <addr> <size> <data>`.
pub fn parse_mmio_line(line: &str) -> Option<MmioRequest> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "mmio" {
        return None;
    }
    let op = fields.next()?;
    let addr = parse_number(fields.next()?)?;
    let size = u8::try_from(parse_number(fields.next()?)?).ok()?;
    if !matches!(size, 1 | 2 | 4 | 8) {
        return None;
    }
    let write = match op {
        "rd" => None,
        "wr" => Some(parse_number(fields.next()?)?),
        _ => return None,
    };
    Some(MmioRequest { addr, size, write })
}

fn parse_number(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

fn size_mask(size: u8) -> u64 {
    if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (u32::from(size) * 8)) - 1
    }
}

/// Byte console plus a small scratch register file.
pub struct ConsoleMmio {
    out: Box<dyn Write + Send>,
    scratch: FxHashMap<u64, u64>,
    requests: u64,
    unmapped: u64,
}

impl ConsoleMmio {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            scratch: FxHashMap::default(),
            requests: 0,
            unmapped: 0,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Requests to addresses no device answers.
    pub fn unmapped(&self) -> u64 {
        self.unmapped
    }

    fn putchar(&mut self, byte: u8) {
        if let Err(e) = self.out.write_all(&[byte]).and_then(|()| self.out.flush()) {
            warn!(error = %e, "console write failed");
        }
    }
}

impl ExternalMmio for ConsoleMmio {
    fn request(&mut self, req: MmioRequest) -> MmioResponse {
        self.requests += 1;
        let mask = size_mask(req.size);

        match (req.addr, req.write) {
            (CONSOLE_DATA, Some(data)) => {
                self.putchar((data & 0xff) as u8);
                MmioResponse { data: 0, mapped: true }
            }
            (CONSOLE_DATA, None) => MmioResponse { data: 0, mapped: true },
            (CONSOLE_STATUS, None) => MmioResponse { data: 1, mapped: true },
            (addr, write) if (SCRATCH_BASE..SCRATCH_BASE + SCRATCH_SIZE).contains(&addr) => {
                match write {
                    Some(data) => {
                        self.scratch.insert(addr, data & mask);
                        MmioResponse { data: 0, mapped: true }
                    }
                    None => MmioResponse {
                        data: self.scratch.get(&addr).copied().unwrap_or(0) & mask,
                        mapped: true,
                    },
                }
            }
            (addr, write) => {
                self.unmapped += 1;
                debug!(addr = format_args!("{addr:#x}"), store = write.is_some(), "unmapped mmio access");
                MmioResponse { data: 0, mapped: false }
            }
        }
    }
}

impl std::fmt::Debug for ConsoleMmio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleMmio")
            .field("requests", &self.requests)
            .field("unmapped", &self.unmapped)
            .finish_non_exhaustive()
    }
}
