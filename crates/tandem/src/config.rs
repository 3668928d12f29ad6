//! Run configuration and mode policy.

use std::fmt;
use std::path::PathBuf;

use tandem_platform::{DEFAULT_RAM_SIZE, DEFAULT_ROM_SIZE};

/// Leading token selecting [`RunMode::JustRun`].
pub const JUST_RUN_FLAG: &str = "--just-run";
/// Leading token selecting [`RunMode::JustTrace`].
pub const JUST_TRACE_FLAG: &str = "--just-trace";

/// Main clock period of the platform in nanoseconds.
pub const DEFAULT_CLOCK_PERIOD_NS: f64 = 10.0;
/// Performance report artifact.
pub const DEFAULT_PERF_REPORT: &str = "verilator/Proc.perfmon.txt";
/// ISA string handed to the golden model.
pub const DEFAULT_ISA: &str = "rv64imafdc";

/// How retired instructions are verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// No verification; the device stops tagging packets.
    JustRun,
    /// Print every packet without checking it.
    JustTrace,
    /// Lock-step comparison against the golden model.
    #[default]
    TandemVerify,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JustRun => write!(f, "just-run"),
            Self::JustTrace => write!(f, "just-trace"),
            Self::TandemVerify => write!(f, "tandem-verify"),
        }
    }
}

/// Split the mode token off the front of the argument list.
///
/// Only the first token is inspected and at most one mode token is consumed.
/// Everything else is returned untouched as the workload's arguments.
pub fn resolve_mode(mut tokens: Vec<String>) -> (RunMode, Vec<String>) {
    let mode = match tokens.first().map(String::as_str) {
        Some(JUST_RUN_FLAG) => RunMode::JustRun,
        Some(JUST_TRACE_FLAG) => RunMode::JustTrace,
        _ => return (RunMode::TandemVerify, tokens),
    };
    tokens.remove(0);
    (mode, tokens)
}

/// Everything a run needs, fixed before the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    /// Workload argument vector, HTIF options first.
    pub htif_args: Vec<String>,
    pub mode: RunMode,
    pub ram_size: u64,
    pub rom_size: u64,
    pub clock_period_ns: f64,
    pub perf_report: PathBuf,
    pub isa: String,
}

impl RunConfiguration {
    /// Configuration from raw tokens with every other setting at its default.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let (mode, htif_args) = resolve_mode(tokens);
        Self {
            htif_args,
            mode,
            ram_size: DEFAULT_RAM_SIZE,
            rom_size: DEFAULT_ROM_SIZE,
            clock_period_ns: DEFAULT_CLOCK_PERIOD_NS,
            perf_report: PathBuf::from(DEFAULT_PERF_REPORT),
            isa: DEFAULT_ISA.to_string(),
        }
    }
}

/// Parse a byte size: decimal, `0x` hex, or decimal with a `K`, `M` or `G`
/// suffix (binary multiples).
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_err(|e| format!("invalid size '{s}': {e}"));
    }
    let (digits, shift) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 10),
        Some((i, 'm' | 'M')) => (&s[..i], 20),
        Some((i, 'g' | 'G')) => (&s[..i], 30),
        _ => (s, 0),
    };
    let value: u64 = digits
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size '{s}' overflows"))
}
