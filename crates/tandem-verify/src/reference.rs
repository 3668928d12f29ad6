//! Reference models for golden-model verification.
//!
//! The default model runs Spike with `--log-commits` and streams its commit
//! log through a pipe, one retired instruction per step.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, info};

use crate::commit_log::parse_commit_line;
use crate::packet::VerificationPacket;
use crate::{Result, VerifyError};

/// Base address of the RAM window the reference model mirrors.
pub const REFERENCE_RAM_BASE: u64 = 0x8000_0000;

/// A reference simulator that can be stepped one retired instruction at a time.
pub trait ReferenceModel: Send {
    /// Retire one instruction and return its effects, or `None` once finished.
    fn step(&mut self) -> Option<VerificationPacket>;

    /// Human-readable model name for reports.
    fn name(&self) -> &str;

    /// Instructions retired so far.
    fn instret(&self) -> u64;
}

/// Options for launching Spike.
#[derive(Debug, Clone)]
pub struct SpikeOptions {
    /// Spike executable.
    pub program: PathBuf,
    /// `--isa` string.
    pub isa: String,
    /// RAM size mirrored from the platform.
    pub ram_size: u64,
}

impl SpikeOptions {
    pub fn new(isa: impl Into<String>, ram_size: u64) -> Self {
        Self {
            program: find_spike().unwrap_or_else(|| PathBuf::from("spike")),
            isa: isa.into(),
            ram_size,
        }
    }

    /// Command-line arguments for Spike, workload arguments last.
    pub fn command_args(&self, htif_args: &[String]) -> Vec<String> {
        let mut args = vec![
            format!("--isa={}", self.isa),
            format!("-m0x{:x}:0x{:x}", REFERENCE_RAM_BASE, self.ram_size),
            "--log-commits".to_string(),
            "--log=/dev/stdout".to_string(),
        ];
        args.extend(htif_args.iter().cloned());
        args
    }
}

/// Spike process driven as a golden model.
pub struct SpikeModel {
    child: Child,
    reader: BufReader<ChildStdout>,
    instret: u64,
    finished: bool,
}

impl SpikeModel {
    /// Start Spike on the same workload arguments the device runs.
    pub fn start(options: &SpikeOptions, htif_args: &[String]) -> Result<Self> {
        let args = options.command_args(htif_args);
        info!(program = %options.program.display(), args = ?args, "starting golden model");

        let mut child = Command::new(&options.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| VerifyError::Spawn {
                program: options.program.clone(),
                source,
            })?;
        let stdout = child.stdout.take().ok_or(VerifyError::NoOutput)?;

        Ok(Self {
            child,
            reader: BufReader::new(stdout),
            instret: 0,
            finished: false,
        })
    }

    fn read_next(&mut self) -> Option<VerificationPacket> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {
                    if let Some(packet) = parse_commit_line(&line) {
                        return Some(packet);
                    }
                }
            }
        }
    }
}

impl ReferenceModel for SpikeModel {
    fn step(&mut self) -> Option<VerificationPacket> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Some(packet) => {
                self.instret += 1;
                Some(packet)
            }
            None => {
                debug!(instret = self.instret, "golden model finished");
                self.finished = true;
                None
            }
        }
    }

    fn name(&self) -> &str {
        "spike"
    }

    fn instret(&self) -> u64 {
        self.instret
    }
}

impl Drop for SpikeModel {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Find the Spike executable in PATH.
pub fn find_spike() -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join("spike"))
            .find(|path| path.is_file())
    })
}

/// Reference model replaying a fixed packet sequence.
///
/// Used when the expected trace is already known, e.g. a recorded commit log.
pub struct ReplayModel {
    packets: std::vec::IntoIter<VerificationPacket>,
    instret: u64,
}

impl ReplayModel {
    pub fn new(packets: Vec<VerificationPacket>) -> Self {
        Self {
            packets: packets.into_iter(),
            instret: 0,
        }
    }

    /// Build a replay model from commit-log text.
    pub fn from_commit_log(log: &str) -> Self {
        Self::new(log.lines().filter_map(parse_commit_line).collect())
    }
}

impl ReferenceModel for ReplayModel {
    fn step(&mut self) -> Option<VerificationPacket> {
        let packet = self.packets.next()?;
        self.instret += 1;
        Some(packet)
    }

    fn name(&self) -> &str {
        "replay"
    }

    fn instret(&self) -> u64 {
        self.instret
    }
}
