//! Host-Target Interface run driver.
//!
//! Loads the workload named in the HTIF arguments into the platform, starts
//! the processor and services `tohost` requests until the target exits.

use std::io::{self, Write};
use std::path::PathBuf;

use tandem_image::WorkloadImage;
use tandem_platform::{Launch, Platform, ProcControl, ProcEvent};
use tracing::{debug, error, info, warn};

use crate::cli::EXIT_FAILURE;
use crate::error::HtifError;

/// `tohost` address used when the image has no `tohost` symbol.
pub const DEFAULT_TOHOST: u64 = 0x8000_1000;
/// `fromhost` address used when the image has no `fromhost` symbol.
pub const DEFAULT_FROMHOST: u64 = 0x8000_1008;

const DEVICE_SYSCALL: u8 = 0;
const DEVICE_CONSOLE: u8 = 1;
const CONSOLE_PUTCHAR: u8 = 1;

/// HTIF argument vector split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtifArgs {
    /// Leading `+`/`-` options.
    pub options: Vec<String>,
    /// Workload ELF.
    pub program: Option<PathBuf>,
    /// Arguments passed to the workload.
    pub target_args: Vec<String>,
}

impl HtifArgs {
    pub fn parse(args: &[String]) -> Self {
        let split = args
            .iter()
            .position(|a| !(a.starts_with('+') || a.starts_with('-')))
            .unwrap_or(args.len());
        let (options, rest) = args.split_at(split);
        Self {
            options: options.to_vec(),
            program: rest.first().map(PathBuf::from),
            target_args: rest.iter().skip(1).cloned().collect(),
        }
    }
}

/// Decoded `tohost` write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRequest {
    /// Target finished with an exit code.
    Exit(i32),
    /// Byte for the host console.
    Putchar(u8),
    /// Anything this driver does not service.
    Other { device: u8, command: u8, payload: u64 },
}

/// Decode a `tohost` value: device in bits 63:56, command in 55:48,
/// payload below.
pub fn decode_tohost(value: u64) -> HostRequest {
    let device = (value >> 56) as u8;
    let command = (value >> 48) as u8;
    let payload = value & 0xffff_ffff_ffff;
    match (device, command) {
        (DEVICE_SYSCALL, 0) if payload & 1 == 1 => HostRequest::Exit((payload >> 1) as i32),
        (DEVICE_CONSOLE, CONSOLE_PUTCHAR) => HostRequest::Putchar(payload as u8),
        _ => HostRequest::Other {
            device,
            command,
            payload,
        },
    }
}

/// Drives one workload to completion.
pub struct Htif<'a, C: ProcControl + ?Sized, P: Platform + ?Sized> {
    args: HtifArgs,
    raw_args: Vec<String>,
    proc_control: &'a mut C,
    platform: &'a mut P,
    console: Box<dyn Write + 'a>,
}

impl<'a, C: ProcControl + ?Sized, P: Platform + ?Sized> Htif<'a, C, P> {
    pub fn new(htif_args: &[String], proc_control: &'a mut C, platform: &'a mut P) -> Self {
        Self {
            args: HtifArgs::parse(htif_args),
            raw_args: htif_args.to_vec(),
            proc_control,
            platform,
            console: Box::new(io::stdout()),
        }
    }

    /// Send console output somewhere other than stdout.
    pub fn with_console(mut self, console: Box<dyn Write + 'a>) -> Self {
        self.console = console;
        self
    }

    /// Load and run the workload. Returns its exit code; any failure to load
    /// or drive it is logged and reported as 1.
    pub fn run(&mut self) -> i32 {
        match self.try_run() {
            Ok(code) => code,
            Err(e) => {
                error!(error = %e, "workload run failed");
                EXIT_FAILURE
            }
        }
    }

    fn try_run(&mut self) -> Result<i32, HtifError> {
        for option in &self.args.options {
            debug!(option, "ignoring HTIF option");
        }
        let program = self.args.program.clone().ok_or(HtifError::NoProgram)?;
        let image = WorkloadImage::load(&program)?;
        info!(
            program = %program.display(),
            entry = format_args!("{:#x}", image.entry_point),
            segments = image.segments.len(),
            target_args = ?self.args.target_args,
            "loading workload"
        );
        let launch = self.load(&image)?;

        self.proc_control.start(&launch)?;
        loop {
            match self.proc_control.poll()? {
                ProcEvent::Progress => {}
                ProcEvent::Halted(code) => {
                    info!(code, "processor halted");
                    return Ok(code);
                }
                ProcEvent::ToHost(value) => {
                    if let Some(code) = self.service(value)? {
                        info!(code, "target exited");
                        return Ok(code);
                    }
                }
            }
        }
    }

    fn load(&mut self, image: &WorkloadImage) -> Result<Launch, HtifError> {
        for segment in &image.segments {
            debug!(
                vaddr = format_args!("{:#x}", segment.vaddr),
                filesz = segment.filesz(),
                memsz = segment.memsz,
                "loading segment"
            );
            self.platform.write_memory(segment.vaddr, &segment.data)?;
            if segment.bss_size() > 0 {
                self.platform
                    .zero_memory(segment.vaddr + segment.filesz(), segment.bss_size())?;
            }
        }
        Ok(Launch {
            entry: image.entry_point,
            tohost: image.tohost().unwrap_or(DEFAULT_TOHOST),
            fromhost: image.fromhost().unwrap_or(DEFAULT_FROMHOST),
            args: self.raw_args.clone(),
        })
    }

    /// Service one `tohost` write; `Some(code)` once the target exits.
    fn service(&mut self, value: u64) -> Result<Option<i32>, HtifError> {
        match decode_tohost(value) {
            HostRequest::Exit(code) => return Ok(Some(code)),
            HostRequest::Putchar(byte) => {
                if let Err(e) = self.console.write_all(&[byte]).and_then(|()| self.console.flush()) {
                    warn!(error = %e, "console write failed");
                }
                let ack = (u64::from(DEVICE_CONSOLE) << 56) | (u64::from(CONSOLE_PUTCHAR) << 48);
                self.proc_control.set_fromhost(ack)?;
            }
            HostRequest::Other {
                device,
                command,
                payload,
            } => {
                warn!(
                    device,
                    command,
                    payload = format_args!("{payload:#x}"),
                    "unsupported tohost request"
                );
            }
        }
        Ok(None)
    }
}
