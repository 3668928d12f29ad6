//! CLI definitions.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    DEFAULT_CLOCK_PERIOD_NS, DEFAULT_ISA, DEFAULT_PERF_REPORT, RunConfiguration, parse_size,
    resolve_mode,
};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(about = "Run a workload on a processor under test with tandem verification")]
#[command(override_usage = "tandem [OPTIONS] [--just-run | --just-trace] HTIF_ARGS...")]
#[command(after_help = "\
Modes (first workload token only):
  --just-run    run without verification
  --just-trace  print every verification packet
  (none)        lock-step verification against the golden model")]
pub struct Cli {
    /// RAM size attached to the processor (accepts K/M/G suffixes and 0x hex)
    #[arg(long, env = "TANDEM_RAM_SIZE", default_value = "64M", value_parser = parse_size)]
    pub ram_size: u64,

    /// ROM size of the uncached region
    #[arg(long, env = "TANDEM_ROM_SIZE", default_value = "64K", value_parser = parse_size)]
    pub rom_size: u64,

    /// Main clock period in nanoseconds
    #[arg(long, env = "TANDEM_CLOCK_PERIOD_NS", default_value_t = DEFAULT_CLOCK_PERIOD_NS)]
    pub clock_period: f64,

    /// Performance report artifact
    #[arg(long, env = "TANDEM_PERF_REPORT", default_value = DEFAULT_PERF_REPORT)]
    pub perf_report: PathBuf,

    /// Simulator command running the processor under test
    #[arg(long, env = "TANDEM_DUT", default_value = tandem_platform::sim::DEFAULT_SIM_COMMAND)]
    pub dut: String,

    /// ISA string for the golden model
    #[arg(long, env = "TANDEM_ISA", default_value = DEFAULT_ISA)]
    pub isa: String,

    /// Show metrics summary after execution
    #[arg(long)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, conflicts_with = "verbose")]
    pub silent: bool,

    /// Mode flag, HTIF options, workload ELF and its arguments
    #[arg(value_name = "HTIF_ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Resolve the mode token and freeze the run configuration.
    pub fn run_configuration(&self) -> RunConfiguration {
        let (mode, htif_args) = resolve_mode(self.args.clone());
        RunConfiguration {
            htif_args,
            mode,
            ram_size: self.ram_size,
            rom_size: self.rom_size,
            clock_period_ns: self.clock_period,
            perf_report: self.perf_report.clone(),
            isa: self.isa.clone(),
        }
    }
}
