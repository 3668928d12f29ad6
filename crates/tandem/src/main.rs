//! tandem CLI

use clap::Parser;
use tandem::cli::{Cli, EXIT_FAILURE};
use tandem::{Harness, InterruptWatcher, terminal};
use tandem_platform::sim::{SimBackend, SimCommand};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        tandem::metrics::CliRecorder::new().install()
    } else {
        None
    };
    tandem::metrics::init();

    let default_level = if cli.verbose {
        "tandem=debug"
    } else if cli.silent {
        "tandem=error"
    } else {
        "tandem=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let exit_code = run(&cli);

    if let Some(handle) = metrics_handle {
        handle.print_summary();
    }
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> i32 {
    // Must precede every other thread so they inherit the blocked mask.
    let watcher = match InterruptWatcher::install() {
        Ok(watcher) => watcher,
        Err(e) => {
            terminal::error(&format!("Failed to install interrupt handler: {e}"));
            return EXIT_FAILURE;
        }
    };

    let config = cli.run_configuration();
    let Some(command) = SimCommand::parse(&cli.dut) else {
        terminal::error("Empty --dut command");
        return EXIT_FAILURE;
    };

    let mut harness = Harness::new(SimBackend::new(command), &config, watcher.slot().clone());
    match harness.run() {
        Ok(summary) => {
            tandem::metrics::record_run(&summary);
            summary.outcome
        }
        Err(e) => {
            terminal::error(&format!("Run could not start: {e}"));
            EXIT_FAILURE
        }
    }
}
