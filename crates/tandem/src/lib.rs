//! tandem - host-side driver for tandem-verified processor test runs
//!
//! Brings up a processor under test, runs a workload on it through the
//! Host-Target Interface and cross-checks every retired instruction with the
//! selected verification strategy.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tandem::{Harness, RunConfiguration, VerificationSlot};
//! use tandem_platform::sim::{SimBackend, SimCommand};
//!
//! let config = RunConfiguration::from_tokens(vec!["--just-run".into(), "prog.elf".into()]);
//! let backend = SimBackend::new(SimCommand::parse("my-sim --commits").unwrap());
//! let summary = Harness::new(backend, &config, Arc::new(VerificationSlot::new())).run()?;
//! std::process::exit(summary.outcome);
//! ```

pub mod cli;
pub mod clock;
pub mod config;
mod error;
pub mod harness;
pub mod htif;
pub mod interrupt;
pub mod metrics;
pub mod report;
pub mod terminal;

pub use clock::{ClockNegotiation, negotiate};
pub use config::{RunConfiguration, RunMode, resolve_mode};
pub use error::{HarnessError, HtifError, Result};
pub use harness::{Harness, RunState, RunSummary};
pub use htif::{Htif, HtifArgs};
pub use interrupt::{InterruptWatcher, VerificationSlot, on_interrupt};
