//! SIGINT handling.
//!
//! SIGINT is blocked on the main thread and received synchronously by a
//! watcher thread, so the status dump runs as ordinary code rather than in
//! signal-handler context. The watcher sees only the [`VerificationSlot`].
//! It never holds stderr while waiting on verifier state.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use nix::sys::signal::{SigSet, Signal};
use tandem_verify::Verification;
use tracing::debug;

use crate::cli::EXIT_FAILURE;
use crate::error::Result;
use crate::harness::RunState;

/// Printed when the run is interrupted.
pub const INTERRUPT_NOTICE: &str = "\n>> Ctrl-C: Exiting...";

/// The run's verification handle, published once it is fully built, and the
/// run state shared with the interrupt watcher.
#[derive(Debug)]
pub struct VerificationSlot {
    verification: OnceLock<Arc<Verification>>,
    state: AtomicU64,
}

impl Default for VerificationSlot {
    fn default() -> Self {
        Self {
            verification: OnceLock::new(),
            state: AtomicU64::new(RunState::Uninitialized.to_bits()),
        }
    }
}

impl VerificationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        RunState::from_bits(self.state.load(Ordering::Acquire))
    }

    /// Move the run to `next`. `Interrupted` is terminal and is never left.
    /// Returns the state in effect afterwards.
    pub fn advance(&self, next: RunState) -> RunState {
        let result = self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            (RunState::from_bits(bits) != RunState::Interrupted).then(|| next.to_bits())
        });
        match result {
            Ok(_) => next,
            Err(_) => RunState::Interrupted,
        }
    }

    /// Enter `Interrupted`, returning the state the run was in.
    pub fn interrupt(&self) -> RunState {
        RunState::from_bits(
            self.state
                .swap(RunState::Interrupted.to_bits(), Ordering::AcqRel),
        )
    }

    /// Publish the handle. Only the first call has an effect.
    pub fn install(&self, verification: Arc<Verification>) -> bool {
        self.verification.set(verification).is_ok()
    }

    pub fn get(&self) -> Option<&Arc<Verification>> {
        self.verification.get()
    }
}

/// Interrupt path: marks the run `Interrupted`, then writes the notice plus
/// verification status if one is installed. No banner and no performance
/// data. Returns the exit code.
pub fn on_interrupt(slot: &VerificationSlot, out: &mut dyn Write) -> i32 {
    let previous = slot.interrupt();
    debug!(?previous, "run interrupted");
    let _ = writeln!(out, "{INTERRUPT_NOTICE}");
    if let Some(verification) = slot.get() {
        let _ = verification.write_status(out);
    }
    let _ = out.flush();
    EXIT_FAILURE
}

/// Background thread turning SIGINT into [`on_interrupt`] and process exit.
#[derive(Debug)]
pub struct InterruptWatcher {
    slot: Arc<VerificationSlot>,
}

impl InterruptWatcher {
    /// Block SIGINT on the calling thread and start the watcher.
    ///
    /// Call before spawning any other thread so they inherit the mask.
    pub fn install() -> Result<Self> {
        let slot = Arc::new(VerificationSlot::new());
        let mut set = SigSet::empty();
        set.add(Signal::SIGINT);
        set.thread_block()?;

        let watched = Arc::clone(&slot);
        thread::Builder::new()
            .name("sigint-watcher".to_string())
            .spawn(move || {
                if let Ok(signal) = set.wait() {
                    debug!(%signal, "interrupt received");
                    let mut report = Vec::new();
                    let code = on_interrupt(&watched, &mut report);
                    let mut stderr = io::stderr().lock();
                    let _ = stderr.write_all(&report);
                    let _ = stderr.flush();
                    std::process::exit(code);
                }
            })?;
        Ok(Self { slot })
    }

    pub fn slot(&self) -> &Arc<VerificationSlot> {
        &self.slot
    }
}
