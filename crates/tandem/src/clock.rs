//! Main clock negotiation.

use tandem_platform::ClockControl;
use tracing::{info, warn};

/// Index of the main clock.
pub const MAIN_CLOCK: u32 = 0;

/// Requested and granted main clock frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockNegotiation {
    pub requested_hz: u64,
    pub actual_hz: u64,
    pub status: i32,
    /// Host error code, zero unless `status` is nonzero.
    pub errno: i32,
}

impl ClockNegotiation {
    pub fn succeeded(&self) -> bool {
        self.status == 0
    }

    /// One-line summary, frequencies in MHz.
    pub fn summary(&self) -> String {
        format!(
            "Requested main clock frequency {:5.2}, actual clock frequency {:5.2} MHz status={} errno={}",
            self.requested_hz as f64 * 1.0e-6,
            self.actual_hz as f64 * 1.0e-6,
            self.status,
            self.errno
        )
    }
}

/// Frequency in Hz for a clock period in nanoseconds.
pub fn requested_frequency(period_ns: f64) -> u64 {
    (1.0e9 / period_ns) as u64
}

/// Ask for the main clock frequency. Never fails: a refused request is
/// logged and the granted frequency is used.
pub fn negotiate<C: ClockControl + ?Sized>(clock: &mut C, period_ns: f64) -> ClockNegotiation {
    let requested_hz = requested_frequency(period_ns);
    let grant = clock.set_clock_frequency(MAIN_CLOCK, requested_hz);
    let negotiation = ClockNegotiation {
        requested_hz,
        actual_hz: grant.actual_hz,
        status: grant.status,
        errno: if grant.status == 0 { 0 } else { grant.errno },
    };

    if negotiation.succeeded() {
        info!(requested_hz, actual_hz = grant.actual_hz, "main clock set");
    } else {
        warn!(
            requested_hz,
            actual_hz = grant.actual_hz,
            status = grant.status,
            errno = grant.errno,
            "clock request not honoured, continuing with granted frequency"
        );
    }
    negotiation
}
