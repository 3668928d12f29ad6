//! End-of-run reporting.

use std::io::{self, Write};
use std::path::Path;

use tandem_platform::PerfMonitor;
use tandem_verify::Verification;
use tracing::warn;

use crate::harness::best_effort;
use crate::terminal;

/// Write the completion report: banner, verification findings and
/// performance findings.
///
/// Every part is best-effort. A console or report-file write failure is
/// logged and never changes the outcome.
pub fn report_completion<M: PerfMonitor + ?Sized>(
    err: &mut dyn Write,
    outcome: i32,
    verification: &Verification,
    perf: &M,
    perf_report: &Path,
) {
    best_effort(write_verification(err, outcome, verification), "verification results");

    best_effort(
        writeln!(err, "{}", terminal::section("PerfMonitor results")).and_then(|()| err.flush()),
        "performance header",
    );
    if let Err(e) = perf.print_performance(perf_report) {
        warn!(path = %perf_report.display(), error = %e, "failed to write performance report");
    }
    best_effort(writeln!(err).and_then(|()| err.flush()), "performance trailer");
}

fn write_verification(err: &mut dyn Write, outcome: i32, verification: &Verification) -> io::Result<()> {
    writeln!(err, "{}", terminal::banner(outcome))?;
    writeln!(err, "{}", terminal::section("Verification results"))?;
    verification.write_status(err)?;
    writeln!(err)
}
