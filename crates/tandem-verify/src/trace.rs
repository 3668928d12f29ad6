//! Verifier that prints every packet.

use std::io::{self, Write};

use tracing::warn;

use crate::packet::VerificationPacket;
use crate::verifier::{Check, TandemVerifier};

/// Prints each packet as it arrives and checks nothing.
pub struct TraceVerifier {
    out: Box<dyn Write + Send>,
    printed: u64,
    write_failed: bool,
}

impl TraceVerifier {
    /// Trace to an arbitrary writer.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            printed: 0,
            write_failed: false,
        }
    }

    /// Trace to stderr.
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    pub fn printed(&self) -> u64 {
        self.printed
    }
}

impl std::fmt::Debug for TraceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceVerifier")
            .field("printed", &self.printed)
            .finish_non_exhaustive()
    }
}

impl TandemVerifier for TraceVerifier {
    fn check(&mut self, packet: &VerificationPacket) -> Check {
        match writeln!(self.out, "[{:>10}] {}", self.printed, packet) {
            Ok(()) => self.printed += 1,
            Err(e) if !self.write_failed => {
                // Report once; a closed trace sink should not flood the log.
                warn!(error = %e, "trace output failed");
                self.write_failed = true;
            }
            Err(_) => {}
        }
        Check::Accepted
    }

    fn write_status(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "PrintTrace: {} packets printed", self.printed)
    }
}
