//! Verifier that accepts everything.

use std::io::{self, Write};

use crate::packet::VerificationPacket;
use crate::verifier::{Check, TandemVerifier};

/// Accepts every packet; used when the device runs without verification.
#[derive(Debug, Default)]
pub struct NullVerifier {
    packets: u64,
}

impl NullVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }
}

impl TandemVerifier for NullVerifier {
    fn check(&mut self, _packet: &VerificationPacket) -> Check {
        self.packets += 1;
        Check::Accepted
    }

    fn write_status(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "NullTandemVerifier: verification disabled ({} packets ignored)", self.packets)
    }
}
