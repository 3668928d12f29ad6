//! Golden-model verifier: lock-step comparison against a reference simulator.

use std::io::{self, Write};

use rustc_hash::FxHashMap;
use tracing::{debug, error};

use crate::compare::{CompareConfig, Mismatch, MismatchKind, compare_packets};
use crate::packet::VerificationPacket;
use crate::reference::{ReferenceModel, SpikeModel, SpikeOptions};
use crate::verifier::{Check, TandemVerifier};
use crate::Result;

/// Mismatches kept in full for the status report.
pub const MAX_REPORTED_MISMATCHES: usize = 8;

/// Reference instructions skipped while looking for the device's PC.
///
/// Covers the reference boot ROM and any re-synchronisation after a PC
/// mismatch.
pub const MAX_ALIGN_STEPS: usize = 4096;

/// Compares every device packet against the next reference instruction.
pub struct GoldenModelVerifier {
    reference: Box<dyn ReferenceModel>,
    config: CompareConfig,
    aligned: bool,
    checked: u64,
    matched: u64,
    reference_finished: bool,
    mismatch_counts: FxHashMap<MismatchKind, u64>,
    mismatches: Vec<Mismatch>,
}

impl GoldenModelVerifier {
    /// Run Spike on the workload arguments with a RAM window of `ram_size`.
    pub fn spike(htif_args: &[String], ram_size: u64, isa: &str) -> Result<Self> {
        let model = SpikeModel::start(&SpikeOptions::new(isa, ram_size), htif_args)?;
        Ok(Self::with_reference(Box::new(model)))
    }

    /// Wrap an already running reference model.
    pub fn with_reference(reference: Box<dyn ReferenceModel>) -> Self {
        Self {
            reference,
            config: CompareConfig::default(),
            aligned: false,
            checked: 0,
            matched: 0,
            reference_finished: false,
            mismatch_counts: FxHashMap::default(),
            mismatches: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: CompareConfig) -> Self {
        self.config = config;
        self
    }

    pub fn checked(&self) -> u64 {
        self.checked
    }

    pub fn matched(&self) -> u64 {
        self.matched
    }

    /// Total mismatches across all kinds.
    pub fn mismatch_count(&self) -> u64 {
        self.mismatch_counts.values().sum()
    }

    /// First recorded mismatches, oldest first.
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    fn next_reference(&mut self) -> Option<VerificationPacket> {
        let next = self.reference.step();
        if next.is_none() {
            self.reference_finished = true;
        }
        next
    }

    /// Step the reference until it reaches `pc`.
    ///
    /// Returns the last reference packet seen; a PC mismatch is reported by
    /// the caller when alignment fails within the step bound.
    fn align_to(&mut self, pc: u64) -> Option<VerificationPacket> {
        let mut last = None;
        for step in 0..MAX_ALIGN_STEPS {
            let packet = self.next_reference()?;
            if packet.pc == pc {
                debug!(pc = format_args!("{pc:#x}"), skipped = step, "golden model aligned");
                self.aligned = true;
                return Some(packet);
            }
            last = Some(packet);
        }
        self.aligned = true;
        last
    }

    fn record(&mut self, kind: MismatchKind, expected: Option<VerificationPacket>, actual: &VerificationPacket) {
        *self.mismatch_counts.entry(kind).or_insert(0) += 1;
        if self.mismatches.len() < MAX_REPORTED_MISMATCHES {
            error!(
                index = self.checked,
                pc = format_args!("{:#x}", actual.pc),
                %kind,
                "tandem verification mismatch"
            );
            self.mismatches.push(Mismatch {
                index: self.checked,
                expected,
                actual: actual.clone(),
                kind,
            });
        }
    }
}

impl std::fmt::Debug for GoldenModelVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoldenModelVerifier")
            .field("reference", &self.reference.name())
            .field("checked", &self.checked)
            .field("matched", &self.matched)
            .finish_non_exhaustive()
    }
}

impl TandemVerifier for GoldenModelVerifier {
    fn check(&mut self, packet: &VerificationPacket) -> Check {
        self.checked += 1;

        if self.reference_finished {
            self.record(MismatchKind::ActualTail, None, packet);
            return Check::Mismatch(MismatchKind::ActualTail);
        }

        // The device dropped packets; the reference retires them silently.
        for _ in 0..packet.skipped {
            if self.next_reference().is_none() {
                break;
            }
        }

        let expected = if self.aligned {
            self.next_reference()
        } else {
            self.align_to(packet.pc)
        };

        let Some(expected) = expected else {
            self.record(MismatchKind::ActualTail, None, packet);
            return Check::Mismatch(MismatchKind::ActualTail);
        };

        match compare_packets(&expected, packet, &self.config) {
            None => {
                self.matched += 1;
                Check::Accepted
            }
            Some(kind) => {
                if kind == MismatchKind::Pc {
                    // Control flow diverged; re-align on the next packet.
                    self.aligned = false;
                }
                self.record(kind, Some(expected), packet);
                Check::Mismatch(kind)
            }
        }
    }

    fn write_status(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "SpikeTandemVerifier ({}): {} packets checked, {} matched, {} mismatches, reference retired {}",
            self.reference.name(),
            self.checked,
            self.matched,
            self.mismatch_count(),
            self.reference.instret()
        )?;

        let mut kinds: Vec<_> = self.mismatch_counts.iter().collect();
        kinds.sort();
        for (kind, count) in kinds {
            writeln!(out, "  {kind}: {count}")?;
        }

        for m in &self.mismatches {
            writeln!(out, "  #{} {}", m.index, m.kind)?;
            match &m.expected {
                Some(expected) => writeln!(out, "    expected: {expected}")?,
                None => writeln!(out, "    expected: <reference finished>")?,
            }
            writeln!(out, "    actual:   {}", m.actual)?;
        }
        Ok(())
    }
}
