//! The closed set of verification strategies.

use std::io::{self, Write};

use crate::golden::GoldenModelVerifier;
use crate::null::NullVerifier;
use crate::packet::VerificationPacket;
use crate::trace::TraceVerifier;
use crate::verifier::{Check, TandemVerifier};

/// Discriminant of a [`VerificationStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Null,
    Trace,
    GoldenModel,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Trace => write!(f, "trace"),
            Self::GoldenModel => write!(f, "golden-model"),
        }
    }
}

/// Verification strategy selected once per run.
#[derive(Debug)]
pub enum VerificationStrategy {
    Null(NullVerifier),
    Trace(TraceVerifier),
    GoldenModel(GoldenModelVerifier),
}

impl VerificationStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Null(_) => StrategyKind::Null,
            Self::Trace(_) => StrategyKind::Trace,
            Self::GoldenModel(_) => StrategyKind::GoldenModel,
        }
    }
}

impl TandemVerifier for VerificationStrategy {
    fn check(&mut self, packet: &VerificationPacket) -> Check {
        match self {
            Self::Null(v) => v.check(packet),
            Self::Trace(v) => v.check(packet),
            Self::GoldenModel(v) => v.check(packet),
        }
    }

    fn write_status(&self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            Self::Null(v) => v.write_status(out),
            Self::Trace(v) => v.write_status(out),
            Self::GoldenModel(v) => v.write_status(out),
        }
    }
}

impl From<NullVerifier> for VerificationStrategy {
    fn from(v: NullVerifier) -> Self {
        Self::Null(v)
    }
}

impl From<TraceVerifier> for VerificationStrategy {
    fn from(v: TraceVerifier) -> Self {
        Self::Trace(v)
    }
}

impl From<GoldenModelVerifier> for VerificationStrategy {
    fn from(v: GoldenModelVerifier) -> Self {
        Self::GoldenModel(v)
    }
}
