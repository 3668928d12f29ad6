//! Tandem verification for processors under test.
//!
//! A device reports one [`VerificationPacket`] per retired instruction. The
//! run's single [`VerificationStrategy`] either ignores packets
//! ([`NullVerifier`]), prints them ([`TraceVerifier`]) or compares them in
//! lock-step against a reference simulator ([`GoldenModelVerifier`]).

mod commit_log;
mod compare;
mod golden;
mod null;
mod packet;
mod reference;
mod strategy;
mod trace;
mod verification;
mod verifier;

pub use commit_log::parse_commit_line;
pub use compare::{CompareConfig, Mismatch, MismatchKind, compare_packets};
pub use golden::{GoldenModelVerifier, MAX_ALIGN_STEPS, MAX_REPORTED_MISMATCHES};
pub use null::NullVerifier;
pub use packet::{MemAccess, RegWrite, VerificationPacket};
pub use reference::{
    REFERENCE_RAM_BASE, ReferenceModel, ReplayModel, SpikeModel, SpikeOptions, find_spike,
};
pub use strategy::{StrategyKind, VerificationStrategy};
pub use trace::TraceVerifier;
pub use verification::{PacketSink, STATUS_LOCK_TIMEOUT, Verification, VerificationStats};
pub use verifier::{Check, TandemVerifier};

use std::path::PathBuf;

use thiserror::Error;

/// Verification errors.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("failed to start reference model {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reference model produced no output stream")]
    NoOutput,
}

pub type Result<T> = std::result::Result<T, VerifyError>;
