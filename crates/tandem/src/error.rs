use thiserror::Error;

use tandem_image::ImageError;
use tandem_platform::PlatformError;
use tandem_verify::VerifyError;

/// Errors that prevent a run from starting.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),
    #[error("Signal setup failed: {0}")]
    Signal(#[from] nix::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while loading and running the workload.
#[derive(Error, Debug)]
pub enum HtifError {
    #[error("No workload ELF in HTIF arguments")]
    NoProgram,
    #[error("Workload image error: {0}")]
    Image(#[from] ImageError),
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
