//! Socket name shared with the simulator process.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Environment variable naming the simulator side of the socket.
pub const BLUESIM_SOCKET_ENV: &str = "BLUESIM_SOCKET_NAME";
/// Environment variable naming the software side of the socket.
pub const SOFTWARE_SOCKET_ENV: &str = "SOFTWARE_SOCKET_NAME";

/// Owns the `SOCK.<pid>` name and unlinks the file on drop.
#[derive(Debug)]
pub struct SocketGuard {
    path: PathBuf,
}

impl SocketGuard {
    /// Name seeded from this process's id, relative to the working directory.
    pub fn for_process() -> Self {
        Self::new(PathBuf::from(format!("SOCK.{}", std::process::id())))
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(name, value)` pairs to set in the simulator's environment.
    pub fn env(&self) -> [(&'static str, &Path); 2] {
        [
            (BLUESIM_SOCKET_ENV, self.path.as_path()),
            (SOFTWARE_SOCKET_ENV, self.path.as_path()),
        ]
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        if std::fs::remove_file(&self.path).is_ok() {
            debug!(path = %self.path.display(), "removed simulator socket");
        }
    }
}
