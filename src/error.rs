//! Crate-level error type.
//!
//! Every failure is surfaced to the operator with the offending path,
//! address or value; nothing is swallowed and nothing is retried. The only
//! loop in the pipeline is the interactive serial re-prompt.

use crate::image::ImageError;
use crate::serial::SerialError;
use serde::Serialize;
use snafu::Snafu;
use std::fmt;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A single verification failure: the byte at `address` did not read back
/// as written. `actual` is `None` when the address is no longer mapped in
/// the reloaded image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub address: usize,
    pub expected: u8,
    pub actual: Option<u8>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.actual {
            Some(actual) => write!(
                f,
                "{:#x}: expected {:#04x}, read back {:#04x}",
                self.address, self.expected, actual
            ),
            None => write!(
                f,
                "{:#x}: expected {:#04x}, address no longer mapped",
                self.address, self.expected
            ),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility = "pub")]
pub enum Error {
    #[snafu(display("input file not found: {}", path.display()))]
    InputNotFound { path: PathBuf },

    #[snafu(display("failed to load {}: {}", path.display(), source))]
    LoadFailure { path: PathBuf, source: ImageError },

    #[snafu(display("failed to create backup of {}: {}", path.display(), source))]
    BackupFailure {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("marker {:#06x} not found at address {:#x}", marker, address))]
    MarkerNotFound { marker: u64, address: usize },

    #[snafu(display("no free space after marker at {:#x}", address))]
    NoFreeSpace { address: usize },

    #[snafu(display("invalid serial: {}", source))]
    SerialInvalid { source: SerialError },

    #[snafu(display("serial entry failed: {}", source))]
    PromptFailure { source: std::io::Error },

    #[snafu(display("failed to write output file {}: {}", path.display(), source))]
    WriteFailure { path: PathBuf, source: ImageError },

    #[snafu(display("failed to reload written file {}: {}", path.display(), source))]
    ReloadFailure { path: PathBuf, source: ImageError },

    #[snafu(display("verification failed: {} byte(s) did not read back as written", mismatches.len()))]
    VerificationMismatch { mismatches: Vec<Mismatch> },

    #[snafu(display("failed to write report {}: {}", path.display(), source))]
    ReportFailure {
        path: PathBuf,
        source: std::io::Error,
    },
}
