use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a run
#[derive(Debug, Error)]
pub enum DaqError {
    #[error("no signals detected during rate calibration")]
    NoSignal,
    #[error("no coincidence window: calibration buffer has no usable tag pairs")]
    NoWindow,
    #[error("no time tagger driver in this build; use selftest, flatgen, normgen or replay")]
    NoDevice,
    #[error("output file {0} already exists")]
    OutputExists(PathBuf),
    #[error("acquisition stopped before round {0}")]
    AcquisitionStopped(u32),
}
