use std::time::Duration;

use thiserror::Error;

use crate::capture::CaptureError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// No capture region has been selected yet.
    #[error("no capture region selected")]
    ConfigurationMissing,

    #[error("OCR engine not ready after {0:?}")]
    InitializationTimeout(Duration),

    #[error("OCR not ready")]
    OcrNotReady,

    #[error("capture in progress")]
    CaptureInProgress,

    #[error(transparent)]
    Recognition(#[from] CaptureError),

    #[error("failed to save settings: {0}")]
    Settings(String),
}
