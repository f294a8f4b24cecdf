pub mod tesseract;

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tesseract::{TesseractConfig, TesseractRecognizer};

fn default_scale_factor() -> f64 {
    1.0
}

/// Screen rectangle holding the damage counter, in logical (DPI-independent) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

/// A region converted to physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            scale_factor: 1.0,
        }
    }

    pub fn physical(&self) -> Result<PhysicalRect, CaptureError> {
        let scale = if self.scale_factor.is_finite() && self.scale_factor > 0.0 {
            self.scale_factor
        } else {
            return Err(CaptureError::RegionInvalid);
        };

        let rect = PhysicalRect {
            x: (f64::from(self.x) * scale).round() as i64,
            y: (f64::from(self.y) * scale).round() as i64,
            width: (f64::from(self.width) * scale).round() as u32,
            height: (f64::from(self.height) * scale).round() as u32,
        };

        if rect.width <= 1 || rect.height <= 1 {
            return Err(CaptureError::RegionInvalid);
        }
        Ok(rect)
    }
}

/// Successful read of the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    pub value: u64,
    pub raw_text: String,
    /// PNG of the cropped region, when the recognizer produced one.
    pub preview: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid region dimensions")]
    RegionInvalid,
    #[error("cannot find display for region")]
    DisplayNotFound,
    #[error("crop region out of bounds")]
    CropOutOfBounds,
    #[error("screen capture failed: {0}")]
    CaptureFailed(String),
    #[error("empty result from OCR")]
    RecognitionEmpty,
    #[error("non-numeric result: {0}")]
    RecognitionNonNumeric(String),
    #[error("internal OCR/processing error: {0}")]
    InternalError(String),
}

impl CaptureError {
    /// Only a broken capture subsystem ends the session; everything else is
    /// skipped and the loop carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::CaptureFailed(_))
    }
}

/// Captures a screen region and reads the number in it.
pub trait Recognizer: Send + Sync + 'static {
    /// Whether the OCR engine has finished initialising.
    fn is_ready(&self) -> bool;

    fn recognize(
        &self,
        region: &Region,
    ) -> impl Future<Output = Result<Recognition, CaptureError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_rect_applies_scale_factor() {
        let region = Region {
            x: 101,
            y: 20,
            width: 50,
            height: 15,
            scale_factor: 1.5,
        };

        let rect = region.physical().unwrap();

        assert_eq!(
            rect,
            PhysicalRect {
                x: 152,
                y: 30,
                width: 75,
                height: 23
            }
        );
    }

    #[test]
    fn degenerate_regions_are_invalid() {
        assert_eq!(Region::new(0, 0, 1, 40).physical(), Err(CaptureError::RegionInvalid));
        assert_eq!(Region::new(0, 0, 40, 0).physical(), Err(CaptureError::RegionInvalid));

        let mut scaled = Region::new(0, 0, 40, 40);
        scaled.scale_factor = 0.0;
        assert_eq!(scaled.physical(), Err(CaptureError::RegionInvalid));
    }

    #[test]
    fn only_capture_failure_is_fatal() {
        assert!(CaptureError::CaptureFailed("gone".into()).is_fatal());
        for transient in [
            CaptureError::RegionInvalid,
            CaptureError::DisplayNotFound,
            CaptureError::CropOutOfBounds,
            CaptureError::RecognitionEmpty,
            CaptureError::RecognitionNonNumeric("abc".into()),
            CaptureError::InternalError("boom".into()),
        ] {
            assert!(!transient.is_fatal(), "{transient} should be transient");
        }
    }

    #[test]
    fn region_scale_factor_defaults_when_missing() {
        let region: Region =
            serde_json::from_str(r#"{"x":10,"y":20,"width":100,"height":30}"#).unwrap();

        assert_eq!(region.scale_factor, 1.0);
    }
}
