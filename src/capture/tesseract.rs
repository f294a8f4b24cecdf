use std::io::Cursor;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use image::{DynamicImage, ImageFormat};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{CaptureError, PhysicalRect, Recognition, Recognizer, Region};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// External programs used for a capture.
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Writes a PNG of the whole virtual screen to stdout.
    pub screenshot_program: String,
    pub screenshot_args: Vec<String>,
    pub tesseract_program: String,
    pub char_whitelist: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            screenshot_program: "import".into(),
            screenshot_args: vec!["-window".into(), "root".into(), "png:-".into()],
            tesseract_program: "tesseract".into(),
            char_whitelist: "0123456789".into(),
        }
    }
}

/// Recognizer backed by a screenshot command and the `tesseract` CLI.
pub struct TesseractRecognizer {
    config: TesseractConfig,
    ready: AtomicBool,
}

impl TesseractRecognizer {
    pub fn new(config: TesseractConfig) -> Self {
        Self {
            config,
            ready: AtomicBool::new(false),
        }
    }

    /// Probes the OCR binary once; the recognizer reports ready only after
    /// this succeeds.
    pub async fn initialize(&self) -> Result<(), CaptureError> {
        if self.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        log_info!("Initializing OCR engine ({})", self.config.tesseract_program);
        let output = Command::new(&self.config.tesseract_program)
            .arg("--version")
            .output()
            .await
            .map_err(|err| CaptureError::InternalError(format!("failed to launch OCR engine: {err}")))?;

        if !output.status.success() {
            return Err(CaptureError::InternalError(format!(
                "OCR engine version check exited with {}",
                output.status
            )));
        }

        self.ready.store(true, Ordering::Release);
        log_info!("OCR engine initialized");
        Ok(())
    }

    async fn capture_screen(&self) -> Result<Vec<u8>, CaptureError> {
        let output = Command::new(&self.config.screenshot_program)
            .args(&self.config.screenshot_args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| CaptureError::CaptureFailed(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::CaptureFailed(format!(
                "{} exited with {}: {}",
                self.config.screenshot_program,
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(CaptureError::DisplayNotFound);
        }
        Ok(output.stdout)
    }

    async fn run_ocr(&self, png: &[u8]) -> Result<String, CaptureError> {
        let whitelist = format!("tessedit_char_whitelist={}", self.config.char_whitelist);
        let mut child = Command::new(&self.config.tesseract_program)
            .args(["stdin", "stdout", "--psm", "7", "-c"])
            .arg(whitelist)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| CaptureError::InternalError(format!("failed to launch OCR engine: {err}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(png)
                .await
                .map_err(|err| CaptureError::InternalError(format!("failed to feed OCR engine: {err}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| CaptureError::InternalError(format!("OCR engine failed: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log_warn!("OCR engine exited with {}: {}", output.status, stderr.trim());
            return Err(CaptureError::InternalError(format!(
                "OCR engine exited with {}",
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Recognizer for TesseractRecognizer {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn recognize(&self, region: &Region) -> Result<Recognition, CaptureError> {
        if !self.is_ready() {
            return Err(CaptureError::InternalError("OCR not initialized".into()));
        }

        let rect = region.physical()?;
        let screen_png = self.capture_screen().await?;

        let cropped = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, CaptureError> {
            let screen = image::load_from_memory(&screen_png)
                .map_err(|err| CaptureError::InternalError(format!("screenshot decode failed: {err}")))?;
            let crop = crop_region(&screen, rect)?;
            encode_png(&crop)
        })
        .await
        .map_err(|err| CaptureError::InternalError(format!("crop worker join failed: {err}")))??;

        let text = self.run_ocr(&cropped).await?;
        let value = parse_counter(&text)?;

        Ok(Recognition {
            value,
            raw_text: text.trim().to_string(),
            preview: Some(cropped),
        })
    }
}

pub fn crop_region(screen: &DynamicImage, rect: PhysicalRect) -> Result<DynamicImage, CaptureError> {
    let (Some(right), Some(bottom)) = (
        rect.x.checked_add(i64::from(rect.width)),
        rect.y.checked_add(i64::from(rect.height)),
    ) else {
        return Err(CaptureError::CropOutOfBounds);
    };
    if rect.x < 0
        || rect.y < 0
        || right > i64::from(screen.width())
        || bottom > i64::from(screen.height())
    {
        return Err(CaptureError::CropOutOfBounds);
    }

    Ok(screen.crop_imm(rect.x as u32, rect.y as u32, rect.width, rect.height))
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|err| CaptureError::InternalError(format!("png encode failed: {err}")))?;
    Ok(buffer.into_inner())
}

/// Keeps only the digits of the OCR output and parses them.
pub fn parse_counter(text: &str) -> Result<u64, CaptureError> {
    let trimmed = text.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return if trimmed.is_empty() {
            Err(CaptureError::RecognitionEmpty)
        } else {
            Err(CaptureError::RecognitionNonNumeric(trimmed.to_string()))
        };
    }

    digits
        .parse::<u64>()
        .map_err(|_| CaptureError::RecognitionNonNumeric(trimmed.to_string()))
}
