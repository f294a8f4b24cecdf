use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureError, Recognizer, Region};
use crate::meter::RawReading;

use super::events::MeterEvents;
use super::state::{ErrorCause, SessionState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

/// Everything one sampling loop needs; cloned out of the controller at start.
pub struct LoopContext<R: Recognizer> {
    pub session_id: String,
    pub region: Region,
    pub state: Arc<Mutex<SessionState>>,
    pub recognizer: Arc<R>,
    /// Held for the duration of a recognition; an OCR test holds it too.
    pub capture_gate: Arc<Mutex<()>>,
    pub events: MeterEvents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Processed,
    /// Another recognition was still running.
    Skipped,
    /// Stop or reset happened while the recognition was in flight.
    Stale,
    Transient,
    Fatal,
}

pub async fn sampling_loop<R: Recognizer>(
    ctx: LoopContext<R>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    // The first tick completes immediately, so the loop captures once on start.
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log_info!(
        "sampling loop started for session {} every {}ms",
        ctx.session_id,
        interval.as_millis()
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down for session {}", ctx.session_id);
                break;
            }
            _ = ticker.tick() => {
                if run_tick(&ctx).await == TickOutcome::Fatal {
                    log_error!("stopping capture due to screen capture failure (session {})", ctx.session_id);
                    break;
                }
            }
        }
    }
}

pub async fn run_tick<R: Recognizer>(ctx: &LoopContext<R>) -> TickOutcome {
    let Ok(_gate) = ctx.capture_gate.try_lock() else {
        log::debug!("capture still in flight; skipping tick");
        return TickOutcome::Skipped;
    };

    let generation = ctx.state.lock().await.generation();
    let timestamp = Instant::now();

    let recognizer = Arc::clone(&ctx.recognizer);
    let region = ctx.region;
    let result = match tokio::spawn(async move { recognizer.recognize(&region).await }).await {
        Ok(result) => result,
        Err(err) => Err(CaptureError::InternalError(format!(
            "recognition task failed: {err}"
        ))),
    };

    let mut state = ctx.state.lock().await;
    if state.generation() != generation {
        log::debug!("discarding capture result from a previous generation");
        return TickOutcome::Stale;
    }

    match result {
        Ok(recognition) => {
            let status_before = state.status;
            let outcome = state.process_reading(RawReading::new(recognition.value, timestamp));

            if state.status != status_before {
                ctx.events.status(state.status_update());
            }
            if let Some(hit) = outcome.hit() {
                ctx.events.hit(hit.value);
                ctx.events.stats(state.stats());
            }
            TickOutcome::Processed
        }
        Err(err) if err.is_fatal() => {
            log_error!("capture subsystem failed: {err}");
            state.advance_generation();
            if state.fail(ErrorCause::CaptureFailed) {
                ctx.events.status(state.status_update());
            }
            TickOutcome::Fatal
        }
        Err(CaptureError::RecognitionEmpty) => {
            log::debug!("OCR returned nothing");
            TickOutcome::Transient
        }
        Err(err) => {
            log_warn!("OCR failed: {err}");
            TickOutcome::Transient
        }
    }
}
