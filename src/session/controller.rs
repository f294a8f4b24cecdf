use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capture::{Recognition, Recognizer, Region};
use crate::meter::StatsSnapshot;
use crate::settings::{SettingsStore, UserSettings};

use super::error::SessionError;
use super::events::{MeterEvent, MeterEvents};
use super::loop_worker::LoopContext;
use super::sampler::Sampler;
use super::state::{ErrorCause, MeterState, SessionState, SessionStatus};

const OCR_INIT_TIMEOUT: Duration = Duration::from_millis(15_000);
const OCR_INIT_POLL: Duration = Duration::from_millis(500);

/// Start/stop/reset for the damage meter and the single owner of its status.
pub struct SessionController<R: Recognizer> {
    state: Arc<Mutex<SessionState>>,
    sampler: Arc<Mutex<Sampler>>,
    recognizer: Arc<R>,
    settings: Arc<SettingsStore>,
    capture_gate: Arc<Mutex<()>>,
    events: MeterEvents,
    ocr_init_timeout: Duration,
    ocr_init_poll: Duration,
}

impl<R: Recognizer> Clone for SessionController<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            sampler: Arc::clone(&self.sampler),
            recognizer: Arc::clone(&self.recognizer),
            settings: Arc::clone(&self.settings),
            capture_gate: Arc::clone(&self.capture_gate),
            events: self.events.clone(),
            ocr_init_timeout: self.ocr_init_timeout,
            ocr_init_poll: self.ocr_init_poll,
        }
    }
}

impl<R: Recognizer> SessionController<R> {
    pub fn new(recognizer: Arc<R>, settings: Arc<SettingsStore>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            sampler: Arc::new(Mutex::new(Sampler::new())),
            recognizer,
            settings,
            capture_gate: Arc::new(Mutex::new(())),
            events: MeterEvents::new(SessionStatus::Idle),
            ocr_init_timeout: OCR_INIT_TIMEOUT,
            ocr_init_poll: OCR_INIT_POLL,
        }
    }

    pub fn with_ocr_init_wait(mut self, timeout: Duration, poll: Duration) -> Self {
        self.ocr_init_timeout = timeout;
        self.ocr_init_poll = poll;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeterEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.events.subscribe_status()
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status
    }

    pub async fn get_snapshot(&self) -> StatsSnapshot {
        self.state.lock().await.stats()
    }

    pub async fn get_state(&self) -> MeterState {
        self.state.lock().await.view()
    }

    pub fn settings(&self) -> UserSettings {
        self.settings.get()
    }

    /// Called once the OCR engine is up at launch. Does not start sampling.
    pub async fn announce_ready(&self) {
        let status = if self.settings.region().is_some() {
            SessionStatus::Stopped
        } else {
            SessionStatus::NoRegion
        };

        let mut state = self.state.lock().await;
        if matches!(state.status, SessionStatus::Idle | SessionStatus::InitializingOcr) {
            info!("Initial capture status: {}", status.as_str());
            self.transition(&mut state, status);
        }
    }

    /// Starts (or restarts) sampling. The ledger and baseline carry over.
    pub async fn start(&self) -> Result<SessionStatus, SessionError> {
        let Some(region) = self.settings.region() else {
            warn!("Cannot start capture: no region selected");
            self.set_status(SessionStatus::NoRegion).await;
            return Err(SessionError::ConfigurationMissing);
        };

        let pending = self.sampler.lock().await.begin_pending();

        if !self.recognizer.is_ready() {
            info!("Waiting for OCR engine...");
            self.set_status(SessionStatus::InitializingOcr).await;

            if !self.wait_for_ocr(&pending).await {
                if pending.is_cancelled() {
                    return Ok(self.status().await);
                }
                warn!("OCR init timeout after {:?}", self.ocr_init_timeout);
                self.sampler.lock().await.take_pending();
                let mut state = self.state.lock().await;
                if state.fail(ErrorCause::OcrInitTimeout) {
                    self.events.status(state.status_update());
                }
                return Err(SessionError::InitializationTimeout(self.ocr_init_timeout));
            }
        }

        self.launch(region, pending).await
    }

    async fn launch(
        &self,
        region: Region,
        pending: CancellationToken,
    ) -> Result<SessionStatus, SessionError> {
        let mut sampler = self.sampler.lock().await;
        if pending.is_cancelled() {
            return Ok(self.status().await);
        }
        sampler.take_pending();

        let interval = self.settings.interval();
        let session_id = Uuid::new_v4().to_string();

        {
            let mut state = self.state.lock().await;
            state.advance_generation();
            state.session_id = Some(session_id.clone());
            state.started_at = Some(Utc::now());
            self.transition(&mut state, SessionStatus::Running);
        }

        info!(
            "Starting capture loop: {}ms (session {session_id})",
            interval.as_millis()
        );
        sampler.start_sampling(
            LoopContext {
                session_id,
                region,
                state: Arc::clone(&self.state),
                recognizer: Arc::clone(&self.recognizer),
                capture_gate: Arc::clone(&self.capture_gate),
                events: self.events.clone(),
            },
            interval,
        );

        Ok(SessionStatus::Running)
    }

    async fn wait_for_ocr(&self, pending: &CancellationToken) -> bool {
        let deadline = Instant::now() + self.ocr_init_timeout;
        loop {
            if self.recognizer.is_ready() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::select! {
                _ = pending.cancelled() => return false,
                _ = time::sleep(self.ocr_init_poll) => {}
            }
        }
    }

    /// Halts sampling without touching hits or baseline. No-op when nothing
    /// is running.
    pub async fn stop(&self) -> SessionStatus {
        let mut sampler = self.sampler.lock().await;
        let abandoned_start = match sampler.take_pending() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };
        let stopped_loop = sampler.stop_sampling();

        let mut state = self.state.lock().await;
        if stopped_loop || abandoned_start {
            state.advance_generation();
            self.transition(&mut state, SessionStatus::Stopped);
        }
        state.status
    }

    /// Clears hits and baseline; sampling keeps going if it was running.
    /// Returns once the clear is done, which is the acknowledgement.
    pub async fn reset(&self) -> StatsSnapshot {
        let mut state = self.state.lock().await;
        state.reset();
        info!("Stats reset");

        let stats = state.stats();
        self.events.stats(stats);
        self.events.reset_acknowledged();
        stats
    }

    /// One recognition outside the loop, for checking the region. Does not
    /// feed the meter.
    pub async fn test_ocr(&self) -> Result<Recognition, SessionError> {
        if !self.recognizer.is_ready() {
            return Err(SessionError::OcrNotReady);
        }
        let region = self
            .settings
            .region()
            .ok_or(SessionError::ConfigurationMissing)?;
        let _gate = self
            .capture_gate
            .try_lock()
            .map_err(|_| SessionError::CaptureInProgress)?;

        let recognition = self.recognizer.recognize(&region).await?;
        info!("OCR test result: {}", recognition.value);
        Ok(recognition)
    }

    /// Persists new settings. A running loop picks up a changed region or
    /// interval by restarting; clearing the region stops it.
    pub async fn update_settings(&self, settings: UserSettings) -> Result<SessionStatus, SessionError> {
        let previous = self.settings.get();
        self.settings
            .update(settings.clone())
            .map_err(|err| SessionError::Settings(format!("{err:#}")))?;

        let capture_changed = previous.capture_region != settings.capture_region
            || previous.interval() != settings.interval();
        let running = self.sampler.lock().await.is_running();

        match (settings.capture_region, running) {
            (Some(_), true) if capture_changed => self.start().await,
            (None, true) => {
                self.stop().await;
                self.set_status(SessionStatus::NoRegion).await;
                Ok(SessionStatus::NoRegion)
            }
            (None, false) => {
                let mut state = self.state.lock().await;
                if state.status == SessionStatus::Stopped {
                    self.transition(&mut state, SessionStatus::NoRegion);
                }
                Ok(state.status)
            }
            (Some(_), false) => {
                let mut state = self.state.lock().await;
                if state.status == SessionStatus::NoRegion {
                    self.transition(&mut state, SessionStatus::Stopped);
                }
                Ok(state.status)
            }
            (Some(_), true) => Ok(self.status().await),
        }
    }

    async fn set_status(&self, status: SessionStatus) {
        let mut state = self.state.lock().await;
        self.transition(&mut state, status);
    }

    fn transition(&self, state: &mut SessionState, status: SessionStatus) {
        if state.set_status(status) {
            self.events.status(state.status_update());
        }
    }
}
