use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::meter::{BaselineTracker, HitLedger, RawReading, ReadingOutcome, StatsSnapshot};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    InitializingOcr,
    NoRegion,
    Stopped,
    Running,
    Error,
}

impl SessionStatus {
    /// Label shown in the main window status line.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::InitializingOcr => "Initializing OCR...",
            SessionStatus::NoRegion => "No Region",
            SessionStatus::Stopped => "Stopped",
            SessionStatus::Running => "Running",
            SessionStatus::Error => "Error",
        }
    }
}

/// Why the session ended up in `Error`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCause {
    CaptureFailed,
    OcrInitTimeout,
}

/// Status as pushed to windows; `cause` is set only for `Error`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: SessionStatus,
    pub cause: Option<ErrorCause>,
}

impl StatusUpdate {
    pub fn label(&self) -> &'static str {
        match (self.status, self.cause) {
            (SessionStatus::Error, Some(ErrorCause::CaptureFailed)) => "Capture Error",
            (SessionStatus::Error, Some(ErrorCause::OcrInitTimeout)) => "OCR Init Error",
            (status, _) => status.as_str(),
        }
    }
}

/// Everything a consumer may want to show about the meter at once.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterState {
    pub status: SessionStatus,
    pub error_cause: Option<ErrorCause>,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub baseline: Option<u64>,
    pub last_raw_reading: Option<u64>,
    pub stats: StatsSnapshot,
}

/// Mutable meter state shared between the controller and the sampling loop.
///
/// `generation` changes on every start, stop and reset. A tick remembers the
/// generation it started under and drops its result if it no longer matches.
#[derive(Debug, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub error_cause: Option<ErrorCause>,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_raw_reading: Option<u64>,
    generation: u64,
    tracker: BaselineTracker,
    ledger: HitLedger,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn advance_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    /// Returns true when the status actually changed. Leaving `Error`
    /// forgets its cause.
    pub fn set_status(&mut self, status: SessionStatus) -> bool {
        if self.status == status {
            return false;
        }
        info!("Status {:?} -> {:?}", self.status, status);
        self.status = status;
        if status != SessionStatus::Error {
            self.error_cause = None;
        }
        true
    }

    /// Moves to `Error` for `cause`. Returns true when status or cause changed.
    pub fn fail(&mut self, cause: ErrorCause) -> bool {
        let cause_changed = self.error_cause != Some(cause);
        self.error_cause = Some(cause);
        self.set_status(SessionStatus::Error) || cause_changed
    }

    pub fn status_update(&self) -> StatusUpdate {
        StatusUpdate {
            status: self.status,
            cause: self.error_cause,
        }
    }

    pub fn process_reading(&mut self, reading: RawReading) -> ReadingOutcome {
        self.last_raw_reading = Some(reading.value);
        let outcome = self.tracker.process_reading(reading);

        match outcome {
            ReadingOutcome::BaselineSet(value) => {
                info!("First reading {value}; baseline set");
            }
            ReadingOutcome::Hit(hit) => {
                if let Err(err) = self.ledger.append(hit) {
                    error!("Dropping hit {}: {err}", hit.value);
                }
            }
            ReadingOutcome::Rebaselined { from, to } => {
                info!("Damage counter decreased ({from} -> {to}); rebaselining");
            }
            ReadingOutcome::Unchanged | ReadingOutcome::Ignored => {}
        }

        if outcome.marks_running() {
            self.set_status(SessionStatus::Running);
        }
        outcome
    }

    /// Clears hits and baseline. Status is left alone.
    pub fn reset(&mut self) {
        self.ledger.clear();
        self.tracker.clear();
        self.last_raw_reading = None;
        self.advance_generation();
    }

    pub fn baseline(&self) -> Option<u64> {
        self.tracker.previous_total()
    }

    pub fn ledger(&self) -> &HitLedger {
        &self.ledger
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ledger.stats()
    }

    pub fn view(&self) -> MeterState {
        MeterState {
            status: self.status,
            error_cause: self.error_cause,
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            baseline: self.baseline(),
            last_raw_reading: self.last_raw_reading,
            stats: self.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::stats;
    use tokio::time::{Duration, Instant};

    fn feed(state: &mut SessionState, t0: Instant, readings: &[(u64, u64)]) {
        for &(value, secs) in readings {
            state.process_reading(RawReading::new(value, t0 + Duration::from_secs(secs)));
        }
    }

    #[test]
    fn regression_scenario_produces_expected_stats() {
        let t0 = Instant::now();
        let mut state = SessionState::new();

        feed(&mut state, t0, &[(100, 0), (150, 1)]);
        assert_eq!(state.ledger().len(), 1);

        feed(&mut state, t0, &[(140, 2)]);
        assert_eq!(state.ledger().len(), 1);
        assert_eq!(state.baseline(), Some(140));

        feed(&mut state, t0, &[(200, 3)]);
        let values: Vec<u64> = state.ledger().hits().iter().map(|h| h.value).collect();
        assert_eq!(values, vec![50, 60]);

        let stats = state.stats();
        assert_eq!(stats.total_damage, 110);
        assert_eq!(stats.largest_hit, 60);
        assert_eq!(stats.last_hit, 60);
        assert_eq!(stats.elapsed_time, 2.0);
        assert_eq!(stats.dps, 55.0);
        assert_eq!(stats, stats::compute(state.ledger().hits()));
    }

    #[test]
    fn non_decreasing_readings_sum_to_last_minus_first() {
        let t0 = Instant::now();
        let mut state = SessionState::new();
        let readings = [(1_000, 0), (1_000, 1), (1_250, 2), (1_251, 3), (1_251, 4), (4_000, 5)];

        feed(&mut state, t0, &readings);

        assert_eq!(state.stats().total_damage, 4_000 - 1_000);
        assert_eq!(state.stats().number_of_hits, 3);
    }

    #[test]
    fn equal_reading_leaves_hit_count() {
        let t0 = Instant::now();
        let mut state = SessionState::new();
        feed(&mut state, t0, &[(10, 0), (30, 1)]);

        feed(&mut state, t0, &[(30, 2)]);

        assert_eq!(state.stats().number_of_hits, 1);
        assert_eq!(state.last_raw_reading, Some(30));
    }

    #[test]
    fn baseline_and_hits_mark_running() {
        let t0 = Instant::now();
        let mut state = SessionState::new();
        state.set_status(SessionStatus::Stopped);

        feed(&mut state, t0, &[(0, 0)]);
        assert_eq!(state.status, SessionStatus::Stopped);

        feed(&mut state, t0, &[(5, 1)]);
        assert_eq!(state.status, SessionStatus::Running);
    }

    #[test]
    fn reset_is_idempotent_and_keeps_status() {
        let t0 = Instant::now();
        let mut state = SessionState::new();
        feed(&mut state, t0, &[(100, 0), (180, 1)]);
        let before = state.generation();

        state.reset();
        let once = (state.ledger().len(), state.baseline(), state.stats());
        state.reset();
        let twice = (state.ledger().len(), state.baseline(), state.stats());

        assert_eq!(once, twice);
        assert_eq!(twice, (0, None, StatsSnapshot::default()));
        assert_eq!(state.status, SessionStatus::Running);
        assert_eq!(state.last_raw_reading, None);
        assert_ne!(state.generation(), before);
    }

    #[test]
    fn error_cause_distinguishes_labels_and_clears_on_recovery() {
        let mut state = SessionState::new();

        assert!(state.fail(ErrorCause::OcrInitTimeout));
        assert_eq!(state.status_update().label(), "OCR Init Error");
        assert!(state.fail(ErrorCause::CaptureFailed));
        assert_eq!(state.status_update().label(), "Capture Error");
        assert!(!state.fail(ErrorCause::CaptureFailed));
        assert_eq!(state.view().error_cause, Some(ErrorCause::CaptureFailed));

        state.set_status(SessionStatus::Running);
        assert_eq!(state.error_cause, None);
        assert_eq!(state.status_update().label(), "Running");
    }

    #[test]
    fn status_labels_match_overlay_text() {
        assert_eq!(SessionStatus::NoRegion.as_str(), "No Region");
        assert_eq!(SessionStatus::InitializingOcr.as_str(), "Initializing OCR...");
        assert!(!SessionState::new().set_status(SessionStatus::Idle));
    }
}
