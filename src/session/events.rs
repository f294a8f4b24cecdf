use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::meter::StatsSnapshot;

use super::state::{SessionStatus, StatusUpdate};

const EVENT_CAPACITY: usize = 64;

/// Pushed to overlays and the main window. Delivery is fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum MeterEvent {
    StatsUpdated(StatsSnapshot),
    NewHit(u64),
    StatusChanged(StatusUpdate),
    ResetAcknowledged,
}

impl MeterEvent {
    /// Window event name the payload is emitted under.
    pub fn name(&self) -> &'static str {
        match self {
            MeterEvent::StatsUpdated(_) => "stats-update",
            MeterEvent::NewHit(_) => "new-hit",
            MeterEvent::StatusChanged(_) => "update-status",
            MeterEvent::ResetAcknowledged => "stats-reset-acknowledged",
        }
    }
}

#[derive(Clone)]
pub struct MeterEvents {
    events: broadcast::Sender<MeterEvent>,
    status: Arc<watch::Sender<SessionStatus>>,
}

impl MeterEvents {
    pub fn new(initial: SessionStatus) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(initial);
        Self {
            events,
            status: Arc::new(status),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeterEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self, update: StatusUpdate) {
        self.status.send_replace(update.status);
        self.send(MeterEvent::StatusChanged(update));
    }

    pub fn stats(&self, stats: StatsSnapshot) {
        self.send(MeterEvent::StatsUpdated(stats));
    }

    pub fn hit(&self, value: u64) {
        self.send(MeterEvent::NewHit(value));
    }

    pub fn reset_acknowledged(&self) {
        self.send(MeterEvent::ResetAcknowledged);
    }

    fn send(&self, event: MeterEvent) {
        // No receivers is normal before any window subscribes.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_reaches_both_channels() {
        let events = MeterEvents::new(SessionStatus::Idle);
        let mut rx = events.subscribe();
        let status_rx = events.subscribe_status();

        let update = StatusUpdate {
            status: SessionStatus::Running,
            cause: None,
        };
        events.status(update);

        assert_eq!(*status_rx.borrow(), SessionStatus::Running);
        assert_eq!(rx.recv().await.unwrap(), MeterEvent::StatusChanged(update));
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let events = MeterEvents::new(SessionStatus::Idle);

        events.hit(12);
        events.reset_acknowledged();
    }

    #[test]
    fn event_names_match_window_listeners() {
        assert_eq!(MeterEvent::NewHit(1).name(), "new-hit");
        assert_eq!(MeterEvent::ResetAcknowledged.name(), "stats-reset-acknowledged");
        assert_eq!(
            serde_json::to_value(MeterEvent::NewHit(7)).unwrap(),
            serde_json::json!({"type": "newHit", "payload": 7})
        );
    }
}
