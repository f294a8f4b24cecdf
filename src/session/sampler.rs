use log::info;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::capture::Recognizer;

use super::loop_worker::{sampling_loop, LoopContext};

/// Owns the running sampling task, if any.
#[derive(Default)]
pub struct Sampler {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    /// Set while `start` waits for the OCR engine so `stop` can abandon the wait.
    pending_start: Option<CancellationToken>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a loop task exists and has not exited on its own.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn begin_pending(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.pending_start.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    pub fn take_pending(&mut self) -> Option<CancellationToken> {
        self.pending_start.take()
    }

    pub fn start_sampling<R: Recognizer>(&mut self, ctx: LoopContext<R>, interval: Duration) {
        self.stop_sampling();

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(ctx, interval, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    /// Prevents further ticks. A recognition already in flight is left to
    /// finish; its result is dropped by the generation check. Returns whether
    /// a live loop was stopped.
    pub fn stop_sampling(&mut self) -> bool {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        match self.handle.take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                if was_running {
                    info!("Capture loop stopped");
                }
                was_running
            }
            None => false,
        }
    }
}
