use tokio::time::Instant;

/// One OCR sample of the on-screen damage counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading {
    pub value: u64,
    pub timestamp: Instant,
}

impl RawReading {
    pub fn new(value: u64, timestamp: Instant) -> Self {
        Self { value, timestamp }
    }
}

/// A positive increment of the counter between two readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitEvent {
    pub value: u64,
    pub timestamp: Instant,
}
