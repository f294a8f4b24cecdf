use super::reading::{HitEvent, RawReading};

/// What a single reading did to the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOutcome {
    /// First non-zero reading of a session; adopted as the reference total.
    BaselineSet(u64),
    /// The counter grew; the increment is a hit.
    Hit(HitEvent),
    /// The counter went backwards and the lower value became the new reference.
    Rebaselined { from: u64, to: u64 },
    /// Same value as the baseline.
    Unchanged,
    /// Zero reading with no baseline yet.
    Ignored,
}

impl ReadingOutcome {
    pub fn hit(&self) -> Option<HitEvent> {
        match self {
            ReadingOutcome::Hit(hit) => Some(*hit),
            _ => None,
        }
    }

    /// Baseline adoption and hits both mean the meter is actively tracking.
    pub fn marks_running(&self) -> bool {
        matches!(self, ReadingOutcome::BaselineSet(_) | ReadingOutcome::Hit(_))
    }
}

/// Turns successive total-counter readings into hits.
///
/// `None` means no reference total has been seen since creation or the last
/// [`BaselineTracker::clear`]. A counter that legitimately drops to zero is
/// stored as `Some(0)`, so the next increase from zero still counts as a hit.
#[derive(Debug, Clone, Default)]
pub struct BaselineTracker {
    previous_total: Option<u64>,
}

impl BaselineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_total(&self) -> Option<u64> {
        self.previous_total
    }

    pub fn process_reading(&mut self, reading: RawReading) -> ReadingOutcome {
        let Some(previous) = self.previous_total else {
            if reading.value == 0 {
                return ReadingOutcome::Ignored;
            }
            self.previous_total = Some(reading.value);
            return ReadingOutcome::BaselineSet(reading.value);
        };

        if reading.value > previous {
            self.previous_total = Some(reading.value);
            ReadingOutcome::Hit(HitEvent {
                value: reading.value - previous,
                timestamp: reading.timestamp,
            })
        } else if reading.value < previous {
            self.previous_total = Some(reading.value);
            ReadingOutcome::Rebaselined {
                from: previous,
                to: reading.value,
            }
        } else {
            ReadingOutcome::Unchanged
        }
    }

    pub fn clear(&mut self) {
        self.previous_total = None;
    }
}
