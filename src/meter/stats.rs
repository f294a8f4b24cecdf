use serde::{Deserialize, Serialize};

use super::reading::HitEvent;

/// Derived meter figures pushed to the overlays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub dps: f64,
    pub last_hit: u64,
    pub largest_hit: u64,
    pub average_hit: f64,
    /// Seconds between the first and the last hit.
    pub elapsed_time: f64,
    pub total_damage: u64,
    pub number_of_hits: u64,
}

impl StatsSnapshot {
    pub fn from_parts(
        total_damage: u64,
        number_of_hits: u64,
        largest_hit: u64,
        last_hit: u64,
        elapsed_time: f64,
    ) -> Self {
        let average_hit = if number_of_hits > 0 {
            total_damage as f64 / number_of_hits as f64
        } else {
            0.0
        };
        let dps = if elapsed_time > 0.0 {
            total_damage as f64 / elapsed_time
        } else {
            0.0
        };

        Self {
            dps,
            last_hit,
            largest_hit,
            average_hit,
            elapsed_time,
            total_damage,
            number_of_hits,
        }
    }
}

pub fn compute(hits: &[HitEvent]) -> StatsSnapshot {
    StatsSnapshot::from_parts(
        total_damage(hits),
        hits.len() as u64,
        largest_hit(hits),
        last_hit(hits),
        elapsed_secs(hits),
    )
}

pub fn total_damage(hits: &[HitEvent]) -> u64 {
    hits.iter().fold(0_u64, |sum, hit| sum.saturating_add(hit.value))
}

pub fn largest_hit(hits: &[HitEvent]) -> u64 {
    hits.iter().map(|hit| hit.value).max().unwrap_or(0)
}

pub fn last_hit(hits: &[HitEvent]) -> u64 {
    hits.last().map(|hit| hit.value).unwrap_or(0)
}

/// Span from the first hit to the last. A first hit stamped after the last
/// one (clock anomaly) collapses the span to zero instead of going negative.
pub fn elapsed_secs(hits: &[HitEvent]) -> f64 {
    let (Some(first), Some(last)) = (hits.first(), hits.last()) else {
        return 0.0;
    };
    let start = first.timestamp.min(last.timestamp);
    last.timestamp.duration_since(start).as_secs_f64()
}
