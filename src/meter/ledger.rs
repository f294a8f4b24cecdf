use log::warn;
use thiserror::Error;

use super::reading::HitEvent;
use super::stats::{self, StatsSnapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("hit value must be greater than zero")]
    ZeroValue,
}

/// Append-only record of the hits seen since the last reset.
///
/// Keeps running `total_damage`/`largest_hit` so a snapshot does not need to
/// walk the whole session; [`stats::compute`] over [`HitLedger::hits`] yields
/// the same numbers.
#[derive(Debug, Clone, Default)]
pub struct HitLedger {
    hits: Vec<HitEvent>,
    total_damage: u64,
    largest_hit: u64,
}

impl HitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamps are kept non-decreasing: a hit stamped before the current
    /// last entry is recorded at the last entry's instant. The stored stamp is
    /// what `elapsedTime` is measured from, so a late stamp never shortens it.
    pub fn append(&mut self, mut event: HitEvent) -> Result<(), LedgerError> {
        if event.value == 0 {
            return Err(LedgerError::ZeroValue);
        }

        if let Some(last) = self.hits.last() {
            if event.timestamp < last.timestamp {
                warn!(
                    "hit of {} arrived out of order; clamping to previous hit timestamp",
                    event.value
                );
                event.timestamp = last.timestamp;
            }
        }

        self.total_damage = self.total_damage.saturating_add(event.value);
        self.largest_hit = self.largest_hit.max(event.value);
        self.hits.push(event);
        Ok(())
    }

    pub fn hits(&self) -> &[HitEvent] {
        &self.hits
    }

    pub fn snapshot(&self) -> Vec<HitEvent> {
        self.hits.clone()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn total_damage(&self) -> u64 {
        self.total_damage
    }

    pub fn largest_hit(&self) -> u64 {
        self.largest_hit
    }

    /// Elapsed time spans the first and last stored (clamped) timestamps.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::from_parts(
            self.total_damage,
            self.hits.len() as u64,
            self.largest_hit,
            stats::last_hit(&self.hits),
            stats::elapsed_secs(&self.hits),
        )
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.total_damage = 0;
        self.largest_hit = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, Instant};

    fn hit(value: u64, t0: Instant, millis: u64) -> HitEvent {
        HitEvent {
            value,
            timestamp: t0 + Duration::from_millis(millis),
        }
    }

    #[test]
    fn append_keeps_insertion_order_and_caches() {
        let t0 = Instant::now();
        let mut ledger = HitLedger::new();

        ledger.append(hit(30, t0, 0)).unwrap();
        ledger.append(hit(90, t0, 500)).unwrap();
        ledger.append(hit(10, t0, 900)).unwrap();

        let values: Vec<u64> = ledger.hits().iter().map(|h| h.value).collect();
        assert_eq!(values, vec![30, 90, 10]);
        assert_eq!(ledger.total_damage(), 130);
        assert_eq!(ledger.largest_hit(), 90);
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn zero_value_is_rejected() {
        let mut ledger = HitLedger::new();

        assert_eq!(
            ledger.append(hit(0, Instant::now(), 0)),
            Err(LedgerError::ZeroValue)
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn out_of_order_timestamp_is_clamped() {
        let t0 = Instant::now();
        let mut ledger = HitLedger::new();
        ledger.append(hit(5, t0, 1_000)).unwrap();

        ledger.append(hit(7, t0, 200)).unwrap();

        let hits = ledger.hits();
        assert_eq!(hits[1].timestamp, hits[0].timestamp);
        assert!(hits.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn clamped_hit_does_not_shrink_elapsed_time() {
        let t0 = Instant::now();
        let mut ledger = HitLedger::new();
        ledger.append(hit(10, t0, 1_000)).unwrap();
        ledger.append(hit(20, t0, 5_000)).unwrap();

        ledger.append(hit(30, t0, 3_000)).unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.elapsed_time, 4.0);
        assert_eq!(stats.dps, 15.0);
        assert_eq!(stats.last_hit, 30);
        assert_eq!(stats, stats::compute(ledger.hits()));
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let t0 = Instant::now();
        let mut ledger = HitLedger::new();
        ledger.append(hit(8, t0, 0)).unwrap();
        ledger.append(hit(13, t0, 100)).unwrap();

        let snapshot = ledger.snapshot();
        ledger.append(hit(21, t0, 200)).unwrap();
        ledger.clear();

        let values: Vec<u64> = snapshot.iter().map(|h| h.value).collect();
        assert_eq!(values, vec![8, 13]);
        assert_eq!(snapshot[1].timestamp, t0 + Duration::from_millis(100));
    }

    #[test]
    fn cached_stats_match_recomputation() {
        let t0 = Instant::now();
        let mut ledger = HitLedger::new();
        for (i, value) in [12_u64, 400, 3, 77, 400, 1].into_iter().enumerate() {
            ledger.append(hit(value, t0, i as u64 * 250)).unwrap();
        }

        assert_eq!(ledger.stats(), stats::compute(ledger.hits()));
    }

    #[test]
    fn clear_empties_everything() {
        let t0 = Instant::now();
        let mut ledger = HitLedger::new();
        ledger.append(hit(50, t0, 0)).unwrap();

        ledger.clear();

        assert!(ledger.is_empty());
        assert_eq!(ledger.total_damage(), 0);
        assert_eq!(ledger.largest_hit(), 0);
        assert_eq!(ledger.stats(), StatsSnapshot::default());
    }
}
