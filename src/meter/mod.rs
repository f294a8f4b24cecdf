pub mod baseline;
pub mod ledger;
pub mod reading;
pub mod stats;

pub use baseline::{BaselineTracker, ReadingOutcome};
pub use ledger::{HitLedger, LedgerError};
pub use reading::{HitEvent, RawReading};
pub use stats::StatsSnapshot;
