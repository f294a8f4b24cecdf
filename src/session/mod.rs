pub mod controller;
pub mod error;
pub mod events;
pub mod loop_worker;
pub mod sampler;
pub mod state;

pub use controller::SessionController;
pub use error::SessionError;
pub use events::{MeterEvent, MeterEvents};
pub use state::{ErrorCause, MeterState, SessionState, SessionStatus, StatusUpdate};
