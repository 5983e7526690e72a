pub mod controller;
pub mod state;

pub use controller::{CountdownTimer, TimerCallback, TimerEvent};
pub use state::{CountdownState, CountdownStatus, TickOutcome};
