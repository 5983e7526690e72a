pub mod controller;
pub mod state;
pub mod store;

pub use controller::{ControllerConfig, SessionController, SessionEvent};
pub use state::{BreathState, Command, Effect, Rejection, Session, SessionSnapshot, SubState};
pub use store::SessionStore;
