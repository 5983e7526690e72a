pub mod practice;
pub mod session;

pub use practice::{BreathPattern, Practice, PracticeKind, Step};
pub use session::CompletionEvent;
