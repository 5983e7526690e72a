pub mod cycle;
pub mod runner;

pub use cycle::{BreathCycle, BreathPhase, PhaseChange};
pub use runner::{BreathCallback, BreathEvent, BreathRunner};
