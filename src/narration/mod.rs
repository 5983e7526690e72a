//! Voice narration: decides what to say for each session state, owns the
//! single narration slot and speaks through the synthesizer.

pub mod cue;
pub mod orchestrator;
pub mod slot;

pub use cue::{cue_for, NarrationCue};
pub use orchestrator::{Continuation, NarrationOrchestrator, NarrationOutcome, Utterance};
pub use slot::NarrationSlot;
