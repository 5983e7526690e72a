use serde::{Deserialize, Serialize};

use crate::models::BreathPattern;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
    Rest,
}

impl BreathPhase {
    pub fn index(&self) -> usize {
        match self {
            BreathPhase::Inhale => 0,
            BreathPhase::Hold => 1,
            BreathPhase::Exhale => 2,
            BreathPhase::Rest => 3,
        }
    }

    pub fn next(&self) -> BreathPhase {
        match self {
            BreathPhase::Inhale => BreathPhase::Hold,
            BreathPhase::Hold => BreathPhase::Exhale,
            BreathPhase::Exhale => BreathPhase::Rest,
            BreathPhase::Rest => BreathPhase::Inhale,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "inhale",
            BreathPhase::Hold => "hold",
            BreathPhase::Exhale => "exhale",
            BreathPhase::Rest => "rest",
        }
    }

    /// Spoken cue for entering this phase.
    pub fn cue(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Breathe in",
            BreathPhase::Hold => "Hold",
            BreathPhase::Exhale => "Breathe out",
            BreathPhase::Rest => "Rest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub phase: BreathPhase,
    pub cycle_count: u32,
}

/// inhale -> hold -> exhale -> rest -> inhale ...
///
/// `cycle_count` moves only on the rest -> inhale wrap.
#[derive(Debug, Clone)]
pub struct BreathCycle {
    pattern: BreathPattern,
    phase: BreathPhase,
    elapsed_in_phase: u32,
    cycle_count: u32,
}

impl BreathCycle {
    pub fn new(pattern: BreathPattern) -> Self {
        Self {
            pattern,
            phase: BreathPhase::Inhale,
            elapsed_in_phase: 0,
            cycle_count: 0,
        }
    }

    pub fn phase(&self) -> BreathPhase {
        self.phase
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn pattern(&self) -> BreathPattern {
        self.pattern
    }

    pub fn phase_remaining_secs(&self) -> u32 {
        self.pattern
            .phase_secs(self.phase.index())
            .saturating_sub(self.elapsed_in_phase)
    }

    /// Advance one second; returns the new phase when a boundary is crossed.
    pub fn advance_second(&mut self) -> Option<PhaseChange> {
        self.elapsed_in_phase += 1;
        if self.elapsed_in_phase < self.pattern.phase_secs(self.phase.index()) {
            return None;
        }

        self.elapsed_in_phase = 0;
        let next = self.phase.next();
        if next == BreathPhase::Inhale {
            self.cycle_count += 1;
        }
        self.phase = next;

        Some(PhaseChange {
            phase: next,
            cycle_count: self.cycle_count,
        })
    }
}
