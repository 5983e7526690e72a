use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CountdownStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Expired,
}

/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ticked(u32),
    Expired,
    /// Not running; nothing changed.
    Ignored,
}

/// Second-resolution countdown.
///
/// `remaining_secs` never underflows and the transition into `Expired`
/// happens on exactly one tick. Every `start`/`reset` opens a new
/// generation so notifications from a replaced run can be told apart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownState {
    pub status: CountdownStatus,
    pub total_secs: u32,
    pub remaining_secs: u32,
    pub generation: u64,
}

impl CountdownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == CountdownStatus::Running
    }

    pub fn start(&mut self, secs: u32) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.total_secs = secs;
        self.remaining_secs = secs;
        self.status = if secs == 0 {
            CountdownStatus::Expired
        } else {
            CountdownStatus::Running
        };
        self.generation
    }

    pub fn pause(&mut self) -> bool {
        if self.status != CountdownStatus::Running {
            return false;
        }
        self.status = CountdownStatus::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.status != CountdownStatus::Paused {
            return false;
        }
        self.status = CountdownStatus::Running;
        true
    }

    pub fn reset(&mut self, secs: u32) {
        self.generation = self.generation.wrapping_add(1);
        self.total_secs = secs;
        self.remaining_secs = secs;
        self.status = CountdownStatus::Idle;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.status != CountdownStatus::Running {
            return TickOutcome::Ignored;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.status = CountdownStatus::Expired;
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked(self.remaining_secs)
        }
    }
}
