//! Session state machine.
//!
//! [`Session::apply`] is the only place session state changes. It validates a
//! [`Command`], mutates the session, and returns the [`Effect`]s the
//! controller must carry out on the timer, the breath runner and the session
//! store. Rejected commands leave the session untouched.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::breath::BreathPhase;
use crate::models::{BreathPattern, CompletionEvent, Practice, PracticeKind, Step};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SubState {
    Intro,
    Active,
    Complete,
}

impl SubState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubState::Intro => "intro",
            SubState::Active => "active",
            SubState::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreathState {
    pub phase: BreathPhase,
    pub cycle_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Advance,
    Pause,
    Resume,
    TimerTick { remaining_secs: u32 },
    TimerExpired,
    BreathPhase { phase: BreathPhase, cycle_count: u32 },
    /// Countdown value read back from the timer after its ticker stopped.
    /// Unlike ticks this is accepted while paused.
    SyncTimer { remaining_secs: u32 },
    /// Breath position read back from the runner after it paused.
    SyncBreath { phase: BreathPhase, cycle_count: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTimer(u32),
    PauseTimer,
    ResumeTimer,
    StopTimer,
    StartBreath(BreathPattern),
    PauseBreath,
    ResumeBreath,
    StopBreath,
    Complete(CompletionEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("no practice selected")]
    NoSession,
    #[error("step can only be started from intro (currently {})", .0.as_str())]
    NotInIntro(SubState),
    #[error("step is not active")]
    NotActive,
    #[error("step still has {remaining_secs}s remaining")]
    StepNotFinished { remaining_secs: u32 },
    #[error("session is already complete")]
    AlreadyComplete,
    #[error("session is already paused")]
    AlreadyPaused,
    #[error("session is not paused")]
    NotPaused,
    #[error("timer notification does not apply to the current state")]
    Stale,
}

/// Live, single-use run of one practice.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    practice: Arc<Practice>,
    step_index: usize,
    sub_state: SubState,
    remaining_secs: u32,
    timer_running: bool,
    paused: bool,
    breath: Option<BreathState>,
    revision: u64,
}

/// Serializable view handed to renderers and the narration orchestrator.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub practice_id: String,
    pub practice_title: String,
    pub kind: PracticeKind,
    pub auto_advance: bool,
    pub step_index: usize,
    pub step_count: usize,
    pub step: Step,
    pub sub_state: SubState,
    pub remaining_secs: u32,
    pub timer_running: bool,
    pub paused: bool,
    pub breath: Option<BreathState>,
    pub revision: u64,
}

impl SessionSnapshot {
    pub fn is_last_step(&self) -> bool {
        self.step_index + 1 == self.step_count
    }

    /// Same eligibility rule as [`Session::can_advance`].
    pub fn can_advance(&self) -> bool {
        self.sub_state == SubState::Active
            && (self.step.timed_secs().is_none()
                || (self.remaining_secs == 0 && !self.timer_running))
    }
}

impl Session {
    /// New session at step 0 / intro. The practice must have at least one
    /// step; the catalog guarantees that.
    pub fn new(practice: Arc<Practice>) -> Self {
        Self {
            id: Uuid::new_v4(),
            practice,
            step_index: 0,
            sub_state: SubState::Intro,
            remaining_secs: 0,
            timer_running: false,
            paused: false,
            breath: None,
            revision: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn practice(&self) -> &Arc<Practice> {
        &self.practice
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn sub_state(&self) -> SubState {
        self.sub_state
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer_running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn breath(&self) -> Option<BreathState> {
        self.breath
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn current_step(&self) -> &Step {
        &self.practice.steps[self.step_index]
    }

    /// Advance is allowed from `active` once a timed step has counted down
    /// to exactly zero, or at any time for a self-timed step.
    pub fn can_advance(&self) -> bool {
        self.sub_state == SubState::Active
            && (self.current_step().timed_secs().is_none()
                || (self.remaining_secs == 0 && !self.timer_running))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            practice_id: self.practice.id.clone(),
            practice_title: self.practice.title.clone(),
            kind: self.practice.kind,
            auto_advance: self.practice.auto_advance,
            step_index: self.step_index,
            step_count: self.practice.steps.len(),
            step: self.current_step().clone(),
            sub_state: self.sub_state,
            remaining_secs: self.remaining_secs,
            timer_running: self.timer_running,
            paused: self.paused,
            breath: self.breath,
            revision: self.revision,
        }
    }

    pub fn apply(&mut self, command: Command) -> Result<Vec<Effect>, Rejection> {
        let effects = match command {
            Command::Start => self.start()?,
            Command::Advance => self.advance()?,
            Command::Pause => self.pause()?,
            Command::Resume => self.resume()?,
            Command::TimerTick { remaining_secs } => {
                self.ensure_timer_live()?;
                self.remaining_secs = remaining_secs;
                Vec::new()
            }
            Command::TimerExpired => {
                self.ensure_timer_live()?;
                self.remaining_secs = 0;
                self.timer_running = false;
                Vec::new()
            }
            Command::BreathPhase { phase, cycle_count } => {
                if self.sub_state != SubState::Active || self.breath.is_none() || self.paused {
                    return Err(Rejection::Stale);
                }
                self.breath = Some(BreathState { phase, cycle_count });
                Vec::new()
            }
            Command::SyncTimer { remaining_secs } => {
                if self.sub_state != SubState::Active || self.current_step().timed_secs().is_none() {
                    return Err(Rejection::Stale);
                }
                self.remaining_secs = remaining_secs;
                if remaining_secs == 0 {
                    self.timer_running = false;
                }
                Vec::new()
            }
            Command::SyncBreath { phase, cycle_count } => {
                if self.sub_state != SubState::Active || self.breath.is_none() {
                    return Err(Rejection::Stale);
                }
                self.breath = Some(BreathState { phase, cycle_count });
                Vec::new()
            }
        };

        self.revision += 1;
        Ok(effects)
    }

    fn start(&mut self) -> Result<Vec<Effect>, Rejection> {
        if self.sub_state != SubState::Intro {
            return Err(Rejection::NotInIntro(self.sub_state));
        }

        let mut effects = Vec::new();
        self.sub_state = SubState::Active;
        self.paused = false;

        if let Some(secs) = self.current_step().timed_secs() {
            self.remaining_secs = secs;
            self.timer_running = true;
            effects.push(Effect::StartTimer(secs));
        }

        if let Some(pattern) = self.practice.effective_breath_pattern() {
            self.breath = Some(BreathState {
                phase: BreathPhase::Inhale,
                cycle_count: 0,
            });
            effects.push(Effect::StartBreath(pattern));
        }

        Ok(effects)
    }

    fn advance(&mut self) -> Result<Vec<Effect>, Rejection> {
        match self.sub_state {
            SubState::Complete => return Err(Rejection::AlreadyComplete),
            SubState::Intro => return Err(Rejection::NotActive),
            SubState::Active => {}
        }
        if !self.can_advance() {
            return Err(Rejection::StepNotFinished {
                remaining_secs: self.remaining_secs,
            });
        }

        let mut effects = vec![Effect::StopTimer];
        if self.breath.take().is_some() {
            effects.push(Effect::StopBreath);
        }
        self.remaining_secs = 0;
        self.timer_running = false;
        self.paused = false;

        if self.step_index + 1 < self.practice.steps.len() {
            self.step_index += 1;
            self.sub_state = SubState::Intro;
        } else {
            self.sub_state = SubState::Complete;
            effects.push(Effect::Complete(CompletionEvent {
                session_id: self.id,
                practice_id: self.practice.id.clone(),
                title: self.practice.title.clone(),
                xp: self.practice.xp,
                completed_at: Utc::now(),
            }));
        }

        Ok(effects)
    }

    fn pause(&mut self) -> Result<Vec<Effect>, Rejection> {
        match self.sub_state {
            SubState::Complete => return Err(Rejection::AlreadyComplete),
            SubState::Intro => return Err(Rejection::NotActive),
            SubState::Active => {}
        }
        if self.paused {
            return Err(Rejection::AlreadyPaused);
        }

        let mut effects = Vec::new();
        self.paused = true;
        if self.timer_running {
            self.timer_running = false;
            effects.push(Effect::PauseTimer);
        }
        if self.breath.is_some() {
            effects.push(Effect::PauseBreath);
        }
        Ok(effects)
    }

    fn resume(&mut self) -> Result<Vec<Effect>, Rejection> {
        if !self.paused {
            return Err(Rejection::NotPaused);
        }

        let mut effects = Vec::new();
        self.paused = false;
        if self.current_step().timed_secs().is_some() && self.remaining_secs > 0 {
            self.timer_running = true;
            effects.push(Effect::ResumeTimer);
        }
        if self.breath.is_some() {
            effects.push(Effect::ResumeBreath);
        }
        Ok(effects)
    }

    fn ensure_timer_live(&self) -> Result<(), Rejection> {
        if self.sub_state == SubState::Active && self.timer_running {
            Ok(())
        } else {
            Err(Rejection::Stale)
        }
    }
}
