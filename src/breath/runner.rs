use std::{sync::Arc, time::Duration};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::models::BreathPattern;

use super::{BreathCycle, BreathPhase};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreathEvent {
    pub generation: u64,
    pub phase: BreathPhase,
    pub cycle_count: u32,
}

/// Receives `on_phase_change` notifications.
pub type BreathCallback = Arc<dyn Fn(BreathEvent) + Send + Sync>;

/// Drives a [`BreathCycle`] on its own one-second ticker, independent of the
/// step countdown.
pub struct BreathRunner {
    cycle: Arc<Mutex<Option<BreathCycle>>>,
    ticker: Option<JoinHandle<()>>,
    generation: u64,
    tick_interval: Duration,
    on_event: BreathCallback,
}

impl BreathRunner {
    pub fn new(tick_interval: Duration, on_event: BreathCallback) -> Self {
        Self {
            cycle: Arc::new(Mutex::new(None)),
            ticker: None,
            generation: 0,
            tick_interval,
            on_event,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Current phase and cycle count, if a cycle exists (running or paused).
    pub async fn current(&self) -> Option<(BreathPhase, u32)> {
        self.cycle
            .lock()
            .await
            .as_ref()
            .map(|cycle| (cycle.phase(), cycle.cycle_count()))
    }

    /// Begin a fresh cycle at inhale with `cycle_count == 0`.
    pub async fn start(&mut self, pattern: BreathPattern) -> u64 {
        self.cancel_ticker();
        self.generation = self.generation.wrapping_add(1);
        *self.cycle.lock().await = Some(BreathCycle::new(pattern));

        log_debug!(
            "breath cycle started with pattern {:?} (generation {})",
            pattern.raw(),
            self.generation
        );
        self.spawn_ticker();
        self.generation
    }

    pub async fn stop(&mut self) {
        self.cancel_ticker();
        self.generation = self.generation.wrapping_add(1);
        *self.cycle.lock().await = None;
    }

    /// Stop ticking but keep phase and elapsed time.
    pub fn pause(&mut self) {
        self.cancel_ticker();
    }

    pub async fn resume(&mut self) -> bool {
        if self.cycle.lock().await.is_none() || self.is_running() {
            return false;
        }
        self.spawn_ticker();
        true
    }

    fn spawn_ticker(&mut self) {
        self.cancel_ticker();

        let cycle = self.cycle.clone();
        let on_event = self.on_event.clone();
        let generation = self.generation;
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let change = {
                    let mut guard = cycle.lock().await;
                    match guard.as_mut() {
                        Some(cycle) => cycle.advance_second(),
                        None => break,
                    }
                };

                if let Some(change) = change {
                    log_debug!(
                        "breath phase -> {} (cycle {})",
                        change.phase.as_str(),
                        change.cycle_count
                    );
                    on_event(BreathEvent {
                        generation,
                        phase: change.phase,
                        cycle_count: change.cycle_count,
                    });
                }
            }
        });

        self.ticker = Some(handle);
    }

    fn cancel_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for BreathRunner {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}
