use std::{sync::Arc, time::Duration};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::{CountdownState, TickOutcome};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Notification from a running countdown, tagged with the run's generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { generation: u64, remaining_secs: u32 },
    Expired { generation: u64 },
}

impl TimerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TimerEvent::Tick { generation, .. } | TimerEvent::Expired { generation } => *generation,
        }
    }
}

/// Receives `on_tick` / `on_expire` notifications.
pub type TimerCallback = Arc<dyn Fn(TimerEvent) + Send + Sync>;

/// Countdown driven by a single tokio ticker task.
///
/// At most one ticker exists at a time: every call that (re)starts ticking
/// aborts the previous handle first.
pub struct CountdownTimer {
    state: Arc<Mutex<CountdownState>>,
    ticker: Option<JoinHandle<()>>,
    tick_interval: Duration,
    on_event: TimerCallback,
}

impl CountdownTimer {
    pub fn new(tick_interval: Duration, on_event: TimerCallback) -> Self {
        Self {
            state: Arc::new(Mutex::new(CountdownState::new())),
            ticker: None,
            tick_interval,
            on_event,
        }
    }

    pub async fn snapshot(&self) -> CountdownState {
        self.state.lock().await.clone()
    }

    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    /// Whether a ticker task is alive. Paused and stopped timers have none.
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start a fresh countdown of `secs`, replacing any previous run.
    pub async fn start(&mut self, secs: u32) -> u64 {
        self.cancel_ticker();

        let generation = self.state.lock().await.start(secs);
        log_debug!("countdown started: {}s (generation {})", secs, generation);

        if secs > 0 {
            self.spawn_ticker();
        }
        generation
    }

    pub async fn pause(&mut self) -> bool {
        self.cancel_ticker();
        self.state.lock().await.pause()
    }

    pub async fn resume(&mut self) -> bool {
        let resumed = self.state.lock().await.resume();
        if resumed {
            self.spawn_ticker();
        }
        resumed
    }

    /// Stop ticking and rewind to `secs` without starting.
    pub async fn reset(&mut self, secs: u32) {
        self.cancel_ticker();
        self.state.lock().await.reset(secs);
    }

    fn spawn_ticker(&mut self) {
        self.cancel_ticker();

        let state = self.state.clone();
        let on_event = self.on_event.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            // First tick one full period after (re)start, not immediately.
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let (outcome, generation) = {
                    let mut guard = state.lock().await;
                    (guard.tick(), guard.generation)
                };

                match outcome {
                    TickOutcome::Ticked(remaining_secs) => {
                        on_event(TimerEvent::Tick {
                            generation,
                            remaining_secs,
                        });
                    }
                    TickOutcome::Expired => {
                        log_debug!("countdown expired (generation {})", generation);
                        on_event(TimerEvent::Expired { generation });
                        break;
                    }
                    TickOutcome::Ignored => break,
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

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}
