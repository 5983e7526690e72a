use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::breath::{BreathCallback, BreathEvent, BreathRunner};
use crate::catalog::default_practice;
use crate::models::{CompletionEvent, Practice};
use crate::narration::{cue_for, NarrationOrchestrator};
use crate::timer::{CountdownStatus, CountdownTimer, TimerCallback, TimerEvent};

use super::{Command, Effect, Rejection, Session, SessionSnapshot, SessionStore, SubState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Outbound notifications for whatever renders the session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum SessionEvent {
    StateChanged(SessionSnapshot),
    Completed(CompletionEvent),
    Ended { session_id: Uuid },
}

enum Signal {
    Timer(TimerEvent),
    Breath(BreathEvent),
    NarrationFinished(String),
}

struct ControllerInner {
    session: Option<Session>,
    timer: CountdownTimer,
    breath: BreathRunner,
}

struct Shared {
    inner: Mutex<ControllerInner>,
    narrator: NarrationOrchestrator,
    store: Arc<dyn SessionStore>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Owns the live session and performs the effects its reducer asks for.
///
/// User commands and timer/breath/narration signals are serialized through
/// one lock, so every transition sees the effects of the previous one.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        narrator: NarrationOrchestrator,
        store: Arc<dyn SessionStore>,
        config: ControllerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let timer_tx = signal_tx.clone();
        let on_timer: TimerCallback = Arc::new(move |event| {
            let _ = timer_tx.send(Signal::Timer(event));
        });
        let breath_tx = signal_tx.clone();
        let on_breath: BreathCallback = Arc::new(move |event| {
            let _ = breath_tx.send(Signal::Breath(event));
        });
        narrator.set_continuation(Arc::new(move |key| {
            let _ = signal_tx.send(Signal::NarrationFinished(key));
        }));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            inner: Mutex::new(ControllerInner {
                session: None,
                timer: CountdownTimer::new(config.tick_interval, on_timer),
                breath: BreathRunner::new(config.tick_interval, on_breath),
            }),
            narrator,
            store,
            events: events_tx,
        });

        tokio::spawn(pump_signals(Arc::downgrade(&shared), signal_rx));

        (Self { shared }, events_rx)
    }

    pub fn narrator(&self) -> &NarrationOrchestrator {
        &self.shared.narrator
    }

    /// Replace any current session with a fresh one at step 0, intro.
    /// A malformed practice is swapped for the built-in default.
    pub async fn select_practice(&self, practice: Arc<Practice>) -> SessionSnapshot {
        let practice = match practice.validate() {
            Ok(()) => practice,
            Err(err) => {
                log_warn!("substituting default practice: {:#}", err);
                Arc::new(default_practice())
            }
        };

        let mut inner = self.shared.inner.lock().await;
        self.shared.teardown(&mut inner).await;

        let session = Session::new(practice);
        let snapshot = session.snapshot();
        log_info!(
            "session {} started for practice '{}'",
            snapshot.session_id,
            snapshot.practice_id
        );
        inner.session = Some(session);
        self.shared.publish(&snapshot);
        snapshot
    }

    pub async fn start(&self) -> Result<SessionSnapshot, Rejection> {
        self.dispatch(Command::Start).await
    }

    pub async fn advance(&self) -> Result<SessionSnapshot, Rejection> {
        self.dispatch(Command::Advance).await
    }

    pub async fn pause(&self) -> Result<SessionSnapshot, Rejection> {
        self.dispatch(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<SessionSnapshot, Rejection> {
        self.dispatch(Command::Resume).await
    }

    /// Tear down timer, breath cycle and narration and discard the session.
    /// Returns whether there was a session to discard.
    pub async fn exit(&self) -> bool {
        let mut inner = self.shared.inner.lock().await;
        self.shared.teardown(&mut inner).await
    }

    pub async fn reset(&self) -> bool {
        self.exit().await
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let inner = self.shared.inner.lock().await;
        inner.session.as_ref().map(Session::snapshot)
    }

    pub fn set_voice_enabled(&self, enabled: bool) {
        self.shared.narrator.set_enabled(enabled);
    }

    pub async fn timer_running(&self) -> bool {
        self.shared.inner.lock().await.timer.is_ticking()
    }

    pub async fn breath_running(&self) -> bool {
        self.shared.inner.lock().await.breath.is_running()
    }

    async fn dispatch(&self, command: Command) -> Result<SessionSnapshot, Rejection> {
        let (snapshot, completion) = {
            let mut inner = self.shared.inner.lock().await;
            let (mut snapshot, mut completion) = self.shared.apply(&mut inner, command).await?;
            if let Some(next) = self
                .shared
                .follow_auto_advance(&mut inner, &mut completion)
                .await
            {
                snapshot = next;
            }
            (snapshot, completion)
        };

        if let Some(event) = completion {
            self.shared.persist(&event).await;
        }
        Ok(snapshot)
    }
}

impl Shared {
    async fn apply(
        &self,
        inner: &mut ControllerInner,
        command: Command,
    ) -> Result<(SessionSnapshot, Option<CompletionEvent>), Rejection> {
        let ControllerInner {
            session,
            timer,
            breath,
        } = inner;
        let session = session.as_mut().ok_or(Rejection::NoSession)?;
        let effects = session.apply(command)?;

        let mut completion = None;
        for effect in effects {
            match effect {
                Effect::StartTimer(secs) => {
                    timer.start(secs).await;
                }
                Effect::PauseTimer => {
                    timer.pause().await;
                    // Queued ticks are stale once paused; read the timer.
                    sync_countdown(session, timer).await;
                }
                Effect::ResumeTimer => {
                    if !timer.resume().await {
                        log_warn!("countdown was not paused on resume; resynchronizing");
                        sync_countdown(session, timer).await;
                        if session.is_timer_running() {
                            timer.start(session.remaining_secs()).await;
                        }
                    }
                }
                Effect::StopTimer => timer.reset(0).await,
                Effect::StartBreath(pattern) => {
                    breath.start(pattern).await;
                }
                Effect::PauseBreath => {
                    breath.pause();
                    if let Some((phase, cycle_count)) = breath.current().await {
                        if let Err(rejection) =
                            session.apply(Command::SyncBreath { phase, cycle_count })
                        {
                            log_debug!("breath sync rejected: {}", rejection);
                        }
                    }
                }
                Effect::ResumeBreath => {
                    breath.resume().await;
                }
                Effect::StopBreath => breath.stop().await,
                Effect::Complete(event) => completion = Some(event),
            }
        }

        let snapshot = session.snapshot();
        self.publish(&snapshot);
        if let Some(event) = &completion {
            log_info!(
                "session {} complete: '{}' (+{} xp)",
                event.session_id,
                event.title,
                event.xp
            );
            let _ = self.events.send(SessionEvent::Completed(event.clone()));
        }
        Ok((snapshot, completion))
    }

    /// Free-running flows move on as soon as a timed step runs out, whether
    /// the expiry arrived as a signal or was picked up on resume.
    async fn follow_auto_advance(
        &self,
        inner: &mut ControllerInner,
        completion: &mut Option<CompletionEvent>,
    ) -> Option<SessionSnapshot> {
        let ran_out = inner.session.as_ref().is_some_and(|session| {
            session.practice().auto_advance
                && !session.is_paused()
                && session.current_step().timed_secs().is_some()
                && session.can_advance()
        });
        if !ran_out {
            return None;
        }

        match self.apply(inner, Command::Advance).await {
            Ok((snapshot, done)) => {
                if completion.is_none() {
                    *completion = done;
                }
                Some(snapshot)
            }
            Err(rejection) => {
                log_debug!("auto advance rejected: {}", rejection);
                None
            }
        }
    }

    fn publish(&self, snapshot: &SessionSnapshot) {
        self.narrator.on_session_state_change(snapshot);
        let _ = self.events.send(SessionEvent::StateChanged(snapshot.clone()));
    }

    async fn teardown(&self, inner: &mut ControllerInner) -> bool {
        inner.timer.reset(0).await;
        inner.breath.stop().await;
        self.narrator.cancel_all();

        match inner.session.take() {
            Some(session) => {
                log_debug!("session {} torn down", session.id());
                let _ = self.events.send(SessionEvent::Ended {
                    session_id: session.id(),
                });
                true
            }
            None => false,
        }
    }

    /// Completion is already visible to the caller; a failed write only
    /// loses the record.
    async fn persist(&self, event: &CompletionEvent) {
        if let Err(err) = self.store.record_completion(event).await {
            log_error!("failed to record completion of {}: {:#}", event.session_id, err);
        }
    }

    async fn handle_signal(&self, signal: Signal) {
        let completion = {
            let mut inner = self.inner.lock().await;
            let Some(command) = self.command_for(&inner, signal).await else {
                return;
            };

            let mut completion = match self.apply(&mut inner, command).await {
                Ok((_, completion)) => completion,
                Err(rejection) => {
                    log_debug!("signal rejected: {}", rejection);
                    return;
                }
            };
            self.follow_auto_advance(&mut inner, &mut completion).await;
            completion
        };

        if let Some(event) = completion {
            self.persist(&event).await;
        }
    }

    async fn command_for(&self, inner: &ControllerInner, signal: Signal) -> Option<Command> {
        match signal {
            Signal::Timer(event) => {
                if event.generation() != inner.timer.generation().await {
                    log_debug!("dropping stale timer event {:?}", event);
                    return None;
                }
                Some(match event {
                    TimerEvent::Tick { remaining_secs, .. } => Command::TimerTick { remaining_secs },
                    TimerEvent::Expired { .. } => Command::TimerExpired,
                })
            }
            Signal::Breath(event) => {
                if event.generation != inner.breath.generation() {
                    log_debug!("dropping stale breath event {:?}", event);
                    return None;
                }
                Some(Command::BreathPhase {
                    phase: event.phase,
                    cycle_count: event.cycle_count,
                })
            }
            Signal::NarrationFinished(key) => {
                let session = inner.session.as_ref()?;
                if !session.practice().auto_advance {
                    return None;
                }
                let snapshot = session.snapshot();
                if cue_for(&snapshot).key != key {
                    log_debug!("ignoring narration continuation for stale state {}", key);
                    return None;
                }
                match snapshot.sub_state {
                    SubState::Intro => Some(Command::Start),
                    // Breath cues repeat for the whole step; only guidance
                    // narration ends a self-timed step.
                    SubState::Active
                        if !snapshot.paused
                            && snapshot.breath.is_none()
                            && snapshot.step.timed_secs().is_none() =>
                    {
                        Some(Command::Advance)
                    }
                    _ => None,
                }
            }
        }
    }
}

/// Copy the timer's own countdown into the session. A run that already
/// expired reads as zero.
async fn sync_countdown(session: &mut Session, timer: &CountdownTimer) {
    let countdown = timer.snapshot().await;
    let remaining_secs = match countdown.status {
        CountdownStatus::Expired => 0,
        _ => countdown.remaining_secs,
    };
    if let Err(rejection) = session.apply(Command::SyncTimer { remaining_secs }) {
        log_debug!("countdown sync rejected: {}", rejection);
    }
}

async fn pump_signals(shared: Weak<Shared>, mut signals: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = signals.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_signal(signal).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{NarrationPlayer, Playback};
    use crate::breath::BreathPhase;
    use crate::models::{BreathPattern, PracticeKind, Step};
    use crate::speech::{AudioClip, SpeechSynthesizer};
    use async_trait::async_trait;
    use tokio::time;

    struct SilentPlayer;

    impl NarrationPlayer for SilentPlayer {
        fn play(&self, _clip: &AudioClip) -> anyhow::Result<Playback> {
            let (_notifier, playback) = Playback::channel();
            Ok(playback)
        }
        fn stop(&self) {}
        fn set_volume(&self, _volume: f32) {}
    }

    struct DiscardStore;

    #[async_trait]
    impl SessionStore for DiscardStore {
        async fn record_completion(&self, _event: &CompletionEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn controller() -> SessionController {
        let narrator = NarrationOrchestrator::new(
            SpeechSynthesizer::new(Vec::new()),
            Arc::new(SilentPlayer),
            false,
        );
        let (controller, _events) =
            SessionController::new(narrator, Arc::new(DiscardStore), ControllerConfig::default());
        controller
    }

    /// Pause while holding the controller lock, so every timer and breath
    /// signal fired in the meantime is still queued behind it.
    async fn pause_with_signals_queued(controller: &SessionController, after: Duration) {
        let mut inner = controller.shared.inner.lock().await;
        time::sleep(after).await;
        controller
            .shared
            .apply(&mut inner, Command::Pause)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pause_racing_expiry_still_lets_the_step_finish() {
        let controller = controller();
        let practice = Practice::new(
            "sq",
            "Square",
            PracticeKind::Breath,
            20,
            vec![Step::new("Box", "Follow the square").with_duration(3)],
        )
        .with_breath_pattern(BreathPattern::new(3, 3, 3, 3));
        controller.select_practice(Arc::new(practice)).await;
        controller.start().await.unwrap();

        pause_with_signals_queued(&controller, Duration::from_millis(3_500)).await;
        let paused = controller.snapshot().await.unwrap();
        assert!(paused.paused);
        assert_eq!(paused.remaining_secs, 0);
        assert_eq!(paused.breath.map(|b| b.phase), Some(BreathPhase::Hold));

        // Let the queued signals drain; they are all stale now.
        time::sleep(Duration::from_millis(100)).await;

        let resumed = controller.resume().await.unwrap();
        assert_eq!(resumed.remaining_secs, 0);
        assert!(!resumed.timer_running);
        assert!(resumed.can_advance());
        assert_eq!(resumed.breath.map(|b| b.phase), Some(BreathPhase::Hold));

        let done = controller.advance().await.unwrap();
        assert_eq!(done.sub_state, SubState::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_with_ticks_queued_keeps_the_timer_value() {
        let controller = controller();
        let practice = Practice::new(
            "w",
            "Witness",
            PracticeKind::Witness,
            10,
            vec![Step::new("Watch", "Notice thoughts").with_duration(10)],
        );
        controller.select_practice(Arc::new(practice)).await;
        controller.start().await.unwrap();

        pause_with_signals_queued(&controller, Duration::from_millis(2_500)).await;
        time::sleep(Duration::from_millis(100)).await;

        let resumed = controller.resume().await.unwrap();
        assert_eq!(resumed.remaining_secs, 8);
        assert!(resumed.timer_running);
        assert!(controller.timer_running().await);

        time::sleep(Duration::from_millis(8_500)).await;
        let snapshot = controller.snapshot().await.unwrap();
        assert_eq!(snapshot.remaining_secs, 0);
        assert!(snapshot.can_advance());
    }

    #[tokio::test(start_paused = true)]
    async fn free_running_flow_moves_on_when_resumed_after_running_out() {
        let controller = controller();
        let practice = Practice::new(
            "shake",
            "Energy Reset",
            PracticeKind::Energy,
            30,
            vec![
                Step::new("Shake", "Shake out your hands").with_duration(2),
                Step::new("Still", "Stand still"),
            ],
        )
        .with_auto_advance();
        controller.select_practice(Arc::new(practice)).await;
        controller.start().await.unwrap();

        pause_with_signals_queued(&controller, Duration::from_millis(2_500)).await;
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(controller.snapshot().await.unwrap().step_index, 0);

        let resumed = controller.resume().await.unwrap();
        assert_eq!(resumed.step_index, 1);
        assert_eq!(resumed.sub_state, SubState::Intro);
    }
}
