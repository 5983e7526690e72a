#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use stillpoint_lib::{
    audio::{NarrationPlayer, Playback, PlaybackNotifier},
    models::{BreathPattern, CompletionEvent, Practice, PracticeKind, Step},
    narration::NarrationOrchestrator,
    session::{ControllerConfig, SessionController, SessionEvent, SessionStore},
    speech::{AudioClip, AudioFormat, SpeechError, SpeechProvider, SpeechSynthesizer},
};

/// Let spawned tasks run without crossing a one-second tick.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Provider that echoes the text back as audio bytes, or fails.
pub struct ScriptedProvider {
    name: &'static str,
    succeed: bool,
    delay: Duration,
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn ok(name: &'static str) -> Arc<Self> {
        Self::build(name, true, Duration::ZERO)
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        Self::build(name, false, Duration::ZERO)
    }

    pub fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Self::build(name, true, delay)
    }

    fn build(name: &'static str, succeed: bool, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            succeed,
            delay,
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.succeed {
            Ok(AudioClip::new(text.as_bytes().to_vec(), AudioFormat::Wav, self.name))
        } else {
            Err(SpeechError::Status {
                status: 500,
                body: "scripted failure".into(),
            })
        }
    }
}

#[derive(Default)]
struct PlayerState {
    current: Option<(String, PlaybackNotifier)>,
    played: Vec<String>,
    stopped: Vec<String>,
    stop_calls: usize,
}

/// Records what was played. In `instant` mode every clip finishes
/// immediately; otherwise clips play until `finish_current` or `stop`.
pub struct MockPlayer {
    instant: bool,
    state: Mutex<PlayerState>,
}

impl MockPlayer {
    pub fn manual() -> Arc<Self> {
        Arc::new(Self {
            instant: false,
            state: Mutex::new(PlayerState::default()),
        })
    }

    pub fn instant() -> Arc<Self> {
        Arc::new(Self {
            instant: true,
            state: Mutex::new(PlayerState::default()),
        })
    }

    pub fn current(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .current
            .as_ref()
            .map(|(text, _)| text.clone())
    }

    pub fn played(&self) -> Vec<String> {
        self.state.lock().unwrap().played.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }

    pub fn finish_current(&self) {
        if let Some((_, notifier)) = self.state.lock().unwrap().current.take() {
            notifier.finish();
        }
    }
}

impl NarrationPlayer for MockPlayer {
    fn play(&self, clip: &AudioClip) -> Result<Playback> {
        let text = String::from_utf8_lossy(&clip.bytes).into_owned();
        let (notifier, playback) = Playback::channel();

        let mut state = self.state.lock().unwrap();
        if let Some((previous, previous_notifier)) = state.current.take() {
            state.stopped.push(previous);
            previous_notifier.stop();
        }
        state.played.push(text.clone());
        if self.instant {
            notifier.finish();
        } else {
            state.current = Some((text, notifier));
        }
        Ok(playback)
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        if let Some((text, notifier)) = state.current.take() {
            state.stopped.push(text);
            notifier.stop();
        }
    }

    fn set_volume(&self, _volume: f32) {}
}

#[derive(Default)]
pub struct MemoryStore {
    fail: bool,
    events: Mutex<Vec<CompletionEvent>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<CompletionEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn record_completion(&self, event: &CompletionEvent) -> Result<()> {
        if self.fail {
            bail!("disk full");
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn orchestrator(
    providers: Vec<Arc<dyn SpeechProvider>>,
    player: Arc<MockPlayer>,
    enabled: bool,
) -> NarrationOrchestrator {
    NarrationOrchestrator::new(SpeechSynthesizer::new(providers), player, enabled)
}

pub struct Harness {
    pub controller: SessionController,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub store: Arc<MemoryStore>,
    pub player: Arc<MockPlayer>,
}

pub fn harness(
    providers: Vec<Arc<dyn SpeechProvider>>,
    player: Arc<MockPlayer>,
    store: Arc<MemoryStore>,
    voice_enabled: bool,
) -> Harness {
    let narrator = orchestrator(providers, player.clone(), voice_enabled);
    let (controller, events) =
        SessionController::new(narrator, store.clone(), ControllerConfig::default());
    Harness {
        controller,
        events,
        store,
        player,
    }
}

/// The two-step breath practice: a self-timed settle step, then 180 s.
pub fn quick_calm() -> Arc<Practice> {
    Arc::new(
        Practice::new(
            "1",
            "Quick Calm",
            PracticeKind::Breath,
            35,
            vec![
                Step::new("Settle", "Sit comfortably.").with_duration(0),
                Step::new("Box breathing", "Follow the square.").with_duration(180),
            ],
        )
        .with_breath_pattern(BreathPattern::new(3, 3, 3, 3)),
    )
}

pub fn witness() -> Arc<Practice> {
    Arc::new(Practice::new(
        "witness",
        "The Witness",
        PracticeKind::Witness,
        50,
        vec![
            Step::new("Notice", "Watch thoughts arise.")
                .with_guidance("Let each thought pass.")
                .with_duration(120),
            Step::new("Rest", "Rest as awareness."),
        ],
    ))
}

pub fn self_paced(auto_advance: bool) -> Arc<Practice> {
    let practice = Practice::new(
        "reframe",
        "Reframe",
        PracticeKind::Reframing,
        45,
        vec![
            Step::new("Name it", "Write the thought down.").with_guidance("Just the words."),
            Step::new("Question it", "Is it true?").with_guidance("Look for evidence."),
        ],
    );
    Arc::new(if auto_advance {
        practice.with_auto_advance()
    } else {
        practice
    })
}
