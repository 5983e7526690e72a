use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use tokio::task::JoinHandle;

use crate::audio::{NarrationPlayer, PlaybackEnd};
use crate::session::SessionSnapshot;
use crate::speech::SpeechSynthesizer;

use super::{cue_for, NarrationSlot};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Called with the cue key once a state's narration has played to the end.
pub type Continuation = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    /// Played to the end via the named provider.
    Played(&'static str),
    /// Superseded or stopped before it finished.
    Cancelled,
    /// Every tier failed or playback could not start.
    Silent,
}

/// Handle to one `speak` call.
pub struct Utterance {
    ticket: u64,
    slot: Arc<NarrationSlot>,
    task: JoinHandle<NarrationOutcome>,
}

impl Utterance {
    /// Silence this utterance if it still holds the slot.
    pub fn stop(&self) {
        self.slot.release(self.ticket);
    }

    pub async fn wait(self) -> NarrationOutcome {
        self.task.await.unwrap_or(NarrationOutcome::Cancelled)
    }
}

struct Inner {
    synthesizer: SpeechSynthesizer,
    slot: Arc<NarrationSlot>,
    enabled: AtomicBool,
    last_key: Mutex<Option<String>>,
    continuation: Mutex<Option<Continuation>>,
}

impl Inner {
    fn last_key(&self) -> MutexGuard<'_, Option<String>> {
        self.last_key
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn continuation(&self) -> Option<Continuation> {
        self.continuation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// Observes session snapshots and narrates each state entry once.
///
/// Cheap to clone; clones share the slot, the cache and the last spoken key.
#[derive(Clone)]
pub struct NarrationOrchestrator {
    inner: Arc<Inner>,
}

impl NarrationOrchestrator {
    pub fn new(synthesizer: SpeechSynthesizer, player: Arc<dyn NarrationPlayer>, enabled: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                synthesizer,
                slot: Arc::new(NarrationSlot::new(player)),
                enabled: AtomicBool::new(enabled),
                last_key: Mutex::new(None),
                continuation: Mutex::new(None),
            }),
        }
    }

    pub fn set_continuation(&self, continuation: Continuation) {
        *self
            .inner
            .continuation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(continuation);
    }

    pub fn synthesizer(&self) -> &SpeechSynthesizer {
        &self.inner.synthesizer
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Turning voice off silences whatever is audible right away.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.inner.enabled.swap(enabled, Ordering::SeqCst);
        if was && !enabled {
            log_info!("voice disabled; stopping narration");
            self.inner.slot.release_current();
        }
    }

    pub fn set_volume(&self, volume: f32) {
        self.inner.slot.set_volume(volume);
    }

    pub fn is_speaking(&self) -> bool {
        self.inner.slot.is_speaking()
    }

    /// Stop everything and forget the last spoken key.
    pub fn cancel_all(&self) {
        self.inner.slot.release_current();
        *self.inner.last_key() = None;
    }

    /// Narrate the cue for `snapshot` unless it was the last one handled.
    ///
    /// The key is recorded even while voice is off, so turning voice back
    /// on mid-step stays silent until the state next changes.
    pub fn on_session_state_change(&self, snapshot: &SessionSnapshot) {
        let cue = cue_for(snapshot);
        {
            let mut last_key = self.inner.last_key();
            if last_key.as_deref() == Some(cue.key.as_str()) {
                return;
            }
            *last_key = Some(cue.key.clone());
        }

        self.inner.slot.release_current();

        let Some(text) = cue.text else {
            return;
        };
        if !self.is_enabled() {
            log_debug!("voice disabled; skipping narration for {}", cue.key);
            return;
        }

        self.speak_for(text, cue.cache_key, Some(cue.key));
    }

    /// Speak `text` now, taking the slot from whoever holds it.
    pub fn speak(&self, text: impl Into<String>, cache_key: Option<String>) -> Utterance {
        self.speak_for(text.into(), cache_key, None)
    }

    fn speak_for(&self, text: String, cache_key: Option<String>, origin: Option<String>) -> Utterance {
        let (ticket, cancel) = self.inner.slot.acquire();
        let inner = self.inner.clone();

        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return NarrationOutcome::Cancelled,
                outcome = inner.synthesizer.synthesize(&text, cache_key.as_deref()) => outcome,
            };

            let Some(clip) = outcome.into_clip() else {
                inner.slot.release(ticket);
                return NarrationOutcome::Silent;
            };
            let provider = clip.provider;

            let playback = match inner.slot.play(ticket, &clip) {
                Ok(Some(playback)) => playback,
                Ok(None) => return NarrationOutcome::Cancelled,
                Err(err) => {
                    log_warn!("could not start narration playback: {}", err);
                    inner.slot.release(ticket);
                    return NarrationOutcome::Silent;
                }
            };

            let end = tokio::select! {
                _ = cancel.cancelled() => PlaybackEnd::Stopped,
                end = playback.wait() => end,
            };
            if end != PlaybackEnd::Finished || !inner.slot.finish(ticket) {
                return NarrationOutcome::Cancelled;
            }

            if let Some(origin) = origin {
                let current = inner.last_key().clone();
                if current.as_deref() == Some(origin.as_str()) {
                    if let Some(continuation) = inner.continuation() {
                        continuation(origin);
                    }
                } else {
                    log_debug!("narration for {} finished after the state moved on", origin);
                }
            }
            NarrationOutcome::Played(provider)
        });

        Utterance {
            ticket,
            slot: self.inner.slot.clone(),
            task,
        }
    }
}
