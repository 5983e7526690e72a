use std::sync::Arc;

use super::{AudioClip, NarrationCache, SpeechError, SpeechProvider};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Result of running the fallback chain once.
#[derive(Debug)]
pub enum SynthesisOutcome {
    Cached(AudioClip),
    Synthesized {
        provider: &'static str,
        clip: AudioClip,
    },
    /// Every tier failed; narration degrades to silence.
    Exhausted {
        failures: Vec<(&'static str, SpeechError)>,
    },
}

impl SynthesisOutcome {
    pub fn clip(&self) -> Option<&AudioClip> {
        match self {
            SynthesisOutcome::Cached(clip) | SynthesisOutcome::Synthesized { clip, .. } => Some(clip),
            SynthesisOutcome::Exhausted { .. } => None,
        }
    }

    pub fn into_clip(self) -> Option<AudioClip> {
        match self {
            SynthesisOutcome::Cached(clip) | SynthesisOutcome::Synthesized { clip, .. } => Some(clip),
            SynthesisOutcome::Exhausted { .. } => None,
        }
    }
}

/// Ordered provider tiers behind the narration cache. The first tier that
/// succeeds wins; each tier gets exactly one attempt.
pub struct SpeechSynthesizer {
    providers: Vec<Arc<dyn SpeechProvider>>,
    cache: NarrationCache,
}

impl SpeechSynthesizer {
    pub fn new(providers: Vec<Arc<dyn SpeechProvider>>) -> Self {
        Self {
            providers,
            cache: NarrationCache::new(),
        }
    }

    pub fn cache(&self) -> &NarrationCache {
        &self.cache
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    pub async fn synthesize(&self, text: &str, cache_key: Option<&str>) -> SynthesisOutcome {
        let key = NarrationCache::key_for(text, cache_key);
        if let Some(clip) = self.cache.get(key) {
            log_debug!("narration cache hit for '{}'", key);
            return SynthesisOutcome::Cached(clip);
        }

        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.synthesize(text).await {
                Ok(clip) if !clip.is_empty() => {
                    log_info!(
                        "synthesized {} bytes via {} for '{}'",
                        clip.len(),
                        provider.name(),
                        key
                    );
                    self.cache.insert(key, clip.clone());
                    return SynthesisOutcome::Synthesized {
                        provider: provider.name(),
                        clip,
                    };
                }
                Ok(_) => {
                    log_warn!("{} returned empty audio, falling back", provider.name());
                    failures.push((
                        provider.name(),
                        SpeechError::InvalidPayload("empty audio".into()),
                    ));
                }
                Err(err) => {
                    log_warn!("{} synthesis failed, falling back: {}", provider.name(), err);
                    failures.push((provider.name(), err));
                }
            }
        }

        log_warn!("all speech tiers failed for '{}'; continuing silently", key);
        SynthesisOutcome::Exhausted { failures }
    }
}
