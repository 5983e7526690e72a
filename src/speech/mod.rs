//! Speech synthesis: provider tiers, the fallback chain over them, and the
//! narration cache in front of it.
//!
//! ```text
//!   cache hit ──────────────────────────────────────────► clip
//!   miss ─► hi-fi remote (mp3) ─► PCM remote (wav) ─► local ─► clip | exhausted
//! ```

pub mod cache;
pub mod hifi;
pub mod local;
pub mod pcm;
pub mod synthesizer;

use std::sync::Arc;

use async_trait::async_trait;

pub use cache::NarrationCache;
pub use hifi::HiFiVoiceProvider;
pub use local::LocalVoiceProvider;
pub use pcm::PcmVoiceProvider;
pub use synthesizer::{SpeechSynthesizer, SynthesisOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

/// Encoded, playable audio. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Arc<[u8]>,
    pub format: AudioFormat,
    /// Provider that produced the audio.
    pub provider: &'static str,
}

impl AudioClip {
    pub fn new(bytes: impl Into<Arc<[u8]>>, format: AudioFormat, provider: &'static str) -> Self {
        Self {
            bytes: bytes.into(),
            format,
            provider,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Why a single tier failed. Every variant means "fall through to the next
/// tier"; none is retried.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("{0} credentials are not configured")]
    MissingCredentials(&'static str),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid audio payload: {0}")]
    InvalidPayload(String),

    #[error("local synthesis unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One synthesis tier.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Provider name for logging and outcome tagging.
    fn name(&self) -> &'static str;

    /// Whether the provider needs the network.
    fn is_remote(&self) -> bool;

    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError>;
}
