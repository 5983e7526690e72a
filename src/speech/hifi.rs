//! High-fidelity remote voice (ElevenLabs-compatible text-to-speech API).

use async_trait::async_trait;
use serde_json::json;

use super::{AudioClip, AudioFormat, SpeechError, SpeechProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_MODEL: &str = "eleven_multilingual_v2";
/// Calm, low-register narrator voice.
pub const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";

pub struct HiFiVoiceProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    voice_id: String,
    model: String,
    base_url: String,
}

impl HiFiVoiceProvider {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        )
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "text": text,
            "model_id": self.model,
            "voice_settings": {
                "stability": 0.6,
                "similarity_boost": 0.75,
            },
        })
    }
}

#[async_trait]
impl SpeechProvider for HiFiVoiceProvider {
    fn name(&self) -> &'static str {
        "hifi"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SpeechError::MissingCredentials("hi-fi voice"))?;

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&self.request_body(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        Ok(AudioClip::new(bytes.to_vec(), AudioFormat::Mp3, self.name()))
    }
}
