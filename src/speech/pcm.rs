//! Secondary remote voice (Gemini TTS-compatible). The API answers with
//! base64 raw 16-bit little-endian mono PCM, which is wrapped in a WAV
//! container before playback.

use std::io::Cursor;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;

use super::{AudioClip, AudioFormat, SpeechError, SpeechProvider};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Aoede";
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

pub struct PcmVoiceProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    voice: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl PcmVoiceProvider {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            voice: DEFAULT_VOICE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
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

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.voice }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl SpeechProvider for PcmVoiceProvider {
    fn name(&self) -> &'static str {
        "pcm"
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SpeechError::MissingCredentials("PCM voice"))?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.request_body(text))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Status { status, body });
        }

        let payload: GenerateResponse = response.json().await?;
        let inline = payload
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .find_map(|part| part.inline_data)
            .ok_or_else(|| SpeechError::InvalidPayload("response carried no audio".into()))?;

        let pcm = STANDARD
            .decode(inline.data.as_bytes())
            .map_err(|err| SpeechError::InvalidPayload(format!("bad base64 audio: {err}")))?;
        let sample_rate = sample_rate_from_mime(&inline.mime_type).unwrap_or(DEFAULT_SAMPLE_RATE);

        let wav = pcm16_to_wav(&pcm, sample_rate, 1)?;
        Ok(AudioClip::new(wav, AudioFormat::Wav, self.name()))
    }
}

/// Parse `rate=` out of a mime type such as `audio/L16;codec=pcm;rate=24000`.
pub fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

/// Wrap raw little-endian 16-bit PCM in a WAV container.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, SpeechError> {
    if pcm.len() % 2 != 0 {
        return Err(SpeechError::InvalidPayload(format!(
            "PCM payload has odd length {}",
            pcm.len()
        )));
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|err| SpeechError::InvalidPayload(format!("WAV write error: {err}")))?;
        for frame in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([frame[0], frame[1]]))
                .map_err(|err| SpeechError::InvalidPayload(format!("WAV sample write error: {err}")))?;
        }
        writer
            .finalize()
            .map_err(|err| SpeechError::InvalidPayload(format!("WAV finalize error: {err}")))?;
    }
    Ok(cursor.into_inner())
}
