//! On-device fallback voice. Shells out to the platform synthesizer, so it
//! works offline and never needs credentials.

use async_trait::async_trait;
use tokio::process::Command;

use super::{AudioClip, AudioFormat, SpeechError, SpeechProvider};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_debug;

#[derive(Debug, Clone, Default)]
pub struct LocalVoiceProvider {
    voice: Option<String>,
}

impl LocalVoiceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice.filter(|voice| !voice.trim().is_empty());
        self
    }

    #[cfg(target_os = "macos")]
    async fn render(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let path = temp_wav_path();
        let mut command = Command::new("say");
        command
            .arg("-o")
            .arg(&path)
            .arg("--data-format=LEI16@22050");
        if let Some(voice) = &self.voice {
            command.arg("-v").arg(voice);
        }
        command.arg(text);

        let output = command.output().await?;
        let result = if output.status.success() {
            tokio::fs::read(&path).await.map_err(SpeechError::from)
        } else {
            Err(SpeechError::Unavailable(format!(
                "say exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        };
        let _ = tokio::fs::remove_file(&path).await;
        result
    }

    #[cfg(not(target_os = "macos"))]
    async fn render(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let mut last_error = None;
        for program in ["espeak-ng", "espeak"] {
            let mut command = Command::new(program);
            command.arg("--stdout");
            if let Some(voice) = &self.voice {
                command.arg("-v").arg(voice);
            }
            command.arg(text);

            match command.output().await {
                Ok(output) if output.status.success() => return Ok(output.stdout),
                Ok(output) => {
                    last_error = Some(SpeechError::Unavailable(format!(
                        "{program} exited with {}",
                        output.status
                    )));
                }
                Err(err) => {
                    log_debug!("{} not available: {}", program, err);
                    last_error = Some(SpeechError::Unavailable(format!("{program}: {err}")));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| SpeechError::Unavailable("no local synthesizer".into())))
    }
}

#[cfg(target_os = "macos")]
fn temp_wav_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("stillpoint-{}.wav", uuid::Uuid::new_v4()))
}

#[async_trait]
impl SpeechProvider for LocalVoiceProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip, SpeechError> {
        if text.trim().is_empty() {
            return Err(SpeechError::InvalidPayload("nothing to say".into()));
        }
        let wav = self.render(text).await?;
        Ok(AudioClip::new(wav, AudioFormat::Wav, self.name()))
    }
}
