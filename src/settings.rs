use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DATA_DIR_ENV: &str = "STILLPOINT_DATA_DIR";
pub const HIFI_API_KEY_ENV: &str = "ELEVENLABS_API_KEY";
pub const PCM_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DAILY_SCRIPT_URL_ENV: &str = "STILLPOINT_DAILY_SCRIPT_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub enabled: bool,
    pub volume: f32,
    pub hifi_voice_id: Option<String>,
    pub hifi_model: Option<String>,
    pub pcm_voice: Option<String>,
    pub pcm_model: Option<String>,
    pub local_voice: Option<String>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.8,
            hifi_voice_id: None,
            hifi_model: None,
            pcm_voice: None,
            pcm_model: None,
            local_voice: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserSettings {
    voice: VoiceSettings,
}

/// Secrets and deployment knobs. Never written to the settings file.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub hifi_api_key: Option<String>,
    pub pcm_api_key: Option<String>,
    pub daily_script_url: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            hifi_api_key: non_empty_env(HIFI_API_KEY_ENV),
            pcm_api_key: non_empty_env(PCM_API_KEY_ENV),
            daily_script_url: non_empty_env(DAILY_SCRIPT_URL_ENV),
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `$STILLPOINT_DATA_DIR`, else the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(dir) = non_empty_env(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::data_dir()
        .map(|dir| dir.join("stillpoint"))
        .context("could not determine a data directory; set STILLPOINT_DATA_DIR")
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// Load from `path`; a missing or corrupt file yields defaults.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {}", path.display(), err);
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn voice(&self) -> VoiceSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .voice
            .clone()
    }

    pub fn update_voice(&self, settings: VoiceSettings) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.voice = settings;
        self.persist(&guard)
    }

    pub fn set_voice_enabled(&self, enabled: bool) -> Result<()> {
        let mut voice = self.voice();
        voice.enabled = enabled;
        self.update_voice(voice)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
