pub mod audio;
pub mod breath;
pub mod catalog;
pub mod db;
pub mod models;
pub mod narration;
pub mod session;
pub mod settings;
pub mod speech;
pub mod timer;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use audio::RodioPlayer;
use catalog::DailyScriptSource;
use db::Database;
use narration::NarrationOrchestrator;
use session::{ControllerConfig, SessionController, SessionEvent};
use settings::{Credentials, SettingsStore, VoiceSettings};
use speech::{
    HiFiVoiceProvider, LocalVoiceProvider, PcmVoiceProvider, SpeechProvider, SpeechSynthesizer,
};

pub use catalog::Catalog;
pub use models::{BreathPattern, CompletionEvent, Practice, PracticeKind, Step};

/// Startup options that do not live in the settings file.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Overrides `$STILLPOINT_DATA_DIR` and the platform default.
    pub data_dir: Option<PathBuf>,
    /// Force narration off for this run without touching saved settings.
    pub no_voice: bool,
}

/// Everything a front end needs, wired together.
pub struct AppState {
    pub controller: SessionController,
    pub db: Database,
    pub settings: SettingsStore,
    pub daily: DailyScriptSource,
}

impl AppState {
    pub fn bootstrap(options: AppOptions) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        let data_dir = match options.data_dir {
            Some(dir) => dir,
            None => settings::data_dir()?,
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let voice = settings.voice();
        let credentials = Credentials::from_env();

        let db = Database::new(data_dir.join("stillpoint.sqlite3"))?;

        let synthesizer = SpeechSynthesizer::new(build_providers(&voice, &credentials)?);
        log::info!(
            "Speech tiers: {}",
            synthesizer.provider_names().join(" -> ")
        );

        let player = Arc::new(RodioPlayer::new(voice.volume));
        let narrator =
            NarrationOrchestrator::new(synthesizer, player, voice.enabled && !options.no_voice);

        let (controller, events) = SessionController::new(
            narrator,
            Arc::new(db.clone()),
            ControllerConfig::default(),
        );

        let daily = DailyScriptSource::new(credentials.daily_script_url)?;

        Ok((
            Self {
                controller,
                db,
                settings,
                daily,
            },
            events,
        ))
    }

    /// Toggle narration and remember the choice.
    pub fn set_voice_enabled(&self, enabled: bool) -> Result<()> {
        self.controller.set_voice_enabled(enabled);
        self.settings.set_voice_enabled(enabled)
    }
}

fn build_providers(
    voice: &VoiceSettings,
    credentials: &Credentials,
) -> Result<Vec<Arc<dyn SpeechProvider>>> {
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let mut hifi = HiFiVoiceProvider::new(client.clone(), credentials.hifi_api_key.clone());
    if let Some(voice_id) = &voice.hifi_voice_id {
        hifi = hifi.with_voice(voice_id.clone());
    }
    if let Some(model) = &voice.hifi_model {
        hifi = hifi.with_model(model.clone());
    }

    let mut pcm = PcmVoiceProvider::new(client, credentials.pcm_api_key.clone());
    if let Some(name) = &voice.pcm_voice {
        pcm = pcm.with_voice(name.clone());
    }
    if let Some(model) = &voice.pcm_model {
        pcm = pcm.with_model(model.clone());
    }

    let local = LocalVoiceProvider::new().with_voice(voice.local_voice.clone());

    Ok(vec![Arc::new(hifi), Arc::new(pcm), Arc::new(local)])
}
