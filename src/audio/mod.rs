use std::io::Cursor;
use std::sync::{
    mpsc::{self, RecvTimeoutError, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::oneshot;

use crate::speech::AudioClip;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// How a single playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
    Stopped,
}

/// Completion handle for one clip. Resolves when the clip plays out or is
/// cut short; a dropped notifier counts as stopped.
#[derive(Debug)]
pub struct Playback {
    done: oneshot::Receiver<PlaybackEnd>,
}

impl Playback {
    pub fn channel() -> (PlaybackNotifier, Playback) {
        let (tx, rx) = oneshot::channel();
        (PlaybackNotifier { tx: Some(tx) }, Playback { done: rx })
    }

    pub async fn wait(self) -> PlaybackEnd {
        self.done.await.unwrap_or(PlaybackEnd::Stopped)
    }
}

#[derive(Debug)]
pub struct PlaybackNotifier {
    tx: Option<oneshot::Sender<PlaybackEnd>>,
}

impl PlaybackNotifier {
    pub fn finish(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(PlaybackEnd::Finished);
        }
    }

    pub fn stop(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(PlaybackEnd::Stopped);
        }
    }
}

/// Output side of narration. One clip plays at a time; `play` replaces
/// whatever is currently audible.
pub trait NarrationPlayer: Send + Sync {
    fn play(&self, clip: &AudioClip) -> Result<Playback>;
    fn stop(&self);
    fn set_volume(&self, volume: f32);
}

enum AudioCommand {
    Play {
        bytes: Arc<[u8]>,
        notifier: PlaybackNotifier,
    },
    Stop,
    SetVolume(f32),
}

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// rodio-backed player. Output objects are not `Send`, so they live on a
/// dedicated thread that is spawned on first use and fed over a channel.
pub struct RodioPlayer {
    tx: Mutex<Option<Sender<AudioCommand>>>,
    initial_volume: f32,
}

impl RodioPlayer {
    pub fn new(volume: f32) -> Self {
        Self {
            tx: Mutex::new(None),
            initial_volume: volume.clamp(0.0, 1.0),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self.tx.lock().map_err(|e| anyhow!(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let initial_volume = self.initial_volume;

        thread::Builder::new()
            .name("audio-narration".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut current: Option<(Sink, PlaybackNotifier)> = None;
                let mut volume = initial_volume;

                loop {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(AudioCommand::Play { bytes, notifier }) => {
                            if let Some((sink, previous)) = current.take() {
                                sink.stop();
                                previous.stop();
                            }
                            match start_clip(&mut output, bytes, volume) {
                                Ok(sink) => current = Some((sink, notifier)),
                                Err(err) => {
                                    log_warn!("narration playback failed: {}", err);
                                    notifier.stop();
                                }
                            }
                        }
                        Ok(AudioCommand::Stop) => {
                            if let Some((sink, notifier)) = current.take() {
                                sink.stop();
                                notifier.stop();
                            }
                        }
                        Ok(AudioCommand::SetVolume(v)) => {
                            volume = v.clamp(0.0, 1.0);
                            if let Some((sink, _)) = current.as_ref() {
                                sink.set_volume(volume);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }

                    if current.as_ref().is_some_and(|(sink, _)| sink.empty()) {
                        if let Some((_, notifier)) = current.take() {
                            log_debug!("narration clip finished");
                            notifier.finish();
                        }
                    }
                }
            })
            .map_err(|e| anyhow!("failed to spawn audio thread: {}", e))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    fn send(&self, command: AudioCommand) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(command)
            .map_err(|_| anyhow!("audio thread has shut down"))
    }
}

fn start_clip(
    output: &mut Option<(OutputStream, OutputStreamHandle)>,
    bytes: Arc<[u8]>,
    volume: f32,
) -> Result<Sink> {
    if output.is_none() {
        let pair = OutputStream::try_default()
            .map_err(|e| anyhow!("failed to open audio output: {}", e))?;
        *output = Some(pair);
    }
    let handle = match output.as_ref() {
        Some((_, handle)) => handle,
        None => return Err(anyhow!("audio output unavailable")),
    };

    let source = Decoder::new(Cursor::new(bytes))
        .map_err(|e| anyhow!("failed to decode narration clip: {}", e))?;
    let sink = Sink::try_new(handle).map_err(|e| anyhow!("failed to create audio sink: {}", e))?;
    sink.set_volume(volume);
    sink.append(source);
    Ok(sink)
}

impl NarrationPlayer for RodioPlayer {
    fn play(&self, clip: &AudioClip) -> Result<Playback> {
        let (notifier, playback) = Playback::channel();
        self.send(AudioCommand::Play {
            bytes: clip.bytes.clone(),
            notifier,
        })?;
        Ok(playback)
    }

    fn stop(&self) {
        let tx = self.tx.lock().ok().and_then(|guard| guard.clone());
        if let Some(tx) = tx {
            let _ = tx.send(AudioCommand::Stop);
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Err(err) = self.send(AudioCommand::SetVolume(volume)) {
            log_warn!("could not set narration volume: {}", err);
        }
    }
}
