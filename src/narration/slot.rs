use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::audio::{NarrationPlayer, Playback};
use crate::speech::AudioClip;

struct Holder {
    ticket: u64,
    cancel: CancellationToken,
    playing: bool,
}

/// The one place narration may be audible from.
///
/// `acquire` stops whatever currently holds the slot before handing out a new
/// ticket; there is no queue. A holder whose ticket has been superseded can
/// no longer start playback.
pub struct NarrationSlot {
    player: Arc<dyn NarrationPlayer>,
    holder: Mutex<Option<Holder>>,
    next_ticket: AtomicU64,
}

impl NarrationSlot {
    pub fn new(player: Arc<dyn NarrationPlayer>) -> Self {
        Self {
            player,
            holder: Mutex::new(None),
            next_ticket: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Holder>> {
        self.holder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn evict(&self, holder: Holder) {
        holder.cancel.cancel();
        if holder.playing {
            self.player.stop();
        }
    }

    pub fn acquire(&self) -> (u64, CancellationToken) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        let mut guard = self.lock();
        if let Some(previous) = guard.take() {
            self.evict(previous);
        }
        *guard = Some(Holder {
            ticket,
            cancel: cancel.clone(),
            playing: false,
        });
        (ticket, cancel)
    }

    /// Release the slot if `ticket` still holds it, stopping its audio.
    pub fn release(&self, ticket: u64) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|holder| holder.ticket == ticket) {
            if let Some(holder) = guard.take() {
                self.evict(holder);
            }
        }
    }

    pub fn release_current(&self) {
        let mut guard = self.lock();
        if let Some(holder) = guard.take() {
            self.evict(holder);
        }
    }

    /// Start playback for `ticket`. `Ok(None)` when the ticket was superseded
    /// while synthesis was in flight.
    pub fn play(&self, ticket: u64, clip: &AudioClip) -> Result<Option<Playback>> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(holder) if holder.ticket == ticket && !holder.cancel.is_cancelled() => {
                let playback = self.player.play(clip)?;
                holder.playing = true;
                Ok(Some(playback))
            }
            _ => Ok(None),
        }
    }

    /// Playback for `ticket` ended on its own. Returns whether it still held
    /// the slot.
    pub fn finish(&self, ticket: u64) -> bool {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|holder| holder.ticket == ticket) {
            *guard = None;
            true
        } else {
            false
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.lock().as_ref().is_some_and(|holder| holder.playing)
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }

    pub fn set_volume(&self, volume: f32) {
        self.player.set_volume(volume);
    }
}
