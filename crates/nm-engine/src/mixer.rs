//! The mixer: voice arena, active list and block rendering.

use nm_core::{Controls, Filter, SoundKey};
use slotmap::SecondaryMap;

use crate::command::Command;
use crate::voice::Voice;

/// Full-scale value of the `i32` output format.
pub const MAX_AMPLITUDE: f64 = i32::MAX as f64;

/// Hard clip to `[-1, 1]`.
#[inline]
pub fn clip(amp: f64) -> f64 {
    amp.clamp(-1.0, 1.0)
}

/// Clip and scale one mixed amplitude to the output format.
#[inline]
pub fn to_output(amp: f64) -> i32 {
    (clip(amp) * MAX_AMPLITUDE) as i32
}

/// Something the mixer let go of. Dropping it may free memory.
pub enum Retired {
    Voice(Voice),
    Filter(Filter),
}

impl std::fmt::Debug for Retired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Retired::Voice(voice) => write!(f, "Retired::Voice({})", voice.store.name()),
            Retired::Filter(_) => write!(f, "Retired::Filter"),
        }
    }
}

/// Sums every active voice into interleaved `i32` blocks.
pub struct Mixer {
    /// Every loaded voice, addressed by handle.
    voices: SecondaryMap<SoundKey, Voice>,
    /// Voices that have been played and not yet reaped, in play order.
    active: Vec<SoundKey>,
    /// Engine-wide controls.
    master: Controls,
    channels: usize,
}

impl Mixer {
    /// Create a mixer for `channels` interleaved output channels, with room
    /// for `sound_capacity` voices before the arena has to grow.
    pub fn new(channels: u16, sound_capacity: usize) -> Self {
        Self {
            // Slot 0 of a key space is never handed out.
            voices: SecondaryMap::with_capacity(sound_capacity + 1),
            active: Vec::with_capacity(sound_capacity),
            master: Controls::default(),
            channels: channels.max(1) as usize,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    pub fn master(&self) -> &Controls {
        &self.master
    }

    pub fn voice(&self, key: SoundKey) -> Option<&Voice> {
        self.voices.get(key)
    }

    /// Number of voices on the active list.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, key: SoundKey) -> bool {
        self.active.contains(&key)
    }

    /// True when no voice has a needle left.
    pub fn is_idle(&self) -> bool {
        !self
            .active
            .iter()
            .any(|&key| self.voices.get(key).is_some_and(Voice::is_sounding))
    }

    /// Apply one control command.
    ///
    /// Anything the command displaces (an unloaded voice, a replaced
    /// filter) is handed back instead of dropped, so a realtime caller can
    /// pass it to another thread to free.
    pub fn apply(&mut self, command: Command) -> Option<Retired> {
        match command {
            Command::Insert { key, store, controls, state, epoch } => {
                let old = self.voices.insert(key, Voice::new(store, controls, state, epoch));
                if old.is_some() {
                    self.active.retain(|&k| k != key);
                }
                old.map(Retired::Voice)
            }
            Command::Remove(key) => {
                self.active.retain(|&k| k != key);
                self.voices.remove(key).map(Retired::Voice)
            }
            Command::Play(key) => {
                if let Some(voice) = self.voices.get_mut(key) {
                    voice.add_needle();
                    if !voice.registered {
                        voice.registered = true;
                        self.active.push(key);
                    }
                }
                None
            }
            Command::Stop { key, epoch } => {
                if let Some(voice) = self.voices.get_mut(key) {
                    voice.stop(epoch);
                }
                None
            }
            Command::Set { key, change } => self
                .voices
                .get_mut(key)
                .and_then(|voice| voice.controls.apply(change))
                .map(Retired::Filter),
            Command::SetMaster(change) => self.master.apply(change).map(Retired::Filter),
        }
    }

    /// Drop voices whose needles have all ended from the active list.
    pub fn reap(&mut self) {
        let voices = &mut self.voices;
        self.active.retain(|&key| match voices.get_mut(key) {
            Some(voice) if voice.is_sounding() => true,
            Some(voice) => {
                voice.registered = false;
                false
            }
            None => false,
        });
    }

    /// One mixed amplitude for `channel`, before clipping.
    /// Advances every needle of every active voice.
    #[inline]
    pub fn mix_sample(&mut self, channel: usize) -> f64 {
        if self.master.paused {
            return 0.0;
        }

        let mut amp = 0.0;
        for &key in &self.active {
            if let Some(voice) = self.voices.get_mut(key) {
                amp += voice.mix_channel(channel, &self.master);
            }
        }
        self.master.filtered(amp, channel)
    }

    /// Reap finished voices, then fill `block` with interleaved samples.
    pub fn render_block(&mut self, block: &mut [i32]) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.fill_block(block));
        #[cfg(not(feature = "alloc_check"))]
        self.fill_block(block);
    }

    fn fill_block(&mut self, block: &mut [i32]) {
        self.reap();
        let channels = self.channels;
        for frame in block.chunks_mut(channels) {
            for (channel, out) in frame.iter_mut().enumerate() {
                *out = to_output(self.mix_sample(channel));
            }
        }
    }
}
