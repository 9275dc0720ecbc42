//! Voice: one loaded sound and its playback cursors.

use std::sync::Arc;

use arrayvec::ArrayVec;
use nm_core::{Controls, SampleStore};

use crate::playback::PlaybackState;

/// Maximum number of overlapping needles per voice.
pub const MAX_NEEDLES: usize = 32;

/// A playback cursor: fractional index into the voice's samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Needle {
    pub position: f64,
}

impl Needle {
    /// Move forward by `step`. Returns false once the needle has run off the
    /// end of a `len`-sample stream and is not looping.
    #[inline]
    pub fn advance(&mut self, step: f64, len: usize, looping: bool) -> bool {
        self.position += step;
        // Negative velocity runs off the front; treat it like the end.
        if self.position >= len as f64 || !(self.position >= 0.0) {
            self.position = 0.0;
            return looping;
        }
        true
    }
}

/// Mixer-side state of one sound.
#[derive(Clone, Debug)]
pub struct Voice {
    pub store: Arc<SampleStore>,
    pub controls: Controls,
    pub needles: ArrayVec<Needle, MAX_NEEDLES>,
    /// Status shared with the sound handle.
    pub state: Arc<PlaybackState>,
    /// Stop epoch last applied to this voice.
    pub epoch: u32,
    /// Is this voice on the mixer's active list?
    pub registered: bool,
}

impl Voice {
    pub fn new(store: Arc<SampleStore>, controls: Controls, state: Arc<PlaybackState>, epoch: u32) -> Self {
        Self {
            store,
            controls,
            needles: ArrayVec::new(),
            state,
            epoch,
            registered: false,
        }
    }

    /// Start a needle at the beginning of the stream.
    /// When every slot is taken the needle furthest along is stolen.
    pub fn add_needle(&mut self) {
        if self.needles.is_full() {
            let oldest = self
                .needles
                .iter()
                .enumerate()
                .fold(0, |best, (i, n)| {
                    if n.position > self.needles[best].position { i } else { best }
                });
            self.needles.remove(oldest);
            self.state.end_needle(self.epoch);
        }
        self.needles.push(Needle::default());
    }

    /// Drop every needle.
    pub fn stop(&mut self, epoch: u32) {
        self.needles.clear();
        self.epoch = epoch;
    }

    pub fn is_sounding(&self) -> bool {
        !self.needles.is_empty()
    }

    /// Sum every needle's contribution for `channel` and advance them.
    ///
    /// Each needle reads `samples[floor(position)]`, runs it through the
    /// voice filter, then scales by the voice and master gains. Needles that
    /// run off the end are removed unless the voice loops.
    #[inline]
    pub fn mix_channel(&mut self, channel: usize, master: &Controls) -> f64 {
        if self.controls.paused {
            return 0.0;
        }

        let gain = self.controls.gain() * master.gain();
        let step = self.controls.velocity * master.velocity;
        let len = self.store.sample_count();
        let looping = self.controls.looping;

        let mut amp = 0.0;
        let mut i = 0;
        while i < self.needles.len() {
            let needle = &mut self.needles[i];
            let raw = self.store.get(needle.position as usize);
            amp += self.controls.filtered(raw, channel) * gain;

            if needle.advance(step, len, looping) {
                i += 1;
            } else {
                self.needles.remove(i);
                self.state.end_needle(self.epoch);
            }
        }
        amp
    }
}
