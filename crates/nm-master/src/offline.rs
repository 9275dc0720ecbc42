//! Faster-than-real-time rendering without a device.

use std::sync::Arc;

use nm_core::{ControlChange, Controls, SampleStore, SoundKey};
use nm_engine::{Command, Mixer, PlaybackState};
use slotmap::SlotMap;

/// Drives a `Mixer` directly, block by block.
pub struct OfflineRender {
    mixer: Mixer,
    keys: SlotMap<SoundKey, ()>,
    block: Vec<i32>,
    sample_rate: u32,
}

impl OfflineRender {
    pub fn new(sample_rate: u32, channels: u16, block_sample_count: usize) -> Self {
        Self {
            mixer: Mixer::new(channels, 16),
            keys: SlotMap::with_key(),
            block: vec![0; block_sample_count],
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.mixer.channels()
    }

    /// Change one engine-wide control.
    pub fn master(&mut self, change: ControlChange) {
        self.mixer.apply(Command::SetMaster(change));
    }

    /// Load `store` and start one needle on it.
    pub fn play(&mut self, store: Arc<SampleStore>, controls: Controls) -> Arc<PlaybackState> {
        let key = self.keys.insert(());
        let state = Arc::new(PlaybackState::new());
        self.mixer.apply(Command::Insert { key, store, controls, state: state.clone(), epoch: 0 });
        state.begin_needle();
        self.mixer.apply(Command::Play(key));
        state
    }

    pub fn is_idle(&self) -> bool {
        self.mixer.is_idle()
    }

    pub fn render_block(&mut self) -> &[i32] {
        self.mixer.render_block(&mut self.block);
        &self.block
    }

    /// Render until every needle has ended, or `max_blocks` have been mixed.
    pub fn render_until_idle(&mut self, max_blocks: usize) -> Vec<i32> {
        let mut out = Vec::new();
        for _ in 0..max_blocks {
            if self.mixer.is_idle() {
                break;
            }
            let block = self.render_block();
            out.extend_from_slice(block);
        }
        out
    }
}
