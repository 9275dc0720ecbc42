//! Control messages applied by the mixer at block boundaries.

use std::sync::Arc;

use nm_core::{ControlChange, Controls, SampleStore, SoundKey};

use crate::playback::PlaybackState;

/// A mutation queued by a control thread.
#[derive(Debug)]
pub enum Command {
    /// Load a sound into the voice arena.
    Insert {
        key: SoundKey,
        store: Arc<SampleStore>,
        controls: Controls,
        state: Arc<PlaybackState>,
        epoch: u32,
    },
    /// Unload a sound, silencing it immediately.
    Remove(SoundKey),
    /// Start a new needle at position 0.
    Play(SoundKey),
    /// Drop every needle and adopt the stop epoch.
    Stop { key: SoundKey, epoch: u32 },
    /// Change one control of a sound.
    Set { key: SoundKey, change: ControlChange },
    /// Change one control of the master bus.
    SetMaster(ControlChange),
}
