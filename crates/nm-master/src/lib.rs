//! Threaded audio engine and sound handles for the needlemix mixer.
//!
//! An `AudioEngine` opens one output device and runs a mixing thread that
//! keeps the device's block ring full. `Sound`s are bound to an engine and
//! controlled from any thread; their changes reach the mixer through a
//! bounded command mailbox at the next block boundary.

mod clock;
mod config;
mod engine;
mod error;
mod offline;
mod sound;

pub use clock::BlockClock;
pub use config::{
    EngineConfig, DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SAMPLES, DEFAULT_CHANNELS,
    DEFAULT_COMMAND_CAPACITY, DEFAULT_SAMPLE_RATE, DEFAULT_SOUND_CAPACITY,
};
pub use engine::AudioEngine;
pub use error::{check_format, EngineError, MismatchWarning};
pub use offline::OfflineRender;
pub use sound::Sound;

// Re-export common types so callers don't need the lower crates directly.
pub use nm_audio::{AudioError, CpalHost, MemoryHost, OutputHost};
pub use nm_core::{ControlChange, Controls, Filter, SampleStore};
pub use nm_formats::{decode, samples_to_wav, write_wav, DecodeError};
