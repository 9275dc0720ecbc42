//! Shared types for the needlemix mixer.
//!
//! This crate defines the decoded waveform (`SampleStore`), the playback
//! controls shared by sounds and the engine, and the handle type used to
//! address a sound inside the mixer. The decode front-end produces these
//! types and the mixing engine consumes them.

mod controls;
mod sample;

pub use controls::{ControlChange, Controls, Filter};
pub use sample::{SampleStore, SoundKey};
