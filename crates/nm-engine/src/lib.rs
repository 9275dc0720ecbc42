//! Block mixing core for the needlemix mixer.
//!
//! The `Mixer` owns every loaded voice and turns them into blocks of
//! interleaved `i32` samples. It is driven by one thread at a time; other
//! threads talk to it only through `Command`s and read back through each
//! voice's `PlaybackState`.

mod command;
mod mixer;
mod playback;
mod voice;

pub use command::Command;
pub use mixer::{clip, to_output, Mixer, Retired, MAX_AMPLITUDE};
pub use playback::PlaybackState;
pub use voice::{Needle, Voice, MAX_NEEDLES};
