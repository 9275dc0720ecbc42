//! Engine error and diagnostic types.

use nm_audio::{AudioError, OutputFormat};
use nm_core::SampleStore;
use thiserror::Error;

/// Errors that leave an engine unable to run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Failed to spawn mixing thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Mixing thread exited during startup")]
    ThreadExited,
}

/// A sound whose layout differs from its engine's. It still plays, at the
/// wrong pitch or channel mapping.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchWarning {
    #[error("sample rate {sound} Hz does not match the engine's {engine} Hz")]
    SampleRate { sound: u32, engine: u32 },

    #[error("channel count {sound} does not match the engine's {engine}")]
    Channels { sound: u16, engine: u16 },
}

/// Compare a store against the engine output format.
pub fn check_format(store: &SampleStore, format: &OutputFormat) -> Vec<MismatchWarning> {
    let mut found = Vec::new();
    if store.sample_rate() != format.sample_rate {
        found.push(MismatchWarning::SampleRate {
            sound: store.sample_rate(),
            engine: format.sample_rate,
        });
    }
    if store.channels() != format.channels {
        found.push(MismatchWarning::Channels {
            sound: store.channels(),
            engine: format.channels,
        });
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(sample_rate: u32, channels: u16) -> OutputFormat {
        OutputFormat { sample_rate, channels, block_samples: 256, block_count: 4 }
    }

    #[test]
    fn matching_store_has_no_warnings() {
        let store = SampleStore::new("ok", vec![0.0; 4], 44100, 16, 1);
        assert!(check_format(&store, &format(44100, 1)).is_empty());
    }

    #[test]
    fn both_mismatches_reported() {
        let store = SampleStore::new("odd", vec![0.0; 4], 22050, 16, 2);
        let found = check_format(&store, &format(48000, 1));
        assert_eq!(
            found,
            vec![
                MismatchWarning::SampleRate { sound: 22050, engine: 48000 },
                MismatchWarning::Channels { sound: 2, engine: 1 },
            ]
        );
        assert_eq!(found[0].to_string(), "sample rate 22050 Hz does not match the engine's 48000 Hz");
    }
}
