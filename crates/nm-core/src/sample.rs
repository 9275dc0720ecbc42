//! Decoded sample data.

use std::fmt;
use std::time::Duration;

slotmap::new_key_type! {
    /// Handle addressing one sound inside the mixer's voice arena.
    pub struct SoundKey;
}

/// An immutable decoded waveform.
///
/// Samples are normalized to `[-1, 1]` and interleaved when the source has
/// more than one channel. A store is shared between sounds through `Arc`
/// and never mutated after construction.
#[derive(Clone, PartialEq)]
pub struct SampleStore {
    name: String,
    samples: Vec<f64>,
    sample_rate: u32,
    bits_per_sample: u16,
    channels: u16,
}

impl SampleStore {
    /// Build a store from already-normalized samples.
    pub fn new(
        name: &str,
        samples: Vec<f64>,
        sample_rate: u32,
        bits_per_sample: u16,
        channels: u16,
    ) -> Self {
        Self {
            name: name.to_string(),
            samples,
            sample_rate,
            bits_per_sample,
            channels,
        }
    }

    /// The empty store carried by sounds whose decode failed.
    pub fn silent() -> Self {
        Self::new("", Vec::new(), 0, 0, 0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Total number of samples across all channels.
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns true if the store holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample at `index`, or silence past the end.
    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        self.samples.get(index).copied().unwrap_or(0.0)
    }

    /// Playing time at the store's own rate and channel count.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

impl fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStore")
            .field("name", &self.name)
            .field("sample_count", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("bits_per_sample", &self.bits_per_sample)
            .field("channels", &self.channels)
            .finish()
    }
}
