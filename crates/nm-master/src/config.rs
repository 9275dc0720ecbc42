//! Engine configuration.

use nm_audio::OutputFormat;

use crate::error::EngineError;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNELS: u16 = 1;
pub const DEFAULT_BLOCK_COUNT: usize = 16;
pub const DEFAULT_BLOCK_SAMPLES: usize = 256;
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;
pub const DEFAULT_SOUND_CAPACITY: usize = 64;

/// Everything needed to open an engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Output device name; `None` picks the first device the host lists.
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Blocks in the ring.
    pub block_count: usize,
    /// Interleaved samples per block, across all channels.
    pub block_sample_count: usize,
    /// Control commands that may wait between two blocks.
    pub command_capacity: usize,
    /// Sounds the mixer holds before its arena grows.
    pub sound_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            block_count: DEFAULT_BLOCK_COUNT,
            block_sample_count: DEFAULT_BLOCK_SAMPLES,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            sound_capacity: DEFAULT_SOUND_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }

    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn block_count(mut self, block_count: usize) -> Self {
        self.block_count = block_count;
        self
    }

    pub fn block_sample_count(mut self, block_sample_count: usize) -> Self {
        self.block_sample_count = block_sample_count;
        self
    }

    pub fn command_capacity(mut self, command_capacity: usize) -> Self {
        self.command_capacity = command_capacity;
        self
    }

    pub fn sound_capacity(mut self, sound_capacity: usize) -> Self {
        self.sound_capacity = sound_capacity;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: String| Err(EngineError::InvalidConfig(msg));

        if self.sample_rate == 0 {
            return fail("sample rate must be non-zero".into());
        }
        if self.channels == 0 {
            return fail("channel count must be non-zero".into());
        }
        if self.block_count == 0 {
            return fail("block count must be non-zero".into());
        }
        if self.block_sample_count == 0 || self.block_sample_count % self.channels as usize != 0 {
            return fail(format!(
                "block of {} samples does not hold whole {}-channel frames",
                self.block_sample_count, self.channels
            ));
        }
        if self.command_capacity == 0 {
            return fail("command capacity must be non-zero".into());
        }
        if self.sound_capacity == 0 {
            return fail("sound capacity must be non-zero".into());
        }
        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_samples: self.block_sample_count,
            block_count: self.block_count,
        }
    }
}
