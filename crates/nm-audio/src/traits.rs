//! Output device traits and error types.

use thiserror::Error;

/// Errors raised while opening or feeding an output device.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No output device at all
    #[error("No audio output devices found")]
    NoDevices,
    /// Named device does not exist
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),
    /// Host or device query failed
    #[error("Device init error: {0}")]
    DeviceInit(String),
    /// Device cannot play the requested format
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
    /// Failed to create the output stream
    #[error("Stream create error: {0}")]
    StreamCreate(String),
    /// Stream refused to start
    #[error("Playback error: {0}")]
    Playback(String),
    /// Device queue had no room for a submitted block
    #[error("Output queue overrun: {0} samples dropped")]
    Overrun(usize),
}

/// Linear `i32` PCM layout shared by the engine and its device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples per block.
    pub block_samples: usize,
    /// Blocks the device may hold at once.
    pub block_count: usize,
}

impl OutputFormat {
    pub fn check(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} Hz, {} channels",
                self.sample_rate, self.channels
            )));
        }
        if self.block_samples == 0 || self.block_count == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} blocks of {} samples",
                self.block_count, self.block_samples
            )));
        }
        Ok(())
    }
}

/// Called once by the device for every block it has finished playing.
/// Runs on whatever thread the platform uses for audio.
pub type CompletionHandler = Box<dyn FnMut() + Send + 'static>;

/// Something that can enumerate and open output devices.
pub trait OutputHost {
    /// Names of the available output devices, in host order.
    fn devices(&self) -> Result<Vec<String>, AudioError>;

    /// Open `device` for `format`. `on_complete` is invoked once per
    /// consumed block for as long as the device lives.
    fn open(
        &self,
        device: &str,
        format: OutputFormat,
        on_complete: CompletionHandler,
    ) -> Result<Box<dyn OutputDevice>, AudioError>;
}

/// An open output device.
pub trait OutputDevice {
    fn name(&self) -> &str;

    fn format(&self) -> OutputFormat;

    /// Queue one block for playback. Never blocks; completion is reported
    /// through the handler given to `open`.
    fn submit(&mut self, block: &[i32]) -> Result<(), AudioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_is_rejected() {
        let format = OutputFormat { sample_rate: 0, channels: 1, block_samples: 256, block_count: 4 };
        assert!(matches!(format.check(), Err(AudioError::UnsupportedFormat(_))));
    }

    #[test]
    fn empty_ring_is_rejected() {
        let format = OutputFormat { sample_rate: 48000, channels: 2, block_samples: 256, block_count: 0 };
        assert!(format.check().is_err());
    }

    #[test]
    fn sane_format_passes() {
        let format = OutputFormat { sample_rate: 44100, channels: 1, block_samples: 256, block_count: 32 };
        assert!(format.check().is_ok());
    }
}
