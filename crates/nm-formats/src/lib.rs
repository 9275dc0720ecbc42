//! WAV decoding and encoding for the needlemix mixer.
//!
//! Decoding turns a RIFF/WAVE PCM file into a normalized `SampleStore`.
//! Encoding writes the engine's 32-bit integer blocks back out, for
//! offline renders.

mod wav_format;

pub use wav_format::{decode, load_wav, samples_to_wav, write_wav};

use thiserror::Error;

/// Error type for sample decoding.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// File could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Data ends before a header or chunk does
    #[error("File is truncated")]
    Truncated,
    /// Not a RIFF/WAVE file, or a malformed header
    #[error("Invalid WAV header: {0}")]
    InvalidHeader(String),
    /// A required chunk is absent
    #[error("Missing '{0}' chunk")]
    MissingChunk(&'static str),
    /// Compressed or float data
    #[error("Unsupported format tag {0:#06x}")]
    UnsupportedFormat(u16),
    /// Bit depth other than 8, 16, 24 or 32
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),
}
