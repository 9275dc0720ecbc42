//! Audio output devices for the needlemix mixer.

mod cpal_backend;
mod memory;
mod traits;

pub use cpal_backend::{CpalHost, CpalOutput};
pub use memory::{MemoryHost, MemoryOutput};
pub use traits::{AudioError, CompletionHandler, OutputDevice, OutputFormat, OutputHost};
