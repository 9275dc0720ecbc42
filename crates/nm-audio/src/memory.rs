//! In-memory output device.
//!
//! Records every submitted block and only reports completions when told to,
//! which lets tests step an engine one block at a time.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::traits::{AudioError, CompletionHandler, OutputDevice, OutputFormat, OutputHost};

#[derive(Default)]
struct Tape {
    blocks: Vec<Vec<i32>>,
    format: Option<OutputFormat>,
    open: bool,
}

#[derive(Default)]
struct Shared {
    tape: Mutex<Tape>,
    submitted: Condvar,
    handler: Mutex<Option<CompletionHandler>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A host with a fixed device list whose devices write to memory.
///
/// Clones share the same tape, so a test keeps one clone to inspect what an
/// engine submitted through the other.
#[derive(Clone)]
pub struct MemoryHost {
    devices: Arc<Vec<String>>,
    shared: Arc<Shared>,
}

impl MemoryHost {
    pub fn new(devices: &[&str]) -> Self {
        Self {
            devices: Arc::new(devices.iter().map(|d| d.to_string()).collect()),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Copy of every block submitted so far.
    pub fn blocks(&self) -> Vec<Vec<i32>> {
        lock(&self.shared.tape).blocks.clone()
    }

    pub fn submitted(&self) -> usize {
        lock(&self.shared.tape).blocks.len()
    }

    /// Format of the currently or most recently opened device.
    pub fn format(&self) -> Option<OutputFormat> {
        lock(&self.shared.tape).format
    }

    /// Is a device from this host currently open?
    pub fn is_open(&self) -> bool {
        lock(&self.shared.tape).open
    }

    /// Wait until at least `count` blocks have been submitted.
    pub fn wait_for_blocks(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut tape = lock(&self.shared.tape);
        while tape.blocks.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tape = self
                .shared
                .submitted
                .wait_timeout(tape, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Report `count` blocks as played.
    pub fn complete(&self, count: usize) {
        let mut handler = lock(&self.shared.handler);
        if let Some(on_complete) = handler.as_mut() {
            for _ in 0..count {
                on_complete();
            }
        }
    }
}

impl OutputHost for MemoryHost {
    fn devices(&self) -> Result<Vec<String>, AudioError> {
        if self.devices.is_empty() {
            return Err(AudioError::NoDevices);
        }
        Ok(self.devices.as_ref().clone())
    }

    fn open(
        &self,
        device: &str,
        format: OutputFormat,
        on_complete: CompletionHandler,
    ) -> Result<Box<dyn OutputDevice>, AudioError> {
        format.check()?;
        if !self.devices.iter().any(|d| d == device) {
            return Err(AudioError::DeviceNotFound(device.to_string()));
        }

        {
            let mut tape = lock(&self.shared.tape);
            tape.format = Some(format);
            tape.open = true;
        }
        *lock(&self.shared.handler) = Some(on_complete);

        Ok(Box::new(MemoryOutput {
            name: device.to_string(),
            format,
            shared: self.shared.clone(),
        }))
    }
}

/// Device handed out by `MemoryHost`.
pub struct MemoryOutput {
    name: String,
    format: OutputFormat,
    shared: Arc<Shared>,
}

impl OutputDevice for MemoryOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> OutputFormat {
        self.format
    }

    fn submit(&mut self, block: &[i32]) -> Result<(), AudioError> {
        lock(&self.shared.tape).blocks.push(block.to_vec());
        self.shared.submitted.notify_all();
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        lock(&self.shared.handler).take();
        lock(&self.shared.tape).open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn format() -> OutputFormat {
        OutputFormat { sample_rate: 44100, channels: 1, block_samples: 4, block_count: 2 }
    }

    #[test]
    fn unknown_device_is_rejected() {
        let host = MemoryHost::new(&["speakers"]);
        let err = host.open("headphones", format(), Box::new(|| {})).err();
        assert!(matches!(err, Some(AudioError::DeviceNotFound(name)) if name == "headphones"));
    }

    #[test]
    fn empty_host_has_no_devices() {
        let host = MemoryHost::new(&[]);
        assert!(matches!(host.devices(), Err(AudioError::NoDevices)));
    }

    #[test]
    fn records_blocks_and_completes_on_demand() {
        let host = MemoryHost::new(&["speakers"]);
        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        let mut device = host
            .open("speakers", format(), Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        device.submit(&[1, 2, 3, 4]).unwrap();
        assert!(host.wait_for_blocks(1, Duration::from_millis(10)));
        assert_eq!(host.blocks(), vec![vec![1, 2, 3, 4]]);
        assert_eq!(done.load(Ordering::SeqCst), 0);

        host.complete(2);
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn drop_closes_device() {
        let host = MemoryHost::new(&["speakers"]);
        let device = host.open("speakers", format(), Box::new(|| {})).unwrap();
        assert!(host.is_open());
        assert_eq!(host.format(), Some(format()));
        drop(device);
        assert!(!host.is_open());
    }

    #[test]
    fn wait_times_out_without_blocks() {
        let host = MemoryHost::new(&["speakers"]);
        assert!(!host.wait_for_blocks(1, Duration::from_millis(5)));
    }
}
