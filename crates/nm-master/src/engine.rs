//! The audio engine: one output device, one mixing thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};

use nm_audio::{AudioError, CpalHost, OutputFormat, OutputHost};
use nm_core::{ControlChange, Controls, Filter, SoundKey};
use nm_engine::{Command, Mixer, Retired};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use slotmap::SlotMap;

use crate::clock::BlockClock;
use crate::config::EngineConfig;
use crate::error::EngineError;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock without waiting; `None` when another thread holds the lock.
fn try_lock<T>(m: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match m.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Commands that did not fit in the ring, oldest first.
///
/// Every command in the ring is older than every command here: a sender
/// only uses the ring while this is empty. The mixing thread drains the
/// ring first, then this, and skips it for a block rather than wait for
/// the lock.
type Backlog = Arc<Mutex<VecDeque<Command>>>;

/// Control-side half of a running engine, shared with every bound sound.
pub(crate) struct Control {
    mailbox: Mutex<HeapProd<Command>>,
    backlog: Backlog,
    /// Voices and filters the mixer let go of, freed here instead of on
    /// the mixing thread.
    trash: Mutex<HeapCons<Retired>>,
    keys: Mutex<SlotMap<SoundKey, ()>>,
    sound_capacity: usize,
    format: OutputFormat,
    device: String,
}

impl Control {
    /// Queue a command for the next block. Never drops a command and never
    /// waits on the mixing thread.
    pub(crate) fn send(&self, command: Command) {
        self.empty_trash();
        let mut mailbox = lock(&self.mailbox);
        let mut backlog = lock(&self.backlog);
        if backlog.is_empty() {
            match mailbox.try_push(command) {
                Ok(()) => return,
                Err(command) => {
                    log::debug!("Command mailbox on '{}' full, queueing {:?}", self.device, command);
                    backlog.push_back(command);
                }
            }
        } else {
            backlog.push_back(command);
        }
    }

    /// A fresh key, or `None` once `sound_capacity` sounds are bound.
    pub(crate) fn register(&self) -> Option<SoundKey> {
        self.empty_trash();
        let mut keys = lock(&self.keys);
        if keys.len() >= self.sound_capacity {
            log::warn!(
                "Engine on '{}' already holds {} sounds",
                self.device, self.sound_capacity
            );
            return None;
        }
        Some(keys.insert(()))
    }

    pub(crate) fn release(&self, key: SoundKey) {
        lock(&self.keys).remove(key);
    }

    fn empty_trash(&self) {
        let mut trash = lock(&self.trash);
        while trash.try_pop().is_some() {}
    }

    pub(crate) fn format(&self) -> &OutputFormat {
        &self.format
    }

    pub(crate) fn device(&self) -> &str {
        &self.device
    }

    #[cfg(test)]
    pub(crate) fn backlog_len(&self) -> usize {
        lock(&self.backlog).len()
    }
}

/// Mixing-thread ends of the control queues.
struct Inbox {
    commands: HeapCons<Command>,
    backlog: Backlog,
    trash: HeapProd<Retired>,
}

impl Inbox {
    /// Apply every pending command to `mixer`, oldest first.
    fn deliver(&mut self, mixer: &mut Mixer) {
        let Inbox { commands, backlog, trash } = self;
        while let Some(command) = commands.try_pop() {
            retire(trash, mixer.apply(command));
        }
        if let Some(mut backlog) = try_lock(backlog) {
            while let Some(command) = backlog.pop_front() {
                retire(trash, mixer.apply(command));
            }
        }
    }
}

fn retire(trash: &mut HeapProd<Retired>, retired: Option<Retired>) {
    if let Some(retired) = retired {
        // With the trash ring full it is freed here instead.
        let _ = trash.try_push(retired);
    }
}

/// Counters published by the mixing thread.
#[derive(Default)]
struct MixStats {
    active: AtomicUsize,
    submitted: AtomicU64,
}

struct Running {
    control: Arc<Control>,
    clock: Arc<BlockClock>,
    stats: Arc<MixStats>,
    thread: Option<JoinHandle<()>>,
}

/// Owns an output device and the thread that mixes into it.
///
/// An engine that failed to open is still a value: it is inert, reports
/// `is_valid() == false`, and ignores every control call. Dropping a running
/// engine stops the mixing thread and closes the device.
pub struct AudioEngine {
    config: EngineConfig,
    device: String,
    master: Controls,
    running: Option<Running>,
}

impl AudioEngine {
    /// Names of the system's output devices. Empty when none can be listed.
    pub fn devices() -> Vec<String> {
        Self::devices_on(&CpalHost::new())
    }

    pub fn devices_on(host: &impl OutputHost) -> Vec<String> {
        match host.devices() {
            Ok(names) => names,
            Err(e) => {
                log::error!("Failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }

    /// Open the configured system device and start mixing.
    pub fn try_launch(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_host(config, CpalHost::new())
    }

    /// Like `try_launch`, but logs a failure and returns an inert engine.
    pub fn launch(config: EngineConfig) -> Self {
        Self::try_launch(config.clone()).unwrap_or_else(|e| {
            log::error!("Audio engine failed to start: {}", e);
            Self::inert(config)
        })
    }

    /// An engine with no device behind it.
    pub fn inert(config: EngineConfig) -> Self {
        Self {
            device: config.device.clone().unwrap_or_default(),
            config,
            master: Controls::default(),
            running: None,
        }
    }

    /// Open a device from `host` and start the mixing thread.
    ///
    /// The device is opened on the mixing thread itself; this call waits
    /// until that has either succeeded or failed.
    pub fn with_host<H>(config: EngineConfig, host: H) -> Result<Self, EngineError>
    where
        H: OutputHost + Send + 'static,
    {
        config.validate()?;
        let device = match &config.device {
            Some(name) => name.clone(),
            None => host.devices()?.into_iter().next().ok_or(AudioError::NoDevices)?,
        };
        let format = config.output_format();

        let (producer, consumer) = HeapRb::<Command>::new(config.command_capacity).split();
        let (trash_in, trash_out) =
            HeapRb::<Retired>::new(config.command_capacity + config.sound_capacity).split();
        let backlog = Backlog::default();
        let inbox = Inbox { commands: consumer, backlog: backlog.clone(), trash: trash_in };
        let mixer = Mixer::new(config.channels, config.sound_capacity);
        let clock = Arc::new(BlockClock::new(config.block_count));
        let stats = Arc::new(MixStats::default());
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = {
            let device = device.clone();
            let clock = clock.clone();
            let stats = stats.clone();
            thread::Builder::new()
                .name("nm-mixer".into())
                .spawn(move || {
                    mixing_thread(host, device, format, clock, inbox, mixer, stats, ready_tx)
                })
                .map_err(EngineError::ThreadSpawn)?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => {
                let _ = thread.join();
                return Err(EngineError::ThreadExited);
            }
        }

        log::info!(
            "Audio engine on '{}': {} Hz, {} ch, {} blocks of {} samples",
            device,
            format.sample_rate,
            format.channels,
            format.block_count,
            format.block_samples
        );

        let control = Arc::new(Control {
            mailbox: Mutex::new(producer),
            backlog,
            trash: Mutex::new(trash_out),
            keys: Mutex::new(SlotMap::with_capacity_and_key(config.sound_capacity)),
            sound_capacity: config.sound_capacity,
            format,
            device: device.clone(),
        });

        Ok(Self {
            config,
            device,
            master: Controls::default(),
            running: Some(Running { control, clock, stats, thread: Some(thread) }),
        })
    }

    /// True when a device is open and the mixing thread is running.
    pub fn is_valid(&self) -> bool {
        self.running.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn block_count(&self) -> usize {
        self.config.block_count
    }

    pub fn block_sample_count(&self) -> usize {
        self.config.block_sample_count
    }

    /// Sounds on the mixer's active list as of the last block.
    pub fn active_sound_count(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, |r| r.stats.active.load(Ordering::Relaxed))
    }

    /// Blocks handed to the device so far.
    pub fn blocks_submitted(&self) -> u64 {
        self.running
            .as_ref()
            .map_or(0, |r| r.stats.submitted.load(Ordering::Relaxed))
    }

    pub(crate) fn control(&self) -> Option<&Arc<Control>> {
        self.running.as_ref().map(|r| &r.control)
    }

    fn send_master(&mut self, change: ControlChange) -> &mut Self {
        self.master.apply(change.clone());
        match &self.running {
            Some(running) => {
                running.control.send(Command::SetMaster(change));
            }
            None => log::debug!("Ignoring {:?} on inert engine", change),
        }
        self
    }

    // --- Engine-wide controls ---

    pub fn pause(&mut self) -> &mut Self {
        self.send_master(ControlChange::Pause(true))
    }

    pub fn resume(&mut self) -> &mut Self {
        self.send_master(ControlChange::Pause(false))
    }

    pub fn swap_pause(&mut self) -> &mut Self {
        let paused = !self.master.paused;
        self.send_master(ControlChange::Pause(paused))
    }

    pub fn mute(&mut self) -> &mut Self {
        self.send_master(ControlChange::Mute(true))
    }

    pub fn unmute(&mut self) -> &mut Self {
        self.send_master(ControlChange::Mute(false))
    }

    pub fn swap_mute(&mut self) -> &mut Self {
        let muted = !self.master.muted;
        self.send_master(ControlChange::Mute(muted))
    }

    pub fn volume_to(&mut self, volume: f64) -> &mut Self {
        self.send_master(ControlChange::Volume(volume))
    }

    /// Playback speed multiplier applied to every sound.
    pub fn velocity_to(&mut self, velocity: f64) -> &mut Self {
        self.send_master(ControlChange::Velocity(velocity))
    }

    /// Filter applied to the summed output, per channel. `None` clears it.
    pub fn filter_to(&mut self, filter: Option<Filter>) -> &mut Self {
        self.send_master(ControlChange::Filter(filter))
    }

    pub fn is_paused(&self) -> bool {
        self.master.paused
    }

    pub fn is_muted(&self) -> bool {
        self.master.muted
    }

    pub fn volume(&self) -> f64 {
        self.master.volume
    }

    pub fn velocity(&self) -> f64 {
        self.master.velocity
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.master.filter.as_ref()
    }

    fn shutdown(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        running.clock.power_down();
        if let Some(handle) = running.thread.take() {
            if handle.join().is_err() {
                log::error!("Mixing thread for '{}' panicked", self.device);
            }
        }
        log::info!(
            "Audio engine on '{}' shut down after {} blocks",
            self.device,
            running.stats.submitted.load(Ordering::Relaxed)
        );
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[allow(clippy::too_many_arguments)]
fn mixing_thread<H: OutputHost>(
    host: H,
    device_name: String,
    format: OutputFormat,
    clock: Arc<BlockClock>,
    mut inbox: Inbox,
    mut mixer: Mixer,
    stats: Arc<MixStats>,
    ready: mpsc::Sender<Result<(), AudioError>>,
) {
    let on_complete = {
        let clock = clock.clone();
        Box::new(move || clock.release())
    };
    let mut device = match host.open(&device_name, format, on_complete) {
        Ok(device) => {
            let _ = ready.send(Ok(()));
            device
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    drop(ready);

    let mut blocks = vec![vec![0i32; format.block_samples]; format.block_count];
    let mut cursor = 0;

    while clock.acquire() {
        inbox.deliver(&mut mixer);

        let block = &mut blocks[cursor];
        mixer.render_block(block);
        stats.active.store(mixer.active_count(), Ordering::Relaxed);

        match device.submit(block) {
            Ok(()) => {
                stats.submitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => log::warn!("Block submit to '{}' failed: {}", device.name(), e),
        }
        cursor = (cursor + 1) % blocks.len();
    }

    log::debug!("Mixing thread for '{}' stopping", device.name());
}
