//! Sound handles: a sample store plus its controls, bound to an engine.

use std::path::Path;
use std::sync::Arc;

use nm_core::{ControlChange, Controls, Filter, SampleStore, SoundKey};
use nm_engine::{Command, PlaybackState};
use nm_formats::DecodeError;

use crate::engine::{AudioEngine, Control};
use crate::error::{check_format, MismatchWarning};

struct Binding {
    control: Arc<Control>,
    key: SoundKey,
}

/// A playable sound.
///
/// Each call to `play` starts another needle at the beginning of the
/// samples; needles run until they reach the end, or forever while looping.
/// Controls take effect at the start of the next mixed block. A sound that
/// failed to load, or is not bound to a running engine, accepts every call
/// and does nothing.
pub struct Sound {
    store: Arc<SampleStore>,
    controls: Controls,
    state: Arc<PlaybackState>,
    binding: Option<Binding>,
    valid: bool,
}

impl Sound {
    /// A sound over `store`, not yet bound to an engine.
    pub fn new(store: Arc<SampleStore>) -> Self {
        Self {
            store,
            controls: Controls::default(),
            state: Arc::new(PlaybackState::new()),
            binding: None,
            valid: true,
        }
    }

    /// A sound over `store`, bound to `engine`.
    pub fn bound(engine: &AudioEngine, store: Arc<SampleStore>) -> Self {
        let mut sound = Self::new(store);
        sound.lock_on(engine);
        sound
    }

    /// An empty sound that never plays.
    pub fn inert() -> Self {
        Self {
            store: Arc::new(SampleStore::silent()),
            controls: Controls::default(),
            state: Arc::new(PlaybackState::new()),
            binding: None,
            valid: false,
        }
    }

    /// Decode a WAV file and bind it to `engine`.
    pub fn try_load(engine: &AudioEngine, path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let store = nm_formats::decode(path)?;
        Ok(Self::bound(engine, Arc::new(store)))
    }

    /// Like `try_load`, but logs a failure and returns an inert sound.
    pub fn load(engine: &AudioEngine, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::try_load(engine, path).unwrap_or_else(|e| {
            log::error!("Failed to load '{}': {}", path.display(), e);
            Self::inert()
        })
    }

    /// True unless decoding failed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Bind to `engine`, leaving any engine this sound was bound to.
    /// Binding to an inert engine, or one already holding its configured
    /// number of sounds, leaves the sound unbound.
    pub fn lock_on(&mut self, engine: &AudioEngine) -> &mut Self {
        self.unbind();
        if !self.valid {
            return self;
        }
        let Some(control) = engine.control() else {
            log::warn!("'{}' not bound: engine on '{}' is not running", self.name(), engine.device());
            return self;
        };

        for warning in check_format(&self.store, control.format()) {
            log::warn!("'{}' on '{}': {}", self.name(), control.device(), warning);
        }

        self.binding = self.attach(control);
        self
    }

    /// Register with `control` and load this sound into its mixer.
    fn attach(&self, control: &Arc<Control>) -> Option<Binding> {
        let key = control.register()?;
        control.send(Command::Insert {
            key,
            store: self.store.clone(),
            controls: self.controls.clone(),
            state: self.state.clone(),
            epoch: self.state.epoch(),
        });
        Some(Binding { control: control.clone(), key })
    }

    /// Format differences between this sound and its engine.
    pub fn mismatches(&self) -> Vec<MismatchWarning> {
        self.binding
            .as_ref()
            .map_or_else(Vec::new, |b| check_format(&self.store, b.control.format()))
    }

    fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            self.state.stop();
            binding.control.send(Command::Remove(binding.key));
            binding.control.release(binding.key);
        }
    }

    /// Start a new needle at the beginning of the sound.
    pub fn play(&mut self) -> &mut Self {
        let Some(binding) = &self.binding else {
            log::debug!("play on unbound sound '{}' ignored", self.store.name());
            return self;
        };
        self.state.begin_needle();
        binding.control.send(Command::Play(binding.key));
        self
    }

    /// Silence every needle. `is_playing` is false as soon as this returns.
    pub fn stop(&mut self) -> &mut Self {
        let epoch = self.state.stop();
        if let Some(binding) = &self.binding {
            binding.control.send(Command::Stop { key: binding.key, epoch });
        }
        self
    }

    fn set(&mut self, change: ControlChange) -> &mut Self {
        self.controls.apply(change.clone());
        if let Some(binding) = &self.binding {
            binding.control.send(Command::Set { key: binding.key, change });
        }
        self
    }

    pub fn loop_on(&mut self) -> &mut Self {
        self.set(ControlChange::Loop(true))
    }

    pub fn unloop(&mut self) -> &mut Self {
        self.set(ControlChange::Loop(false))
    }

    pub fn swap_loop(&mut self) -> &mut Self {
        let looping = !self.controls.looping;
        self.set(ControlChange::Loop(looping))
    }

    pub fn pause(&mut self) -> &mut Self {
        self.set(ControlChange::Pause(true))
    }

    pub fn resume(&mut self) -> &mut Self {
        self.set(ControlChange::Pause(false))
    }

    pub fn swap_pause(&mut self) -> &mut Self {
        let paused = !self.controls.paused;
        self.set(ControlChange::Pause(paused))
    }

    pub fn mute(&mut self) -> &mut Self {
        self.set(ControlChange::Mute(true))
    }

    pub fn unmute(&mut self) -> &mut Self {
        self.set(ControlChange::Mute(false))
    }

    pub fn swap_mute(&mut self) -> &mut Self {
        let muted = !self.controls.muted;
        self.set(ControlChange::Mute(muted))
    }

    pub fn volume_to(&mut self, volume: f64) -> &mut Self {
        self.set(ControlChange::Volume(volume))
    }

    /// Needle step per output sample. Negative values end needles at once.
    pub fn velocity_to(&mut self, velocity: f64) -> &mut Self {
        self.set(ControlChange::Velocity(velocity))
    }

    pub fn filter_to(&mut self, filter: Option<Filter>) -> &mut Self {
        self.set(ControlChange::Filter(filter))
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Needles started and not yet finished or stopped.
    pub fn live_needles(&self) -> u32 {
        self.state.live_needles()
    }

    pub fn is_looping(&self) -> bool {
        self.controls.looping
    }

    pub fn is_paused(&self) -> bool {
        self.controls.paused
    }

    pub fn is_muted(&self) -> bool {
        self.controls.muted
    }

    pub fn volume(&self) -> f64 {
        self.controls.volume
    }

    pub fn velocity(&self) -> f64 {
        self.controls.velocity
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.controls.filter.as_ref()
    }
}

/// Clones share the sample data and copy the controls, but play
/// independently and start out stopped.
impl Clone for Sound {
    fn clone(&self) -> Self {
        let mut sound = Self {
            store: self.store.clone(),
            controls: self.controls.clone(),
            state: Arc::new(PlaybackState::new()),
            binding: None,
            valid: self.valid,
        };
        if let Some(binding) = &self.binding {
            sound.binding = sound.attach(&binding.control);
        }
        sound
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl std::fmt::Debug for Sound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sound")
            .field("store", &self.store)
            .field("controls", &self.controls)
            .field("live_needles", &self.state.live_needles())
            .field("bound", &self.binding.is_some())
            .field("valid", &self.valid)
            .finish()
    }
}
