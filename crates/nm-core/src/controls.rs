//! Playback controls shared by sounds and the engine master bus.

use std::fmt;
use std::sync::Arc;

/// Custom amplitude transform, called with `(amplitude, channel)`.
pub type Filter = Arc<dyn Fn(f64, usize) -> f64 + Send + Sync>;

/// Scalar and flag controls applied while mixing.
///
/// Sounds use every field. The engine master bus ignores `looping`.
#[derive(Clone)]
pub struct Controls {
    pub volume: f64,
    pub velocity: f64,
    pub looping: bool,
    pub paused: bool,
    pub muted: bool,
    pub filter: Option<Filter>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            volume: 1.0,
            velocity: 1.0,
            looping: false,
            paused: false,
            muted: false,
            filter: None,
        }
    }
}

impl Controls {
    /// Gain after mute is taken into account.
    #[inline]
    pub fn gain(&self) -> f64 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Run `amp` through the filter, if one is set.
    #[inline]
    pub fn filtered(&self, amp: f64, channel: usize) -> f64 {
        match &self.filter {
            Some(filter) => filter(amp, channel),
            None => amp,
        }
    }

    /// Apply one change. Returns the filter it displaced, if any, so the
    /// caller decides where that closure gets dropped.
    pub fn apply(&mut self, change: ControlChange) -> Option<Filter> {
        match change {
            ControlChange::Volume(v) => self.volume = v,
            ControlChange::Velocity(v) => self.velocity = v,
            ControlChange::Loop(on) => self.looping = on,
            ControlChange::Pause(on) => self.paused = on,
            ControlChange::Mute(on) => self.muted = on,
            ControlChange::Filter(f) => return std::mem::replace(&mut self.filter, f),
        }
        None
    }
}

impl fmt::Debug for Controls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controls")
            .field("volume", &self.volume)
            .field("velocity", &self.velocity)
            .field("looping", &self.looping)
            .field("paused", &self.paused)
            .field("muted", &self.muted)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// One control mutation, carried from a control thread to the mixer.
#[derive(Clone)]
pub enum ControlChange {
    Volume(f64),
    Velocity(f64),
    Loop(bool),
    Pause(bool),
    Mute(bool),
    Filter(Option<Filter>),
}

impl fmt::Debug for ControlChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlChange::Volume(v) => write!(f, "Volume({})", v),
            ControlChange::Velocity(v) => write!(f, "Velocity({})", v),
            ControlChange::Loop(on) => write!(f, "Loop({})", on),
            ControlChange::Pause(on) => write!(f, "Pause({})", on),
            ControlChange::Mute(on) => write!(f, "Mute({})", on),
            ControlChange::Filter(flt) => write!(f, "Filter({})", if flt.is_some() { "set" } else { "none" }),
        }
    }
}
