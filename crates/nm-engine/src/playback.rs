//! Lock-free playing status shared between a sound handle and the mixer.

use std::sync::atomic::{AtomicU64, Ordering};

const COUNT_MASK: u64 = 0xFFFF_FFFF;

/// Live-needle count tagged with a stop epoch, packed into one atomic word.
///
/// The control side bumps the count on `play` and resets it (starting a new
/// epoch) on `stop`. The mixer lowers the count when a needle runs out, but
/// only while the epoch it last applied is still current, so a needle that
/// ends after a `stop` the mixer has not seen yet never eats into the count
/// of a later `play`.
#[derive(Debug, Default)]
pub struct PlaybackState {
    word: AtomicU64,
}

fn pack(epoch: u32, count: u32) -> u64 {
    ((epoch as u64) << 32) | count as u64
}

fn unpack(word: u64) -> (u32, u32) {
    ((word >> 32) as u32, (word & COUNT_MASK) as u32)
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Needles the control side believes are sounding.
    pub fn live_needles(&self) -> u32 {
        unpack(self.word.load(Ordering::Acquire)).1
    }

    pub fn is_playing(&self) -> bool {
        self.live_needles() > 0
    }

    pub fn epoch(&self) -> u32 {
        unpack(self.word.load(Ordering::Acquire)).0
    }

    /// Record a `play`.
    pub fn begin_needle(&self) {
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                let (epoch, count) = unpack(w);
                Some(pack(epoch, count.saturating_add(1)))
            });
    }

    /// Record a `stop`, returning the epoch it opened.
    pub fn stop(&self) -> u32 {
        let prev = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                let (epoch, _) = unpack(w);
                Some(pack(epoch.wrapping_add(1), 0))
            })
            .unwrap_or_else(|w| w);
        unpack(prev).0.wrapping_add(1)
    }

    /// Mixer side: a needle ran out. Ignored when `epoch` is stale.
    pub fn end_needle(&self, epoch: u32) -> bool {
        self.word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                let (current, count) = unpack(w);
                (current == epoch && count > 0).then(|| pack(current, count - 1))
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_then_stop_is_not_playing() {
        let state = PlaybackState::new();
        state.begin_needle();
        state.begin_needle();
        assert_eq!(state.live_needles(), 2);
        state.stop();
        assert!(!state.is_playing());
    }

    #[test]
    fn stop_opens_new_epoch() {
        let state = PlaybackState::new();
        assert_eq!(state.epoch(), 0);
        assert_eq!(state.stop(), 1);
        assert_eq!(state.stop(), 2);
        assert_eq!(state.epoch(), 2);
    }

    #[test]
    fn end_needle_counts_down() {
        let state = PlaybackState::new();
        state.begin_needle();
        assert!(state.end_needle(0));
        assert!(!state.is_playing());
        assert!(!state.end_needle(0), "count must not go below zero");
    }

    #[test]
    fn stale_end_does_not_touch_new_play() {
        let state = PlaybackState::new();
        state.begin_needle();
        let epoch = state.stop();
        state.begin_needle();
        // Mixer still on epoch 0 sees the old needle run out.
        assert!(!state.end_needle(0));
        assert_eq!(state.live_needles(), 1);
        assert!(state.end_needle(epoch));
        assert_eq!(state.live_needles(), 0);
    }
}
