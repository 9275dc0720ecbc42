//! Allocation-free render path tests.
//!
//! These tests verify that `Mixer::render_block()` does not allocate once
//! its voices are loaded: needles starting, wrapping, ending and being
//! reaped must all stay off the heap. Applying commands must not touch the
//! heap either, as long as the mixer stays within its sound capacity and
//! whatever it retires is freed elsewhere.
//!
//! Just run `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use std::sync::Arc;

use nm_core::{ControlChange, Controls, Filter, SampleStore, SoundKey};
use nm_engine::{Command, Mixer, PlaybackState, MAX_NEEDLES};
use slotmap::SlotMap;

struct Bench {
    mixer: Mixer,
    keys: SlotMap<SoundKey, ()>,
}

impl Bench {
    fn new(channels: u16) -> Self {
        Self { mixer: Mixer::new(channels, 64), keys: SlotMap::with_key() }
    }

    fn load(&mut self, len: usize, controls: Controls) -> (SoundKey, Arc<PlaybackState>) {
        let key = self.keys.insert(());
        let state = Arc::new(PlaybackState::new());
        let samples = (0..len).map(|i| (i as f64 / len as f64) - 0.5).collect();
        let store = Arc::new(SampleStore::new("ramp", samples, 48_000, 16, 1));
        self.mixer.apply(Command::Insert { key, store, controls, state: state.clone(), epoch: 0 });
        (key, state)
    }

    fn play(&mut self, key: SoundKey, state: &PlaybackState, times: usize) {
        for _ in 0..times {
            state.begin_needle();
            self.mixer.apply(Command::Play(key));
        }
    }
}

/// Render `blocks` blocks, aborting on any heap allocation.
fn assert_render_alloc_free(bench: &mut Bench, block_len: usize, blocks: usize) {
    let mut block = vec![0i32; block_len];
    let mixer = &mut bench.mixer;
    assert_no_alloc(|| {
        for _ in 0..blocks {
            mixer.render_block(&mut block);
        }
    });
}

#[test]
fn one_shot_voices_alloc_free() {
    let mut bench = Bench::new(1);
    for len in [100, 1000, 10_000] {
        let (key, state) = bench.load(len, Controls::default());
        bench.play(key, &state, 3);
    }
    assert_render_alloc_free(&mut bench, 256, 200);
    assert!(bench.mixer.is_idle());
}

#[test]
fn looping_voices_alloc_free() {
    let mut bench = Bench::new(2);
    let looping = Controls { looping: true, velocity: 1.5, ..Controls::default() };
    for len in [7, 300, 4096] {
        let (key, state) = bench.load(len, looping.clone());
        bench.play(key, &state, MAX_NEEDLES);
    }
    assert_render_alloc_free(&mut bench, 512, 200);
}

#[test]
fn filtered_master_alloc_free() {
    let mut bench = Bench::new(1);
    bench.mixer.apply(Command::SetMaster(ControlChange::Filter(Some(Arc::new(
        |amp: f64, _ch: usize| amp * 0.5,
    )))));
    let filtered = Controls {
        filter: Some(Arc::new(|amp: f64, ch: usize| amp + ch as f64 * 0.01)),
        ..Controls::default()
    };
    let (key, state) = bench.load(2048, filtered);
    bench.play(key, &state, 4);
    assert_render_alloc_free(&mut bench, 256, 50);
}

#[test]
fn stealing_needles_alloc_free() {
    let mut bench = Bench::new(1);
    let (key, state) = bench.load(1 << 16, Controls::default());
    bench.play(key, &state, MAX_NEEDLES);
    assert_render_alloc_free(&mut bench, 256, 4);

    let mut retired = Vec::with_capacity(4);
    let mixer = &mut bench.mixer;
    assert_no_alloc(|| {
        for _ in 0..4 {
            state.begin_needle();
            retired.extend(mixer.apply(Command::Play(key)));
        }
    });
    assert!(retired.is_empty());
    assert_eq!(bench.mixer.voice(key).map(|v| v.needles.len()), Some(MAX_NEEDLES));
    assert_render_alloc_free(&mut bench, 256, 4);
}

#[test]
fn command_application_alloc_free() {
    const SOUNDS: usize = 8;
    let mut mixer = Mixer::new(1, SOUNDS);
    let mut keys: SlotMap<SoundKey, ()> = SlotMap::with_capacity_and_key(SOUNDS);
    let store = Arc::new(SampleStore::new("ramp", vec![0.1; 4096], 48_000, 16, 1));
    let filter: Filter = Arc::new(|amp: f64, _ch: usize| amp * 0.5);

    let mut commands = Vec::with_capacity(SOUNDS * 6);
    for _ in 0..SOUNDS {
        let key = keys.insert(());
        let state = Arc::new(PlaybackState::new());
        commands.push(Command::Insert {
            key,
            store: store.clone(),
            controls: Controls::default(),
            state: state.clone(),
            epoch: state.epoch(),
        });
        state.begin_needle();
        commands.push(Command::Play(key));
        commands.push(Command::Set { key, change: ControlChange::Filter(Some(filter.clone())) });
        commands.push(Command::Set { key, change: ControlChange::Filter(None) });
        commands.push(Command::Stop { key, epoch: state.stop() });
        commands.push(Command::Remove(key));
    }

    // Everything the mixer hands back is kept alive until after the check.
    let mut retired = Vec::with_capacity(commands.len());
    let mut block = vec![0i32; 256];
    assert_no_alloc(|| {
        for command in commands.drain(..) {
            retired.extend(mixer.apply(command));
            mixer.render_block(&mut block);
        }
    });

    // One displaced filter and one removed voice per sound.
    assert_eq!(retired.len(), SOUNDS * 2);
    assert!(mixer.is_idle());
    assert_eq!(mixer.active_count(), 0);
}
