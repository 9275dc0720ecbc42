use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use nm_core::{ControlChange, Controls, SampleStore, SoundKey};
use nm_engine::{Command, Mixer, PlaybackState};
use slotmap::SlotMap;

fn loaded_mixer(voices: usize, needles: usize) -> Mixer {
    let mut keys: SlotMap<SoundKey, ()> = SlotMap::with_key();
    let mut mixer = Mixer::new(2, voices);
    let samples: Vec<f64> = (0..48_000).map(|i| ((i as f64) * 0.01).sin() * 0.1).collect();
    let store = Arc::new(SampleStore::new("bench", samples, 48_000, 16, 2));

    for _ in 0..voices {
        let key = keys.insert(());
        let state = Arc::new(PlaybackState::new());
        mixer.apply(Command::Insert {
            key,
            store: store.clone(),
            controls: Controls::default(),
            state: state.clone(),
            epoch: 0,
        });
        mixer.apply(Command::Set { key, change: ControlChange::Loop(true) });
        for _ in 0..needles {
            state.begin_needle();
            mixer.apply(Command::Play(key));
        }
    }
    mixer
}

fn bench_render_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_block");

    for (voices, needles) in [(1, 1), (16, 1), (16, 4)] {
        let mut mixer = loaded_mixer(voices, needles);
        let mut block = vec![0i32; 512];
        group.bench_function(format!("{}x{}", voices, needles), |b| {
            b.iter(|| {
                mixer.render_block(black_box(&mut block));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render_block);
criterion_main!(benches);
