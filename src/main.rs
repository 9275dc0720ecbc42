//! needlemix CLI: play WAV files through an output device, or mix them to a
//! WAV file.
//!
//! Usage:
//!   needlemix --devices
//!   needlemix kick.wav snare.wav
//!   needlemix --device "Speakers" --rate 44100 --channels 2 --loop drums.wav
//!   needlemix --volume 0.5 kick.wav --wav mix.wav

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use std::{env, fs, process};

use nm_master::{
    samples_to_wav, AudioEngine, Controls, EngineConfig, OfflineRender, Sound,
};

const USAGE: &str = "Usage: needlemix [--devices] [--device NAME] [--rate HZ] [--channels N] \
[--blocks N] [--block-samples N] [--loop] [--volume V] [--speed S] [--wav OUT] FILE...";

/// Longest offline render, in seconds.
const MAX_RENDER_SECONDS: usize = 300;

struct Options {
    list_devices: bool,
    config: EngineConfig,
    looping: bool,
    volume: f64,
    speed: f64,
    wav: Option<String>,
    files: Vec<String>,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}

fn parse<T: FromStr>(flag: &str, value: Option<String>) -> T {
    let value = value.unwrap_or_else(|| fail(format!("{} needs a value\n{}", flag, USAGE)));
    value
        .parse()
        .unwrap_or_else(|_| fail(format!("Invalid value for {}: {}", flag, value)))
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Options {
    let mut opts = Options {
        list_devices: false,
        config: EngineConfig::default(),
        looping: false,
        volume: 1.0,
        speed: 1.0,
        wav: None,
        files: Vec::new(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devices" => opts.list_devices = true,
            "--device" => opts.config.device = Some(parse(&arg, args.next())),
            "--rate" => opts.config.sample_rate = parse(&arg, args.next()),
            "--channels" => opts.config.channels = parse(&arg, args.next()),
            "--blocks" => opts.config.block_count = parse(&arg, args.next()),
            "--block-samples" => opts.config.block_sample_count = parse(&arg, args.next()),
            "--loop" => opts.looping = true,
            "--volume" => opts.volume = parse(&arg, args.next()),
            "--speed" => opts.speed = parse(&arg, args.next()),
            "--wav" => opts.wav = Some(parse(&arg, args.next())),
            "-h" | "--help" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            flag if flag.starts_with("--") => fail(format!("Unknown option {}\n{}", flag, USAGE)),
            file => opts.files.push(file.to_string()),
        }
    }
    opts
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let opts = parse_args(env::args().skip(1));

    if opts.list_devices {
        for (i, name) in AudioEngine::devices().iter().enumerate() {
            println!("{:2}: {}", i, name);
        }
        return;
    }

    if opts.files.is_empty() {
        fail(USAGE);
    }
    if let Err(e) = opts.config.validate() {
        fail(e);
    }

    match &opts.wav {
        Some(out) => render_to_wav(&opts, out),
        None => play_audio(&opts),
    }
}

fn play_audio(opts: &Options) {
    let engine = AudioEngine::try_launch(opts.config.clone())
        .unwrap_or_else(|e| fail(format!("Failed to start audio: {}", e)));

    let mut sounds: Vec<Sound> = opts
        .files
        .iter()
        .map(|path| {
            Sound::try_load(&engine, path)
                .unwrap_or_else(|e| fail(format!("Failed to load {}: {}", path, e)))
        })
        .collect();

    for sound in &mut sounds {
        let store = sound.store();
        println!(
            "{}: {} Hz, {} ch, {} bit, {:.2}s",
            store.name(),
            store.sample_rate(),
            store.channels(),
            store.bits_per_sample(),
            store.duration().as_secs_f64()
        );
        sound.volume_to(opts.volume).velocity_to(opts.speed);
        if opts.looping {
            sound.loop_on();
        }
        sound.play();
    }

    println!("Playing on {}...", engine.device());
    while sounds.iter().any(Sound::is_playing) {
        print!(
            "\rSounds: {} | Blocks: {}",
            engine.active_sound_count(),
            engine.blocks_submitted()
        );
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(10));
    }

    // Let the queued blocks drain before the device closes.
    let latency = opts.config.block_count * opts.config.block_sample_count;
    let latency_secs = latency as f64 / (opts.config.sample_rate as f64 * opts.config.channels as f64);
    std::thread::sleep(Duration::from_secs_f64(latency_secs));

    println!("\rDone.                              ");
}

fn render_to_wav(opts: &Options, path: &str) {
    let config = &opts.config;
    let mut render = OfflineRender::new(config.sample_rate, config.channels, config.block_sample_count);
    let controls = Controls {
        volume: opts.volume,
        velocity: opts.speed,
        looping: opts.looping,
        ..Controls::default()
    };

    for file in &opts.files {
        let store = nm_master::decode(file)
            .unwrap_or_else(|e| fail(format!("Failed to load {}: {}", file, e)));
        render.play(Arc::new(store), controls.clone());
    }

    let max_samples = config.sample_rate as usize * config.channels as usize * MAX_RENDER_SECONDS;
    let max_blocks = max_samples.div_ceil(config.block_sample_count);
    println!("Rendering to {} at {} Hz...", path, config.sample_rate);

    let samples = render.render_until_idle(max_blocks);
    let wav = samples_to_wav(&samples, config.channels, config.sample_rate)
        .unwrap_or_else(|e| fail(format!("Failed to encode {}: {}", path, e)));
    println!("Rendered {} bytes", wav.len());

    fs::write(path, &wav).unwrap_or_else(|e| fail(format!("Failed to write {}: {}", path, e)));
    println!("Done.");
}
