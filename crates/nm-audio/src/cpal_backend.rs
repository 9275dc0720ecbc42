//! CPAL-based audio output.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::traits::{AudioError, CompletionHandler, OutputDevice, OutputFormat, OutputHost};

/// Stream sample formats this backend can convert blocks to, best first.
const STREAM_FORMATS: [SampleFormat; 4] =
    [SampleFormat::F32, SampleFormat::I32, SampleFormat::I16, SampleFormat::U16];

/// The platform's default cpal host.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }

    fn find_device(&self, name: &str) -> Result<Device, AudioError> {
        let host = cpal::default_host();
        let mut devices = host
            .output_devices()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        devices
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
    }
}

impl OutputHost for CpalHost {
    fn devices(&self) -> Result<Vec<String>, AudioError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let names: Vec<String> = devices
            .filter_map(|d| match d.name() {
                Ok(n) => Some(n),
                Err(e) => {
                    log::debug!("Skipping unnamed output device: {}", e);
                    None
                }
            })
            .collect();

        if names.is_empty() {
            return Err(AudioError::NoDevices);
        }
        Ok(names)
    }

    fn open(
        &self,
        device: &str,
        format: OutputFormat,
        on_complete: CompletionHandler,
    ) -> Result<Box<dyn OutputDevice>, AudioError> {
        format.check()?;
        let device = self.find_device(device)?;
        let output = CpalOutput::open(device, format, on_complete)?;
        Ok(Box::new(output))
    }
}

/// One running cpal output stream fed from a sample ring.
///
/// Submitted blocks are copied into the ring; the stream callback drains it
/// and reports a completion every `block_samples` samples it consumes.
pub struct CpalOutput {
    name: String,
    format: OutputFormat,
    producer: HeapProd<i32>,
    _stream: Stream,
}

impl CpalOutput {
    fn open(device: Device, format: OutputFormat, on_complete: CompletionHandler) -> Result<Self, AudioError> {
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let sample_format = choose_sample_format(&device, &format)?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let rb = HeapRb::<i32>::new(format.block_samples * format.block_count);
        let (producer, consumer) = rb.split();

        let block_samples = format.block_samples;
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, block_samples, on_complete),
            SampleFormat::I32 => build_stream::<i32>(&device, &config, consumer, block_samples, on_complete),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, block_samples, on_complete),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, block_samples, on_complete),
            other => Err(AudioError::UnsupportedFormat(format!("{:?} samples", other))),
        }?;
        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;

        log::info!(
            "Opened '{}' at {} Hz, {} ch, {:?} samples, {} x {} samples",
            name, format.sample_rate, format.channels, sample_format, format.block_count, format.block_samples
        );

        Ok(Self { name, format, producer, _stream: stream })
    }
}

/// The stream sample format for `format` on `device`: the device's default
/// when it can carry the requested rate and channel count, else the best
/// one that can.
fn choose_sample_format(device: &Device, format: &OutputFormat) -> Result<SampleFormat, AudioError> {
    let configs = device
        .supported_output_configs()
        .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

    let rate = cpal::SampleRate(format.sample_rate);
    let offered: Vec<SampleFormat> = configs
        .filter(|c| c.channels() == format.channels && c.min_sample_rate() <= rate && rate <= c.max_sample_rate())
        .map(|c| c.sample_format())
        .collect();
    let default = device.default_output_config().ok().map(|c| c.sample_format());

    pick_sample_format(default, &offered).ok_or_else(|| {
        AudioError::UnsupportedFormat(format!("{} Hz, {} channels", format.sample_rate, format.channels))
    })
}

/// Pick from the formats a device offers for the wanted rate and channels.
fn pick_sample_format(default: Option<SampleFormat>, offered: &[SampleFormat]) -> Option<SampleFormat> {
    let usable = |f: &SampleFormat| STREAM_FORMATS.contains(f) && offered.contains(f);
    default
        .filter(usable)
        .or_else(|| STREAM_FORMATS.into_iter().find(usable))
}

/// A stream that converts `i32` block samples to the device's `T`.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<i32>,
    block_samples: usize,
    mut on_complete: CompletionHandler,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<i32>,
{
    let mut consumed = 0usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    match consumer.try_pop() {
                        Some(value) => {
                            *sample = T::from_sample(value);
                            consumed += 1;
                            if consumed == block_samples {
                                consumed = 0;
                                on_complete();
                            }
                        }
                        // Underrun: the mixer is late, play silence.
                        None => *sample = T::EQUILIBRIUM,
                    }
                }
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamCreate(e.to_string()))
}

impl OutputDevice for CpalOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> OutputFormat {
        self.format
    }

    fn submit(&mut self, block: &[i32]) -> Result<(), AudioError> {
        let pushed = self.producer.push_slice(block);
        if pushed < block.len() {
            return Err(AudioError::Overrun(block.len() - pushed));
        }
        Ok(())
    }
}
