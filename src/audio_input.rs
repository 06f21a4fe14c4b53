use std::f32::consts::TAU;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::sensors::SensorCache;
use crate::types::AudioSample;

/// Analysis blocks per second; one per displayed frame at 60 Hz.
const BLOCKS_PER_SECOND: f32 = 60.0;
const LOW_CUTOFF_HZ: f32 = 160.0;
const HIGH_CUTOFF_HZ: f32 = 2_000.0;
const DB_FLOOR: f32 = -70.0;
const DB_CEIL: f32 = -10.0;

#[derive(Debug, Error)]
pub enum AudioInputError {
    #[error("no default audio input device found")]
    NoDevice,
    #[error("failed to read default input config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build input stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start input stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("unsupported input sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}

/// Live microphone feeding band energies into a [`SensorCache`].
pub struct AudioInput {
    _stream: cpal::Stream,
    pub device_name: String,
    pub sample_rate: u32,
}

impl AudioInput {
    pub fn start(cache: SensorCache) -> Result<Self, AudioInputError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioInputError::NoDevice)?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "Unknown input device".to_owned());

        let supported_config = device.default_input_config()?;
        let config = supported_config.config();
        let sample_rate = config.sample_rate.0;

        let stream = match supported_config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, cache)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, cache)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, cache)?,
            other => return Err(AudioInputError::UnsupportedFormat(other)),
        };
        stream.play()?;

        tracing::info!(device = %device_name, sample_rate, "audio input started");

        Ok(Self {
            _stream: stream,
            device_name,
            sample_rate,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    cache: SensorCache,
) -> Result<cpal::Stream, AudioInputError>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let mut analyzer = BandAnalyzer::new(config.sample_rate.0 as f32);
    let error_cache = cache.clone();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let mono = frame
                    .iter()
                    .map(|&s| <f32 as cpal::Sample>::from_sample(s))
                    .sum::<f32>()
                    / frame.len() as f32;
                if let Some(sample) = analyzer.push(mono) {
                    cache.publish_audio(sample);
                }
            }
        },
        move |err| {
            tracing::warn!(error = %err, "audio input stream error");
            error_cache.set_audio_unavailable();
        },
        None,
    )?;

    Ok(stream)
}

/// Splits a mono signal into low/mid/high energies over fixed-length blocks.
pub struct BandAnalyzer {
    sample_rate: f32,
    block_len: usize,
    filled: usize,
    low: [LowPass; 2],
    high: [HighPass; 2],
    mid_high_pass: HighPass,
    mid_low_pass: LowPass,
    sums: [f32; 4],
}

impl BandAnalyzer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            block_len: (sample_rate / BLOCKS_PER_SECOND).round().max(1.0) as usize,
            filled: 0,
            low: [LowPass::new(), LowPass::new()],
            high: [HighPass::new(), HighPass::new()],
            mid_high_pass: HighPass::new(),
            mid_low_pass: LowPass::new(),
            sums: [0.0; 4],
        }
    }

    /// Feeds one sample; returns a finished block every `sample_rate / 60` samples.
    pub fn push(&mut self, input: f32) -> Option<AudioSample> {
        let sr = self.sample_rate;
        let low = self
            .low
            .iter_mut()
            .fold(input, |x, stage| stage.process(x, LOW_CUTOFF_HZ, sr));
        let high = self
            .high
            .iter_mut()
            .fold(input, |x, stage| stage.process(x, HIGH_CUTOFF_HZ, sr));
        let mid = self.mid_low_pass.process(
            self.mid_high_pass.process(input, LOW_CUTOFF_HZ, sr),
            HIGH_CUTOFF_HZ,
            sr,
        );

        self.sums[0] += low * low;
        self.sums[1] += mid * mid;
        self.sums[2] += high * high;
        self.sums[3] += input * input;
        self.filled += 1;

        if self.filled < self.block_len {
            return None;
        }

        let n = self.filled as f32;
        let rms = |sum: f32| (sum / n).sqrt();
        let sample = AudioSample {
            low: db_energy(rms(self.sums[0])),
            mid: db_energy(rms(self.sums[1])),
            high: db_energy(rms(self.sums[2])),
            rms: rms(self.sums[3]),
        };
        self.sums = [0.0; 4];
        self.filled = 0;
        Some(sample)
    }
}

/// Maps an RMS amplitude onto [0, 1] over the analyzer's decibel window.
fn db_energy(rms: f32) -> f32 {
    let db = 20.0 * rms.max(1.0e-7).log10();
    ((db - DB_FLOOR) / (DB_CEIL - DB_FLOOR)).clamp(0.0, 1.0)
}

struct LowPass {
    y1: f32,
}

impl LowPass {
    fn new() -> Self {
        Self { y1: 0.0 }
    }

    fn process(&mut self, input: f32, cutoff_hz: f32, sample_rate: f32) -> f32 {
        let rc = 1.0 / (TAU * cutoff_hz.max(1.0));
        let dt = 1.0 / sample_rate;
        let alpha = dt / (rc + dt);
        self.y1 += alpha * (input - self.y1);
        self.y1
    }
}

struct HighPass {
    x1: f32,
    y1: f32,
}

impl HighPass {
    fn new() -> Self {
        Self { x1: 0.0, y1: 0.0 }
    }

    fn process(&mut self, input: f32, cutoff_hz: f32, sample_rate: f32) -> f32 {
        let rc = 1.0 / (TAU * cutoff_hz.max(20.0));
        let dt = 1.0 / sample_rate;
        let alpha = rc / (rc + dt);
        let output = alpha * (self.y1 + input - self.x1);
        self.x1 = input;
        self.y1 = output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    fn analyze_tone(freq: f32, amplitude: f32) -> AudioSample {
        let mut analyzer = BandAnalyzer::new(SR);
        let mut last = None;
        // Half a second lets the filters settle.
        for n in 0..(SR as usize / 2) {
            let x = amplitude * (TAU * freq * n as f32 / SR).sin();
            if let Some(sample) = analyzer.push(x) {
                last = Some(sample);
            }
        }
        last.expect("analyzer should emit blocks")
    }

    #[test]
    fn bass_tone_lands_in_low_band() {
        let sample = analyze_tone(60.0, 0.5);
        assert!(sample.low > sample.high, "{sample:?}");
        assert!(sample.low > sample.mid, "{sample:?}");
    }

    #[test]
    fn treble_tone_lands_in_high_band() {
        let sample = analyze_tone(6_000.0, 0.5);
        assert!(sample.high > sample.low, "{sample:?}");
    }

    #[test]
    fn rms_of_sine_is_amplitude_over_root_two() {
        let sample = analyze_tone(440.0, 0.5);
        assert!((sample.rms - 0.5 / 2.0_f32.sqrt()).abs() < 0.02, "{}", sample.rms);
    }

    #[test]
    fn silence_reads_as_zero_energy() {
        let mut analyzer = BandAnalyzer::new(SR);
        let sample = (0..800).find_map(|_| analyzer.push(0.0)).unwrap();
        assert_eq!(sample.low, 0.0);
        assert_eq!(sample.high, 0.0);
        assert_eq!(sample.rms, 0.0);
    }

    #[test]
    fn blocks_follow_the_frame_rate() {
        let mut analyzer = BandAnalyzer::new(SR);
        let emitted = (0..SR as usize).filter_map(|_| analyzer.push(0.1)).count();
        assert_eq!(emitted, 60);
    }
}
