//! # Audio Capture Module
//!
//! Real-time capture from the default input device using CPAL (Cross-Platform Audio
//! Library), exposed as an [`AudioSource`] for the analysis worker.
//!
//! ## Features
//! - Default input device with the closest supported sample rate
//! - 32-bit float capture, with 16-bit integer capture converted to float
//! - Multi-channel input downmixed to mono
//! - Bounded buffering: chunks are dropped rather than blocking the audio callback

use anyhow::{Result, anyhow, bail};
use cpal::{
    SampleFormat, SupportedStreamConfigRange,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use crossbeam_channel::Sender;
use log::{error, info, warn};

use crate::worker::{AudioSource, ChannelSource};

/// Number of callback chunks buffered between the audio callback and the worker.
pub const CHUNK_QUEUE_DEPTH: usize = 64;

/// An [`AudioSource`] reading from the default input device.
///
/// The stream stops when the source is dropped. `cpal::Stream` is not `Send` on every
/// platform, so open the source on the thread that reads from it (as
/// [`AnalysisWorker::spawn`](crate::worker::AnalysisWorker::spawn) does).
pub struct CpalSource {
    stream: cpal::Stream,
    input: ChannelSource,
}

impl CpalSource {
    /// Starts capture from the default input device.
    ///
    /// # Arguments
    /// * `preferred_rate` - Desired sample rate in Hz; the closest supported rate is used
    ///
    /// # Returns
    /// * `Err(e)` - If there is no input device or no usable stream format
    pub fn open_default(preferred_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        info!("Using audio input device: {}", device.name()?);

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, preferred_rate)
            .ok_or_else(|| anyhow!("No suitable f32 or i16 input format found"))?;

        let rate = preferred_rate.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(rate))
            .into();
        let channels = usize::from(config.channels.max(1));

        info!(
            "Selected sample rate: {} Hz, {} channel(s), {:?}",
            rate, channels, sample_format
        );

        let (sender, receiver) = crossbeam_channel::bounded(CHUNK_QUEUE_DEPTH);
        let err_fn = |err| error!("An error occurred on the audio stream: {}", err);

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    forward(&sender, downmix(data, channels));
                },
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    let samples: Vec<f32> = data.iter().copied().map(i16_to_f32).collect();
                    forward(&sender, downmix(&samples, channels));
                },
                err_fn,
                None,
            )?,
            other => bail!("Unsupported sample format {:?}", other),
        };

        stream.play()?;

        Ok(Self {
            stream,
            input: ChannelSource::new(receiver, f64::from(rate)),
        })
    }
}

impl AudioSource for CpalSource {
    fn sample_rate(&self) -> f64 {
        self.input.sample_rate()
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<()> {
        self.input.read(buffer)
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Error pausing audio stream: {}", e);
        }
    }
}

/// Hands a chunk to the worker without blocking the audio callback.
fn forward(sender: &Sender<Vec<f32>>, chunk: Vec<f32>) {
    // A full queue means the worker is paused or behind; stale audio is not worth keeping.
    let _ = sender.try_send(chunk);
}

/// Converts a 16-bit PCM sample to a float in `[-1, 1]`.
///
/// Positive and negative ranges are scaled separately so both extremes map exactly.
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample > 0 {
        f32::from(sample) / 32767.0
    } else {
        f32::from(sample) / 32768.0
    }
}

/// Averages interleaved frames down to one channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Finds the best supported input configuration.
///
/// Prefers, in order: f32 over i16, fewer channels, and a rate range closest to
/// `target_rate` (zero distance if the range contains it).
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter_map(|c| format_rank(c.sample_format()).map(|rank| (rank, c)))
        .min_by_key(|(rank, c)| {
            let distance = rate_distance(c.min_sample_rate().0, c.max_sample_rate().0, target_rate);
            (*rank, c.channels(), distance)
        })
        .map(|(_, c)| c)
}

fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::F32 => Some(0),
        SampleFormat::I16 => Some(1),
        _ => None,
    }
}

fn rate_distance(min: u32, max: u32, target: u32) -> u32 {
    if target < min {
        min - target
    } else {
        target.saturating_sub(max)
    }
}
