//! Audio capture.
//!
//! This module opens the configured input device and streams its samples,
//! converted to 16kHz mono `f32`, into a ring buffer read by the recognizer.

use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, SupportedStreamConfig};
use log::{debug, error, info, warn};
use ringbuf::HeapProd;
use ringbuf::traits::Producer;

use crate::config::AudioConfig;

pub mod resample;
pub mod vad;

use resample::Resample;

/// Sample rate the recognizer works at.
pub const SAMPLE_RATE: u32 = 16_000;

#[cfg(all(
    any(
        target_os = "linux",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "netbsd"
    ),
    feature = "jack"
))]
fn host() -> cpal::Host {
    cpal::available_hosts()
        .into_iter()
        .find(|id| *id == cpal::HostId::Jack)
        .and_then(|id| cpal::host_from_id(id).ok())
        .unwrap_or_else(|| {
            warn!("Jack host unavailable, using the default host");
            cpal::default_host()
        })
}

#[cfg(not(all(
    any(
        target_os = "linux",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "netbsd"
    ),
    feature = "jack"
)))]
fn host() -> cpal::Host {
    cpal::default_host()
}

/// Names of the available input devices.
pub fn input_device_names() -> Result<Vec<String>> {
    let host = host();
    let mut names: Vec<String> = host.input_devices()?.flat_map(|d| d.name()).collect();
    names.sort();
    Ok(names)
}

fn find_device(config: &AudioConfig) -> Result<cpal::Device> {
    let host = host();
    debug!("Available hosts: {:?}", cpal::available_hosts());
    debug!("Default host: {:?}", host.id());

    let devices = host.input_devices()?;
    let names: HashSet<_> = devices.into_iter().flat_map(|d| d.name()).collect();
    debug!("Available input devices: {names:?}");

    let mut devices = host.input_devices()?;
    // Find the requested device or use default
    let device = if let Some(device_name) = &config.device {
        devices
            .find(|d| d.name().map(|name| name == *device_name).unwrap_or(false))
            .ok_or_else(|| {
                anyhow!(
                    "Requested audio device '{}' not found, available: {:?}",
                    device_name,
                    names
                )
            })?
    } else {
        host.default_input_device()
            .ok_or_else(|| anyhow!("No default input device found"))?
    };
    info!("Using input device: {}", device.name()?);
    Ok(device)
}

fn stream_config(device: &cpal::Device, config: &AudioConfig) -> SupportedStreamConfig {
    let sample_rate = cpal::SampleRate(config.sample_rate);
    let matching = device.supported_input_configs().ok().and_then(|mut ranges| {
        ranges.find(|range| {
            range.min_sample_rate() <= sample_rate
                && range.max_sample_rate() >= sample_rate
                && range.channels() == config.channels
                && range.sample_format() == config.sample_format.into()
        })
    });
    if let Some(range) = matching {
        return range.with_sample_rate(sample_rate);
    }

    debug!("Could not find supported configs");
    match device.default_input_config() {
        Ok(default_config) => {
            debug!("Device default config: {:?}", default_config);
            default_config
        }
        Err(err) => {
            warn!("Could not default_config ({err}), falling back to configured format");
            SupportedStreamConfig::new(
                config.channels,
                sample_rate,
                cpal::SupportedBufferSize::Unknown,
                config.sample_format.into(),
            )
        }
    }
}

/// Opens the input stream, paused. Converted samples are pushed to `producer`.
///
/// The returned stream is not `Send`; it must stay on the thread that built it.
pub fn open_input_stream(config: &AudioConfig, producer: HeapProd<f32>) -> Result<cpal::Stream> {
    let device = find_device(config)?;
    let stream_config = stream_config(&device, config);
    debug!("Using stream config: {:?}", stream_config);

    let resample = Resample {
        samplerate_in: stream_config.sample_rate().0,
        samplerate_out: SAMPLE_RATE,
        in_channels: stream_config.channels(),
    };
    let stream = match stream_config.sample_format() {
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &stream_config, producer, resample)?
        }
        cpal::SampleFormat::I32 => {
            build_stream::<i32>(&device, &stream_config, producer, resample)?
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &stream_config, producer, resample)?
        }
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &stream_config, producer, resample)?
        }
        sample_format => {
            return Err(anyhow!("Unsupported sample format '{sample_format}'"));
        }
    };
    stream.pause().context("Cannot pause")?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &SupportedStreamConfig,
    mut producer: HeapProd<f32>,
    resample: Resample,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let err_fn = move |err| {
        error!("Audio stream error: {}", err);
    };
    let stream = device
        .build_input_stream(
            &stream_config.config(),
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data.iter().map(|&s| s.to_sample::<f32>()).collect();
                let samples = resample.apply(&samples);
                let pushed = producer.push_slice(&samples);
                if pushed < samples.len() {
                    warn!("Buffer full, dropping {} samples", samples.len() - pushed);
                }
            },
            err_fn,
            None,
        )
        .context("Failed to create audio stream")?;
    Ok(stream)
}
