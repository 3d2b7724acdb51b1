/// Conversion applied to captured frames before they reach the recognizer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Resample {
    pub samplerate_in: u32,
    pub samplerate_out: u32,
    pub in_channels: u16,
}

impl Resample {
    /// Converts interleaved device samples to mono at the output rate.
    pub fn apply(&self, data: &[f32]) -> Vec<f32> {
        let resampled = if self.samplerate_in == self.samplerate_out {
            data.to_vec()
        } else {
            audio_resample(
                data,
                self.samplerate_in,
                self.samplerate_out,
                self.in_channels,
            )
        };
        to_mono(&resampled, self.in_channels)
    }
}

pub fn audio_resample(
    data: &[f32],
    sample_rate0: u32,
    sample_rate: u32,
    channels: u16,
) -> Vec<f32> {
    use samplerate::{ConverterType, convert};
    convert(
        sample_rate0 as _,
        sample_rate as _,
        channels as _,
        ConverterType::SincBestQuality,
        data,
    )
    .unwrap_or_default()
}

/// Averages interleaved frames down to one channel.
pub fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let n = channels as usize;
    data.chunks(n)
        .map(|chunk| chunk.iter().sum::<f32>() / n as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_passthrough() {
        assert_eq!(to_mono(&[0.1, 0.2, 0.3], 1), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_stereo_is_averaged() {
        assert_eq!(to_mono(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
    }

    #[test]
    fn test_same_rate_only_downmixes() {
        let resample = Resample {
            samplerate_in: 16000,
            samplerate_out: 16000,
            in_channels: 2,
        };
        assert_eq!(resample.apply(&[0.25, 0.75, -1.0, 1.0]), vec![0.5, 0.0]);
    }
}
