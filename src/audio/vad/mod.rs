//! Voice activity detection.
//!
//! Frames of [`N_SAMPLES`] samples are scored by the silero model and fed to
//! a [`Segmenter`] which turns the per-frame speech probabilities into
//! utterances.

use crate::audio::SAMPLE_RATE;
use crate::config::ListenConfig;

mod silero;
pub use silero::Silero;

pub const N_SAMPLES: usize = 512;

/// Transition reported by the [`Segmenter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Enough speech was heard for an utterance to begin.
    Started,
    /// The utterance ended; its samples.
    Finished(Vec<f32>),
}

/// Number of frames covering at least `ms` milliseconds, never zero.
pub fn frames_for(ms: u64) -> usize {
    let samples = ms as usize * SAMPLE_RATE as usize / 1000;
    samples.div_ceil(N_SAMPLES).max(1)
}

/// Groups scored frames into utterances.
#[derive(Debug)]
pub struct Segmenter {
    threshold: f32,
    speech_frames: usize,
    silence_frames: usize,
    talking: bool,
    speech_run: usize,
    silence_run: usize,
    utterance: Vec<f32>,
}

impl Segmenter {
    pub fn new(threshold: f32, speech_frames: usize, silence_frames: usize) -> Self {
        Self {
            threshold,
            speech_frames: speech_frames.max(1),
            silence_frames: silence_frames.max(1),
            talking: false,
            speech_run: 0,
            silence_run: 0,
            utterance: Vec::new(),
        }
    }

    pub fn from_config(config: &ListenConfig) -> Self {
        Self::new(
            config.vad_threshold,
            frames_for(config.speech_duration_ms),
            frames_for(config.silence_duration_ms),
        )
    }

    /// Feeds one frame and its speech probability.
    pub fn push(&mut self, speech_prob: f32, frame: &[f32]) -> Option<Segment> {
        let is_speech = speech_prob > self.threshold;
        if !self.talking {
            if !is_speech {
                self.speech_run = 0;
                self.utterance.clear();
                return None;
            }
            // Keep the onset frames, they carry the start of the first word.
            self.utterance.extend_from_slice(frame);
            self.speech_run += 1;
            if self.speech_run < self.speech_frames {
                return None;
            }
            self.talking = true;
            self.silence_run = 0;
            return Some(Segment::Started);
        }

        self.utterance.extend_from_slice(frame);
        if is_speech {
            self.silence_run = 0;
            return None;
        }
        self.silence_run += 1;
        if self.silence_run < self.silence_frames {
            return None;
        }
        self.talking = false;
        self.speech_run = 0;
        self.silence_run = 0;
        Some(Segment::Finished(std::mem::take(&mut self.utterance)))
    }

    /// Samples of the utterance in progress.
    pub fn utterance(&self) -> &[f32] {
        if self.talking { &self.utterance } else { &[] }
    }

    /// Drops any utterance in progress.
    pub fn reset(&mut self) {
        self.talking = false;
        self.speech_run = 0;
        self.silence_run = 0;
        self.utterance.clear();
    }
}
