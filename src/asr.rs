//! Whisper model integration for speech recognition.
//!
//! This module loads the whisper model once and transcribes utterances,
//! reporting the mean token probability alongside the text so the keyword
//! search can apply its threshold.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::Path;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Text decoded from one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Mean probability of the decoded tokens, `0.0` when nothing was decoded.
    pub confidence: f32,
}

/// Decoding options fixed at setup time.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Initial prompt biasing the decoder toward the keywords.
    pub prompt: Option<String>,
    pub no_context: bool,
}

pub struct Asr {
    context: WhisperContext,
}

impl Asr {
    pub fn load(model_path: &Path) -> Result<Self> {
        debug!("Trying to load model {}", model_path.display());
        let context = WhisperContext::new_with_params(
            &model_path.to_string_lossy(),
            WhisperContextParameters::default(),
        )
        .context(format!("Loading model at {}", model_path.display()))?;
        info!("Context loaded");
        Ok(Self { context })
    }

    /// Runs the Whisper model on 16kHz mono samples.
    pub fn run(&self, samples: &[f32], options: &DecodeOptions) -> Result<Transcript> {
        let mut state = self.context.create_state().context("Creating state")?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);
        params.set_no_context(options.no_context);
        params.set_language(Some("en"));

        if let Some(prompt) = &options.prompt {
            params.set_initial_prompt(prompt);
        }

        state.full(params, samples).context("Running model")?;

        let num_segments = state.full_n_segments()?;
        let mut text = String::new();
        let mut probabilities = Vec::new();
        for i in 0..num_segments {
            let segment = state.full_get_segment_text(i)?;
            text.push_str(&segment);
            text.push(' ');
            for token in 0..state.full_n_tokens(i)? {
                probabilities.push(state.full_get_token_prob(i, token)?);
            }
        }

        Ok(Transcript {
            text: text.trim().to_string(),
            confidence: mean(&probabilities),
        })
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}
