//! Continuous keyword recognizer.
//!
//! The recognizer is driven through the [`Recognizer`] trait and reports what
//! it hears as [`RecognizerEvent`]s on a channel. [`RecognizerSetup`] gathers
//! its static configuration and builds the whisper backed implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::{AudioConfig, Config, ListenConfig};

mod engine;
pub mod search;

pub use engine::WhisperRecognizer;

/// Name of the keyword search built from the command list.
pub const COMMANDS_SEARCH: &str = "commands";

/// A candidate transcription for the current utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub text: String,
    /// Mean token probability of the decoded utterance.
    pub score: f32,
}

impl Hypothesis {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// Notifications sent by a running recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    BeginningOfSpeech,
    /// A keyword was spotted while the utterance is still going on.
    PartialResult(Option<Hypothesis>),
    /// Final hypothesis of a finished utterance.
    Result(Option<Hypothesis>),
    EndOfSpeech,
    Error(String),
    /// No speech started within the configured delay; listening stopped.
    Timeout,
}

/// Control surface of a recognizer.
pub trait Recognizer {
    /// Registers a keyword search read from a command file.
    fn add_keyword_search(&mut self, name: &str, keywords_file: &Path) -> Result<()>;

    /// Starts listening with the named search.
    fn start_listening(&mut self, search: &str) -> Result<()>;

    /// Stops listening, dropping any utterance in progress.
    fn stop(&mut self) -> Result<()>;

    /// Stops listening without reporting anything further.
    fn cancel(&mut self) -> Result<()>;

    /// Releases the audio device and models.
    fn shutdown(&mut self) -> Result<()>;
}

/// Static configuration of the recognizer.
#[derive(Debug, Clone)]
pub struct RecognizerSetup {
    pub acoustic_model: PathBuf,
    pub vad_model: PathBuf,
    /// Text replacements applied to every transcript.
    pub dictionary: HashMap<String, String>,
    pub raw_log_dir: Option<PathBuf>,
    pub keyword_threshold: f32,
    pub no_context: bool,
    pub audio: AudioConfig,
    pub listen: ListenConfig,
}

impl RecognizerSetup {
    pub fn new(acoustic_model: &Path, vad_model: &Path) -> Self {
        let defaults = Config::default();
        Self {
            acoustic_model: acoustic_model.to_path_buf(),
            vad_model: vad_model.to_path_buf(),
            dictionary: HashMap::new(),
            raw_log_dir: None,
            keyword_threshold: defaults.recognizer.keyword_threshold,
            no_context: defaults.recognizer.no_context,
            audio: defaults.audio,
            listen: defaults.listen,
        }
    }

    /// Setup described by `config`, with the models at the given paths.
    pub fn from_config(config: &Config, acoustic_model: &Path, vad_model: &Path) -> Self {
        Self::new(acoustic_model, vad_model)
            .with_dictionary(config.model.replacements.clone())
            .with_raw_log_dir(config.paths.raw_log_dir.clone())
            .with_keyword_threshold(config.recognizer.keyword_threshold)
            .with_no_context(config.recognizer.no_context)
            .with_audio(config.audio.clone())
            .with_listen(config.listen.clone())
    }

    pub fn with_dictionary(mut self, dictionary: HashMap<String, String>) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub fn with_raw_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.raw_log_dir = dir;
        self
    }

    pub fn with_keyword_threshold(mut self, threshold: f32) -> Self {
        self.keyword_threshold = threshold;
        self
    }

    pub fn with_no_context(mut self, no_context: bool) -> Self {
        self.no_context = no_context;
        self
    }

    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_listen(mut self, listen: ListenConfig) -> Self {
        self.listen = listen;
        self
    }

    /// Applies the dictionary to a transcript.
    pub fn apply_dictionary(&self, text: &str) -> String {
        let mut text = text.to_string();
        for (from, to) in &self.dictionary {
            text = text.replace(from, to);
        }
        text
    }

    /// Starts the recognizer; events are reported on `events`.
    pub fn build(self, events: UnboundedSender<RecognizerEvent>) -> Result<WhisperRecognizer> {
        WhisperRecognizer::spawn(self, events)
    }
}
