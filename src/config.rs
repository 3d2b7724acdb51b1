//! Configuration management for hark.
//!
//! This module provides functionality for loading and managing application
//! configuration, including audio capture settings, model locations and the
//! recognizer's static parameters.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct AudioConfig {
    /// Number of audio channels (1 for mono, 2 for stereo)
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Sample format requested from the device
    pub sample_format: SampleFormat,
    /// Audio input device name (e.g., "sysdefault:CARD=C920")
    /// If not specified, the default device will be used
    pub device: Option<String>,
}

impl From<SampleFormat> for cpal::SampleFormat {
    fn from(value: SampleFormat) -> Self {
        match value {
            SampleFormat::I16 => cpal::SampleFormat::I16,
            SampleFormat::F32 => cpal::SampleFormat::F32,
        }
    }
}

/// Sample format for audio capture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// `i16` with a valid range of 'i16::MIN..=i16::MAX' with `0` being the origin
    I16,

    /// `f32` with a valid range of `-1.0..1.0` with `0.0` being the origin
    F32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: 16000,
            sample_format: SampleFormat::F32,
            device: None,
        }
    }
}

/// Path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct PathConfig {
    /// Directory the bundled assets are staged into
    pub assets_dir: PathBuf,
    /// Command list to use instead of the staged `commands.lst`
    #[serde(default)]
    pub commands_file: Option<PathBuf>,
    /// Directory receiving one WAV file per utterance, disabled when unset
    #[serde(default)]
    pub raw_log_dir: Option<PathBuf>,
}

/// Model locations and transcript post-processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ModelConfig {
    /// Whisper model repository on Hugging Face
    pub repo: String,
    /// Whisper model filename
    pub filename: String,
    /// Voice activity detection model repository on Hugging Face
    pub vad_repo: String,
    /// Voice activity detection model filename
    pub vad_filename: String,
    /// Map of text to replace with their replacements
    #[serde(default)]
    pub replacements: HashMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo: "ggerganov/whisper.cpp".to_string(),
            filename: "ggml-base.en.bin".to_string(),
            vad_repo: "Narsil/silero".to_string(),
            vad_filename: "silero_vad.onnx".to_string(),
            replacements: HashMap::new(),
        }
    }
}

/// Static decoder parameters of the keyword recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct RecognizerConfig {
    /// Minimum mean token probability for a spotted keyword to be reported.
    /// Lower values accept more detections (more false positives).
    pub keyword_threshold: f32,
    /// Decode every utterance without the previous utterance as context
    pub no_context: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            keyword_threshold: 1e-5,
            no_context: true,
        }
    }
}

/// Utterance segmentation and listening limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct ListenConfig {
    /// Speech probability above which a frame counts as speech
    pub vad_threshold: f32,
    /// Continuous speech needed before an utterance begins
    pub speech_duration_ms: u64,
    /// Continuous silence needed before an utterance ends
    pub silence_duration_ms: u64,
    /// Re-transcribe an ongoing utterance this often, disabled when unset
    #[serde(default)]
    pub partial_interval_ms: Option<u64>,
    /// Stop listening when no speech starts within this delay
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            vad_threshold: 0.5,
            speech_duration_ms: 64,
            silence_duration_ms: 500,
            partial_interval_ms: Some(1000),
            timeout_ms: None,
        }
    }
}

/// Screen options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct DisplayConfig {
    /// Show a desktop notification when a command is recognized
    pub notify: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { notify: true }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Config {
    /// Audio capture settings
    pub audio: AudioConfig,
    /// Path configuration
    pub paths: PathConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Recognizer decoder settings
    #[serde(default)]
    pub recognizer: RecognizerConfig,
    /// Utterance segmentation settings
    #[serde(default)]
    pub listen: ListenConfig,
    /// Screen settings
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .context("Cannot find data directory")
            .unwrap_or_else(|_| PathBuf::from("~/.local/share"));
        let mut assets_dir = data_dir;
        assets_dir.push("hark");
        assets_dir.push("assets");

        Self {
            audio: AudioConfig::default(),
            paths: PathConfig {
                assets_dir,
                commands_file: None,
                raw_log_dir: None,
            },
            model: ModelConfig::default(),
            recognizer: RecognizerConfig::default(),
            listen: ListenConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Gets the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .context("Cannot find config directory")
            .unwrap_or_else(|_| PathBuf::from("~/.config"));
        let mut path = config_dir;
        path.push("hark");
        path.push("config.toml");
        path
    }

    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Loads configuration from the default location, creating it if it doesn't exist.
    pub fn load_or_write_default(path: Option<&Path>) -> Result<Self> {
        let default_path = Self::default_config_path();
        let path = path.unwrap_or(&default_path);
        if path.exists() {
            return Self::from_file(path)
                .context(format!("Reading default config from {}", path.display()));
        }

        let config = Self::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save_to_file(path)?;
        Ok(config)
    }

    /// The command list the keyword search is built from.
    pub fn commands_path(&self) -> PathBuf {
        self.paths
            .commands_file
            .clone()
            .unwrap_or_else(|| self.paths.assets_dir.join(crate::assets::COMMANDS_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.channels, 1);
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(matches!(config.audio.sample_format, SampleFormat::F32));
        assert_eq!(config.model.repo, "ggerganov/whisper.cpp");
        assert_eq!(config.model.filename, "ggml-base.en.bin");
        assert!(config.model.replacements.is_empty());
        assert_eq!(config.recognizer.keyword_threshold, 1e-5);
        assert!(config.recognizer.no_context);
        assert!(config.paths.assets_dir.ends_with("hark/assets"));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("channels = 1"));
        assert!(toml.contains("sample_rate = 16000"));
        assert!(toml.contains("sample_format = \"f32\""));
        assert!(toml.contains("repo = \"ggerganov/whisper.cpp\""));
        assert!(toml.contains("vad_filename = \"silero_vad.onnx\""));
        assert!(toml.contains("[recognizer]"));
        assert!(toml.contains("no_context = true"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [audio]
            channels = 2
            sample_rate = 48000
            sample_format = "i16"
            device = "pulse"

            [paths]
            assets_dir = "/tmp/hark"
            commands_file = "/tmp/my.lst"

            [model]
            repo = "test/repo"
            filename = "test.bin"
            vad_repo = "test/vad"
            vad_filename = "vad.onnx"
            replacements = { "go ahead" = "forward" }

            [recognizer]
            keyword_threshold = 0.25
            no_context = false

            [listen]
            vad_threshold = 0.6
            speech_duration_ms = 100
            silence_duration_ms = 800
            timeout_ms = 5000

            [display]
            notify = false
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.sample_rate, 48000);
        assert_eq!(config.audio.sample_format, SampleFormat::I16);
        assert_eq!(config.audio.device.as_deref(), Some("pulse"));
        assert_eq!(config.paths.assets_dir, PathBuf::from("/tmp/hark"));
        assert_eq!(config.commands_path(), PathBuf::from("/tmp/my.lst"));
        assert_eq!(config.paths.raw_log_dir, None);
        assert_eq!(
            config.model.replacements.get("go ahead"),
            Some(&"forward".to_string())
        );
        assert_eq!(config.recognizer.keyword_threshold, 0.25);
        assert!(!config.recognizer.no_context);
        assert_eq!(config.listen.silence_duration_ms, 800);
        assert_eq!(config.listen.partial_interval_ms, None);
        assert_eq!(config.listen.timeout_ms, Some(5000));
        assert!(!config.display.notify);
    }

    #[test]
    fn test_optional_sections_use_defaults() {
        let toml = r#"
            [audio]
            channels = 1
            sample_rate = 16000
            sample_format = "f32"

            [paths]
            assets_dir = "/tmp/hark"

            [model]
            repo = "ggerganov/whisper.cpp"
            filename = "ggml-base.en.bin"
            vad_repo = "Narsil/silero"
            vad_filename = "silero_vad.onnx"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.recognizer, RecognizerConfig::default());
        assert_eq!(config.listen, ListenConfig::default());
        assert_eq!(config.display, DisplayConfig::default());
        assert_eq!(
            config.commands_path(),
            PathBuf::from("/tmp/hark/commands.lst")
        );
    }

    #[test]
    fn test_example_default_config_round_trip() -> Result<()> {
        let default = Config::default();
        let serialized = toml::to_string(&default)?;
        let deserialized: Config = toml::from_str(&serialized)?;
        assert_eq!(default, deserialized);
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        let toml = r#"
            [audio]
            channels = "invalid"  # Should be a number
            sample_rate = 48000
            sample_format = "i16"
        "#;

        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_sample_format_is_rejected() {
        let toml = r#"
            [audio]
            channels = 1
            sample_rate = 16000
            sample_format = "u64"
        "#;

        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_creation() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("hark").join("config.toml");

        let config = Config::load_or_write_default(Some(&config_path)).unwrap();
        assert!(config_path.exists());
        assert_eq!(config.audio.sample_rate, 16000);

        // A second load reads the file back instead of rewriting it
        let mut edited = config.clone();
        edited.display.notify = false;
        edited.save_to_file(&config_path).unwrap();
        let reloaded = Config::load_or_write_default(Some(&config_path)).unwrap();
        assert!(!reloaded.display.notify);
    }
}
