//! Error types for hark.
//!
//! This module defines the typed failures raised by the listener. It uses the
//! `thiserror` crate to derive error implementations; callers wrap them in
//! `anyhow` with context.

use thiserror::Error;

/// Custom error type for hark.
///
/// Setup failures of any of these kinds put the controller in its terminal
/// failed state; runtime failures are shown verbatim on screen.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to audio device initialization or configuration
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Error related to the speech or VAD models
    #[error("Model error: {0}")]
    Model(String),

    /// Error while staging bundled assets
    #[error("Asset error: {0}")]
    Assets(String),

    /// Error reading the command list
    #[error("Command list error: {0}")]
    Commands(String),

    /// Error reported by the recognizer while listening
    #[error("Recognizer error: {0}")]
    Recognizer(String),
}
