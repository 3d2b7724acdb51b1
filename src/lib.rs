#![doc = include_str!("../README.md")]
pub mod app;
pub mod asr;
pub mod assets;
pub mod audio;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod palette;
pub mod recognizer;
pub mod view;
