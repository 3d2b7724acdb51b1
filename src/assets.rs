//! Asset staging.
//!
//! The default command list ships inside the binary and is written to the
//! assets directory the first time the listener runs, so users can edit it in
//! place. Models are fetched from the Hugging Face Hub and cached there.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hf_hub::api::tokio::ApiBuilder;
use log::{debug, info};

use crate::config::ModelConfig;
use crate::error::Error;

pub const COMMANDS_FILE: &str = "commands.lst";

const BUNDLED: &[(&str, &str)] = &[(COMMANDS_FILE, include_str!("../assets/commands.lst"))];

/// Writes the bundled assets missing from `dir` and returns `dir`.
///
/// Files already present are left alone.
pub fn sync(dir: &Path) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Assets(format!("Creating {}: {e}", dir.display())))?;
    for (name, contents) in BUNDLED {
        let path = dir.join(name);
        if path.exists() {
            debug!("Keeping {}", path.display());
            continue;
        }
        std::fs::write(&path, contents)
            .map_err(|e| Error::Assets(format!("Writing {}: {e}", path.display())))?;
        info!("Staged {}", path.display());
    }
    Ok(dir.to_path_buf())
}

/// Local paths of the downloaded models.
#[derive(Debug, Clone)]
pub struct Models {
    pub acoustic: PathBuf,
    pub vad: PathBuf,
}

/// Downloads the whisper and VAD models from Hugging Face Hub.
///
/// Models are cached locally after the first download.
pub async fn download_models(config: &ModelConfig) -> Result<Models> {
    let api = ApiBuilder::from_env().build()?;
    let acoustic = api
        .model(config.repo.clone())
        .get(&config.filename)
        .await
        .with_context(|| format!("Downloading {}/{}", config.repo, config.filename))?;
    let vad = api
        .model(config.vad_repo.clone())
        .get(&config.vad_filename)
        .await
        .with_context(|| format!("Downloading {}/{}", config.vad_repo, config.vad_filename))?;
    Ok(Models { acoustic, vad })
}
