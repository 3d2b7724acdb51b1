//! Main application logic.
//!
//! This module wires the pieces together: it runs the one-shot setup in the
//! background, hands its outcome to the controller, then feeds recognizer
//! events to the controller until the user interrupts.

use anyhow::{Context, Result, bail};
use log::{info, warn};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use crate::assets;
use crate::commands::CommandList;
use crate::config::Config;
use crate::controller::{Controller, Initialised, Phase};
use crate::recognizer::{
    COMMANDS_SEARCH, Recognizer, RecognizerEvent, RecognizerSetup, WhisperRecognizer,
};
use crate::view::TerminalView;

/// Stages assets, fetches the models and starts the recognizer.
async fn initialise(
    config: Config,
    events: UnboundedSender<RecognizerEvent>,
) -> Result<Initialised<WhisperRecognizer>> {
    let models = assets::download_models(&config.model)
        .await
        .context("Failed to download models")?;

    tokio::task::spawn_blocking(move || {
        assets::sync(&config.paths.assets_dir).context("Synchronising assets")?;

        let setup = RecognizerSetup::from_config(&config, &models.acoustic, &models.vad);
        let mut recognizer = setup.build(events).context("Starting recognizer")?;

        let commands_path = config.commands_path();
        recognizer
            .add_keyword_search(COMMANDS_SEARCH, &commands_path)
            .context(format!("Loading keywords from {}", commands_path.display()))?;
        let commands = CommandList::from_file(&commands_path)?;
        Ok::<_, anyhow::Error>(Initialised {
            recognizer,
            commands,
        })
    })
    .await
    .context("Initialisation task panicked")?
}

/// The listening screen.
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs until interrupted. Fails when the recognizer cannot be set up.
    pub async fn run(self) -> Result<()> {
        let mut controller = Controller::new(TerminalView::new(self.config.display.notify));
        let (events_tx, mut events) = unbounded_channel();

        let setup = tokio::spawn(initialise(self.config.clone(), events_tx));
        let outcome = tokio::select! {
            joined = setup => joined.context("Initialisation task panicked").and_then(|r| r),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted during initialisation");
                return Ok(());
            }
        };
        controller.on_initialised(outcome);
        if controller.phase() == Phase::Failed {
            bail!("Failed to initialise the recognizer");
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => controller.handle_event(event),
                    None => {
                        warn!("Recognizer stopped sending events");
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        // Joining the worker may wait for a transcription to finish.
        tokio::task::block_in_place(|| controller.shutdown());
        info!("Done exiting");
        Ok(())
    }
}
