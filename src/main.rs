use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use hark::app::App;
use hark::audio::input_device_names;
use hark::config::Config;
use hark::logging::init_logging;

/// Listens to the microphone and highlights the spoken commands.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file, defaults to <config dir>/hark/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command list to listen for, one phrase per line
    #[arg(long)]
    commands: Option<PathBuf>,

    /// Print the available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    if args.list_devices {
        for name in input_device_names()? {
            println!("{name}");
        }
        return Ok(());
    }

    if args.write_default_config {
        let path = args.config.unwrap_or_else(Config::default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Config::default().save_to_file(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let mut config = if let Some(path) = &args.config {
        Config::from_file(path).context(format!("Reading config {}", path.display()))?
    } else {
        Config::load_or_write_default(None)?
    };
    if let Some(commands) = args.commands {
        config.paths.commands_file = Some(commands);
    }

    App::new(config).run().await
}
