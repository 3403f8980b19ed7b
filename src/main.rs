//! Pitch Perfect CLI
//!
//! Command-line front end for the effect graph controller.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{debug, error};

use pitch_perfect::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    debug!("Pitch Perfect v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref()).context("loading configuration")?;

    let result = match cli.command {
        Some(Commands::Play {
            clip,
            preset,
            out,
            encoding,
            realtime,
        }) => commands::play(&clip, preset, out.as_deref(), encoding.into(), realtime, config)
            .with_context(|| format!("playing {} with preset '{}'", clip.display(), preset)),
        Some(Commands::Presets) => commands::list_presets().map_err(Into::into),
        Some(Commands::Tone {
            out,
            frequency,
            duration,
            sample_rate,
        }) => commands::tone(&out, frequency, duration, sample_rate)
            .with_context(|| format!("writing tone to {}", out.display())),
        Some(Commands::Info { clip }) => {
            commands::info(&clip).with_context(|| format!("inspecting {}", clip.display()))
        }
        None => {
            println!("Pitch Perfect v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = &result {
        if let Some(err) = e.downcast_ref::<pitch_perfect::PitchPerfectError>() {
            error!("[{}] {}", err.error_code(), err);
            for suggestion in err.recovery_suggestions() {
                eprintln!("  hint: {}", suggestion);
            }
        }
    }

    result
}
