use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yt_summarizer::{Config, CooldownController, LiveConnector, Pipeline, RunOutcome, SlackNotifier};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<u8> {
    let matches = Command::new("YouTube Playlist Summarizer")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Summarize new playlist videos into Notion and Slack")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
        )
        .arg(
            Arg::new("state-path")
                .long("state-path")
                .value_name("FILE")
                .help("Override the cooldown state file location")
        )
        .arg(
            Arg::new("status")
                .long("status")
                .help("Print the cooldown state and exit")
                .action(clap::ArgAction::SetTrue)
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let default_filter = if verbose { "yt_summarizer=debug,info" } else { "yt_summarizer=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if verbose {
        info!("Verbose logging enabled");
    }

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = Config::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Failed to load config, using environment only: {}", e);
        Config::from_env()
    });
    if let Some(state_path) = matches.get_one::<String>("state-path") {
        config.cooldown.state_path = PathBuf::from(state_path);
    }

    let cooldown = CooldownController::new(config.cooldown.state_path.clone());

    if matches.get_flag("status") {
        let state = cooldown.load().unwrap_or_default();
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(0);
    }

    info!("{}", config.summary());

    let notifier = SlackNotifier::new(&config.slack)?;
    let outcome = Pipeline::new(&cooldown, &notifier)
        .run(&config, &LiveConnector)
        .await;

    match &outcome {
        RunOutcome::Skipped { state } => {
            if let Some(retry) = state.next_retry_after {
                info!("⏸️ Next attempt allowed after {}", retry.to_rfc3339());
            }
        }
        RunOutcome::NothingToDo { .. } => info!("✅ Nothing to do"),
        RunOutcome::Completed { processed, errors, .. } => {
            info!("✅ Processed {} video(s), {} error(s)", processed, errors)
        }
        RunOutcome::Failed { error, state } => error!(
            "❌ Run failed (attempt #{}): {}",
            state.consecutive_failures, error
        ),
    }

    Ok(outcome.exit_code())
}
