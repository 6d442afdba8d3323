use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use cuepoint_core::{VideoFormat, classify_with_format};
use log::{debug, error};
use tokio::io::{AsyncBufReadExt, BufReader};

mod app;
mod commands;
mod host;
mod settings;

use app::App;
use commands::CommandHandler;

#[derive(Parser)]
#[command(name = "cuepoint", version, about = "Lecture videos that stop for questions")]
struct Cli {
    /// Config file (TOML); defaults to $CUEPOINT_CONFIG or the platform config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show which provider a video URL belongs to
    Classify {
        url: String,
        /// Format hint for direct links: mp4 or m3u8
        #[arg(long)]
        format: Option<String>,
    },
    /// Watch a video block (JSON) and answer its pause-point questions
    Watch {
        block: PathBuf,
        /// Platform base URL for answer checking and progress
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        lecture_id: Option<String>,
        /// Playback speed of the simulated player
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
}

fn parse_format(raw: &str) -> Result<VideoFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "mp4" => Ok(VideoFormat::Mp4),
        "m3u8" | "hls" => Ok(VideoFormat::M3u8),
        other => Err(anyhow!("Unknown video format: {}", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logger
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Classify { url, format } => {
            let format = format.as_deref().map(parse_format).transpose()?;
            let source = classify_with_format(&url, format)?;
            println!("{}", serde_json::to_string_pretty(&source)?);
        }
        Command::Watch {
            block,
            api_url,
            lecture_id,
            speed,
        } => {
            let mut config = settings::load_config(cli.config)?;
            if api_url.is_some() {
                config.api.base_url = api_url;
            }
            if lecture_id.is_some() {
                config.api.lecture_id = lecture_id;
            }
            if !(speed.is_finite() && speed > 0.0) {
                return Err(anyhow!("Speed must be positive, got {}", speed));
            }
            let block = app::read_block(&block)?;
            watch(App::mount(block, &config, speed).await?).await?;
        }
    }
    Ok(())
}

async fn watch(mut app: App) -> Result<()> {
    app.greet();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut heartbeat = tokio::time::interval(Duration::from_secs(10));

    while !app.should_quit {
        tokio::select! {
            event = app.session.next_event() => match event {
                Some(event) => app.handle_event(event),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!("stdin closed");
                    break;
                };
                if let Err(e) = CommandHandler::execute(&mut app, &line).await {
                    error!("{}", e);
                    app.set_status(format!("Error: {}", e));
                }
            }
            _ = heartbeat.tick() => {
                if app.element.as_ref().is_some_and(|e| e.is_playing()) {
                    if let Some(position) = app.position() {
                        app.set_status(format!("at {}", app::format_clock(position)));
                    }
                }
            }
        }
    }

    let summary = app.session.summary();
    app.set_status(format!(
        "Solved {} of {} pause point(s)",
        summary.completed, summary.pause_points
    ));
    app.session.unmount();
    Ok(())
}
