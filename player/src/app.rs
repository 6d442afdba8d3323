use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use cuepoint_core::{
    ActiveChallenge, AnswerChecker, AnswerKey, EmbedEnvironment, HttpLectureApi, NoProgress,
    ProgressFetcher, Provider, SessionEvent, SyncConfig, VideoBlock, VideoSession,
};
use log::{info, warn};

use crate::host::{SimulatedElement, TerminalFrames};

// App state
pub struct App {
    /// The mounted video block
    pub session: VideoSession,
    /// Simulated media element, for direct file and HLS blocks
    pub element: Option<Arc<SimulatedElement>>,
    /// Whether the app should exit
    pub should_quit: bool,
}

/// Read a video block exported from the platform as JSON.
pub fn read_block(path: &Path) -> Result<VideoBlock> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a video block", path.display()))
}

/// Answer checking against the platform when configured, offline otherwise.
pub fn collaborators(
    block: &VideoBlock,
    config: &SyncConfig,
) -> Result<(Arc<dyn AnswerChecker>, Arc<dyn ProgressFetcher>)> {
    if config.api.base_url.is_some() {
        let api = Arc::new(HttpLectureApi::from_config(&config.api).context("Bad API settings")?);
        info!("Checking answers against {:?}", config.api.base_url);
        let checker: Arc<dyn AnswerChecker> = api.clone();
        let progress: Arc<dyn ProgressFetcher> = api;
        return Ok((checker, progress));
    }
    if block
        .pause_points
        .iter()
        .flat_map(|p| &p.question.choices)
        .all(|c| c.is_correct.is_none())
    {
        warn!("Block carries no answer key and no API is configured; every answer will fail");
    }
    let checker: Arc<dyn AnswerChecker> = Arc::new(AnswerKey::from_block(block));
    let progress: Arc<dyn ProgressFetcher> = Arc::new(NoProgress);
    Ok((checker, progress))
}

impl App {
    pub async fn mount(block: VideoBlock, config: &SyncConfig, rate: f64) -> Result<Self> {
        let source = block.classify().context("Cannot play this block")?;
        if matches!(
            source.provider,
            Provider::YouTube | Provider::Vimeo | Provider::Rutube
        ) {
            bail!(
                "{} embeds need a browser host; open {} instead",
                source.provider,
                source.playable_url
            );
        }

        let (checker, progress) = collaborators(&block, config)?;
        let mut env = EmbedEnvironment::new().with_frames(Arc::new(TerminalFrames));
        let mut element = None;
        if source.provider.is_native() {
            let simulated = Arc::new(SimulatedElement::new(rate));
            env = env.with_media_element(simulated.clone());
            element = Some(simulated);
        }

        let session = VideoSession::mount(block, &env, config, checker, progress)
            .await
            .context("Failed to mount video block")?;
        if let Some(element) = &element {
            element.spawn_clock();
        }

        Ok(Self {
            session,
            element,
            should_quit: false,
        })
    }

    pub fn set_status(&self, message: impl AsRef<str>) {
        println!("[{}] {}", Local::now().format("%H:%M:%S"), message.as_ref());
    }

    /// Intro lines: what is being played and how to drive it.
    pub fn greet(&self) {
        let summary = self.session.summary();
        self.set_status(format!(
            "{} video, {} pause point(s), {} already solved",
            summary.provider, summary.pause_points, summary.completed
        ));
        if let Some(url) = self.element.as_ref().and_then(|e| e.source()) {
            println!("  source: {}", url);
        }
        for point in self.session.pause_points() {
            let mark = if self.session.is_completed(&point.id) {
                "done"
            } else {
                "todo"
            };
            println!(
                "  {} {} {}",
                format_clock(point.timestamp_seconds),
                mark,
                point.question.title
            );
        }
        if summary.needs_manual_start {
            self.set_status("No playback API: type `start` when the video starts playing");
        } else {
            self.set_status("Type `play` to start, `help` for commands");
        }
    }

    pub fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::ChallengeOpened(challenge) => {
                self.set_status(format!(
                    "Paused at {}",
                    format_clock(challenge.point.timestamp_seconds)
                ));
                self.print_challenge(&challenge);
            }
        }
    }

    pub fn print_challenge(&self, challenge: &ActiveChallenge) {
        let question = &challenge.point.question;
        println!("  {}", question.title);
        if let Some(prompt) = question.prompt() {
            println!("  {}", prompt);
        }
        for (index, choice) in question.choices.iter().enumerate() {
            let mark = if challenge.is_selected(&choice.id) {
                "[x]"
            } else {
                "[ ]"
            };
            println!("  {} {}. {} ({})", mark, index + 1, choice.text, choice.id);
        }
        let hint = if question.multiple {
            "`pick <n>` toggles a choice"
        } else {
            "`pick <n>` selects a choice"
        };
        println!("  {}, then `submit`", hint);
        if let Some(result) = &challenge.last_result {
            println!("  last answer: {}", result.message);
        }
    }

    /// Current position, if the provider exposes one.
    pub fn position(&self) -> Option<f64> {
        self.session.adapter().elapsed_seconds()
    }
}

pub fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
