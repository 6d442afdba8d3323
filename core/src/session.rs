//! One mounted video block: adapter, detector, challenge controller and
//! completion store wired together.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{AnswerChecker, ProgressFetcher};
use crate::challenge::{ActiveChallenge, ChallengeController, SubmitOutcome};
use crate::config::SyncConfig;
use crate::create_adapter;
use crate::detector::CheckpointDetector;
use crate::error::{ChallengeError, SessionError};
use crate::media::{Capabilities, EmbedEnvironment, PlaybackAdapter, Subscription, TickSink};
use crate::model::{BlockKey, PausePoint, VideoBlock};
use crate::source::{Provider, VideoSource};
use crate::store::{CompletionRecord, CompletionStore};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Playback reached a pause point and was paused; answer to continue.
    ChallengeOpened(ActiveChallenge),
}

/// What the block renderer shows next to the player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub video_block_id: String,
    pub provider: Provider,
    pub pause_points: usize,
    pub completed: usize,
    /// The learner must press "start" when playback begins.
    pub needs_manual_start: bool,
}

pub struct VideoSession {
    block: VideoBlock,
    source: VideoSource,
    adapter: Arc<dyn PlaybackAdapter>,
    store: Arc<CompletionStore>,
    detector: Arc<CheckpointDetector>,
    controller: Arc<ChallengeController>,
    progress: Arc<dyn ProgressFetcher>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    subscription: Mutex<Option<Subscription>>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl VideoSession {
    /// Classify the block, build its adapter, seed completion state and
    /// start listening for ticks.
    ///
    /// A failed progress fetch is not fatal: the session starts with
    /// nothing completed.
    pub async fn mount(
        block: VideoBlock,
        env: &EmbedEnvironment,
        config: &SyncConfig,
        checker: Arc<dyn AnswerChecker>,
        progress: Arc<dyn ProgressFetcher>,
    ) -> Result<Self, SessionError> {
        config
            .validate()
            .map_err(|e| SessionError::Config(e.to_string()))?;
        let source = block.classify()?;
        let adapter = create_adapter(&source, env, config)?;

        let store = match progress.fetch_progress().await {
            Ok(snapshot) => CompletionStore::seeded(&snapshot),
            Err(e) => {
                warn!("Progress fetch failed, starting with a clean slate: {}", e);
                CompletionStore::new()
            }
        };
        let store = Arc::new(store);
        let detector = Arc::new(CheckpointDetector::new(
            &block,
            store.clone(),
            config.tolerance_seconds,
        ));
        let controller = Arc::new(ChallengeController::new(
            checker,
            store.clone(),
            config.resume_offset_seconds,
        ));

        let (event_tx, events) = mpsc::unbounded_channel();
        let mut subscription = None;
        let mut driver = None;

        if detector.points().is_empty() {
            debug!("Block {} has no pause points, not tracking time", block.id);
        } else {
            let (tick_tx, mut ticks) = mpsc::unbounded_channel::<f64>();
            let sink: TickSink = Arc::new(move |t: f64| {
                let _ = tick_tx.send(t);
            });
            subscription = Some(adapter.subscribe(sink));

            let adapter = adapter.clone();
            let detector = detector.clone();
            let controller = controller.clone();
            driver = Some(tokio::spawn(async move {
                while let Some(t) = ticks.recv().await {
                    let Some(reached) = detector.on_tick(t, adapter.as_ref()) else {
                        continue;
                    };
                    if !controller.open(&reached) {
                        continue;
                    }
                    if let Some(challenge) = controller.active() {
                        if event_tx.send(SessionEvent::ChallengeOpened(challenge)).is_err() {
                            return;
                        }
                    }
                }
            }));
        }

        info!(
            "Mounted {} block {} with {} pause point(s)",
            source.provider,
            block.id,
            detector.points().len()
        );

        Ok(Self {
            block,
            source,
            adapter,
            store,
            detector,
            controller,
            progress,
            events,
            subscription: Mutex::new(subscription),
            driver: Mutex::new(driver),
        })
    }

    /// Wait for the next event. `None` once the session stopped listening.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn capabilities(&self) -> Capabilities {
        self.adapter.capabilities()
    }

    pub fn adapter(&self) -> &Arc<dyn PlaybackAdapter> {
        &self.adapter
    }

    pub fn pause_points(&self) -> &[PausePoint] {
        self.detector.points()
    }

    pub fn summary(&self) -> SessionSummary {
        let completed = self
            .pause_points()
            .iter()
            .filter(|p| self.store.is_completed(&self.block.key_for(&p.id)))
            .count();
        SessionSummary {
            video_block_id: self.block.id.clone(),
            provider: self.source.provider,
            pause_points: self.pause_points().len(),
            completed,
            needs_manual_start: self.capabilities().needs_manual_start
                && !self.pause_points().is_empty(),
        }
    }

    pub fn completion(&self, pause_point_id: &str) -> CompletionRecord {
        self.store.get(&self.block.key_for(pause_point_id))
    }

    pub fn is_completed(&self, pause_point_id: &str) -> bool {
        self.store.is_completed(&self.block.key_for(pause_point_id))
    }

    /// Correct choices to highlight for an already solved pause point.
    pub fn highlighted_choices(&self, pause_point_id: &str) -> Option<Vec<String>> {
        self.store
            .highlighted_choices(&self.block.key_for(pause_point_id))
    }

    /// The manual "start" button for providers without a time source.
    pub fn start_manual_clock(&self) -> bool {
        self.adapter.start_manual_clock()
    }

    pub fn active_challenge(&self) -> Option<ActiveChallenge> {
        self.controller.active()
    }

    pub fn suspended_on(&self) -> Option<BlockKey> {
        self.detector.suspended_on()
    }

    pub fn select_choice(&self, choice_id: &str) -> Result<(), ChallengeError> {
        self.controller.select_choice(choice_id)
    }

    pub fn toggle_choice(&self, choice_id: &str) -> Result<(), ChallengeError> {
        self.controller.toggle_choice(choice_id)
    }

    /// Submit the active challenge. After a pass the completion store is
    /// reconciled with a fresh progress fetch.
    pub async fn submit(&self) -> Result<SubmitOutcome, ChallengeError> {
        let outcome = self
            .controller
            .submit(&self.detector, self.adapter.as_ref())
            .await?;

        if matches!(outcome, SubmitOutcome::Passed { .. }) {
            match self.progress.fetch_progress().await {
                Ok(snapshot) => self.store.reconcile(&snapshot),
                Err(e) => debug!("Progress refresh after pass failed: {}", e),
            }
        }
        Ok(outcome)
    }

    /// Stop every tick source and remove whatever the adapter mounted.
    pub fn unmount(self) {
        drop(self);
    }

    fn shutdown(&self) {
        drop(self.subscription.lock().take());
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
        self.controller.dismiss(&self.detector);
        self.adapter.teardown();
        info!("Unmounted block {}", self.block.id);
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
