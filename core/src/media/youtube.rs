use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use super::host::{ScriptHost, YouTubeApi, YouTubePlayer, YouTubeState};
use super::sdk::{Sdk, SdkRegistry};
use super::{Capabilities, PlaybackAdapter, Subscription, TickSink};
use crate::config::SyncConfig;
use crate::error::AdapterError;
use crate::source::{Provider, VideoSource};

type PlayerSlot = Arc<Mutex<Option<Arc<dyn YouTubePlayer>>>>;

/// Adapter for YouTube embeds driven through the iframe API.
///
/// The player is only built once `subscribe` runs: the SDK is loaded, the
/// player constructed, and time is sampled every poll period while the
/// player reports `Playing`.
pub struct YouTubeAdapter {
    video_id: String,
    api: Arc<dyn YouTubeApi>,
    scripts: Arc<dyn ScriptHost>,
    registry: Arc<SdkRegistry>,
    player: PlayerSlot,
    poll: Duration,
    ready_timeout: Duration,
}

impl YouTubeAdapter {
    pub fn new(
        source: &VideoSource,
        api: Arc<dyn YouTubeApi>,
        scripts: Arc<dyn ScriptHost>,
        registry: Arc<SdkRegistry>,
        config: &SyncConfig,
    ) -> Result<Self, AdapterError> {
        let video_id = source.provider_id.clone().ok_or_else(|| AdapterError::Provider {
            provider: Provider::YouTube,
            reason: format!("no video id in {}", source.raw_url),
        })?;

        Ok(Self {
            video_id,
            api,
            scripts,
            registry,
            player: Arc::new(Mutex::new(None)),
            poll: config.youtube_poll(),
            ready_timeout: config.sdk_ready_timeout(),
        })
    }

    fn current_player(&self) -> Option<Arc<dyn YouTubePlayer>> {
        self.player.lock().clone()
    }
}

impl PlaybackAdapter for YouTubeAdapter {
    fn provider(&self) -> Provider {
        Provider::YouTube
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn elapsed_seconds(&self) -> Option<f64> {
        self.current_player().map(|p| p.current_time())
    }

    fn seek_to(&self, seconds: f64) -> Result<(), AdapterError> {
        let player = self.current_player().ok_or_else(|| AdapterError::Provider {
            provider: Provider::YouTube,
            reason: "player is not ready".to_string(),
        })?;
        player.seek_to(seconds, true);
        Ok(())
    }

    fn play(&self) {
        match self.current_player() {
            Some(player) => player.play_video(),
            None => debug!("play ignored, YouTube player not built yet"),
        }
    }

    fn pause(&self) {
        match self.current_player() {
            Some(player) => player.pause_video(),
            None => debug!("pause ignored, YouTube player not built yet"),
        }
    }

    fn subscribe(&self, on_tick: TickSink) -> Subscription {
        let video_id = self.video_id.clone();
        let api = self.api.clone();
        let scripts = self.scripts.clone();
        let registry = self.registry.clone();
        let slot = self.player.clone();
        let poll = self.poll;
        let ready_timeout = self.ready_timeout;

        let task = tokio::spawn(async move {
            if let Err(e) = registry
                .ensure_loaded(&scripts, Sdk::YouTube, ready_timeout)
                .await
            {
                warn!("YouTube pause points disabled for {}: {}", video_id, e);
                return;
            }

            let (ready_tx, ready_rx) = oneshot::channel();
            let player = match api.create_player(
                &video_id,
                Box::new(move || {
                    let _ = ready_tx.send(());
                }),
            ) {
                Ok(player) => player,
                Err(reason) => {
                    warn!("Could not create YouTube player for {}: {}", video_id, reason);
                    return;
                }
            };
            *slot.lock() = Some(player.clone());

            match tokio::time::timeout(ready_timeout, ready_rx).await {
                Ok(Ok(())) => info!("YouTube player ready for {}", video_id),
                _ => {
                    warn!(
                        "YouTube player for {} never became ready, no pause points will fire",
                        video_id
                    );
                    return;
                }
            }

            let mut interval = tokio::time::interval(poll);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if player.state() == YouTubeState::Playing {
                    on_tick(player.current_time());
                }
            }
        });

        let slot = self.player.clone();
        Subscription::new().with_task(task).with_cleanup(move || {
            if let Some(player) = slot.lock().take() {
                player.destroy();
            }
        })
    }

    fn teardown(&self) {
        if let Some(player) = self.player.lock().take() {
            player.destroy();
        }
    }
}
