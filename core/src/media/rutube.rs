use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::MissedTickBehavior;

use super::host::{EmbedFrame, FrameMounter, FrameSpec, MessageData, MessageHub, WindowMessage};
use super::{Capabilities, PlaybackAdapter, Subscription, TickSink};
use crate::config::SyncConfig;
use crate::error::AdapterError;
use crate::source::{Provider, VideoSource};

static RUTUBE_ORIGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https://(?:[\w-]+\.)*rutube\.ru$").unwrap());

/// Only messages from a Rutube origin are trusted.
pub fn is_rutube_origin(origin: &str) -> bool {
    RUTUBE_ORIGIN.is_match(origin)
}

/// Commands posted to the embedded player, serialized as `{"type", "data"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RutubeCommand {
    #[serde(rename = "player:setCurrentTime")]
    SetCurrentTime { time: f64 },
    #[serde(rename = "player:play")]
    Play {},
    #[serde(rename = "player:pause")]
    Pause {},
}

impl RutubeCommand {
    pub fn to_payload(&self) -> String {
        // Every variant is a plain struct; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Any message from the player; unknown types are ignored.
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn parse(data: &MessageData) -> Envelope {
        let parsed = match data {
            MessageData::Text(raw) => serde_json::from_str(raw),
            MessageData::Json(value) => Envelope::deserialize(value),
        };
        parsed.unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    last_time: Mutex<Option<f64>>,
    playing: AtomicBool,
    heard_from_player: AtomicBool,
}

impl PlayerState {
    fn handle(&self, message: &WindowMessage) {
        if !is_rutube_origin(&message.origin) {
            return;
        }
        let envelope = Envelope::parse(&message.data);
        match envelope.kind.as_str() {
            "player:currentTime" => {
                if let Some(t) = envelope.data.get("time").and_then(Value::as_f64) {
                    *self.last_time.lock() = Some(t);
                    self.playing.store(true, Ordering::SeqCst);
                }
            }
            "player:changeState" => {
                let state = envelope.data.get("state").and_then(Value::as_str);
                self.playing.store(state == Some("playing"), Ordering::SeqCst);
            }
            "player:ready" => self.playing.store(false, Ordering::SeqCst),
            _ => return,
        }
        self.heard_from_player.store(true, Ordering::SeqCst);
    }
}

/// Adapter for Rutube embeds, driven entirely over window messaging.
pub struct RutubeAdapter {
    frame: Arc<dyn EmbedFrame>,
    hub: Arc<dyn MessageHub>,
    state: Arc<PlayerState>,
    poll: Duration,
    silence_timeout: Duration,
}

impl RutubeAdapter {
    pub fn new(
        source: &VideoSource,
        frames: &Arc<dyn FrameMounter>,
        hub: Arc<dyn MessageHub>,
        config: &SyncConfig,
    ) -> Self {
        let frame = frames.mount(&FrameSpec {
            url: source.playable_url.clone(),
            title: "Rutube video",
            allow: "autoplay; fullscreen",
        });
        Self {
            frame,
            hub,
            state: Arc::new(PlayerState::default()),
            poll: config.rutube_poll(),
            silence_timeout: config.rutube_silence_timeout(),
        }
    }

    fn post(&self, command: RutubeCommand) {
        debug!("Rutube <- {:?}", command);
        self.frame.post_message(&command.to_payload());
    }
}

impl PlaybackAdapter for RutubeAdapter {
    fn provider(&self) -> Provider {
        Provider::Rutube
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn elapsed_seconds(&self) -> Option<f64> {
        *self.state.last_time.lock()
    }

    fn seek_to(&self, seconds: f64) -> Result<(), AdapterError> {
        self.post(RutubeCommand::SetCurrentTime { time: seconds });
        Ok(())
    }

    fn play(&self) {
        self.post(RutubeCommand::Play {});
    }

    fn pause(&self) {
        self.post(RutubeCommand::Pause {});
    }

    fn subscribe(&self, on_tick: TickSink) -> Subscription {
        let listener = {
            let state = self.state.clone();
            self.hub.on_message(Box::new(move |message: &WindowMessage| state.handle(message)))
        };

        let poller = {
            let state = self.state.clone();
            let period = self.poll;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    if !state.playing.load(Ordering::SeqCst) {
                        continue;
                    }
                    if let Some(t) = *state.last_time.lock() {
                        on_tick(t);
                    }
                }
            })
        };

        let watchdog = {
            let state = self.state.clone();
            let timeout = self.silence_timeout;
            let url = self.frame.url().to_string();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if !state.heard_from_player.load(Ordering::SeqCst) {
                    warn!(
                        "No messages from Rutube player {} after {:?}, pause points cannot fire",
                        url, timeout
                    );
                }
            })
        };

        Subscription::new()
            .with_listener(listener)
            .with_task(poller)
            .with_task(watchdog)
    }

    fn teardown(&self) {
        self.frame.remove();
    }
}
