use std::sync::Arc;
use std::time::Duration;

use log::info;
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};

use super::host::{EmbedFrame, FrameMounter, FrameSpec};
use super::{Capabilities, PlaybackAdapter, Subscription, TickSink};
use crate::config::SyncConfig;
use crate::source::{Provider, VideoSource};

/// Adapter for VK Video embeds.
///
/// VK offers no player API at all. Elapsed time is wall-clock time since the
/// learner pressed "start", and the clock is never paused or rewound: while a
/// challenge is open the video keeps playing and the clock keeps counting.
pub struct VkAdapter {
    frame: Arc<dyn EmbedFrame>,
    started_at: Arc<Mutex<Option<Instant>>>,
    poll: Duration,
}

impl VkAdapter {
    pub fn new(source: &VideoSource, frames: &Arc<dyn FrameMounter>, config: &SyncConfig) -> Self {
        let frame = frames.mount(&FrameSpec {
            url: source.playable_url.clone(),
            title: "VK video",
            allow: "encrypted-media; fullscreen",
        });
        Self {
            frame,
            started_at: Arc::new(Mutex::new(None)),
            poll: config.vk_poll(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_at.lock().is_some()
    }
}

impl PlaybackAdapter for VkAdapter {
    fn provider(&self) -> Provider {
        Provider::Vk
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    fn play(&self) {}

    fn pause(&self) {}

    fn subscribe(&self, on_tick: TickSink) -> Subscription {
        let started_at = self.started_at.clone();
        let period = self.poll;
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let start = *started_at.lock();
                if let Some(start) = start {
                    on_tick(start.elapsed().as_secs_f64());
                }
            }
        });
        Subscription::new().with_task(task)
    }

    fn start_manual_clock(&self) -> bool {
        let mut started_at = self.started_at.lock();
        if started_at.is_some() {
            return false;
        }
        info!("VK clock started for {}", self.frame.url());
        *started_at = Some(Instant::now());
        true
    }

    fn teardown(&self) {
        self.frame.remove();
    }
}
