//! Terminal stand-ins for the browser surfaces the adapters drive.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use cuepoint_core::media::ListenerGuard;
use cuepoint_core::media::host::{EmbedFrame, FrameMounter, FrameSpec, MediaElement};
use log::{debug, info};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How often a playing element reports progress, like a browser does.
const TIME_UPDATE_PERIOD: Duration = Duration::from_millis(250);

type Listener = Arc<dyn Fn() + Send + Sync>;

struct Playhead {
    position: f64,
    playing: bool,
    since: Instant,
}

impl Playhead {
    fn now(&self, rate: f64) -> f64 {
        if self.playing {
            self.position + self.since.elapsed().as_secs_f64() * rate
        } else {
            self.position
        }
    }
}

/// A media element without pixels: a clock that advances while "playing".
pub struct SimulatedElement {
    rate: f64,
    playhead: Mutex<Playhead>,
    source: Mutex<Option<String>>,
    next_listener: AtomicU64,
    listeners: Arc<Mutex<HashMap<u64, Listener>>>,
}

impl SimulatedElement {
    /// `rate` is playback speed; 2.0 runs the lecture twice as fast.
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            playhead: Mutex::new(Playhead {
                position: 0.0,
                playing: false,
                since: Instant::now(),
            }),
            source: Mutex::new(None),
            next_listener: AtomicU64::new(0),
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playhead.lock().playing
    }

    pub fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    /// Fire "timeupdate" periodically while playing.
    pub fn spawn_clock(self: &Arc<Self>) -> JoinHandle<()> {
        let element = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TIME_UPDATE_PERIOD);
            loop {
                interval.tick().await;
                let Some(element) = element.upgrade() else {
                    return;
                };
                if element.is_playing() {
                    let listeners: Vec<Listener> =
                        element.listeners.lock().values().cloned().collect();
                    for listener in listeners {
                        listener();
                    }
                }
            }
        })
    }

    fn set_playing(&self, playing: bool) {
        let mut playhead = self.playhead.lock();
        playhead.position = playhead.now(self.rate);
        playhead.playing = playing;
        playhead.since = Instant::now();
    }
}

impl MediaElement for SimulatedElement {
    fn current_time(&self) -> f64 {
        self.playhead.lock().now(self.rate)
    }

    fn set_current_time(&self, seconds: f64) {
        let mut playhead = self.playhead.lock();
        playhead.position = seconds.max(0.0);
        playhead.since = Instant::now();
    }

    fn play(&self) {
        self.set_playing(true);
    }

    fn pause(&self) {
        self.set_playing(false);
    }

    fn set_source(&self, url: &str) {
        info!("Loading {}", url);
        *self.source.lock() = Some(url.to_string());
    }

    fn can_play_type(&self, _mime: &str) -> bool {
        // Nothing is decoded, so every playlist "plays".
        true
    }

    fn on_time_update(&self, callback: Box<dyn Fn() + Send + Sync>) -> ListenerGuard {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(id, Arc::from(callback));
        let listeners = Arc::downgrade(&self.listeners);
        ListenerGuard::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.lock().remove(&id);
            }
        })
    }
}

/// Prints embeds instead of mounting iframes; the learner opens the URL.
pub struct TerminalFrames;

impl FrameMounter for TerminalFrames {
    fn mount(&self, spec: &FrameSpec) -> Arc<dyn EmbedFrame> {
        println!("{}: open {} in a browser", spec.title, spec.url);
        Arc::new(TerminalFrame {
            url: spec.url.clone(),
        })
    }
}

struct TerminalFrame {
    url: String,
}

impl EmbedFrame for TerminalFrame {
    fn url(&self) -> &str {
        &self.url
    }

    fn post_message(&self, payload: &str) {
        debug!("-> {}: {}", self.url, payload);
    }

    fn remove(&self) {
        debug!("Removed embed {}", self.url);
    }
}
