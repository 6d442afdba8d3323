pub mod host;
mod native;
mod rutube;
pub mod sdk;
mod vimeo;
mod vk;
mod youtube;

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::AdapterError;
use crate::source::Provider;

pub use host::{EmbedEnvironment, ListenerGuard};
pub use native::NativeAdapter;
pub use rutube::{RutubeAdapter, RutubeCommand, is_rutube_origin};
pub use vimeo::VimeoAdapter;
pub use vk::VkAdapter;
pub use youtube::YouTubeAdapter;

/// Receives one elapsed-time sample (seconds) per tick.
pub type TickSink = Arc<dyn Fn(f64) + Send + Sync>;

/// What a provider lets us do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_query_time: bool,
    pub can_seek: bool,
    /// `play()`/`pause()` actually reach the player.
    pub can_control: bool,
    /// Time only starts flowing after the learner presses "start".
    pub needs_manual_start: bool,
}

impl Capabilities {
    pub const FULL: Capabilities = Capabilities {
        can_query_time: true,
        can_seek: true,
        can_control: true,
        needs_manual_start: false,
    };

    pub const NONE: Capabilities = Capabilities {
        can_query_time: false,
        can_seek: false,
        can_control: false,
        needs_manual_start: true,
    };
}

/// Common for all provider adapters
pub trait PlaybackAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn capabilities(&self) -> Capabilities;

    /// Current playback position, when the provider exposes one.
    fn elapsed_seconds(&self) -> Option<f64> {
        None
    }

    fn seek_to(&self, _seconds: f64) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported {
            provider: self.provider(),
            capability: "seek",
        })
    }

    /// Best effort; a no-op where the provider offers no control channel.
    fn play(&self);

    /// Best effort; a no-op where the provider offers no control channel.
    fn pause(&self);

    /// Start producing ticks. Dropping the returned subscription stops them.
    fn subscribe(&self, on_tick: TickSink) -> Subscription;

    /// Manual start trigger for providers with no time source. Returns
    /// false when unsupported or already started.
    fn start_manual_clock(&self) -> bool {
        false
    }

    /// Remove mounted frames and destroy provider players.
    fn teardown(&self) {}
}

/// Everything a `subscribe` call set up: background tasks, registered
/// listeners and provider-specific cleanup. Cancelled on drop.
#[derive(Default)]
pub struct Subscription {
    tasks: Vec<JoinHandle<()>>,
    listeners: Vec<ListenerGuard>,
    cleanups: Vec<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_listener(mut self, guard: ListenerGuard) -> Self {
        self.listeners.push(guard);
        self
    }

    pub fn with_cleanup(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self.cleanups.push(Box::new(cleanup));
        self
    }

    pub fn cancel(self) {
        drop(self);
    }

    fn release(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.listeners.clear();
        for cleanup in self.cleanups.drain(..) {
            cleanup();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("tasks", &self.tasks.len())
            .field("listeners", &self.listeners.len())
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}
