//! Surfaces the embedding host provides to the adapters.
//!
//! A browser build implements these over the DOM (media element, iframes,
//! `window.postMessage`, the provider SDK globals); tests and the terminal
//! player implement them with simulated players.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::sdk::{Sdk, SdkRegistry};

/// Unregisters a listener when dropped.
pub struct ListenerGuard(Option<Box<dyn FnOnce() + Send>>);

impl ListenerGuard {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(remove)))
    }

    /// Guard for a listener that needs no removal.
    pub fn noop() -> Self {
        Self(None)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(remove) = self.0.take() {
            remove();
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("armed", &self.0.is_some())
            .finish()
    }
}

/// A real media element (`<video>`).
pub trait MediaElement: Send + Sync {
    fn current_time(&self) -> f64;
    fn set_current_time(&self, seconds: f64);
    fn play(&self);
    fn pause(&self);
    fn set_source(&self, url: &str);
    fn can_play_type(&self, mime: &str) -> bool;
    /// Register for "time progressed" notifications.
    fn on_time_update(&self, callback: Box<dyn Fn() + Send + Sync>) -> ListenerGuard;
}

/// Adaptive-streaming helper that feeds a media element (hls.js in a browser).
pub trait AdaptiveStreamHelper: Send + Sync {
    fn is_supported(&self) -> bool;
    fn attach(&self, url: &str, element: Arc<dyn MediaElement>) -> Box<dyn AdaptiveStream>;
}

pub trait AdaptiveStream: Send + Sync {
    fn destroy(&self);
}

/// Injects provider SDK scripts. Scripts are process-wide and never removed.
pub trait ScriptHost: Send + Sync {
    /// Whether the SDK global is already available.
    fn sdk_present(&self, sdk: Sdk) -> bool;

    /// Inject the script tag; resolves once the SDK reports ready.
    fn inject_script(&self, sdk: Sdk, src: &str) -> BoxFuture<'static, Result<(), String>>;
}

/// YouTube player states as reported by the iframe API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

/// The `YT` global.
pub trait YouTubeApi: Send + Sync {
    /// Construct an embedded player; `on_ready` fires once it can be driven.
    fn create_player(
        &self,
        video_id: &str,
        on_ready: Box<dyn FnOnce() + Send>,
    ) -> Result<Arc<dyn YouTubePlayer>, String>;
}

pub trait YouTubePlayer: Send + Sync {
    fn current_time(&self) -> f64;
    fn state(&self) -> YouTubeState;
    fn play_video(&self);
    fn pause_video(&self);
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool);
    fn destroy(&self);
}

/// The `Vimeo` global.
pub trait VimeoApi: Send + Sync {
    fn create_player(&self, frame: &Arc<dyn EmbedFrame>) -> Result<Arc<dyn VimeoPlayer>, String>;
}

/// Vimeo player; every query is promise-based.
#[async_trait]
pub trait VimeoPlayer: Send + Sync {
    async fn current_time(&self) -> Result<f64, String>;
    async fn play(&self) -> Result<(), String>;
    async fn pause(&self) -> Result<(), String>;
    async fn set_current_time(&self, seconds: f64) -> Result<(), String>;
    fn on_play(&self, callback: Box<dyn Fn() + Send + Sync>) -> ListenerGuard;
    fn destroy(&self);
}

/// What to put into an iframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    pub url: String,
    pub title: &'static str,
    pub allow: &'static str,
}

pub trait FrameMounter: Send + Sync {
    /// Replace the block's embed container content with an iframe.
    fn mount(&self, spec: &FrameSpec) -> Arc<dyn EmbedFrame>;
}

pub trait EmbedFrame: Send + Sync {
    fn url(&self) -> &str;
    /// `contentWindow.postMessage(payload, "*")`.
    fn post_message(&self, payload: &str);
    fn remove(&self);
}

/// Payload of a window "message" event.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageData {
    Text(String),
    Json(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    pub origin: String,
    pub data: MessageData,
}

/// Window-level "message" events.
pub trait MessageHub: Send + Sync {
    fn on_message(&self, callback: Box<dyn Fn(&WindowMessage) + Send + Sync>) -> ListenerGuard;
}

/// Everything a host can offer. Absent surfaces make the adapters that need
/// them fail to build; the rest keep working.
#[derive(Clone)]
pub struct EmbedEnvironment {
    pub media_element: Option<Arc<dyn MediaElement>>,
    pub adaptive_helper: Option<Arc<dyn AdaptiveStreamHelper>>,
    pub scripts: Option<Arc<dyn ScriptHost>>,
    pub youtube: Option<Arc<dyn YouTubeApi>>,
    pub vimeo: Option<Arc<dyn VimeoApi>>,
    pub frames: Option<Arc<dyn FrameMounter>>,
    pub messages: Option<Arc<dyn MessageHub>>,
    pub sdk_registry: Arc<SdkRegistry>,
}

impl Default for EmbedEnvironment {
    fn default() -> Self {
        Self {
            media_element: None,
            adaptive_helper: None,
            scripts: None,
            youtube: None,
            vimeo: None,
            frames: None,
            messages: None,
            sdk_registry: SdkRegistry::global(),
        }
    }
}

impl EmbedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_media_element(mut self, element: Arc<dyn MediaElement>) -> Self {
        self.media_element = Some(element);
        self
    }

    pub fn with_adaptive_helper(mut self, helper: Arc<dyn AdaptiveStreamHelper>) -> Self {
        self.adaptive_helper = Some(helper);
        self
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptHost>) -> Self {
        self.scripts = Some(scripts);
        self
    }

    pub fn with_youtube(mut self, api: Arc<dyn YouTubeApi>) -> Self {
        self.youtube = Some(api);
        self
    }

    pub fn with_vimeo(mut self, api: Arc<dyn VimeoApi>) -> Self {
        self.vimeo = Some(api);
        self
    }

    pub fn with_frames(mut self, frames: Arc<dyn FrameMounter>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn with_messages(mut self, hub: Arc<dyn MessageHub>) -> Self {
        self.messages = Some(hub);
        self
    }

    /// Use a private SDK cache instead of the process-wide one.
    pub fn with_sdk_registry(mut self, registry: Arc<SdkRegistry>) -> Self {
        self.sdk_registry = registry;
        self
    }
}

impl fmt::Debug for EmbedEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedEnvironment")
            .field("media_element", &self.media_element.is_some())
            .field("adaptive_helper", &self.adaptive_helper.is_some())
            .field("scripts", &self.scripts.is_some())
            .field("youtube", &self.youtube.is_some())
            .field("vimeo", &self.vimeo.is_some())
            .field("frames", &self.frames.is_some())
            .field("messages", &self.messages.is_some())
            .finish()
    }
}
