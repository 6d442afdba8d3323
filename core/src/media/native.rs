use std::sync::{Arc, Weak};

use log::{debug, info, warn};
use parking_lot::Mutex;

use super::host::{AdaptiveStream, AdaptiveStreamHelper, MediaElement};
use super::{Capabilities, PlaybackAdapter, Subscription, TickSink};
use crate::error::AdapterError;
use crate::source::{Provider, VideoSource};

const HLS_MIME: &str = "application/vnd.apple.mpegurl";

/// Adapter for direct files and HLS playlists played by a media element.
///
/// The element is the single source of truth for elapsed time; for HLS an
/// adaptive-streaming helper may feed it, but never reports time itself.
pub struct NativeAdapter {
    provider: Provider,
    element: Arc<dyn MediaElement>,
    stream: Mutex<Option<Box<dyn AdaptiveStream>>>,
}

impl NativeAdapter {
    /// Attach a source to the element.
    pub fn new(
        source: &VideoSource,
        element: Arc<dyn MediaElement>,
        helper: Option<Arc<dyn AdaptiveStreamHelper>>,
    ) -> Self {
        let url = source.playable_url.as_str();
        let mut stream = None;

        if source.is_adaptive() {
            match helper.filter(|h| h.is_supported()) {
                Some(helper) => {
                    info!("Attaching adaptive stream helper for {}", url);
                    stream = Some(helper.attach(url, element.clone()));
                }
                None if element.can_play_type(HLS_MIME) => {
                    debug!("Element plays HLS natively: {}", url);
                    element.set_source(url);
                }
                None => {
                    warn!("No HLS support available, trying direct playback of {}", url);
                    element.set_source(url);
                }
            }
        } else {
            element.set_source(url);
        }

        Self {
            provider: source.provider,
            element,
            stream: Mutex::new(stream),
        }
    }
}

impl PlaybackAdapter for NativeAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn elapsed_seconds(&self) -> Option<f64> {
        Some(self.element.current_time())
    }

    fn seek_to(&self, seconds: f64) -> Result<(), AdapterError> {
        self.element.set_current_time(seconds);
        Ok(())
    }

    fn play(&self) {
        self.element.play();
    }

    fn pause(&self) {
        self.element.pause();
    }

    fn subscribe(&self, on_tick: TickSink) -> Subscription {
        // The listener lives inside the element, so it must not own it.
        let element: Weak<dyn MediaElement> = Arc::downgrade(&self.element);
        let guard = self.element.on_time_update(Box::new(move || {
            if let Some(element) = element.upgrade() {
                on_tick(element.current_time());
            }
        }));
        Subscription::new().with_listener(guard)
    }

    fn teardown(&self) {
        if let Some(stream) = self.stream.lock().take() {
            debug!("Destroying adaptive stream helper");
            stream.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::classify;
    use crate::testing::{FakeAdaptiveHelper, FakeMediaElement, tick_recorder};

    #[test]
    fn test_progressive_file_sets_source() {
        let element = Arc::new(FakeMediaElement::new());
        let source = classify("https://cdn.example.com/a.mp4").unwrap();
        let adapter = NativeAdapter::new(&source, element.clone(), None);
        assert_eq!(element.source().as_deref(), Some("https://cdn.example.com/a.mp4"));
        assert_eq!(adapter.capabilities(), Capabilities::FULL);
    }

    #[test]
    fn test_hls_prefers_helper_then_native_support() {
        let source = classify("https://cdn.example.com/live/index.m3u8").unwrap();

        let element = Arc::new(FakeMediaElement::new());
        let helper = Arc::new(FakeAdaptiveHelper::new(true));
        let adapter = NativeAdapter::new(&source, element.clone(), Some(helper.clone()));
        assert_eq!(helper.attached(), vec![source.playable_url.clone()]);
        assert_eq!(element.source(), None);
        adapter.teardown();
        assert_eq!(helper.destroyed(), 1);

        let safari = Arc::new(FakeMediaElement::with_native_hls());
        let unsupported = Arc::new(FakeAdaptiveHelper::new(false));
        NativeAdapter::new(&source, safari.clone(), Some(unsupported.clone()));
        assert!(unsupported.attached().is_empty());
        assert_eq!(safari.source().as_deref(), Some(source.playable_url.as_str()));
    }

    #[test]
    fn test_time_updates_become_ticks_until_unsubscribed() {
        let element = Arc::new(FakeMediaElement::new());
        let source = classify("https://cdn.example.com/a.mp4").unwrap();
        let adapter = NativeAdapter::new(&source, element.clone(), None);
        let (sink, ticks) = tick_recorder();

        let subscription = adapter.subscribe(sink);
        element.advance_to(1.5);
        element.advance_to(2.0);
        assert_eq!(*ticks.lock(), vec![1.5, 2.0]);

        subscription.cancel();
        assert_eq!(element.listener_count(), 0);
        element.advance_to(3.0);
        assert_eq!(ticks.lock().len(), 2);
    }

    #[test]
    fn test_controls_reach_element() {
        let element = Arc::new(FakeMediaElement::new());
        let source = classify("https://cdn.example.com/a.mp4").unwrap();
        let adapter = NativeAdapter::new(&source, element.clone(), None);
        adapter.pause();
        adapter.seek_to(31.0).unwrap();
        adapter.play();
        assert_eq!(element.calls(), vec!["pause", "seek:31", "play"]);
        assert_eq!(adapter.elapsed_seconds(), Some(31.0));
    }
}
