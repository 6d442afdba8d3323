//! Recording fakes for the host surfaces and collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::api::{
    AnswerCheckRequest, AnswerCheckResponse, AnswerChecker, ProgressFetcher, ProgressSnapshot,
};
use crate::error::ApiError;
use crate::media::host::{
    AdaptiveStream, AdaptiveStreamHelper, EmbedFrame, FrameMounter, FrameSpec, ListenerGuard,
    MediaElement, MessageData, MessageHub, ScriptHost, VimeoApi, VimeoPlayer, WindowMessage,
    YouTubeApi, YouTubePlayer, YouTubeState,
};
use crate::media::sdk::Sdk;
use crate::media::{Capabilities, PlaybackAdapter, Subscription, TickSink};
use crate::source::Provider;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn tick_recorder() -> (TickSink, Arc<Mutex<Vec<f64>>>) {
    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let ticks = ticks.clone();
        Arc::new(move |t: f64| ticks.lock().push(t)) as TickSink
    };
    (sink, ticks)
}

/// Registered callbacks, removable through their guards.
struct Listeners<F: ?Sized> {
    next_id: AtomicU64,
    entries: Arc<Mutex<HashMap<u64, Arc<F>>>>,
}

impl<F: ?Sized + Send + Sync + 'static> Listeners<F> {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn add(&self, callback: Arc<F>) -> ListenerGuard {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().insert(id, callback);
        let entries = Arc::downgrade(&self.entries);
        ListenerGuard::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.lock().remove(&id);
            }
        })
    }

    fn snapshot(&self) -> Vec<Arc<F>> {
        self.entries.lock().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

pub struct FakeScriptHost {
    present: bool,
    behaviour: ScriptBehaviour,
    injections: Mutex<HashMap<Sdk, usize>>,
}

#[derive(Clone)]
enum ScriptBehaviour {
    ResolveAfter(Duration),
    Hang,
    Fail(String),
}

impl FakeScriptHost {
    fn with(present: bool, behaviour: ScriptBehaviour) -> Self {
        Self {
            present,
            behaviour,
            injections: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolving_after(delay: Duration) -> Self {
        Self::with(false, ScriptBehaviour::ResolveAfter(delay))
    }

    /// SDK globals already exist; nothing gets injected.
    pub fn present() -> Self {
        Self::with(true, ScriptBehaviour::ResolveAfter(Duration::ZERO))
    }

    pub fn hanging() -> Self {
        Self::with(false, ScriptBehaviour::Hang)
    }

    pub fn failing(reason: &str) -> Self {
        Self::with(false, ScriptBehaviour::Fail(reason.to_string()))
    }

    pub fn injections(&self, sdk: Sdk) -> usize {
        self.injections.lock().get(&sdk).copied().unwrap_or(0)
    }
}

impl ScriptHost for FakeScriptHost {
    fn sdk_present(&self, _sdk: Sdk) -> bool {
        self.present
    }

    fn inject_script(&self, sdk: Sdk, _src: &str) -> BoxFuture<'static, Result<(), String>> {
        *self.injections.lock().entry(sdk).or_insert(0) += 1;
        match self.behaviour.clone() {
            ScriptBehaviour::ResolveAfter(delay) => async move {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            .boxed(),
            ScriptBehaviour::Hang => futures::future::pending().boxed(),
            ScriptBehaviour::Fail(reason) => async move { Err(reason) }.boxed(),
        }
    }
}

/// Simulated `<video>`: time only moves when the test says so.
pub struct FakeMediaElement {
    native_hls: bool,
    time: Mutex<f64>,
    source: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    listeners: Listeners<dyn Fn() + Send + Sync>,
}

impl FakeMediaElement {
    pub fn new() -> Self {
        Self {
            native_hls: false,
            time: Mutex::new(0.0),
            source: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            listeners: Listeners::new(),
        }
    }

    pub fn with_native_hls() -> Self {
        Self {
            native_hls: true,
            ..Self::new()
        }
    }

    pub fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    /// Move the playhead and fire "timeupdate".
    pub fn advance_to(&self, seconds: f64) {
        *self.time.lock() = seconds;
        for listener in self.listeners.snapshot() {
            listener();
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl MediaElement for FakeMediaElement {
    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn set_current_time(&self, seconds: f64) {
        self.calls.lock().push(format!("seek:{}", seconds));
        *self.time.lock() = seconds;
    }

    fn play(&self) {
        self.calls.lock().push("play".to_string());
    }

    fn pause(&self) {
        self.calls.lock().push("pause".to_string());
    }

    fn set_source(&self, url: &str) {
        *self.source.lock() = Some(url.to_string());
    }

    fn can_play_type(&self, mime: &str) -> bool {
        self.native_hls && mime == "application/vnd.apple.mpegurl"
    }

    fn on_time_update(&self, callback: Box<dyn Fn() + Send + Sync>) -> ListenerGuard {
        self.listeners.add(Arc::from(callback))
    }
}

pub struct FakeAdaptiveHelper {
    supported: bool,
    attached: Mutex<Vec<String>>,
    destroyed: Arc<AtomicUsize>,
}

struct FakeStream(Arc<AtomicUsize>);

impl AdaptiveStream for FakeStream {
    fn destroy(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeAdaptiveHelper {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            attached: Mutex::new(Vec::new()),
            destroyed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attached(&self) -> Vec<String> {
        self.attached.lock().clone()
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl AdaptiveStreamHelper for FakeAdaptiveHelper {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn attach(&self, url: &str, _element: Arc<dyn MediaElement>) -> Box<dyn AdaptiveStream> {
        self.attached.lock().push(url.to_string());
        Box::new(FakeStream(self.destroyed.clone()))
    }
}

pub struct FakeYouTubeApi {
    fire_ready: bool,
    player: Mutex<Option<Arc<FakeYouTubePlayer>>>,
}

impl FakeYouTubeApi {
    pub fn ready_immediately() -> Self {
        Self {
            fire_ready: true,
            player: Mutex::new(None),
        }
    }

    pub fn never_ready() -> Self {
        Self {
            fire_ready: false,
            player: Mutex::new(None),
        }
    }

    pub fn player(&self) -> Option<Arc<FakeYouTubePlayer>> {
        self.player.lock().clone()
    }
}

impl YouTubeApi for FakeYouTubeApi {
    fn create_player(
        &self,
        video_id: &str,
        on_ready: Box<dyn FnOnce() + Send>,
    ) -> Result<Arc<dyn YouTubePlayer>, String> {
        let player = Arc::new(FakeYouTubePlayer {
            video_id: video_id.to_string(),
            time: Mutex::new(0.0),
            state: Mutex::new(YouTubeState::Unstarted),
            calls: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });
        *self.player.lock() = Some(player.clone());
        if self.fire_ready {
            on_ready();
        }
        Ok(player)
    }
}

pub struct FakeYouTubePlayer {
    video_id: String,
    time: Mutex<f64>,
    state: Mutex<YouTubeState>,
    calls: Mutex<Vec<String>>,
    destroyed: AtomicBool,
}

impl FakeYouTubePlayer {
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn set_time(&self, seconds: f64) {
        *self.time.lock() = seconds;
    }

    pub fn set_state(&self, state: YouTubeState) {
        *self.state.lock() = state;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl YouTubePlayer for FakeYouTubePlayer {
    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn state(&self) -> YouTubeState {
        *self.state.lock()
    }

    fn play_video(&self) {
        self.calls.lock().push("play".to_string());
        self.set_state(YouTubeState::Playing);
    }

    fn pause_video(&self) {
        self.calls.lock().push("pause".to_string());
        self.set_state(YouTubeState::Paused);
    }

    fn seek_to(&self, seconds: f64, _allow_seek_ahead: bool) {
        self.calls.lock().push(format!("seek:{}", seconds));
        self.set_time(seconds);
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeVimeoApi {
    player: Mutex<Option<Arc<FakeVimeoPlayer>>>,
}

impl FakeVimeoApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self) -> Option<Arc<FakeVimeoPlayer>> {
        self.player.lock().clone()
    }
}

impl VimeoApi for FakeVimeoApi {
    fn create_player(&self, _frame: &Arc<dyn EmbedFrame>) -> Result<Arc<dyn VimeoPlayer>, String> {
        let player = Arc::new(FakeVimeoPlayer {
            time: Mutex::new(0.0),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
            play_listeners: Listeners::new(),
        });
        *self.player.lock() = Some(player.clone());
        Ok(player)
    }
}

pub struct FakeVimeoPlayer {
    time: Mutex<f64>,
    failing: AtomicBool,
    calls: Mutex<Vec<String>>,
    destroyed: AtomicBool,
    play_listeners: Listeners<dyn Fn() + Send + Sync>,
}

impl FakeVimeoPlayer {
    pub fn set_time(&self, seconds: f64) {
        *self.time.lock() = seconds;
    }

    /// Fire the SDK "play" event.
    pub fn emit_play(&self) {
        for listener in self.play_listeners.snapshot() {
            listener();
        }
    }

    pub fn fail_time_queries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VimeoPlayer for FakeVimeoPlayer {
    async fn current_time(&self) -> Result<f64, String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("player is not ready".to_string());
        }
        Ok(*self.time.lock())
    }

    async fn play(&self) -> Result<(), String> {
        self.calls.lock().push("play".to_string());
        self.emit_play();
        Ok(())
    }

    async fn pause(&self) -> Result<(), String> {
        self.calls.lock().push("pause".to_string());
        Ok(())
    }

    async fn set_current_time(&self, seconds: f64) -> Result<(), String> {
        self.calls.lock().push(format!("seek:{}", seconds));
        self.set_time(seconds);
        Ok(())
    }

    fn on_play(&self, callback: Box<dyn Fn() + Send + Sync>) -> ListenerGuard {
        self.play_listeners.add(Arc::from(callback))
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeFrameMounter {
    frames: Mutex<Vec<Arc<FakeFrame>>>,
}

impl FakeFrameMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted_urls(&self) -> Vec<String> {
        self.frames.lock().iter().map(|f| f.url.clone()).collect()
    }

    pub fn last_frame(&self) -> Option<Arc<FakeFrame>> {
        self.frames.lock().last().cloned()
    }

    pub fn removed(&self) -> usize {
        self.frames.lock().iter().filter(|f| f.is_removed()).count()
    }
}

impl FrameMounter for FakeFrameMounter {
    fn mount(&self, spec: &FrameSpec) -> Arc<dyn EmbedFrame> {
        let frame = Arc::new(FakeFrame {
            url: spec.url.clone(),
            posted: Mutex::new(Vec::new()),
            removed: AtomicBool::new(false),
        });
        self.frames.lock().push(frame.clone());
        frame
    }
}

pub struct FakeFrame {
    url: String,
    posted: Mutex<Vec<String>>,
    removed: AtomicBool,
}

impl FakeFrame {
    pub fn posted(&self) -> Vec<String> {
        self.posted.lock().clone()
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

impl EmbedFrame for FakeFrame {
    fn url(&self) -> &str {
        &self.url
    }

    fn post_message(&self, payload: &str) {
        self.posted.lock().push(payload.to_string());
    }

    fn remove(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeMessageHub {
    listeners: Listeners<dyn Fn(&WindowMessage) + Send + Sync>,
}

impl FakeMessageHub {
    pub fn new() -> Self {
        Self {
            listeners: Listeners::new(),
        }
    }

    pub fn send(&self, origin: &str, data: MessageData) {
        let message = WindowMessage {
            origin: origin.to_string(),
            data,
        };
        for listener in self.listeners.snapshot() {
            listener(&message);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl MessageHub for FakeMessageHub {
    fn on_message(&self, callback: Box<dyn Fn(&WindowMessage) + Send + Sync>) -> ListenerGuard {
        self.listeners.add(Arc::from(callback))
    }
}

/// Adapter that records control calls and never ticks on its own.
pub struct RecordingAdapter {
    provider: Provider,
    capabilities: Capabilities,
    calls: Mutex<Vec<String>>,
}

impl RecordingAdapter {
    pub fn seekable() -> Self {
        Self {
            provider: Provider::NativeFile,
            capabilities: Capabilities::FULL,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn capability_less() -> Self {
        Self {
            provider: Provider::Vk,
            capabilities: Capabilities::NONE,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl PlaybackAdapter for RecordingAdapter {
    fn provider(&self) -> Provider {
        self.provider
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn seek_to(&self, seconds: f64) -> Result<(), crate::error::AdapterError> {
        if !self.capabilities.can_seek {
            return Err(crate::error::AdapterError::Unsupported {
                provider: self.provider,
                capability: "seek",
            });
        }
        self.calls.lock().push(format!("seek:{}", seconds));
        Ok(())
    }

    fn play(&self) {
        if self.capabilities.can_control {
            self.calls.lock().push("play".to_string());
        }
    }

    fn pause(&self) {
        if self.capabilities.can_control {
            self.calls.lock().push("pause".to_string());
        }
    }

    fn subscribe(&self, _on_tick: TickSink) -> Subscription {
        Subscription::new()
    }
}

/// Scripted answer for [`ScriptedChecker`].
#[derive(Debug, Clone)]
pub enum Verdict {
    Pass(Vec<String>),
    Fail(String),
    Unreachable,
}

/// Checker that replays verdicts in order, repeating the last one.
pub struct ScriptedChecker {
    verdicts: Mutex<VecDeque<Verdict>>,
    delay: Duration,
    requests: Mutex<Vec<AnswerCheckRequest>>,
}

impl ScriptedChecker {
    pub fn new(verdicts: Vec<Verdict>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into()),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn passing(correct: &[&str]) -> Self {
        Self::new(vec![Verdict::Pass(
            correct.iter().map(|s| s.to_string()).collect(),
        )])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<AnswerCheckRequest> {
        self.requests.lock().clone()
    }

    fn next_verdict(&self) -> Verdict {
        let mut verdicts = self.verdicts.lock();
        if verdicts.len() > 1 {
            verdicts.pop_front().unwrap_or(Verdict::Unreachable)
        } else {
            verdicts.front().cloned().unwrap_or(Verdict::Unreachable)
        }
    }
}

#[async_trait]
impl AnswerChecker for ScriptedChecker {
    async fn check(&self, request: AnswerCheckRequest) -> Result<AnswerCheckResponse, ApiError> {
        self.requests.lock().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.next_verdict() {
            Verdict::Pass(correct) => Ok(AnswerCheckResponse {
                passed: true,
                message: "Correct".to_string(),
                correct_choice_ids: Some(correct),
            }),
            Verdict::Fail(message) => Ok(AnswerCheckResponse {
                passed: false,
                message,
                correct_choice_ids: None,
            }),
            Verdict::Unreachable => Err(ApiError::Status {
                status: 503,
                body: "unavailable".to_string(),
            }),
        }
    }
}

/// Progress source returning a fixed snapshot, or failing.
pub struct FixedProgress {
    snapshot: Option<ProgressSnapshot>,
    fetches: AtomicUsize,
}

impl FixedProgress {
    pub fn new(snapshot: ProgressSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            snapshot: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProgressFetcher for FixedProgress {
    async fn fetch_progress(&self) -> Result<ProgressSnapshot, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.snapshot
            .clone()
            .ok_or_else(|| ApiError::Decode("progress unavailable".to_string()))
    }
}
