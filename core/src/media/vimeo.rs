use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::host::{EmbedFrame, FrameMounter, FrameSpec, ScriptHost, VimeoApi, VimeoPlayer};
use super::sdk::{Sdk, SdkRegistry};
use super::{Capabilities, PlaybackAdapter, Subscription, TickSink};
use crate::config::SyncConfig;
use crate::error::AdapterError;
use crate::source::{Provider, VideoSource};

const FRAME_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Seek(f64),
    Play,
    Pause,
}

#[derive(Default)]
struct Shared {
    player: Mutex<Option<Arc<dyn VimeoPlayer>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
    last_time: Mutex<Option<f64>>,
}

impl Shared {
    /// Start sampling time unless a poller is already running.
    fn start_poller(
        self: &Arc<Self>,
        runtime: &Handle,
        player: Arc<dyn VimeoPlayer>,
        on_tick: TickSink,
        period: Duration,
    ) {
        let mut poller = self.poller.lock();
        if poller.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        debug!("Vimeo play event, starting poller");

        let shared = Arc::downgrade(self);
        *poller = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match player.current_time().await {
                    Ok(t) => {
                        match shared.upgrade() {
                            Some(shared) => *shared.last_time.lock() = Some(t),
                            None => return,
                        }
                        on_tick(t);
                    }
                    Err(e) => debug!("Vimeo time query failed: {}", e),
                }
            }
        }));
    }

    fn stop_poller(&self) {
        if let Some(task) = self.poller.lock().take() {
            task.abort();
        }
    }

    fn destroy_player(&self) {
        if let Some(player) = self.player.lock().take() {
            player.destroy();
        }
    }
}

/// Adapter for Vimeo embeds.
///
/// Every player call is asynchronous, so control requests go through a
/// queue that is drained in order once the player exists.
pub struct VimeoAdapter {
    frame: Arc<dyn EmbedFrame>,
    api: Arc<dyn VimeoApi>,
    scripts: Arc<dyn ScriptHost>,
    registry: Arc<SdkRegistry>,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    queue: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    poll: Duration,
    ready_timeout: Duration,
}

impl VimeoAdapter {
    /// Mount the embed frame. The player is created on `subscribe`.
    pub fn new(
        source: &VideoSource,
        frames: &Arc<dyn FrameMounter>,
        api: Arc<dyn VimeoApi>,
        scripts: Arc<dyn ScriptHost>,
        registry: Arc<SdkRegistry>,
        config: &SyncConfig,
    ) -> Self {
        let frame = frames.mount(&FrameSpec {
            url: source.playable_url.clone(),
            title: "Vimeo video",
            allow: FRAME_ALLOW,
        });
        let (commands, queue) = mpsc::unbounded_channel();

        Self {
            frame,
            api,
            scripts,
            registry,
            shared: Arc::new(Shared::default()),
            commands,
            queue: Mutex::new(Some(queue)),
            poll: config.vimeo_poll(),
            ready_timeout: config.sdk_ready_timeout(),
        }
    }

    fn enqueue(&self, command: Command) -> Result<(), AdapterError> {
        self.commands
            .send(command)
            .map_err(|_| AdapterError::Provider {
                provider: Provider::Vimeo,
                reason: "player has been torn down".to_string(),
            })
    }
}

async fn run_command(player: &dyn VimeoPlayer, command: Command) {
    let result = match command {
        Command::Seek(t) => player.set_current_time(t).await,
        Command::Play => player.play().await,
        Command::Pause => player.pause().await,
    };
    if let Err(e) = result {
        debug!("Vimeo {:?} rejected: {}", command, e);
    }
}

impl PlaybackAdapter for VimeoAdapter {
    fn provider(&self) -> Provider {
        Provider::Vimeo
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    /// Last sampled position; the player itself only answers asynchronously.
    fn elapsed_seconds(&self) -> Option<f64> {
        *self.shared.last_time.lock()
    }

    fn seek_to(&self, seconds: f64) -> Result<(), AdapterError> {
        self.enqueue(Command::Seek(seconds))
    }

    fn play(&self) {
        if let Err(e) = self.enqueue(Command::Play) {
            debug!("{}", e);
        }
    }

    fn pause(&self) {
        if let Err(e) = self.enqueue(Command::Pause) {
            debug!("{}", e);
        }
    }

    fn subscribe(&self, on_tick: TickSink) -> Subscription {
        let Some(mut queue) = self.queue.lock().take() else {
            warn!("Vimeo adapter subscribed twice, ignoring");
            return Subscription::new();
        };
        let frame = self.frame.clone();
        let api = self.api.clone();
        let scripts = self.scripts.clone();
        let registry = self.registry.clone();
        let shared = self.shared.clone();
        let poll = self.poll;
        let ready_timeout = self.ready_timeout;

        let task = tokio::spawn(async move {
            if let Err(e) = registry
                .ensure_loaded(&scripts, Sdk::Vimeo, ready_timeout)
                .await
            {
                warn!("Vimeo pause points disabled for {}: {}", frame.url(), e);
                return;
            }
            let player = match api.create_player(&frame) {
                Ok(player) => player,
                Err(reason) => {
                    warn!("Could not create Vimeo player for {}: {}", frame.url(), reason);
                    return;
                }
            };
            info!("Vimeo player ready for {}", frame.url());
            *shared.player.lock() = Some(player.clone());

            let runtime = Handle::current();
            let on_play = {
                let shared = Arc::downgrade(&shared);
                let polled = player.clone();
                player.on_play(Box::new(move || {
                    if let Some(shared) = shared.upgrade() {
                        shared.start_poller(&runtime, polled.clone(), on_tick.clone(), poll);
                    }
                }))
            };

            while let Some(command) = queue.recv().await {
                run_command(player.as_ref(), command).await;
            }
            drop(on_play);
        });

        let shared = self.shared.clone();
        Subscription::new().with_task(task).with_cleanup(move || {
            shared.stop_poller();
            shared.destroy_player();
        })
    }

    fn teardown(&self) {
        self.shared.stop_poller();
        self.shared.destroy_player();
        self.frame.remove();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::classify;
    use crate::testing::{
        FakeFrameMounter, FakeScriptHost, FakeVimeoApi, settle, tick_recorder,
    };

    struct Rig {
        frames: Arc<FakeFrameMounter>,
        api: Arc<FakeVimeoApi>,
        adapter: VimeoAdapter,
    }

    fn rig() -> Rig {
        let source = classify("https://vimeo.com/76979871").unwrap();
        let frames = Arc::new(FakeFrameMounter::new());
        let api = Arc::new(FakeVimeoApi::new());
        let mounter: Arc<dyn FrameMounter> = frames.clone();
        let adapter = VimeoAdapter::new(
            &source,
            &mounter,
            api.clone(),
            Arc::new(FakeScriptHost::present()),
            Arc::new(SdkRegistry::new()),
            &SyncConfig::default(),
        );
        Rig {
            frames,
            api,
            adapter,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_starts_on_play_event() {
        let rig = rig();
        assert_eq!(
            rig.frames.mounted_urls(),
            vec!["https://player.vimeo.com/video/76979871".to_string()]
        );

        let (sink, ticks) = tick_recorder();
        let _subscription = rig.adapter.subscribe(sink);
        settle().await;
        let player = rig.api.player().unwrap();

        player.set_time(4.0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(ticks.lock().is_empty());

        player.emit_play();
        player.emit_play();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        // one poller, ticks at 0, 500 and 1000ms
        assert_eq!(ticks.lock().len(), 3);
        assert_eq!(rig.adapter.elapsed_seconds(), Some(4.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_queries_are_swallowed() {
        let rig = rig();
        let (sink, ticks) = tick_recorder();
        let _subscription = rig.adapter.subscribe(sink);
        settle().await;
        let player = rig.api.player().unwrap();

        player.fail_time_queries(true);
        player.emit_play();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(ticks.lock().is_empty());

        player.fail_time_queries(false);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!ticks.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_queued_until_ready_run_in_order() {
        let rig = rig();
        rig.adapter.pause();
        rig.adapter.seek_to(31.0).unwrap();
        rig.adapter.play();

        let (sink, _ticks) = tick_recorder();
        let subscription = rig.adapter.subscribe(sink);
        settle().await;
        let player = rig.api.player().unwrap();
        assert_eq!(player.calls(), vec!["pause", "seek:31", "play"]);

        subscription.cancel();
        assert!(player.is_destroyed());
        rig.adapter.teardown();
        assert_eq!(rig.frames.removed(), 1);
    }
}
