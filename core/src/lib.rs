pub mod api;
pub mod challenge;
pub mod config;
pub mod detector;
pub mod error;
pub mod media;
pub mod model;
pub mod session;
pub mod source;
pub mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;

// Re-exports
pub use api::{AnswerChecker, AnswerKey, HttpLectureApi, NoProgress, ProgressFetcher};
pub use challenge::{ActiveChallenge, ChallengeController, ResumeAction, SubmitOutcome};
pub use config::SyncConfig;
pub use detector::{CheckpointDetector, Reached};
pub use error::{AdapterError, ApiError, ChallengeError, ClassifyError, ConfigError, SessionError};
pub use media::{
    Capabilities, EmbedEnvironment, NativeAdapter, PlaybackAdapter, RutubeAdapter, Subscription,
    TickSink, VimeoAdapter, VkAdapter, YouTubeAdapter,
};
pub use model::{BlockKey, Choice, PausePoint, Question, VideoBlock};
pub use session::{SessionEvent, SessionSummary, VideoSession};
pub use source::{Provider, VideoFormat, VideoSource, classify, classify_with_format};
pub use store::{CompletionRecord, CompletionStatus, CompletionStore};

/// Create the playback adapter for a classified source.
///
/// Fails when the host lacks a surface the provider needs; callers never
/// branch on the provider after this point.
pub fn create_adapter(
    source: &VideoSource,
    env: &EmbedEnvironment,
    config: &SyncConfig,
) -> Result<Arc<dyn PlaybackAdapter>, AdapterError> {
    match source.provider {
        Provider::NativeFile | Provider::Hls => {
            let element = env
                .media_element
                .clone()
                .ok_or(AdapterError::MissingSurface("a media element"))?;
            Ok(Arc::new(NativeAdapter::new(
                source,
                element,
                env.adaptive_helper.clone(),
            )))
        }
        Provider::YouTube => {
            let api = env
                .youtube
                .clone()
                .ok_or(AdapterError::MissingSurface("the YouTube iframe API"))?;
            let scripts = env
                .scripts
                .clone()
                .ok_or(AdapterError::MissingSurface("script injection"))?;
            let adapter =
                YouTubeAdapter::new(source, api, scripts, env.sdk_registry.clone(), config)?;
            Ok(Arc::new(adapter))
        }
        Provider::Vimeo => {
            let frames = frames(env)?;
            let api = env
                .vimeo
                .clone()
                .ok_or(AdapterError::MissingSurface("the Vimeo player API"))?;
            let scripts = env
                .scripts
                .clone()
                .ok_or(AdapterError::MissingSurface("script injection"))?;
            Ok(Arc::new(VimeoAdapter::new(
                source,
                &frames,
                api,
                scripts,
                env.sdk_registry.clone(),
                config,
            )))
        }
        Provider::Rutube => {
            let frames = frames(env)?;
            let hub = env
                .messages
                .clone()
                .ok_or(AdapterError::MissingSurface("window messaging"))?;
            Ok(Arc::new(RutubeAdapter::new(source, &frames, hub, config)))
        }
        Provider::Vk => {
            let frames = frames(env)?;
            Ok(Arc::new(VkAdapter::new(source, &frames, config)))
        }
    }
}

fn frames(env: &EmbedEnvironment) -> Result<Arc<dyn media::host::FrameMounter>, AdapterError> {
    env.frames
        .clone()
        .ok_or(AdapterError::MissingSurface("an embed frame container"))
}
