//! Error types for the pause-point engine.
//!
//! Nothing in here is meant to reach the learner as a crash: adapters degrade
//! to "no ticks", the controller keeps the challenge open, and only the
//! binary edge turns these into `anyhow` reports.

use thiserror::Error;

use crate::source::Provider;

/// Failure to turn a raw string into a [`crate::VideoSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    /// The block has no URL at all; there is nothing to play.
    #[error("video URL is empty")]
    Empty,
}

/// Failures raised while building or driving a playback adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The provider has no such control channel (VK has neither seek nor time).
    #[error("{provider} adapter does not support {capability}")]
    Unsupported {
        provider: Provider,
        capability: &'static str,
    },

    /// The embedding host did not supply a surface this provider needs.
    #[error("host does not provide {0}")]
    MissingSurface(&'static str),

    /// A provider SDK script could not be injected or reported an error.
    #[error("failed to load {sdk} SDK: {reason}")]
    SdkLoad { sdk: &'static str, reason: String },

    /// A provider SDK never signalled readiness within the configured wait.
    #[error("{sdk} SDK did not become ready within {waited_ms}ms")]
    SdkTimeout { sdk: &'static str, waited_ms: u64 },

    /// A provider call failed (rejected promise, dead player).
    #[error("{provider} player call failed: {reason}")]
    Provider { provider: Provider, reason: String },
}

/// Failures talking to the platform API (answer checker, progress fetch).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("invalid API configuration: {0}")]
    Config(String),

    #[error("unknown block `{0}`")]
    UnknownBlock(String),
}

/// Failures of the challenge lifecycle. All of them leave the challenge open.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("no challenge is active")]
    NoActiveChallenge,

    #[error("choice `{0}` does not belong to the active question")]
    UnknownChoice(String),

    #[error("select at least one answer before submitting")]
    EmptySelection,

    #[error("an answer is already being checked")]
    SubmissionInFlight,

    #[error("answer check failed: {0}")]
    Checker(#[from] ApiError),
}

/// Failures loading or validating [`crate::config::SyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failures mounting a [`crate::session::VideoSession`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// The rendered [`ConfigError`]; kept as text so the enum stays `Clone`.
    #[error("{0}")]
    Config(String),
}
