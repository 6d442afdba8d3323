//! External collaborators: the answer checker and the progress fetch.
//!
//! Both are traits so the engine never depends on a transport. The HTTP
//! implementation talks to the platform API; [`AnswerKey`] checks answers
//! offline from authoring data.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::model::{BlockKey, VideoBlock};
use crate::store::CompletionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCheckRequest {
    /// `videoBlockId::pausePointId`.
    pub block_id: String,
    pub selected_choice_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCheckResponse {
    pub passed: bool,
    #[serde(default)]
    pub message: String,
    /// Present on success; used to highlight the right answers later.
    #[serde(default, rename = "correct_ids", alias = "correct_choice_ids")]
    pub correct_choice_ids: Option<Vec<String>>,
}

/// Progress of one block as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgressEntry {
    #[serde(default)]
    pub status: Option<CompletionStatus>,
    #[serde(default)]
    pub correct_ids: Option<Vec<String>>,
}

/// `blockId -> progress` for one lecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub blocks: HashMap<String, ProgressEntry>,
}

#[async_trait]
pub trait AnswerChecker: Send + Sync {
    async fn check(&self, request: AnswerCheckRequest) -> Result<AnswerCheckResponse, ApiError>;
}

#[async_trait]
pub trait ProgressFetcher: Send + Sync {
    async fn fetch_progress(&self) -> Result<ProgressSnapshot, ApiError>;
}

/// Client for the platform's lecture endpoints.
#[derive(Debug, Clone)]
pub struct HttpLectureApi {
    client: Client,
    base_url: Url,
    lecture_id: String,
    token: Option<String>,
}

impl HttpLectureApi {
    pub fn new(
        base_url: &str,
        lecture_id: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::Config(format!("{}: {}", base_url, e)))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            lecture_id: lecture_id.into(),
            token,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| ApiError::Config("api.base_url is not set".to_string()))?;
        let lecture_id = config
            .lecture_id
            .clone()
            .ok_or_else(|| ApiError::Config("api.lecture_id is not set".to_string()))?;
        Self::new(
            base_url,
            lecture_id,
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, tail: &str) -> Result<Url, ApiError> {
        let path = format!("api/lectures/{}/{}", self.lecture_id, tail);
        self.base_url
            .join(&path)
            .map_err(|e| ApiError::Config(format!("bad endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AnswerChecker for HttpLectureApi {
    async fn check(&self, request: AnswerCheckRequest) -> Result<AnswerCheckResponse, ApiError> {
        let url = self.endpoint("check-block/")?;
        log::debug!("POST {} for {}", url, request.block_id);
        let response = self
            .authorize(self.client.post(url))
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl ProgressFetcher for HttpLectureApi {
    async fn fetch_progress(&self) -> Result<ProgressSnapshot, ApiError> {
        let url = self.endpoint("progress/")?;
        log::debug!("GET {}", url);
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::decode(response).await
    }
}

/// Offline checker built from authoring data carrying `is_correct` flags.
///
/// An answer passes when the selected set equals the correct set exactly.
#[derive(Debug, Clone, Default)]
pub struct AnswerKey {
    correct: HashMap<BlockKey, BTreeSet<String>>,
}

impl AnswerKey {
    pub fn from_block(block: &VideoBlock) -> Self {
        let correct = block
            .pause_points
            .iter()
            .map(|point| {
                let ids = point
                    .question
                    .choices
                    .iter()
                    .filter(|c| c.is_correct == Some(true))
                    .map(|c| c.id.clone())
                    .collect();
                (block.key_for(&point.id), ids)
            })
            .collect();
        Self { correct }
    }
}

#[async_trait]
impl AnswerChecker for AnswerKey {
    async fn check(&self, request: AnswerCheckRequest) -> Result<AnswerCheckResponse, ApiError> {
        let key = BlockKey::from(request.block_id.as_str());
        let correct = self
            .correct
            .get(&key)
            .ok_or_else(|| ApiError::UnknownBlock(request.block_id.clone()))?;
        let selected: BTreeSet<String> = request.selected_choice_ids.into_iter().collect();

        if !correct.is_empty() && &selected == correct {
            Ok(AnswerCheckResponse {
                passed: true,
                message: "Correct!".to_string(),
                correct_choice_ids: Some(correct.iter().cloned().collect()),
            })
        } else {
            Ok(AnswerCheckResponse {
                passed: false,
                message: "Not quite, try again.".to_string(),
                correct_choice_ids: None,
            })
        }
    }
}

/// Progress source for sessions without a server: nothing is solved yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

#[async_trait]
impl ProgressFetcher for NoProgress {
    async fn fetch_progress(&self) -> Result<ProgressSnapshot, ApiError> {
        Ok(ProgressSnapshot::default())
    }
}
