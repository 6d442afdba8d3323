//! Lecture video block data: pause points, questions and their keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::source::{VideoFormat, VideoSource, classify_with_format};

/// One answer option of a pause-point question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
    /// Only present in authoring data; the viewer never relies on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// Question shown when playback reaches a pause point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub multiple: bool,
    pub choices: Vec<Choice>,
}

impl Question {
    pub fn has_choice(&self, choice_id: &str) -> bool {
        self.choices.iter().any(|c| c.id == choice_id)
    }

    /// Prompt text, if the author wrote a non-blank one.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Instructor-defined timestamp at which playback stops for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausePoint {
    pub id: String,
    /// Seconds from the start of the video.
    #[serde(rename = "timestamp")]
    pub timestamp_seconds: f64,
    pub question: Question,
}

/// Key of a completion record: `videoBlockId::pausePointId`.
///
/// This is also the block id the answer checker and progress API use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockKey(String);

impl BlockKey {
    pub const SEPARATOR: &'static str = "::";

    pub fn new(video_block_id: &str, pause_point_id: &str) -> Self {
        Self(format!("{}{}{}", video_block_id, Self::SEPARATOR, pause_point_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split back into `(video_block_id, pause_point_id)`.
    pub fn parts(&self) -> Option<(&str, &str)> {
        self.0.split_once(Self::SEPARATOR)
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// A lecture block of type "video" as the platform API delivers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBlock {
    pub id: String,
    /// Link the author entered (page URL or direct link).
    pub url: String,
    /// Direct mp4/m3u8 link resolved by the server for viewing.
    #[serde(default)]
    pub direct_url: Option<String>,
    #[serde(default)]
    pub video_format: Option<VideoFormat>,
    #[serde(default)]
    pub pause_points: Vec<PausePoint>,
}

impl VideoBlock {
    /// URL used for playback: the resolved direct link wins over the raw one.
    pub fn playback_url(&self) -> &str {
        self.direct_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.url)
    }

    pub fn classify(&self) -> Result<VideoSource, ClassifyError> {
        classify_with_format(self.playback_url(), self.video_format)
    }

    pub fn key_for(&self, pause_point_id: &str) -> BlockKey {
        BlockKey::new(&self.id, pause_point_id)
    }

    /// Pause points ordered by `(timestamp, id)`.
    pub fn sorted_pause_points(&self) -> Vec<PausePoint> {
        let mut points = self.pause_points.clone();
        sort_pause_points(&mut points);
        points
    }
}

/// Order by timestamp, ties broken by lexicographic id.
pub fn sort_pause_points(points: &mut [PausePoint]) {
    points.sort_by(|a, b| {
        a.timestamp_seconds
            .total_cmp(&b.timestamp_seconds)
            .then_with(|| a.id.cmp(&b.id))
    });
}
