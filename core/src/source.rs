//! URL classification: raw lecture video URL -> provider + embed URL.
//!
//! Classification is pure. Anything that is not recognized as one of the
//! embed providers falls back to native playback, because an unknown direct
//! link should still get a chance to play.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClassifyError;

/// Video hosting backend a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Direct progressive file (mp4, webm, ...) played by a media element.
    NativeFile,
    /// Direct `.m3u8` playlist; needs adaptive streaming support.
    Hls,
    YouTube,
    Vimeo,
    Rutube,
    /// VK Video: embed only, no player API at all.
    Vk,
}

impl Provider {
    /// Both direct-URL variants are played through a media element.
    pub fn is_native(self) -> bool {
        matches!(self, Provider::NativeFile | Provider::Hls)
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::NativeFile => "native",
            Provider::Hls => "hls",
            Provider::YouTube => "youtube",
            Provider::Vimeo => "vimeo",
            Provider::Rutube => "rutube",
            Provider::Vk => "vk",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Format hint the server attaches to a resolved direct link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Mp4,
    M3u8,
}

/// A classified video URL. Re-derived whenever the block URL changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSource {
    pub raw_url: String,
    pub provider: Provider,
    /// Provider-specific id (YouTube video id, Vimeo number, `oid_id` for VK).
    pub provider_id: Option<String>,
    /// What actually gets loaded: the embed URL for iframe providers, the
    /// direct URL for native ones.
    pub playable_url: String,
}

impl VideoSource {
    /// True when the source plays through adaptive streaming.
    pub fn is_adaptive(&self) -> bool {
        self.provider == Provider::Hls
    }
}

static YOUTUBE_WATCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)youtube\.com/watch\?(?:.*&)?v=([^&#?/]+)").unwrap());
static YOUTUBE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:youtu\.be/|youtube(?:-nocookie)?\.com/(?:embed|shorts|live|v)/)([^?&#/]+)")
        .unwrap()
});
static VIMEO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)vimeo\.com/(?:video/|channels/[^/]+/|groups/[^/]+/videos/)?(\d+)").unwrap()
});
static RUTUBE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rutube\.ru/(?:video|shorts|play/embed)/([a-zA-Z0-9]+)").unwrap()
});
static VK_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[/.])(?:vk\.com|vkvideo\.ru|vk\.video)/").unwrap());
static VK_SHORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)video(-?\d+)_(\d+)").unwrap());

/// Classify a raw URL.
///
/// Only a blank string is an error; everything else yields a usable source.
pub fn classify(raw_url: &str) -> Result<VideoSource, ClassifyError> {
    classify_with_format(raw_url, None)
}

/// Classify with the server's format hint for resolved direct links.
///
/// A `M3u8` hint forces adaptive mode for a URL that falls back to native
/// playback; the hint is ignored for embed providers.
pub fn classify_with_format(
    raw_url: &str,
    format: Option<VideoFormat>,
) -> Result<VideoSource, ClassifyError> {
    let url = raw_url.trim();
    if url.is_empty() {
        return Err(ClassifyError::Empty);
    }

    let source = classify_youtube(url)
        .or_else(|| classify_vimeo(url))
        .or_else(|| classify_rutube(url))
        .or_else(|| classify_vk(url))
        .unwrap_or_else(|| {
            let adaptive = is_m3u8_url(url) || format == Some(VideoFormat::M3u8);
            VideoSource {
                raw_url: url.to_string(),
                provider: if adaptive {
                    Provider::Hls
                } else {
                    Provider::NativeFile
                },
                provider_id: None,
                playable_url: url.to_string(),
            }
        });

    log::debug!(
        "Classified {} as {} (id: {:?})",
        url,
        source.provider,
        source.provider_id
    );
    Ok(source)
}

/// Whether a direct URL points at an HLS playlist.
pub fn is_m3u8_url(url: &str) -> bool {
    url.to_ascii_lowercase().contains("m3u8")
}

/// Canonical YouTube embed URL for a video id.
pub fn youtube_embed_url(id: &str) -> String {
    format!("https://www.youtube.com/embed/{}", id)
}

/// Canonical Vimeo player URL for a numeric id.
pub fn vimeo_embed_url(id: &str) -> String {
    format!("https://player.vimeo.com/video/{}", id)
}

/// Canonical Rutube embed URL.
pub fn rutube_embed_url(id: &str) -> String {
    format!("https://rutube.ru/play/embed/{}", id)
}

/// Canonical VK embed URL. The hash is only known for links copied from
/// the VK "embed" dialog.
pub fn vk_embed_url(oid: &str, id: &str, hash: Option<&str>) -> String {
    match hash {
        Some(hash) => format!(
            "https://vk.com/video_ext.php?oid={}&id={}&hash={}",
            oid, id, hash
        ),
        None => format!("https://vk.com/video_ext.php?oid={}&id={}", oid, id),
    }
}

fn embed(raw: &str, provider: Provider, id: String, playable_url: String) -> VideoSource {
    VideoSource {
        raw_url: raw.to_string(),
        provider,
        provider_id: Some(id),
        playable_url,
    }
}

fn classify_youtube(url: &str) -> Option<VideoSource> {
    let id = YOUTUBE_WATCH
        .captures(url)
        .or_else(|| YOUTUBE_PATH.captures(url))
        .map(|caps| caps[1].to_string())?;
    let embed_url = youtube_embed_url(&id);
    Some(embed(url, Provider::YouTube, id, embed_url))
}

fn classify_vimeo(url: &str) -> Option<VideoSource> {
    let id = VIMEO.captures(url).map(|caps| caps[1].to_string())?;
    // Unlisted videos need their `h` hash carried into the player URL.
    let hash = parse_loose(url).and_then(|parsed| query_param(&parsed, "h"));
    let embed_url = match hash {
        Some(h) => format!("{}?h={}", vimeo_embed_url(&id), h),
        None => vimeo_embed_url(&id),
    };
    Some(embed(url, Provider::Vimeo, id, embed_url))
}

fn classify_rutube(url: &str) -> Option<VideoSource> {
    let id = RUTUBE.captures(url).map(|caps| caps[1].to_string())?;
    let embed_url = rutube_embed_url(&id);
    Some(embed(url, Provider::Rutube, id, embed_url))
}

fn classify_vk(url: &str) -> Option<VideoSource> {
    if !VK_HOST.is_match(url) {
        return None;
    }

    if url.to_ascii_lowercase().contains("video_ext.php") {
        let parsed = parse_loose(url)?;
        let oid = query_param(&parsed, "oid")?;
        let id = query_param(&parsed, "id")?;
        let hash = query_param(&parsed, "hash");
        let embed_url = vk_embed_url(&oid, &id, hash.as_deref());
        return Some(embed(url, Provider::Vk, format!("{}_{}", oid, id), embed_url));
    }

    let caps = VK_SHORT.captures(url)?;
    let (oid, id) = (&caps[1], &caps[2]);
    Some(embed(
        url,
        Provider::Vk,
        format!("{}_{}", oid, id),
        vk_embed_url(oid, id, None),
    ))
}

/// Parse a URL that may be missing its scheme (`vk.com/video_ext.php?...`).
fn parse_loose(url: &str) -> Option<Url> {
    Url::parse(url)
        .or_else(|_| Url::parse(&format!("https://{}", url)))
        .ok()
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
