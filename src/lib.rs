pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod output;
pub mod ratelimit;
pub mod server;
pub mod service;
pub mod youtube;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("bare id pattern is valid"));

// `v=` query parameter or any path segment; the id must end at a non-id character
static EMBEDDED_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|/)([a-zA-Z0-9_-]{11})(?:[^a-zA-Z0-9_-]|$)").expect("embedded id pattern is valid")
});

/// A single captioned segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

/// Response payload for a successful transcript lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub success: bool,
    pub video_id: String,
    pub language: String,
    pub transcript: String,
    pub total_segments: usize,
    pub cached: bool,
}

/// True when `input` is exactly an 11-character video ID
pub fn is_video_id(input: &str) -> bool {
    BARE_ID.is_match(input)
}

/// Extract video ID from various YouTube URL formats
///
/// Accepts a bare ID, `watch?v=ID`, `youtu.be/ID`, `/embed/ID`, `/v/ID` and
/// `/shorts/ID`. Anything else is `None`.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if is_video_id(input) {
        return Some(input.to_string());
    }

    EMBEDDED_ID.captures(input).map(|caps| caps[1].to_string())
}
