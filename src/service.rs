use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{ResultCache, fingerprint};
use crate::error::{ApiError, ApiResult};
use crate::fetcher::{self, FetchError, TranscriptProvider};
use crate::output::render_transcript;
use crate::{TranscriptResult, extract_video_id};

fn default_include_timestamps() -> bool {
    true
}

/// Body of `POST /api/transcript`
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptRequest {
    pub url: String,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default = "default_include_timestamps")]
    pub include_timestamps: bool,
}

impl TranscriptRequest {
    /// Decode a JSON body. An absent or non-string `url` is a missing URL;
    /// any other field of the wrong shape makes the body malformed.
    pub fn from_json(body: Value) -> ApiResult<Self> {
        if !matches!(body.get("url"), Some(Value::String(_))) {
            return Err(ApiError::MissingUrl);
        }
        serde_json::from_value(body).map_err(|e| ApiError::MalformedBody(e.to_string()))
    }
}

/// Extract, look up, fetch, format and cache transcripts
pub struct TranscriptService {
    provider: Arc<dyn TranscriptProvider>,
    cache: ResultCache,
    fetch_timeout: Duration,
}

impl TranscriptService {
    pub fn new(provider: Arc<dyn TranscriptProvider>, cache: ResultCache, fetch_timeout: Duration) -> Self {
        Self {
            provider,
            cache,
            fetch_timeout,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub async fn transcript(&self, request: &TranscriptRequest) -> ApiResult<TranscriptResult> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(ApiError::MissingUrl);
        }
        let video_id = extract_video_id(url).ok_or(ApiError::InvalidUrl)?;

        let languages = request.languages.as_deref();
        let key = fingerprint(&video_id, languages, request.include_timestamps);

        if let Some(hit) = self.cache.get(&key) {
            debug!("Cache hit for {video_id}");
            return Ok(hit);
        }
        debug!("Cache miss for {video_id}");

        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            fetcher::fetch_transcript(self.provider.as_ref(), &video_id, languages),
        )
        .await
        .map_err(|_| FetchError::TimedOut(self.fetch_timeout))
        .and_then(|r| r)
        .map_err(|e| {
            warn!("Transcript for {video_id} failed: {e}");
            ApiError::from(e)
        })?;

        let result = TranscriptResult {
            success: true,
            video_id,
            language: fetched.language,
            transcript: render_transcript(&fetched.segments, request.include_timestamps),
            total_segments: fetched.segments.len(),
            cached: false,
        };
        info!(
            "Fetched transcript for {} ({}, {} segments)",
            result.video_id, result.language, result.total_segments
        );

        self.cache.put(key, result.clone());
        Ok(result)
    }

    pub async fn languages(&self, video_id: &str) -> Vec<String> {
        fetcher::available_languages(self.provider.as_ref(), video_id).await
    }
}
