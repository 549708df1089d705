use std::fmt;

use async_trait::async_trait;
use log::{debug, warn};
use thiserror::Error;

use crate::CaptionSegment;

/// Languages tried one at a time when the caller's preference fails or is absent
pub const DEFAULT_LANGUAGES: [&str; 5] = ["pt", "en", "es", "fr", "de"];

/// Failure conditions raised by a transcript provider
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transcripts are disabled for video {0}")]
    TranscriptsDisabled(String),

    #[error("no transcript for video {video_id} in {languages:?}")]
    NoTranscriptFound { video_id: String, languages: Vec<String> },

    #[error("video {0} is unavailable")]
    VideoUnavailable(String),

    #[error("invalid video id: {0}")]
    InvalidVideoId(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected upstream response: {0}")]
    Upstream(String),

    #[error("transcript fetch timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

/// A caption track advertised for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub name: String,
    pub is_generated: bool,
}

/// The transcript retrieval backend
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// List caption tracks in the provider's own order
    async fn list(&self, video_id: &str) -> Result<Vec<CaptionTrack>, FetchError>;

    /// Fetch segments from the first track matching `languages`, tried in order
    async fn fetch(&self, video_id: &str, languages: &[String]) -> Result<Vec<CaptionSegment>, FetchError>;
}

/// Segments plus the language reported for them
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTranscript {
    pub segments: Vec<CaptionSegment>,
    pub language: String,
}

enum Attempt<'a> {
    Preferred(&'a [String]),
    Default(&'static str),
}

impl fmt::Display for Attempt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Preferred(langs) => write!(f, "preferred {langs:?}"),
            Attempt::Default(lang) => write!(f, "default {lang}"),
        }
    }
}

impl Attempt<'_> {
    async fn run(&self, provider: &dyn TranscriptProvider, video_id: &str) -> Result<FetchedTranscript, FetchError> {
        match self {
            // Reported language is the first preference, whichever track the provider matched
            Attempt::Preferred(langs) => Ok(FetchedTranscript {
                segments: provider.fetch(video_id, langs).await?,
                language: langs[0].clone(),
            }),
            Attempt::Default(lang) => Ok(FetchedTranscript {
                segments: provider.fetch(video_id, &[lang.to_string()]).await?,
                language: lang.to_string(),
            }),
        }
    }
}

fn plan(languages: Option<&[String]>) -> Vec<Attempt<'_>> {
    let mut attempts = Vec::with_capacity(DEFAULT_LANGUAGES.len() + 1);
    if let Some(langs) = languages.filter(|l| !l.is_empty()) {
        attempts.push(Attempt::Preferred(langs));
    }
    attempts.extend(DEFAULT_LANGUAGES.into_iter().map(Attempt::Default));
    attempts
}

/// Fetch a transcript, falling back through preferences, defaults, then any track
pub async fn fetch_transcript(
    provider: &dyn TranscriptProvider,
    video_id: &str,
    languages: Option<&[String]>,
) -> Result<FetchedTranscript, FetchError> {
    for attempt in plan(languages) {
        match attempt.run(provider, video_id).await {
            Ok(fetched) => {
                debug!("Fetched {video_id} via {attempt}: {} segments", fetched.segments.len());
                return Ok(fetched);
            }
            Err(e) => debug!("Attempt {attempt} for {video_id} failed: {e}"),
        }
    }

    first_available(provider, video_id).await
}

async fn first_available(provider: &dyn TranscriptProvider, video_id: &str) -> Result<FetchedTranscript, FetchError> {
    let not_found = || FetchError::NoTranscriptFound {
        video_id: video_id.to_string(),
        languages: Vec::new(),
    };

    let tracks = match provider.list(video_id).await {
        Ok(tracks) => tracks,
        Err(e @ (FetchError::VideoUnavailable(_) | FetchError::InvalidVideoId(_))) => return Err(e),
        // disabled captions included: nothing in any language to find
        Err(e) => {
            debug!("Listing tracks for {video_id} failed: {e}");
            return Err(not_found());
        }
    };

    let Some(track) = tracks.first() else {
        return Err(not_found());
    };

    let language = track.language_code.clone();
    match provider.fetch(video_id, std::slice::from_ref(&language)).await {
        Ok(segments) => {
            debug!("Fetched {video_id} from first listed track {language}");
            Ok(FetchedTranscript { segments, language })
        }
        Err(e) => {
            debug!("First listed track {language} for {video_id} failed: {e}");
            Err(not_found())
        }
    }
}

/// Language codes of every caption track, empty when listing fails
pub async fn available_languages(provider: &dyn TranscriptProvider, video_id: &str) -> Vec<String> {
    match provider.list(video_id).await {
        Ok(tracks) => tracks.into_iter().map(|t| t.language_code).collect(),
        Err(e) => {
            warn!("Listing languages for {video_id} failed: {e}");
            Vec::new()
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{ListingFailure, ScriptedProvider};
    use super::*;

    const VIDEO: &str = "dQw4w9WgXcQ";

    fn langs(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_preferred_languages_used_first() {
        let provider = ScriptedProvider::default().with_track("en", &["hello"]).with_track("ja", &["konnichiwa"]);
        let preferred = langs(&["ja", "en"]);

        let fetched = fetch_transcript(&provider, VIDEO, Some(preferred.as_slice())).await.unwrap();

        assert_eq!(fetched.language, "ja");
        assert_eq!(fetched.segments[0].text, "konnichiwa");
        assert_eq!(*provider.fetch_calls.lock(), vec![preferred]);
    }

    #[tokio::test]
    async fn test_reported_language_is_first_preference() {
        let provider = ScriptedProvider::default().with_track("en", &["hello"]);
        let preferred = langs(&["xx", "en"]);

        let fetched = fetch_transcript(&provider, VIDEO, Some(preferred.as_slice())).await.unwrap();

        assert_eq!(fetched.language, "xx");
        assert_eq!(fetched.segments[0].text, "hello");
    }

    #[tokio::test]
    async fn test_falls_back_to_default_order() {
        let provider = ScriptedProvider::default().with_track("es", &["hola"]).with_track("en", &["hello"]);
        let preferred = langs(&["ja"]);

        let fetched = fetch_transcript(&provider, VIDEO, Some(preferred.as_slice())).await.unwrap();

        assert_eq!(fetched.language, "en");
        assert_eq!(
            *provider.fetch_calls.lock(),
            vec![langs(&["ja"]), langs(&["pt"]), langs(&["en"])]
        );
    }

    #[tokio::test]
    async fn test_empty_preference_skips_preferred_attempt() {
        let provider = ScriptedProvider::default().with_track("pt", &["olá"]);

        let fetched = fetch_transcript(&provider, VIDEO, Some(&[][..])).await.unwrap();

        assert_eq!(fetched.language, "pt");
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_last_resort_uses_first_listed_track() {
        let provider = ScriptedProvider::default().with_track("ko", &["annyeong"]).with_track("ja", &["konnichiwa"]);

        let fetched = fetch_transcript(&provider, VIDEO, None).await.unwrap();

        assert_eq!(fetched.language, "ko");
        assert_eq!(fetched.segments[0].text, "annyeong");
        assert_eq!(provider.list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.fetch_count(), DEFAULT_LANGUAGES.len() + 1);
    }

    #[tokio::test]
    async fn test_no_tracks_is_not_found() {
        let provider = ScriptedProvider::default();

        let err = fetch_transcript(&provider, VIDEO, None).await.unwrap_err();

        assert!(matches!(err, FetchError::NoTranscriptFound { .. }));
    }

    #[tokio::test]
    async fn test_video_without_captions_is_not_found() {
        let provider = ScriptedProvider::default().failing_listing(ListingFailure::Disabled);
        let err = fetch_transcript(&provider, VIDEO, None).await.unwrap_err();
        assert!(matches!(err, FetchError::NoTranscriptFound { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_video_propagates() {
        let provider = ScriptedProvider::default().failing_listing(ListingFailure::Unavailable);
        let err = fetch_transcript(&provider, VIDEO, None).await.unwrap_err();
        assert!(matches!(err, FetchError::VideoUnavailable(_)));
    }

    #[tokio::test]
    async fn test_other_listing_failure_is_not_found() {
        let provider = ScriptedProvider::default().failing_listing(ListingFailure::Network);

        let err = fetch_transcript(&provider, VIDEO, None).await.unwrap_err();

        assert!(matches!(err, FetchError::NoTranscriptFound { .. }));
    }

    #[tokio::test]
    async fn test_available_languages() {
        let provider = ScriptedProvider::default().with_track("en", &["a"]).with_track("de", &["b"]);
        assert_eq!(available_languages(&provider, VIDEO).await, langs(&["en", "de"]));

        let provider = ScriptedProvider::default().failing_listing(ListingFailure::Unavailable);
        assert!(available_languages(&provider, VIDEO).await.is_empty());
    }
}
