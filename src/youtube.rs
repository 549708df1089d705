use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;

use crate::CaptionSegment;
use crate::fetcher::{CaptionTrack, FetchError, TranscriptProvider};

const WATCH_URL: &str = "https://www.youtube.com/watch";
const PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const CLIENT_VERSION: &str = "2.20241126.01.00";

/// A video's track listing is reused for this long across fallback attempts.
const TRACK_MEMO_TTL: Duration = Duration::from_secs(60);
const TRACK_MEMO_CAPACITY: usize = 256;

static API_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("api key pattern is valid"));
static API_KEY_FALLBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).expect("api key pattern is valid"));

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    #[serde(rename = "playabilityStatus")]
    playability_status: Option<PlayabilityStatus>,
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<PlayerCaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct PlayerCaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    name: Option<TrackName>,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackName {
    #[serde(rename = "simpleText")]
    simple_text: Option<String>,
    runs: Option<Vec<TextRun>>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl PlayerCaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    fn display_name(&self) -> String {
        self.name
            .as_ref()
            .and_then(|n| {
                n.simple_text
                    .clone()
                    .or_else(|| n.runs.as_ref().map(|r| r.iter().map(|t| t.text.as_str()).collect()))
            })
            .unwrap_or_else(|| self.language_code.clone())
    }
}

/// Definitive outcome of asking the player endpoint for a video's tracks
#[derive(Clone)]
enum Listing {
    Tracks(Arc<Vec<PlayerCaptionTrack>>),
    Disabled,
    Unavailable,
}

impl Listing {
    fn into_result(self, video_id: &str) -> Result<Arc<Vec<PlayerCaptionTrack>>, FetchError> {
        match self {
            Listing::Tracks(tracks) => Ok(tracks),
            Listing::Disabled => Err(FetchError::TranscriptsDisabled(video_id.to_string())),
            Listing::Unavailable => Err(FetchError::VideoUnavailable(video_id.to_string())),
        }
    }
}

/// Short-lived per-video listings, so one request's attempts share a single lookup
#[derive(Default)]
struct TrackMemo {
    entries: Mutex<HashMap<String, (Instant, Listing)>>,
}

impl TrackMemo {
    fn get_at(&self, video_id: &str, now: Instant) -> Option<Listing> {
        let entries = self.entries.lock();
        entries
            .get(video_id)
            .filter(|(stored_at, _)| now.saturating_duration_since(*stored_at) < TRACK_MEMO_TTL)
            .map(|(_, listing)| listing.clone())
    }

    fn put_at(&self, video_id: &str, listing: Listing, now: Instant) {
        let mut entries = self.entries.lock();
        if entries.len() >= TRACK_MEMO_CAPACITY && !entries.contains_key(video_id) {
            entries.retain(|_, (stored_at, _)| now.saturating_duration_since(*stored_at) < TRACK_MEMO_TTL);
        }
        if entries.len() >= TRACK_MEMO_CAPACITY && !entries.contains_key(video_id) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (stored_at, _))| *stored_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(video_id.to_string(), (now, listing));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Transcript provider backed by YouTube's InnerTube player endpoint
pub struct YouTubeProvider {
    client: reqwest::Client,
    tracks: TrackMemo,
}

impl YouTubeProvider {
    /// `client` carries the browser-like default headers set at startup
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            tracks: TrackMemo::default(),
        }
    }

    async fn caption_tracks(&self, video_id: &str) -> Result<Arc<Vec<PlayerCaptionTrack>>, FetchError> {
        if !crate::is_video_id(video_id) {
            return Err(FetchError::InvalidVideoId(video_id.to_string()));
        }

        if let Some(listing) = self.tracks.get_at(video_id, Instant::now()) {
            debug!("Reusing caption track listing for {video_id}");
            return listing.into_result(video_id);
        }

        let listing = match self.request_caption_tracks(video_id).await {
            Ok(tracks) => Listing::Tracks(Arc::new(tracks)),
            Err(FetchError::TranscriptsDisabled(_)) => Listing::Disabled,
            Err(FetchError::VideoUnavailable(_)) => Listing::Unavailable,
            // transient failures are retried by the next attempt
            Err(e) => return Err(e),
        };
        self.tracks.put_at(video_id, listing.clone(), Instant::now());
        listing.into_result(video_id)
    }

    async fn request_caption_tracks(&self, video_id: &str) -> Result<Vec<PlayerCaptionTrack>, FetchError> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        debug!("Fetching watch page for {video_id}");
        let page_html = self
            .client
            .get(WATCH_URL)
            .query(&[("v", video_id)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key: {api_key}");

        // Step 2: Call InnerTube player endpoint
        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": "en",
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": CLIENT_VERSION
                }
            },
            "videoId": video_id
        });

        let resp: InnerTubePlayerResponse = self
            .client
            .post(PLAYER_URL)
            .query(&[("key", api_key.as_str()), ("prettyPrint", "false")])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        caption_tracks_from_response(video_id, resp)
    }
}

#[async_trait]
impl TranscriptProvider for YouTubeProvider {
    async fn list(&self, video_id: &str) -> Result<Vec<CaptionTrack>, FetchError> {
        let tracks = self.caption_tracks(video_id).await?;
        Ok(tracks
            .iter()
            .map(|t| CaptionTrack {
                language_code: t.language_code.clone(),
                name: t.display_name(),
                is_generated: t.is_generated(),
            })
            .collect())
    }

    async fn fetch(&self, video_id: &str, languages: &[String]) -> Result<Vec<CaptionSegment>, FetchError> {
        let tracks = self.caption_tracks(video_id).await?;
        let Some(track) = select_track(&tracks, languages) else {
            return Err(FetchError::NoTranscriptFound {
                video_id: video_id.to_string(),
                languages: languages.to_vec(),
            });
        };
        debug!(
            "Using caption track: lang={} generated={}",
            track.language_code,
            track.is_generated()
        );

        // Step 3: Fetch the caption XML
        let caption_xml = self
            .client
            .get(&track.base_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_caption_xml(&caption_xml)
    }
}

fn caption_tracks_from_response(
    video_id: &str,
    resp: InnerTubePlayerResponse,
) -> Result<Vec<PlayerCaptionTrack>, FetchError> {
    if let Some(status) = resp.playability_status.as_ref().filter(|s| s.status != "OK") {
        debug!(
            "Video {video_id} not playable: {} ({})",
            status.status,
            status.reason.as_deref().unwrap_or("no reason given")
        );
        return Err(FetchError::VideoUnavailable(video_id.to_string()));
    }

    let tracks = resp
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .and_then(|r| r.caption_tracks)
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(FetchError::TranscriptsDisabled(video_id.to_string()));
    }
    Ok(tracks)
}

/// First requested language wins; within a language, manual tracks beat generated ones
fn select_track<'a>(tracks: &'a [PlayerCaptionTrack], languages: &[String]) -> Option<&'a PlayerCaptionTrack> {
    languages.iter().find_map(|lang| {
        let mut matching = tracks.iter().filter(|t| &t.language_code == lang);
        let first = matching.clone().find(|t| !t.is_generated());
        first.or_else(|| matching.next())
    })
}

fn extract_api_key(html: &str) -> Result<String, FetchError> {
    API_KEY
        .captures(html)
        .or_else(|| API_KEY_FALLBACK.captures(html))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| FetchError::Upstream("could not extract InnerTube API key from watch page".to_string()))
}

fn parse_caption_xml(xml: &str) -> Result<Vec<CaptionSegment>, FetchError> {
    use quick_xml::Reader;
    use quick_xml::events::{BytesStart, Event};

    fn timing(e: &BytesStart<'_>) -> (f64, f64) {
        let mut start = 0.0;
        let mut dur = 0.0;
        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).parse::<f64>().ok();
            match attr.key.as_ref() {
                b"start" => start = value.unwrap_or(0.0),
                b"dur" => dur = value.unwrap_or(0.0),
                _ => {}
            }
        }
        (start, dur)
    }

    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<(f64, f64, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                let (start, duration) = timing(e);
                current = Some((start, duration, String::new()));
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"text" => {
                let (start, duration) = timing(e);
                segments.push(CaptionSegment {
                    text: String::new(),
                    start,
                    duration,
                });
            }
            Ok(Event::Text(ref e)) => {
                if let Some((_, _, text)) = current.as_mut() {
                    let raw_text = e.unescape().unwrap_or_default();
                    text.push_str(&html_escape::decode_html_entities(&raw_text));
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                if let Some((start, duration, text)) = current.take() {
                    segments.push(CaptionSegment { text, start, duration });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::Upstream(format!("error parsing caption XML: {e}"))),
            _ => {}
        }
    }

    Ok(segments)
}
