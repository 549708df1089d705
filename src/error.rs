//! User-facing error kinds and their JSON rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::fetcher::FetchError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing URL")]
    MissingUrl,

    #[error("could not extract a video id")]
    InvalidUrl,

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("transcripts disabled")]
    TranscriptsDisabled,

    #[error("transcript not found")]
    TranscriptNotFound,

    #[error("video unavailable")]
    VideoUnavailable,

    #[error("invalid video id")]
    InvalidVideoId,

    #[error("processing error: {0}")]
    Processing(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("rate limited")]
    RateLimited,
}

impl ApiError {
    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MissingUrl | ApiError::InvalidUrl | ApiError::MalformedBody(_) => "invalid_url",
            ApiError::TranscriptsDisabled => "transcripts_disabled",
            ApiError::TranscriptNotFound => "transcript_not_found",
            ApiError::VideoUnavailable => "video_unavailable",
            ApiError::InvalidVideoId => "invalid_video_id",
            ApiError::Processing(_) => "processing_error",
            ApiError::Internal(_) => "internal_error",
            ApiError::RateLimited => "rate_limited",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::MissingUrl => "Please provide a YouTube URL or video ID.".to_string(),
            ApiError::InvalidUrl => "Could not extract the video ID. Check that the URL is correct.".to_string(),
            ApiError::MalformedBody(detail) => format!("The request body is malformed: {detail}"),
            ApiError::TranscriptsDisabled => "This video does not have transcripts available.".to_string(),
            ApiError::TranscriptNotFound => "Could not find a transcript in the requested language.".to_string(),
            ApiError::VideoUnavailable => "The video is private, was removed, or does not exist.".to_string(),
            ApiError::InvalidVideoId => "The YouTube link provided is invalid.".to_string(),
            ApiError::Processing(detail) => format!("An unexpected error occurred: {detail}"),
            ApiError::Internal(detail) => format!("Error processing request: {detail}"),
            ApiError::RateLimited => "You have reached the request limit. Please wait a moment.".to_string(),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::TranscriptsDisabled(_) => ApiError::TranscriptsDisabled,
            FetchError::NoTranscriptFound { .. } => ApiError::TranscriptNotFound,
            FetchError::VideoUnavailable(_) => ApiError::VideoUnavailable,
            FetchError::InvalidVideoId(_) => ApiError::InvalidVideoId,
            other => ApiError::Processing(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self {
            success: false,
            error: err.kind(),
            message: err.message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_classifies_fetch_errors() {
        let id = "dQw4w9WgXcQ".to_string();
        let cases = [
            (FetchError::TranscriptsDisabled(id.clone()), "transcripts_disabled"),
            (
                FetchError::NoTranscriptFound {
                    video_id: id.clone(),
                    languages: vec![],
                },
                "transcript_not_found",
            ),
            (FetchError::VideoUnavailable(id.clone()), "video_unavailable"),
            (FetchError::InvalidVideoId(id.clone()), "invalid_video_id"),
            (FetchError::Upstream("bad json".to_string()), "processing_error"),
            (FetchError::TimedOut(Duration::from_secs(30)), "processing_error"),
        ];

        for (err, kind) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.kind(), kind);
            assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_processing_error_keeps_upstream_message() {
        let api = ApiError::from(FetchError::Upstream("caption XML truncated".to_string()));
        assert!(api.message().contains("caption XML truncated"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidUrl.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingUrl.kind(), "invalid_url");
        assert_eq!(ApiError::MalformedBody("bad".into()).kind(), "invalid_url");
        assert_eq!(ApiError::Internal("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_malformed_body_message_names_the_problem() {
        let err = ApiError::MalformedBody("invalid type: null, expected a boolean".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("malformed"));
        assert!(err.message().contains("expected a boolean"));
        assert_ne!(err.message(), ApiError::MissingUrl.message());
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ErrorResponse::from(&ApiError::TranscriptNotFound)).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "transcript_not_found");
        assert!(body["message"].as_str().unwrap().contains("transcript"));
    }
}
