use crate::CaptionSegment;

/// Render segments one per line, optionally prefixed with `[MM:SS]` / `[HH:MM:SS]`
///
/// Segments whose text is empty after trimming are dropped.
pub fn render_transcript(segments: &[CaptionSegment], include_timestamps: bool) -> String {
    segments
        .iter()
        .filter_map(|s| {
            let text = s.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(if include_timestamps {
                format!("[{}] {text}", format_timestamp(s.start))
            } else {
                text.to_string()
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format seconds as `MM:SS`, or `HH:MM:SS` from one hour up
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
