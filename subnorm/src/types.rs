use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One timed subtitle entry. Times are seconds from the start of the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Cues in delivery order.
///
/// Order is whatever the source produced; the normalizer never re-sorts.
/// Consecutive cues may overlap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueSequence {
    cues: Vec<Cue>,
}

impl CueSequence {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn into_inner(self) -> Vec<Cue> {
        self.cues
    }
}

impl From<Vec<Cue>> for CueSequence {
    fn from(cues: Vec<Cue>) -> Self {
        Self::new(cues)
    }
}

impl<'a> IntoIterator for &'a CueSequence {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}

/// Source representation tag of a raw caption payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    TimedTextXml,
    TranscriptJson,
    TtmlXml,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::TimedTextXml => write!(f, "timedtext-xml"),
            PayloadKind::TranscriptJson => write!(f, "transcript-json"),
            PayloadKind::TtmlXml => write!(f, "ttml-xml"),
        }
    }
}

/// One record of a transcript API response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
    pub start: f64,
    #[serde(alias = "dur")]
    pub duration: f64,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Caption data as handed over by a caption provider, tagged with its format
#[derive(Debug, Clone, PartialEq)]
pub enum RawCaptionPayload {
    /// `<text start=".." dur="..">` elements, seconds as floats
    TimedTextXml { body: String },
    /// Already decoded transcript records
    TranscriptJson { entries: Vec<TranscriptEntry> },
    /// `<p begin=".." end="..">` elements in the TTML namespace
    TtmlXml { body: String },
}

impl RawCaptionPayload {
    pub fn timed_text(body: impl Into<String>) -> Self {
        Self::TimedTextXml { body: body.into() }
    }

    pub fn transcript(entries: Vec<TranscriptEntry>) -> Self {
        Self::TranscriptJson { entries }
    }

    pub fn ttml(body: impl Into<String>) -> Self {
        Self::TtmlXml { body: body.into() }
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            RawCaptionPayload::TimedTextXml { .. } => PayloadKind::TimedTextXml,
            RawCaptionPayload::TranscriptJson { .. } => PayloadKind::TranscriptJson,
            RawCaptionPayload::TtmlXml { .. } => PayloadKind::TtmlXml,
        }
    }
}

/// Output subtitle formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtitleType {
    /// SubRip
    Srt,
    /// WebVTT
    Vtt,
    /// Plain text, one cue per line
    Txt,
    /// JSON with timing information
    Json,
}

impl SubtitleType {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleType::Srt => "srt",
            SubtitleType::Vtt => "vtt",
            SubtitleType::Txt => "txt",
            SubtitleType::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            SubtitleType::Srt => "application/x-subrip",
            SubtitleType::Vtt => "text/vtt",
            SubtitleType::Txt => "text/plain",
            SubtitleType::Json => "application/json",
        }
    }
}

impl fmt::Display for SubtitleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtitleType::Srt => write!(f, "SRT"),
            SubtitleType::Vtt => write!(f, "VTT"),
            SubtitleType::Txt => write!(f, "TXT"),
            SubtitleType::Json => write!(f, "JSON"),
        }
    }
}

/// A rendered subtitle file ready to be handed to whatever exposes it to the user
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleDocument {
    pub filename: String,
    pub content: String,
    pub mime_type: &'static str,
    pub format: SubtitleType,
    pub cue_count: usize,
}

impl SubtitleDocument {
    pub fn new(stem: &str, format: SubtitleType, content: String, cue_count: usize) -> Self {
        Self {
            filename: format!("{}.{}", stem, format.extension()),
            content,
            mime_type: format.mime_type(),
            format,
            cue_count,
        }
    }
}

/// Whether a track was authored by a person or generated by speech recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptionKind {
    Manual,
    Automatic,
}

impl fmt::Display for CaptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptionKind::Manual => write!(f, "manual"),
            CaptionKind::Automatic => write!(f, "automatic"),
        }
    }
}

/// What a caption provider is asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRequest {
    pub video_id: String,
    pub language: String,
    pub kind: CaptionKind,
}

impl CaptionRequest {
    pub fn new(video_id: impl Into<String>, language: impl Into<String>, kind: CaptionKind) -> Self {
        Self {
            video_id: video_id.into(),
            language: language.into(),
            kind,
        }
    }
}

/// A track a provider can serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub video_id: String,
    pub language: String,
    pub kind: CaptionKind,
    pub path: PathBuf,
}

/// Configuration for normalization and fetching
#[derive(Debug, Clone)]
pub struct NormalizerOptions {
    /// Decode HTML entities left in cue text after XML unescaping
    pub decode_entities: bool,
    /// Remove inline markup such as `<i>` or `<font>` from cue text
    pub strip_tags: bool,
    /// Collapse runs of whitespace, including line breaks, into single spaces
    pub collapse_whitespace: bool,
    /// Fall back to automatic captions when no manual track exists
    pub allow_automatic: bool,
    /// Retries for provider errors classified as retryable
    pub max_retries: u32,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            decode_entities: true,
            strip_tags: false,
            collapse_whitespace: false,
            allow_automatic: true,
            max_retries: 3,
        }
    }
}

impl NormalizerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_entities(mut self, decode: bool) -> Self {
        self.decode_entities = decode;
        self
    }

    pub fn strip_tags(mut self, strip: bool) -> Self {
        self.strip_tags = strip;
        self
    }

    pub fn collapse_whitespace(mut self, collapse: bool) -> Self {
        self.collapse_whitespace = collapse;
        self
    }

    pub fn allow_automatic(mut self, allow: bool) -> Self {
        self.allow_automatic = allow;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_entry_null_text() {
        let entry: TranscriptEntry =
            serde_json::from_str(r#"{"text": null, "start": 1.0, "duration": 2.0}"#).unwrap();
        assert_eq!(entry.text, "");

        let entry: TranscriptEntry =
            serde_json::from_str(r#"{"start": 1.0, "dur": 0.5}"#).unwrap();
        assert_eq!(entry.text, "");
        assert_eq!(entry.duration, 0.5);
    }

    #[test]
    fn test_subtitle_document_naming() {
        let doc = SubtitleDocument::new("talk.en", SubtitleType::Srt, String::new(), 0);
        assert_eq!(doc.filename, "talk.en.srt");
        assert_eq!(doc.mime_type, "application/x-subrip");
    }

    #[test]
    fn test_options_builder() {
        let options = NormalizerOptions::new()
            .decode_entities(false)
            .strip_tags(true)
            .allow_automatic(false)
            .max_retries(1);

        assert!(!options.decode_entities);
        assert!(options.strip_tags);
        assert!(!options.collapse_whitespace);
        assert!(!options.allow_automatic);
        assert_eq!(options.max_retries, 1);
    }

    #[test]
    fn test_payload_kind() {
        assert_eq!(
            RawCaptionPayload::ttml("<tt/>").kind(),
            PayloadKind::TtmlXml
        );
        assert_eq!(PayloadKind::TranscriptJson.to_string(), "transcript-json");
    }
}
