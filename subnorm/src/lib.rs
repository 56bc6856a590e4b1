pub mod error;
pub mod normalizer;
pub mod provider;
pub mod serializer;
pub mod source;
pub mod timestamp;
pub mod types;

pub use error::{SubnormError, SubnormResult};
pub use normalizer::SubtitleNormalizer;
pub use provider::{CaptionProvider, LocalCaptionProvider};
pub use serializer::{render, to_json, to_srt, to_txt, to_vtt};
pub use timestamp::{format_timestamp, format_vtt_timestamp, parse_ttml_clock_time};
pub use types::{
    CaptionKind, CaptionRequest, CaptionTrack, Cue, CueSequence, NormalizerOptions, PayloadKind,
    RawCaptionPayload, SubtitleDocument, SubtitleType, TranscriptEntry,
};

use provider::fetch_preferred;
use tracing::{debug, info};

/// Turns caption payloads into subtitle documents
pub struct Subnorm {
    normalizer: SubtitleNormalizer,
}

impl Default for Subnorm {
    fn default() -> Self {
        Self::new(NormalizerOptions::default())
    }
}

impl Subnorm {
    pub fn new(options: NormalizerOptions) -> Self {
        Self {
            normalizer: SubtitleNormalizer::with_options(options),
        }
    }

    pub fn options(&self) -> &NormalizerOptions {
        self.normalizer.options()
    }

    /// Parse a payload into cues
    pub fn parse(&self, payload: &RawCaptionPayload) -> SubnormResult<CueSequence> {
        debug!("Parsing {} payload", payload.kind());
        let cues = self.normalizer.parse(payload)?;
        debug!("Parsed {} cues", cues.len());
        Ok(cues)
    }

    /// Parse a payload and render it as a document named `<stem>.<ext>`
    pub fn convert(
        &self,
        payload: &RawCaptionPayload,
        format: SubtitleType,
        stem: &str,
        language: &str,
    ) -> SubnormResult<SubtitleDocument> {
        info!("Converting {} payload to {}", payload.kind(), format);

        let cues = self.parse(payload)?;
        let content = render(&cues, format, language)?;

        Ok(SubtitleDocument::new(stem, format, content, cues.len()))
    }

    /// Parse once and render every requested format
    pub fn convert_many(
        &self,
        payload: &RawCaptionPayload,
        formats: &[SubtitleType],
        stem: &str,
        language: &str,
    ) -> SubnormResult<Vec<SubtitleDocument>> {
        info!("Converting {} payload to {:?}", payload.kind(), formats);

        let cues = self.parse(payload)?;
        formats
            .iter()
            .map(|&format| {
                let content = render(&cues, format, language)?;
                Ok(SubtitleDocument::new(stem, format, content, cues.len()))
            })
            .collect()
    }

    /// Convert text content of a known or detected payload kind
    pub fn convert_str(
        &self,
        content: &str,
        kind: Option<PayloadKind>,
        format: SubtitleType,
        stem: &str,
        language: &str,
    ) -> SubnormResult<SubtitleDocument> {
        let payload = RawCaptionPayload::from_content(content, kind)?;
        self.convert(&payload, format, stem, language)
    }

    /// Fetch the preferred track for a video through a provider
    pub async fn fetch<P: CaptionProvider>(
        &self,
        provider: &P,
        video_id: &str,
        language: &str,
    ) -> SubnormResult<(CaptionKind, RawCaptionPayload)> {
        info!("Fetching {} captions for video {}", language, video_id);
        fetch_preferred(provider, video_id, language, self.options()).await
    }

    /// Fetch the preferred track and render it as `<video_id>.<language>.<ext>`
    pub async fn fetch_and_convert<P: CaptionProvider>(
        &self,
        provider: &P,
        video_id: &str,
        language: &str,
        format: SubtitleType,
    ) -> SubnormResult<SubtitleDocument> {
        let (kind, payload) = self.fetch(provider, video_id, language).await?;
        debug!("Using {} track", kind);

        let stem = format!("{}.{}", video_id, language);
        self.convert(&payload, format, &stem, language)
    }
}

// Convenience functions for one-off operations

/// Parse a payload with default options
pub fn parse(payload: &RawCaptionPayload) -> SubnormResult<CueSequence> {
    SubtitleNormalizer::new().parse(payload)
}

/// Parse a payload with default options and serialize it as SubRip
pub fn payload_to_srt(payload: &RawCaptionPayload) -> SubnormResult<String> {
    to_srt(&parse(payload)?)
}
