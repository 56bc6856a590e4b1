use crate::error::{SubnormError, SubnormResult};
use crate::source::{decode_text, detect_payload};
use crate::types::{CaptionKind, CaptionRequest, CaptionTrack, NormalizerOptions, RawCaptionPayload};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// File extensions the local provider serves, in lookup order
const CAPTION_EXTENSIONS: [&str; 3] = ["xml", "ttml", "json"];

/// Source of raw caption payloads.
///
/// Implementations own fetching, retries and source fallback; they hand the
/// normalizer a payload tagged with its format.
pub trait CaptionProvider {
    fn fetch(
        &self,
        request: &CaptionRequest,
    ) -> impl Future<Output = SubnormResult<RawCaptionPayload>> + Send;

    fn list_tracks(
        &self,
        video_id: &str,
    ) -> impl Future<Output = SubnormResult<Vec<CaptionTrack>>> + Send;
}

/// Serves caption files from a directory.
///
/// Files are named `<video_id>.<lang>.<ext>` for manual tracks and
/// `<video_id>.<lang>.auto.<ext>` for automatic ones, with `ext` one of
/// `xml`, `ttml` or `json`.
#[derive(Debug, Clone)]
pub struct LocalCaptionProvider {
    root: PathBuf,
}

impl LocalCaptionProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_name(request: &CaptionRequest, extension: &str) -> String {
        match request.kind {
            CaptionKind::Manual => format!("{}.{}.{}", request.video_id, request.language, extension),
            CaptionKind::Automatic => {
                format!("{}.{}.auto.{}", request.video_id, request.language, extension)
            }
        }
    }

    /// Split `<lang>[.auto].<ext>` into its parts
    fn parse_track_name(rest: &str) -> Option<(String, CaptionKind)> {
        let parts: Vec<&str> = rest.split('.').collect();
        match parts.as_slice() {
            [lang, ext] if CAPTION_EXTENSIONS.contains(ext) => {
                Some((lang.to_string(), CaptionKind::Manual))
            }
            [lang, "auto", ext] if CAPTION_EXTENSIONS.contains(ext) => {
                Some((lang.to_string(), CaptionKind::Automatic))
            }
            _ => None,
        }
    }
}

impl CaptionProvider for LocalCaptionProvider {
    async fn fetch(&self, request: &CaptionRequest) -> SubnormResult<RawCaptionPayload> {
        for extension in CAPTION_EXTENSIONS {
            let path = self.root.join(Self::file_name(request, extension));

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            debug!("Read {} bytes from {}", bytes.len(), path.display());
            let content = decode_text(&bytes);

            return if extension == "json" {
                RawCaptionPayload::transcript_json_from_str(&content)
            } else {
                detect_payload(&content)
            };
        }

        Err(SubnormError::CaptionNotFound {
            video_id: request.video_id.clone(),
            language: request.language.clone(),
        })
    }

    async fn list_tracks(&self, video_id: &str) -> SubnormResult<Vec<CaptionTrack>> {
        let prefix = format!("{}.", video_id);
        let mut tracks = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };

            if let Some((language, kind)) = Self::parse_track_name(rest) {
                tracks.push(CaptionTrack {
                    video_id: video_id.to_string(),
                    language,
                    kind,
                    path: entry.path(),
                });
            }
        }

        tracks.sort_by(|a, b| {
            a.language
                .cmp(&b.language)
                .then_with(|| (a.kind == CaptionKind::Automatic).cmp(&(b.kind == CaptionKind::Automatic)))
        });
        tracks.dedup_by(|a, b| a.language == b.language && a.kind == b.kind);

        Ok(tracks)
    }
}

/// Fetch a track, retrying errors the provider marks as retryable
pub async fn fetch_with_retry<P: CaptionProvider>(
    provider: &P,
    request: &CaptionRequest,
    max_retries: u32,
) -> SubnormResult<RawCaptionPayload> {
    let mut retries = 0;

    loop {
        match provider.fetch(request).await {
            Ok(payload) => return Ok(payload),
            Err(e) => {
                if retries >= max_retries || !e.is_retryable() {
                    return Err(e);
                }

                retries += 1;
                let delay = e.retry_delay().unwrap_or(1);

                debug!(
                    "Retrying in {}s (attempt {} of {})",
                    delay, retries, max_retries
                );
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
        }
    }
}

/// Fetch the manual track for a language, falling back to the automatic one
/// when the options allow it
pub async fn fetch_preferred<P: CaptionProvider>(
    provider: &P,
    video_id: &str,
    language: &str,
    options: &NormalizerOptions,
) -> SubnormResult<(CaptionKind, RawCaptionPayload)> {
    let manual = CaptionRequest::new(video_id, language, CaptionKind::Manual);

    match fetch_with_retry(provider, &manual, options.max_retries).await {
        Ok(payload) => Ok((CaptionKind::Manual, payload)),
        Err(SubnormError::CaptionNotFound { .. }) if options.allow_automatic => {
            info!(
                "No manual {} captions for {}, trying automatic captions",
                language, video_id
            );
            let automatic = CaptionRequest::new(video_id, language, CaptionKind::Automatic);
            let payload = fetch_with_retry(provider, &automatic, options.max_retries).await?;
            Ok((CaptionKind::Automatic, payload))
        }
        Err(e) => Err(e),
    }
}
