use crate::error::{SubnormError, SubnormResult};
use crate::types::{PayloadKind, RawCaptionPayload, TranscriptEntry};
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};
use tracing::{debug, warn};

/// Decode raw caption bytes into text.
///
/// A BOM decides the encoding when present. Even-length data containing NUL
/// bytes is tried as UTF-16 next, with the byte order taken from where the NULs
/// fall. Otherwise UTF-8 is tried, and anything else is read as Windows-1252,
/// which maps every byte.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if !had_errors {
            debug!("Decoded caption data using {} BOM", encoding.name());
            return decoded.into_owned();
        }
    }

    if let Some(encoding) = guess_utf16(bytes) {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(bytes);
        if !had_errors {
            debug!("Successfully decoded using {}", encoding.name());
            return decoded.into_owned();
        }
    }

    let (decoded, had_errors) = UTF_8.decode_without_bom_handling(bytes);
    if !had_errors {
        return decoded.into_owned();
    }

    warn!("Caption data is not valid UTF-8, decoding as windows-1252");
    let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    decoded.into_owned()
}

/// UTF-16 text without a BOM; mostly-ASCII content leaves NULs in every other byte
fn guess_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.is_empty() || bytes.len() % 2 != 0 || !bytes.contains(&0) {
        return None;
    }

    let even_nuls = bytes.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_nuls = bytes.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();

    Some(if odd_nuls >= even_nuls {
        UTF_16LE
    } else {
        UTF_16BE
    })
}

/// Guess the payload format from the content itself.
///
/// Content matching none of the formats fails with `UnrecognizedPayload`
/// rather than blaming a particular format.
pub fn detect_payload(content: &str) -> SubnormResult<RawCaptionPayload> {
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return RawCaptionPayload::transcript_json_from_str(trimmed);
    }

    if trimmed.starts_with('<') {
        if trimmed.contains("http://www.w3.org/ns/ttml")
            || trimmed.contains("http://www.w3.org/2006/10/ttaf1")
            || trimmed.contains("<tt ")
            || trimmed.contains("<tt>")
            || trimmed.contains("<tt/>")
            || trimmed.contains("<tt:tt")
        {
            debug!("Detected TTML caption data");
            return Ok(RawCaptionPayload::ttml(content));
        }

        if trimmed.contains("<transcript") || trimmed.contains("<text") {
            debug!("Detected timed-text caption data");
            return Ok(RawCaptionPayload::timed_text(content));
        }
    }

    Err(SubnormError::UnrecognizedPayload {
        message: "content is neither timed-text XML, TTML nor transcript JSON".to_string(),
    })
}

impl RawCaptionPayload {
    /// Wrap text content as a payload of the given kind, detecting it when unknown
    pub fn from_content(content: &str, kind: Option<PayloadKind>) -> SubnormResult<Self> {
        match kind {
            Some(PayloadKind::TimedTextXml) => Ok(Self::timed_text(content)),
            Some(PayloadKind::TtmlXml) => Ok(Self::ttml(content)),
            Some(PayloadKind::TranscriptJson) => Self::transcript_json_from_str(content),
            None => detect_payload(content),
        }
    }

    /// Decode a transcript API response.
    ///
    /// Accepts a bare array of `{text, start, duration}` records or an object
    /// wrapping that array under `transcript` or `entries`.
    pub fn transcript_json_from_str(content: &str) -> SubnormResult<Self> {
        let kind = PayloadKind::TranscriptJson;
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| SubnormError::malformed(kind, e.to_string()))?;

        let entries = match value {
            serde_json::Value::Array(items) => serde_json::Value::Array(items),
            serde_json::Value::Object(mut map) => map
                .remove("transcript")
                .or_else(|| map.remove("entries"))
                .ok_or_else(|| SubnormError::malformed(kind, "no transcript or entries array"))?,
            _ => return Err(SubnormError::malformed(kind, "expected an array of entries")),
        };

        let entries: Vec<TranscriptEntry> =
            serde_json::from_value(entries).map_err(|e| SubnormError::malformed(kind, e.to_string()))?;

        Ok(Self::transcript(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_utf8() {
        assert_eq!(decode_text("héllo".as_bytes()), "héllo");

        let mut with_bom = vec![0xEF, 0xBB, 0xBF];
        with_bom.extend_from_slice(b"<transcript/>");
        assert_eq!(decode_text(&with_bom), "<transcript/>");
    }

    #[test]
    fn test_decode_text_legacy() {
        // "café" in Windows-1252
        assert_eq!(decode_text(&[0x63, 0x61, 0x66, 0xE9]), "café");
        // Bytes undefined in ISO-8859-1 still decode
        assert_eq!(decode_text(&[0x80, 0x20, 0x41]), "€ A");
    }

    #[test]
    fn test_decode_text_utf16_without_bom() {
        let le: Vec<u8> = "<tt/>".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_text(&le), "<tt/>");

        let be: Vec<u8> = "<tt/>".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        assert_eq!(decode_text(&be), "<tt/>");
    }

    #[test]
    fn test_detect_payload() {
        let ttml = r#"<?xml version="1.0"?><tt xmlns="http://www.w3.org/ns/ttml"></tt>"#;
        assert_eq!(detect_payload(ttml).unwrap().kind(), PayloadKind::TtmlXml);

        let timed = r#"<?xml version="1.0"?><transcript><text start="1">a</text></transcript>"#;
        assert_eq!(
            detect_payload(timed).unwrap().kind(),
            PayloadKind::TimedTextXml
        );

        let json = r#"  [{"text": "Hi", "start": 1.0, "duration": 2.0}]"#;
        assert_eq!(
            detect_payload(json).unwrap(),
            RawCaptionPayload::transcript(vec![TranscriptEntry::new("Hi", 1.0, 2.0)])
        );

        for content in ["1\n00:00:01,000 --> 00:00:02,000\nhi\n", "<html></html>", ""] {
            assert!(
                matches!(
                    detect_payload(content),
                    Err(SubnormError::UnrecognizedPayload { .. })
                ),
                "Should be unrecognized: {:?}",
                content
            );
        }
    }

    #[test]
    fn test_from_content_with_explicit_kind() {
        // Explicit kinds skip detection, so parsing decides whether the body is usable
        let payload =
            RawCaptionPayload::from_content("<tt/>", Some(PayloadKind::TimedTextXml)).unwrap();
        assert_eq!(payload.kind(), PayloadKind::TimedTextXml);

        assert!(RawCaptionPayload::from_content("<tt/>", Some(PayloadKind::TranscriptJson)).is_err());
        assert_eq!(
            RawCaptionPayload::from_content("<tt/>", None).unwrap().kind(),
            PayloadKind::TtmlXml
        );
    }

    #[test]
    fn test_transcript_json_wrapped() {
        let payload = RawCaptionPayload::transcript_json_from_str(
            r#"{"transcript": [{"text": null, "start": 0.5, "dur": 1.0}]}"#,
        )
        .unwrap();
        assert_eq!(
            payload,
            RawCaptionPayload::transcript(vec![TranscriptEntry::new("", 0.5, 1.0)])
        );
    }

    #[test]
    fn test_transcript_json_malformed() {
        for content in [
            "[{\"text\": \"Hi\"",
            r#"{"items": []}"#,
            r#"[{"text": "Hi"}]"#,
            "42",
        ] {
            let err = RawCaptionPayload::transcript_json_from_str(content).unwrap_err();
            assert!(
                matches!(
                    err,
                    SubnormError::MalformedCaptionData {
                        format: PayloadKind::TranscriptJson,
                        ..
                    }
                ),
                "Should be malformed: {}",
                content
            );
        }
    }
}
