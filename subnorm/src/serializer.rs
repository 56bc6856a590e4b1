//! Rendering of cue sequences into subtitle file formats.
//!
//! SubRip output: every block, the last one included, is terminated by a blank
//! line (`"\n\n"`), and an empty sequence renders as an empty string. Cue
//! indices are assigned here, 1-based, in sequence order.

use crate::error::{SubnormError, SubnormResult};
use crate::timestamp::{format_timestamp, format_vtt_timestamp};
use crate::types::{Cue, CueSequence, SubtitleType};

/// Render cues in the requested format
pub fn render(cues: &CueSequence, format: SubtitleType, language: &str) -> SubnormResult<String> {
    match format {
        SubtitleType::Srt => to_srt(cues),
        SubtitleType::Vtt => to_vtt(cues),
        SubtitleType::Txt => Ok(to_txt(cues)),
        SubtitleType::Json => to_json(cues, language),
    }
}

/// Serialize cues as SubRip text
pub fn to_srt(cues: &CueSequence) -> SubnormResult<String> {
    let mut result = String::new();

    for (i, cue) in cues.iter().enumerate() {
        let (start, end) = checked_range(i, cue, format_timestamp)?;

        result.push_str(&format!("{}\n", i + 1));
        result.push_str(&format!("{} --> {}\n", start, end));
        result.push_str(&block_text(&cue.text));
        result.push_str("\n\n");
    }

    Ok(result)
}

/// Serialize cues as WebVTT
pub fn to_vtt(cues: &CueSequence) -> SubnormResult<String> {
    let mut result = String::from("WEBVTT\n\n");

    for (i, cue) in cues.iter().enumerate() {
        let (start, end) = checked_range(i, cue, format_vtt_timestamp)?;

        result.push_str(&format!("{} --> {}\n", start, end));
        result.push_str(&block_text(&cue.text));
        result.push_str("\n\n");
    }

    Ok(result)
}

/// Cue texts only, one per line
pub fn to_txt(cues: &CueSequence) -> String {
    let texts: Vec<&str> = cues.iter().map(|cue| cue.text.as_str()).collect();
    texts.join("\n")
}

/// Cues with their timing as pretty-printed JSON
pub fn to_json(cues: &CueSequence, language: &str) -> SubnormResult<String> {
    let json_entries: Vec<serde_json::Value> = cues
        .iter()
        .map(|cue| {
            serde_json::json!({
                "start": cue.start,
                "end": cue.end,
                "text": cue.text
            })
        })
        .collect();

    let result = serde_json::json!({
        "language": language,
        "entries": json_entries
    });

    serde_json::to_string_pretty(&result).map_err(SubnormError::from)
}

/// Format both ends of a cue and make sure it does not run backwards
fn checked_range(
    position: usize,
    cue: &Cue,
    format: fn(f64) -> SubnormResult<String>,
) -> SubnormResult<(String, String)> {
    let start = format(cue.start)?;
    let end = format(cue.end)?;

    if cue.end < cue.start {
        return Err(SubnormError::InvalidCueTiming {
            index: position + 1,
            start: cue.start,
            end: cue.end,
        });
    }

    Ok((start, end))
}

/// Cue text with unified line endings and no blank lines, which would end the block
fn block_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CueSequence {
        CueSequence::new(vec![Cue::new(1.0, 3.0, "Hi"), Cue::new(5.0, 6.0, "Bye")])
    }

    #[test]
    fn test_to_srt() {
        let srt = to_srt(&sample()).unwrap();
        assert_eq!(
            srt,
            "1\n00:00:01,000 --> 00:00:03,000\nHi\n\n2\n00:00:05,000 --> 00:00:06,000\nBye\n\n"
        );
    }

    #[test]
    fn test_to_srt_empty_sequence() {
        assert_eq!(to_srt(&CueSequence::default()).unwrap(), "");
    }

    #[test]
    fn test_to_srt_is_deterministic() {
        let cues = sample();
        assert_eq!(to_srt(&cues).unwrap(), to_srt(&cues).unwrap());
    }

    #[test]
    fn test_to_srt_rejects_reversed_cue() {
        let cues = CueSequence::new(vec![Cue::new(1.0, 2.0, "ok"), Cue::new(5.0, 4.0, "bad")]);
        let err = to_srt(&cues).unwrap_err();
        assert!(matches!(
            err,
            SubnormError::InvalidCueTiming { index: 2, .. }
        ));
    }

    #[test]
    fn test_to_srt_rejects_negative_timestamp() {
        let cues = CueSequence::new(vec![Cue::new(-1.0, 2.0, "bad")]);
        assert!(matches!(
            to_srt(&cues),
            Err(SubnormError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_to_srt_multiline_text() {
        let cues = CueSequence::new(vec![Cue::new(0.0, 1.0, "first\r\n\r\nsecond\n")]);
        assert_eq!(
            to_srt(&cues).unwrap(),
            "1\n00:00:00,000 --> 00:00:01,000\nfirst\nsecond\n\n"
        );
    }

    #[test]
    fn test_to_srt_overlapping_cues() {
        let cues = CueSequence::new(vec![Cue::new(0.0, 4.0, "a"), Cue::new(2.0, 3.0, "b")]);
        let srt = to_srt(&cues).unwrap();
        assert!(srt.contains("00:00:02,000 --> 00:00:03,000"));
    }

    #[test]
    fn test_to_vtt() {
        let vtt = to_vtt(&sample()).unwrap();
        assert_eq!(
            vtt,
            "WEBVTT\n\n00:00:01.000 --> 00:00:03.000\nHi\n\n00:00:05.000 --> 00:00:06.000\nBye\n\n"
        );
    }

    #[test]
    fn test_to_txt() {
        assert_eq!(to_txt(&sample()), "Hi\nBye");
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&sample(), "en").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["language"], "en");
        assert_eq!(value["entries"][1]["text"], "Bye");
        assert_eq!(value["entries"][0]["end"], 3.0);
    }

    #[test]
    fn test_render_dispatch() {
        let cues = sample();
        assert!(render(&cues, SubtitleType::Vtt, "en").unwrap().starts_with("WEBVTT"));
        assert_eq!(render(&cues, SubtitleType::Txt, "en").unwrap(), "Hi\nBye");
    }
}
