use crate::error::{SubnormError, SubnormResult};
use crate::timestamp::parse_ttml_clock_time;
use crate::types::{Cue, CueSequence, NormalizerOptions, PayloadKind, RawCaptionPayload, TranscriptEntry};
use regex::{Captures, Regex};
use xml::name::OwnedName;
use xml::reader::{EventReader, XmlEvent};

/// TTML namespace, plus the draft namespace older producers still emit
const TTML_NAMESPACES: [&str; 2] = ["http://www.w3.org/ns/ttml", "http://www.w3.org/2006/10/ttaf1"];

/// Converts raw caption payloads into cue sequences.
///
/// Parsing is pure: the payload is only borrowed, nothing is logged and a
/// failure anywhere fails the whole payload. Cues keep their source order.
pub struct SubtitleNormalizer {
    options: NormalizerOptions,
    /// Regex for HTML/XML entity references left in cue text
    entity_regex: Regex,
    /// Regex for inline markup tags
    html_tag_regex: Regex,
}

impl Default for SubtitleNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtitleNormalizer {
    pub fn new() -> Self {
        Self::with_options(NormalizerOptions::default())
    }

    pub fn with_options(options: NormalizerOptions) -> Self {
        let entity_regex =
            Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("Valid entity regex");
        let html_tag_regex = Regex::new(r"<[^>]*>").expect("Valid HTML tag regex");

        Self {
            options,
            entity_regex,
            html_tag_regex,
        }
    }

    pub fn options(&self) -> &NormalizerOptions {
        &self.options
    }

    /// Parse a payload into cues, dispatching on its format tag
    pub fn parse(&self, payload: &RawCaptionPayload) -> SubnormResult<CueSequence> {
        let cues = match payload {
            RawCaptionPayload::TimedTextXml { body } => self.parse_timed_text(body)?,
            RawCaptionPayload::TranscriptJson { entries } => self.parse_transcript(entries)?,
            RawCaptionPayload::TtmlXml { body } => self.parse_ttml(body)?,
        };

        Ok(CueSequence::new(cues))
    }

    /// `<text start="1.5" dur="2.0">Hello</text>`; `dur` defaults to zero
    fn parse_timed_text(&self, body: &str) -> SubnormResult<Vec<Cue>> {
        let kind = PayloadKind::TimedTextXml;
        let elements = collect_elements(body, kind, |name| name.local_name == "text")?;

        let mut cues = Vec::with_capacity(elements.len());
        for (i, element) in elements.into_iter().enumerate() {
            let start_attr = element.attribute("start").ok_or_else(|| {
                SubnormError::malformed(kind, format!("text element {} has no start attribute", i + 1))
            })?;
            let start = parse_seconds(start_attr)?;
            let duration = match element.attribute("dur") {
                Some(dur) => parse_seconds(dur)?,
                None => 0.0,
            };

            cues.push(build_cue(i, start, start + duration, self.clean_text(&element.text))?);
        }

        Ok(cues)
    }

    fn parse_transcript(&self, entries: &[TranscriptEntry]) -> SubnormResult<Vec<Cue>> {
        entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                build_cue(
                    i,
                    entry.start,
                    entry.start + entry.duration,
                    self.clean_text(&entry.text),
                )
            })
            .collect()
    }

    /// `<p begin="00:00:01.000" end="00:00:02.500">Hello</p>` under the TTML namespace
    fn parse_ttml(&self, body: &str) -> SubnormResult<Vec<Cue>> {
        let kind = PayloadKind::TtmlXml;
        let elements = collect_elements(body, kind, |name| {
            name.local_name == "p"
                && name
                    .namespace
                    .as_deref()
                    .is_some_and(|ns| TTML_NAMESPACES.contains(&ns))
        })?;

        let mut cues = Vec::with_capacity(elements.len());
        for (i, element) in elements.into_iter().enumerate() {
            let begin = element.attribute("begin").ok_or_else(|| {
                SubnormError::malformed(kind, format!("p element {} has no begin attribute", i + 1))
            })?;
            let end = element.attribute("end").ok_or_else(|| {
                SubnormError::malformed(kind, format!("p element {} has no end attribute", i + 1))
            })?;

            let start = parse_ttml_clock_time(begin)?;
            let end = parse_ttml_clock_time(end)?;

            cues.push(build_cue(i, start, end, self.clean_text(&element.text))?);
        }

        Ok(cues)
    }

    fn clean_text(&self, text: &str) -> String {
        let mut text = if self.options.decode_entities {
            self.decode_entities(text)
        } else {
            text.to_string()
        };

        if self.options.strip_tags {
            text = self.html_tag_regex.replace_all(&text, "").to_string();
        }

        if self.options.collapse_whitespace {
            text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        text
    }

    /// Decode one level of entity references; unknown names are left untouched
    fn decode_entities(&self, text: &str) -> String {
        self.entity_regex
            .replace_all(text, |caps: &Captures| {
                let reference = &caps[1];
                let decoded = if let Some(hex) = reference
                    .strip_prefix("#x")
                    .or_else(|| reference.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .filter(|&c| is_xml_char(c))
                } else if let Some(dec) = reference.strip_prefix('#') {
                    dec.parse::<u32>()
                        .ok()
                        .and_then(char::from_u32)
                        .filter(|&c| is_xml_char(c))
                } else {
                    named_entity(reference)
                };

                match decoded {
                    Some(c) => c.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .to_string()
    }
}

fn named_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Characters allowed in an XML document; references to anything else stay undecoded
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{d7ff}' | '\u{e000}'..='\u{fffd}' | '\u{10000}'..='\u{10ffff}'
    )
}

fn parse_seconds(value: &str) -> SubnormResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| SubnormError::invalid_timestamp(value))
}

/// Validate timing for the cue at `position` (0-based) and build it
fn build_cue(position: usize, start: f64, end: f64, text: String) -> SubnormResult<Cue> {
    if !start.is_finite() || start < 0.0 {
        return Err(SubnormError::invalid_timestamp(start));
    }
    if !end.is_finite() || end < 0.0 {
        return Err(SubnormError::invalid_timestamp(end));
    }
    if end < start {
        return Err(SubnormError::InvalidCueTiming {
            index: position + 1,
            start,
            end,
        });
    }

    Ok(Cue::new(start, end, text))
}

/// A matched XML element: its attributes by local name and its text content
struct XmlElement {
    attributes: Vec<(String, String)>,
    text: String,
}

impl XmlElement {
    fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == local_name)
            .map(|(_, value)| value.as_str())
    }
}

/// Walk the whole document and collect every element accepted by `matches`.
///
/// Text of nested elements (`<span>`) is folded into the enclosing match and
/// `<br/>` becomes a line break. Source indentation around each line is
/// dropped. Any well-formedness error fails the payload.
fn collect_elements(
    body: &str,
    kind: PayloadKind,
    matches: impl Fn(&OwnedName) -> bool,
) -> SubnormResult<Vec<XmlElement>> {
    let reader = EventReader::new(body.as_bytes());
    let mut elements = Vec::new();
    let mut current: Option<XmlElement> = None;
    let mut depth = 0usize;

    for event in reader {
        let event = event.map_err(|e| SubnormError::malformed(kind, e.to_string()))?;

        match event {
            XmlEvent::StartElement {
                name, attributes, ..
            } => {
                if let Some(element) = current.as_mut() {
                    depth += 1;
                    if name.local_name == "br" {
                        element.text.push('\n');
                    }
                } else if matches(&name) {
                    current = Some(XmlElement {
                        attributes: attributes
                            .into_iter()
                            .map(|attr| (attr.name.local_name, attr.value))
                            .collect(),
                        text: String::new(),
                    });
                    depth = 0;
                }
            }
            XmlEvent::EndElement { .. } => {
                if current.is_some() {
                    if depth == 0 {
                        elements.extend(current.take().map(|mut element| {
                            element.text = trim_lines(&element.text);
                            element
                        }));
                    } else {
                        depth -= 1;
                    }
                }
            }
            XmlEvent::Characters(text) | XmlEvent::CData(text) | XmlEvent::Whitespace(text) => {
                if let Some(element) = current.as_mut() {
                    element.text.push_str(&text);
                }
            }
            _ => {}
        }
    }

    Ok(elements)
}

fn trim_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}
