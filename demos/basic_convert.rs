use subnorm::{
    NormalizerOptions, RawCaptionPayload, Subnorm, SubtitleType, TranscriptEntry, format_timestamp,
};

const TTML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<tt xmlns="http://www.w3.org/ns/ttml" xml:lang="en">
  <body>
    <div>
      <p begin="00:00:00.500" end="00:00:02.000">Welcome back</p>
      <p begin="00:00:02.000" end="00:00:04.250">to the <span>channel</span><br/>everyone</p>
    </div>
  </body>
</tt>"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Testing caption normalization");
    println!("Timestamp for 3661.5s: {}", format_timestamp(3661.5)?);
    println!();

    // Create options
    let options = NormalizerOptions::new()
        .decode_entities(true) // Decode leftover &amp;#39; style entities
        .collapse_whitespace(false); // Keep line breaks from <br/>

    let subnorm = Subnorm::new(options);

    // TTML payload, as a caption provider would hand it over
    let document = subnorm.convert(&RawCaptionPayload::ttml(TTML), SubtitleType::Srt, "welcome", "en")?;
    println!(
        "{} ({}, {} cues):",
        document.filename, document.mime_type, document.cue_count
    );
    println!("=====================================");
    print!("{}", document.content);
    println!("=====================================");
    println!();

    // Transcript API records rendered in every format
    let transcript = RawCaptionPayload::transcript(vec![
        TranscriptEntry::new("Hi", 1.0, 2.0),
        TranscriptEntry::new("Bye", 5.0, 1.0),
    ]);

    let formats = [
        SubtitleType::Srt,
        SubtitleType::Vtt,
        SubtitleType::Txt,
        SubtitleType::Json,
    ];

    for document in subnorm.convert_many(&transcript, &formats, "transcript", "en")? {
        println!("--- {} ---", document.filename);
        println!("{}", document.content);
    }

    Ok(())
}
