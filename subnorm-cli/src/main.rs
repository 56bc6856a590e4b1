use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subnorm::source::decode_text;
use subnorm::{
    CaptionProvider, LocalCaptionProvider, NormalizerOptions, PayloadKind, RawCaptionPayload,
    Subnorm, SubnormError, SubnormResult, SubtitleDocument, SubtitleType,
};

#[derive(Parser)]
#[command(name = "subnorm")]
#[command(
    version,
    about = "Convert timed-text XML, transcript JSON and TTML captions to SubRip"
)]
#[command(long_about = None)]
struct Cli {
    /// Caption file to convert ("-" reads standard input)
    #[arg(value_name = "INPUT", required_unless_present = "video")]
    input: Option<PathBuf>,

    /// Video ID to look up in the captions directory instead of reading INPUT
    #[arg(long, requires = "captions_dir", conflicts_with = "input")]
    video: Option<String>,

    /// Directory holding <video>.<lang>[.auto].<xml|ttml|json> caption files
    #[arg(long)]
    captions_dir: Option<PathBuf>,

    /// Caption language code used for lookups and JSON output
    #[arg(short, long, default_value = "en")]
    language: String,

    /// List the caption tracks available for --video
    #[arg(long, requires = "video")]
    list: bool,

    /// Output subtitle format
    #[arg(short, long, value_enum, default_value = "srt")]
    format: CliSubtitleType,

    /// Write several formats at once (comma-separated)
    #[arg(long, value_delimiter = ',')]
    formats: Option<Vec<CliSubtitleType>>,

    /// Format of the input; detected from the content by default
    #[arg(long, value_enum, default_value = "auto")]
    input_format: CliInputFormat,

    /// Output file path (default: input name with the format's extension)
    #[arg(short, long, conflicts_with = "formats")]
    output: Option<PathBuf>,

    /// Output directory (default: current directory)
    #[arg(short = 'D', long)]
    output_dir: Option<PathBuf>,

    /// Print the converted subtitles instead of writing a file
    #[arg(long)]
    stdout: bool,

    /// Force overwrite existing files
    #[arg(long)]
    force: bool,

    /// Do not fall back to automatic captions when no manual track exists
    #[arg(long)]
    no_auto: bool,

    /// Keep HTML entities in cue text as they are
    #[arg(long)]
    no_decode_entities: bool,

    /// Remove inline markup tags from cue text
    #[arg(long)]
    strip_tags: bool,

    /// Collapse whitespace and line breaks in cue text
    #[arg(long)]
    collapse_whitespace: bool,

    /// Maximum retry attempts for unavailable caption sources
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum CliSubtitleType {
    Srt,
    Vtt,
    Txt,
    Json,
}

impl From<CliSubtitleType> for SubtitleType {
    fn from(cli_type: CliSubtitleType) -> Self {
        match cli_type {
            CliSubtitleType::Srt => SubtitleType::Srt,
            CliSubtitleType::Vtt => SubtitleType::Vtt,
            CliSubtitleType::Txt => SubtitleType::Txt,
            CliSubtitleType::Json => SubtitleType::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum CliInputFormat {
    Auto,
    Timedtext,
    TranscriptJson,
    Ttml,
}

impl CliInputFormat {
    fn payload_kind(self) -> Option<PayloadKind> {
        match self {
            CliInputFormat::Auto => None,
            CliInputFormat::Timedtext => Some(PayloadKind::TimedTextXml),
            CliInputFormat::TranscriptJson => Some(PayloadKind::TranscriptJson),
            CliInputFormat::Ttml => Some(PayloadKind::TtmlXml),
        }
    }
}

#[tokio::main]
async fn main() -> SubnormResult<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --stdout output stays clean
    init_logging(cli.verbose);

    let subnorm = Subnorm::new(build_options(&cli));

    if cli.list {
        list_tracks(&cli).await?;
        return Ok(());
    }

    let formats = requested_formats(&cli);

    let result = match &cli.video {
        Some(video_id) => convert_video(&subnorm, video_id, &formats, &cli).await,
        None => convert_input(&subnorm, &formats, &cli).await,
    };

    let documents = match result {
        Ok(documents) => documents,
        Err(e) => {
            handle_error(&e);
            std::process::exit(1);
        }
    };

    for document in documents {
        if cli.stdout {
            print!("{}", document.content);
            continue;
        }

        let output_path = determine_output_path(&document, &cli);
        write_subtitle_file(&output_path, &document.content, cli.force).await?;

        println!(
            "Saved {} {} cues to: {}",
            document.cue_count,
            document.format,
            output_path.display()
        );
        info!(
            "Wrote {} characters of {} ({})",
            document.content.len(),
            document.format,
            document.mime_type
        );
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "subnorm_cli=debug,subnorm=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "subnorm_cli=info,subnorm=info".into())
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .with(env_filter)
        .init();
}

/// Build NormalizerOptions from CLI arguments
fn build_options(cli: &Cli) -> NormalizerOptions {
    NormalizerOptions::new()
        .decode_entities(!cli.no_decode_entities)
        .strip_tags(cli.strip_tags)
        .collapse_whitespace(cli.collapse_whitespace)
        .allow_automatic(!cli.no_auto)
        .max_retries(cli.max_retries)
}

fn requested_formats(cli: &Cli) -> Vec<SubtitleType> {
    match &cli.formats {
        Some(formats) => formats.iter().map(|&f| f.into()).collect(),
        None => vec![cli.format.into()],
    }
}

/// List caption tracks for a video in the captions directory
async fn list_tracks(cli: &Cli) -> SubnormResult<()> {
    let (Some(video_id), Some(dir)) = (&cli.video, &cli.captions_dir) else {
        return Err(SubnormError::Configuration {
            message: "--list needs --video and --captions-dir".to_string(),
        });
    };

    let provider = LocalCaptionProvider::new(dir);
    let tracks = provider.list_tracks(video_id).await?;

    if tracks.is_empty() {
        println!("No caption tracks found for {}.", video_id);
        return Ok(());
    }

    println!("\nAvailable caption tracks:");
    println!("{:<8} {:<10} {}", "Code", "Type", "File");
    println!("{}", "─".repeat(60));

    for track in tracks {
        println!(
            "{:<8} {:<10} {}",
            track.language,
            track.kind.to_string(),
            track.path.display()
        );
    }

    Ok(())
}

/// Fetch the preferred track through the local provider and convert it
async fn convert_video(
    subnorm: &Subnorm,
    video_id: &str,
    formats: &[SubtitleType],
    cli: &Cli,
) -> SubnormResult<Vec<SubtitleDocument>> {
    let Some(dir) = &cli.captions_dir else {
        return Err(SubnormError::Configuration {
            message: "--video needs --captions-dir".to_string(),
        });
    };

    let provider = LocalCaptionProvider::new(dir);
    let (kind, payload) = subnorm.fetch(&provider, video_id, &cli.language).await?;
    info!("Using {} {} captions for {}", kind, cli.language, video_id);

    let stem = format!("{}.{}", video_id, cli.language);
    subnorm.convert_many(&payload, formats, &stem, &cli.language)
}

/// Read INPUT (or stdin) and convert it
async fn convert_input(
    subnorm: &Subnorm,
    formats: &[SubtitleType],
    cli: &Cli,
) -> SubnormResult<Vec<SubtitleDocument>> {
    let Some(input) = &cli.input else {
        return Err(SubnormError::Configuration {
            message: "no input file given".to_string(),
        });
    };

    let bytes = if input.as_os_str() == "-" {
        let mut buffer = Vec::new();
        tokio::io::stdin().read_to_end(&mut buffer).await?;
        buffer
    } else {
        fs::read(input).await?
    };

    debug!("Read {} bytes of caption data", bytes.len());

    let content = decode_text(&bytes);
    let payload = RawCaptionPayload::from_content(&content, cli.input_format.payload_kind())?;

    subnorm.convert_many(&payload, formats, &output_stem(input), &cli.language)
}

/// File name stem for converted output: the input name without its extension
fn output_stem(input: &Path) -> String {
    if input.as_os_str() == "-" {
        return "captions".to_string();
    }

    input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("captions")
        .to_string()
}

/// Determine the output file path
fn determine_output_path(document: &SubtitleDocument, cli: &Cli) -> PathBuf {
    if let Some(output) = &cli.output {
        return output.clone();
    }

    match &cli.output_dir {
        Some(dir) => dir.join(&document.filename),
        None => PathBuf::from(&document.filename),
    }
}

/// Write subtitle content to file
async fn write_subtitle_file(path: &Path, content: &str, force: bool) -> SubnormResult<()> {
    if path.exists() && !force {
        return Err(SubnormError::FileSystem {
            source: std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!(
                    "File already exists: {}. Use --force to overwrite.",
                    path.display()
                ),
            ),
        });
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).await?;
    }

    fs::write(path, content).await?;

    debug!("Written {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Handle conversion errors with user-friendly messages
fn handle_error(error: &SubnormError) {
    match error {
        SubnormError::MalformedCaptionData { format, message } => {
            eprintln!("❌ Could not read {} caption data: {}", format, message);
            eprintln!("   Check the file, or pass --input-format if detection picked the wrong one.");
        }
        SubnormError::UnrecognizedPayload { message } => {
            eprintln!("❌ Unrecognized caption data: {}", message);
            eprintln!("   Pass --input-format to choose the format explicitly.");
        }
        SubnormError::InvalidTimestamp { value } => {
            eprintln!("❌ Invalid timestamp in caption data: {}", value);
        }
        SubnormError::InvalidCueTiming { index, start, end } => {
            eprintln!(
                "❌ Cue {} ends at {}s, before it starts at {}s",
                index, end, start
            );
            eprintln!("   The caption source looks corrupt.");
        }
        SubnormError::CaptionNotFound { video_id, language } => {
            eprintln!("❌ No {} captions for video: {}", language, video_id);
            eprintln!("   Use --list to see the available caption tracks.");
        }
        SubnormError::ProviderUnavailable { message, .. } => {
            eprintln!("❌ Caption source unavailable: {}", message);
            eprintln!("   Please try again later.");
        }
        _ => {
            eprintln!("❌ Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["subnorm"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_cli_subtitle_type_conversion() {
        assert_eq!(SubtitleType::from(CliSubtitleType::Srt), SubtitleType::Srt);
        assert_eq!(SubtitleType::from(CliSubtitleType::Vtt), SubtitleType::Vtt);
        assert_eq!(SubtitleType::from(CliSubtitleType::Txt), SubtitleType::Txt);
        assert_eq!(
            SubtitleType::from(CliSubtitleType::Json),
            SubtitleType::Json
        );
    }

    #[test]
    fn test_input_format_kinds() {
        assert_eq!(CliInputFormat::Auto.payload_kind(), None);
        assert_eq!(
            CliInputFormat::Ttml.payload_kind(),
            Some(PayloadKind::TtmlXml)
        );
    }

    #[test]
    fn test_build_options() {
        let options = build_options(&cli(&["in.xml", "--no-auto", "--strip-tags"]));
        assert!(!options.allow_automatic);
        assert!(options.strip_tags);
        assert!(options.decode_entities);
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_requested_formats() {
        assert_eq!(requested_formats(&cli(&["in.xml"])), vec![SubtitleType::Srt]);
        assert_eq!(
            requested_formats(&cli(&["in.xml", "--formats", "srt,vtt"])),
            vec![SubtitleType::Srt, SubtitleType::Vtt]
        );
    }

    #[test]
    fn test_output_stem() {
        assert_eq!(output_stem(Path::new("talk.en.xml")), "talk.en");
        assert_eq!(output_stem(Path::new("dir/captions.json")), "captions");
        assert_eq!(output_stem(Path::new("-")), "captions");
    }

    #[test]
    fn test_determine_output_path() {
        let document = SubtitleDocument::new("talk.en", SubtitleType::Srt, String::new(), 0);

        let path = determine_output_path(&document, &cli(&["talk.en.xml"]));
        assert_eq!(path, PathBuf::from("talk.en.srt"));

        let path = determine_output_path(&document, &cli(&["talk.en.xml", "-D", "out"]));
        assert_eq!(path, PathBuf::from("out").join("talk.en.srt"));

        let path = determine_output_path(&document, &cli(&["talk.en.xml", "-o", "x.srt"]));
        assert_eq!(path, PathBuf::from("x.srt"));
    }

    #[tokio::test]
    async fn test_write_subtitle_file_creates_dirs() {
        use tempfile::tempdir;

        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("subdir").join("test.srt");

        let result = write_subtitle_file(&file_path, "test content", false).await;
        assert!(result.is_ok());
        assert!(file_path.exists());

        let result = write_subtitle_file(&file_path, "again", false).await;
        assert!(matches!(result, Err(SubnormError::FileSystem { .. })));

        let result = write_subtitle_file(&file_path, "again", true).await;
        assert!(result.is_ok());
    }
}
