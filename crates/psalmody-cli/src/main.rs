//! Psalmody CLI
//!
//! Headless front end to the reading engine: inspect caption files, verse
//! discovery and timelines, and dry-run narration to see which audio a lesson
//! would play and in what order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;

use psalmody_lib::core::captions::{find_malformed_blocks, parse_captions, CaptionLoader};
use psalmody_lib::core::fs::default_cache_dir;
use psalmody_lib::core::highlight::{HighlightStyle, RenderSurface, SegmentElement};
use psalmody_lib::core::playback::{PlaybackMode, RecordingOutput};
use psalmody_lib::core::reader::{Reader, ReaderCommand};
use psalmody_lib::core::resources::{
    DirectoryFetcher, JsonFileCache, KeyValueCache, MemoryCache, ResourceFetcher,
};
use psalmody_lib::core::settings::{ReaderSettings, SettingsManager};
use psalmody_lib::core::timeline::{TimelineBuilder, Timelines};
use psalmody_lib::core::verses::VerseDiscovery;
use psalmody_lib::core::{DisplayMode, Language, SegmentIndex, VerseNumber};
use psalmody_lib::{init_logging_to, ConsoleStream};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(name = "psalmody-cli", version, about, long_about = None)]
struct Cli {
    /// Local directory holding `subtitles/`, `audios/` and the verse configuration
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Fetch resources over HTTP from this base URL instead of `--root`
    #[cfg(feature = "http")]
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory holding `settings.json`
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Keep fetched captions only for this run
    #[arg(long, global = true)]
    no_cache: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a local caption file and report its segments
    Parse {
        file: PathBuf,

        /// Verse number used when the file carries no verse marker
        #[arg(long, default_value_t = 1)]
        verse_hint: VerseNumber,
    },
    /// List the verses of a lesson
    Discover {
        #[arg(long)]
        lesson: String,
    },
    /// Show the aligned timelines of a lesson, or of one verse
    Timeline {
        #[arg(long)]
        lesson: String,

        #[arg(long)]
        verse: Option<VerseNumber>,
    },
    /// Dry-run narration and print the audio it would play
    Narrate {
        #[arg(long)]
        lesson: String,

        #[arg(long, value_enum, default_value_t = NarrationArg::Single)]
        mode: NarrationArg,

        /// Narrate one verse as in the vertical layout
        #[arg(long)]
        verse: Option<VerseNumber>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum NarrationArg {
    Single,
    Alternate,
}

// --- Environment ---

struct CliEnv {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: Arc<dyn KeyValueCache>,
    settings: ReaderSettings,
    json: bool,
}

fn fetcher_for(cli: &Cli) -> Result<Arc<dyn ResourceFetcher>> {
    #[cfg(feature = "http")]
    if let Some(base_url) = &cli.base_url {
        let fetcher = psalmody_lib::core::resources::HttpFetcher::new(base_url)
            .context("Failed to create HTTP client")?;
        return Ok(Arc::new(fetcher));
    }

    if !cli.root.is_dir() {
        bail!("Resource root is not a directory: {}", cli.root.display());
    }
    Ok(Arc::new(DirectoryFetcher::new(cli.root.clone())))
}

fn context_for(cli: &Cli) -> Result<CliEnv> {
    let settings = match &cli.settings {
        Some(dir) => SettingsManager::new(dir.clone()).load(),
        None => ReaderSettings::default(),
    };
    let cache: Arc<dyn KeyValueCache> = if cli.no_cache {
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(JsonFileCache::in_dir(&default_cache_dir()))
    };
    Ok(CliEnv {
        fetcher: fetcher_for(cli)?,
        cache,
        settings,
        json: cli.json,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// --- Console Surface ---

/// Prints highlight changes as narration advances
#[derive(Default)]
struct ConsoleSurface {
    texts: HashMap<(Language, SegmentIndex), String>,
}

impl RenderSurface for ConsoleSurface {
    fn mount(&mut self, language: Language, elements: &[SegmentElement]) {
        self.texts.retain(|(lang, _), _| *lang != language);
        for element in elements {
            self.texts
                .insert((language, element.index), element.text.plain().replace('\n', " / "));
        }
    }

    fn paint(&mut self, language: Language, index: SegmentIndex, active: Option<HighlightStyle>) {
        if active.is_some() {
            let text = self
                .texts
                .get(&(language, index))
                .map(String::as_str)
                .unwrap_or("");
            println!("  [{}] #{:<3} {}", language, index, text);
        }
    }

    fn show_counter(&mut self, position: usize, total: usize) {
        println!("verse {}/{}", position, total);
    }

    fn set_translation_visible(&mut self, _visible: bool) {}

    fn show_placeholder(&mut self, message: &str) {
        println!("{}", message);
    }
}

// --- Commands ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseReport {
    segments: Vec<psalmody_lib::core::captions::Segment>,
    malformed: Vec<String>,
}

fn cmd_parse(file: &Path, verse_hint: VerseNumber, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read caption file {}", file.display()))?;

    let report = ParseReport {
        segments: parse_captions(&content, verse_hint),
        malformed: find_malformed_blocks(&content)
            .iter()
            .map(ToString::to_string)
            .collect(),
    };

    if json {
        return print_json(&report);
    }
    for segment in &report.segments {
        println!(
            "v{:<3} {:>8.3} -> {:<8.3} {}{}",
            segment.verse_number.map_or("?".to_string(), |v| v.to_string()),
            segment.start,
            segment.end,
            segment.main_text,
            if segment.translation.is_empty() {
                String::new()
            } else {
                format!("  {{{}}}", segment.translation)
            }
        );
    }
    for problem in &report.malformed {
        eprintln!("skipped: {}", problem);
    }
    Ok(())
}

async fn cmd_discover(ctx: &CliEnv, lesson: &str) -> Result<()> {
    let mut discovery = VerseDiscovery::new(ctx.fetcher.clone(), &ctx.settings);
    let verses = discovery.discover(lesson).await;

    if ctx.json {
        return print_json(&verses);
    }
    if verses.is_empty() {
        println!("lesson {} has no content", lesson);
    } else {
        let list: Vec<String> = verses.iter().map(ToString::to_string).collect();
        println!("lesson {}: {} verses [{}]", lesson, verses.len(), list.join(", "));
    }
    Ok(())
}

async fn cmd_timeline(ctx: &CliEnv, lesson: &str, verse: Option<VerseNumber>) -> Result<()> {
    let mut discovery = VerseDiscovery::new(ctx.fetcher.clone(), &ctx.settings);
    let verses = discovery.discover(lesson).await;

    let loader = CaptionLoader::new(
        ctx.fetcher.clone(),
        ctx.cache.clone(),
        ctx.settings.caption_timeout(),
    );
    let builder = TimelineBuilder::new(Arc::new(loader));
    let timelines: Timelines = match verse {
        Some(verse) => builder.build_verse_pair(lesson, verse, &verses).await,
        None => builder.build_pair(lesson, &verses).await,
    };

    if ctx.json {
        return print_json(&timelines);
    }
    for language in Language::ALL {
        let timeline = timelines.get(language);
        println!("[{}] {} segments from index {}", language, timeline.len(), timeline.base_index);
        for (index, segment) in timeline.iter_indexed() {
            println!(
                "  #{:<3} {:>8.3} -> {:<8.3} {}",
                index, segment.start, segment.end, segment.main_text
            );
        }
    }
    Ok(())
}

async fn cmd_narrate(
    ctx: CliEnv,
    lesson: &str,
    mode: NarrationArg,
    verse: Option<VerseNumber>,
) -> Result<()> {
    let mut settings = ctx.settings.clone();
    settings.display_mode = match verse {
        Some(_) => DisplayMode::Vertical,
        None => DisplayMode::Horizontal,
    };

    let output = RecordingOutput::auto_finishing();
    let mut reader = Reader::new(
        lesson,
        ctx.fetcher.clone(),
        ctx.cache.clone(),
        Arc::new(output.clone()),
        Box::new(ConsoleSurface::default()),
        settings,
    )?;
    reader.initialize().await;
    if let Some(verse) = verse {
        reader.jump_to_verse(verse).await;
    }

    let command = match mode {
        NarrationArg::Single => ReaderCommand::PlaySingleTrack,
        NarrationArg::Alternate => ReaderCommand::PlayAlternate,
    };
    reader.handle(command).await;
    while reader.mode() != PlaybackMode::Idle {
        if !reader.process_next_event().await {
            break;
        }
    }
    debug!("Narration dry run finished");

    let played = output.played_urls();
    if ctx.json {
        return print_json(&played);
    }
    println!("played {} clips:", played.len());
    for url in &played {
        println!("  {}", url);
    }
    Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Stdout carries reports and JSON.
    init_logging_to(cli.log_dir.as_deref(), ConsoleStream::Stderr, "warn");

    match &cli.command {
        Command::Parse { file, verse_hint } => cmd_parse(file, *verse_hint, cli.json),
        Command::Discover { lesson } => cmd_discover(&context_for(&cli)?, lesson).await,
        Command::Timeline { lesson, verse } => {
            cmd_timeline(&context_for(&cli)?, lesson, *verse).await
        }
        Command::Narrate {
            lesson,
            mode,
            verse,
        } => cmd_narrate(context_for(&cli)?, lesson, *mode, *verse).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "psalmody-cli",
            "discover",
            "--lesson",
            "23",
            "--log-dir",
            "/tmp/psalmody-logs",
        ])
        .unwrap();

        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/psalmody-logs")));
        assert!(matches!(cli.command, Command::Discover { ref lesson } if lesson == "23"));
    }

    #[test]
    fn test_log_dir_defaults_to_console_only() {
        let cli = Cli::try_parse_from(["psalmody-cli", "parse", "captions.srt"]).unwrap();
        assert_eq!(cli.log_dir, None);
    }
}
