use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quran_shorts::background::BackgroundProvider;
use quran_shorts::api::quran_text::QuranTextClient;
use quran_shorts::cancel::CancelToken;
use quran_shorts::config::{Config, TextAnchor};
use quran_shorts::generator::Pipeline;
use quran_shorts::init;
use quran_shorts::jobs::JobRegistry;
use quran_shorts::models::{BackgroundStrategy, GenerationJob, GenerationRequest, JobStatus};
use quran_shorts::registry;
use quran_shorts::render::{TextRenderer, join_verses};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "quran-shorts", version, about = "Short vertical recitation videos")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one video for a verse range.
    Generate(GenerateArgs),
    /// List available reciters.
    Reciters,
    /// List all surahs.
    Surahs,
    /// Render the overlay for a verse range to a PNG, for checking fonts and layout.
    RenderText {
        #[arg(long)]
        surah: u16,
        #[arg(long = "from")]
        verse_start: u16,
        #[arg(long = "to")]
        verse_end: u16,
        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
        #[arg(long)]
        lower_third: bool,
    },
    /// Download filtered background clips into the cache.
    PrefetchBackgrounds {
        #[arg(long, default_value_t = 5)]
        count: usize,
        /// Check a frame of each candidate with the vision model.
        #[arg(long)]
        vision: bool,
    },
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Reciter id, see `reciters`.
    #[arg(long)]
    reciter: String,

    #[arg(long)]
    surah: u16,

    /// First verse.
    #[arg(long = "from")]
    verse_start: u16,

    /// Last verse, inclusive.
    #[arg(long = "to")]
    verse_end: u16,

    /// Download a separate background clip for every verse.
    #[arg(long)]
    per_verse_backgrounds: bool,

    /// Skip the verse text overlay.
    #[arg(long)]
    no_text: bool,

    /// Check candidate backgrounds with the vision model.
    #[arg(long)]
    vision: bool,

    /// Place the text in the lower third instead of the center.
    #[arg(long)]
    lower_third: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn cmd_generate(mut cfg: Config, args: GenerateArgs) -> Result<i32> {
    if args.lower_third {
        cfg.text.anchor = TextAnchor::LowerThird;
    }
    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg(&cfg).await {
        eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
    }

    let mut request = GenerationRequest::new(args.reciter, args.surah, args.verse_start, args.verse_end);
    if args.per_verse_backgrounds {
        request.background = BackgroundStrategy::PerVerse;
    }
    request.overlay_text = !args.no_text;
    request.vision_filter = args.vision;

    let pipeline = Pipeline::new(&cfg).context("Failed to set up pipeline")?;
    let registry = JobRegistry::new(pipeline, cfg.worker_count);
    let id = registry.submit(request).await;
    println!("Job {}", id);

    let print = |job: &GenerationJob| println!("[{:>3}%] {}", job.progress, job.message);
    let job = tokio::select! {
        job = registry.watch(id, print) => job,
        _ = tokio::signal::ctrl_c() => {
            registry.cancel(id);
            registry.wait(id).await
        }
    };

    match job {
        Some(job) if job.status == JobStatus::Completed => {
            let path = job.result.map(|p| p.display().to_string()).unwrap_or_default();
            println!("Video saved: {}", path);
            Ok(0)
        }
        Some(job) => {
            eprintln!("Generation failed: {}", job.error.unwrap_or_else(|| job.message.clone()));
            Ok(1)
        }
        None => Ok(1),
    }
}

fn cmd_reciters() {
    for r in registry::list_reciters() {
        println!("{:<32} {} | {}", r.id, r.name_en, r.name_ar);
    }
}

fn cmd_surahs() {
    for s in registry::list_surahs() {
        let verses = registry::verse_count(s.number).unwrap_or(0);
        println!("{:>3}  {}  ({} verses)", s.number, s.name, verses);
    }
}

async fn cmd_render_text(mut cfg: Config, surah: u16, start: u16, end: u16, out: PathBuf, lower_third: bool) -> Result<i32> {
    if lower_third {
        cfg.text.anchor = TextAnchor::LowerThird;
    }
    let verses_in_surah = registry::verse_count(surah).with_context(|| format!("unknown surah: {}", surah))?;
    if start == 0 || start > end || end > verses_in_surah {
        anyhow::bail!("invalid verse range {}-{}", start, end);
    }

    let verses = QuranTextClient::new(&cfg)?
        .fetch_verses(surah, start, end, &CancelToken::never())
        .await;
    if verses.is_empty() {
        eprintln!("No verse text fetched");
        return Ok(1);
    }
    let text = join_verses(&verses)?;
    let renderer = TextRenderer::new(&cfg)?;
    let saved = tokio::task::spawn_blocking(move || renderer.render_to_png(&text, &out))
        .await
        .context("render task failed")??;
    println!("Overlay saved: {}", saved.display());
    Ok(0)
}

async fn cmd_prefetch(cfg: Config, count: usize, vision: bool) -> Result<i32> {
    init::ensure_directories(&cfg).await?;
    let provider = BackgroundProvider::new(&cfg)?;
    let saved = provider.prefetch_until(count, vision, tokio::signal::ctrl_c()).await;
    println!("Saved {} clips to {}", saved, provider.cache_dir().display());
    Ok(if saved == count { 0 } else { 1 })
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let code = match cli.cmd {
        Command::Reciters => {
            cmd_reciters();
            0
        }
        Command::Surahs => {
            cmd_surahs();
            0
        }
        Command::Generate(args) => {
            let cfg = Config::load(&cli.config).await?;
            cmd_generate(cfg, args).await?
        }
        Command::RenderText {
            surah,
            verse_start,
            verse_end,
            out,
            lower_third,
        } => {
            let cfg = Config::load(&cli.config).await?;
            cmd_render_text(cfg, surah, verse_start, verse_end, out, lower_third).await?
        }
        Command::PrefetchBackgrounds { count, vision } => {
            let cfg = Config::load(&cli.config).await?;
            cmd_prefetch(cfg, count, vision).await?
        }
    };
    std::process::exit(code);
}
