use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "gifforge", version)]
struct Cli {
    /// Optional JSON config; `GIFFORGE_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract still frames as PNG files (requires `ffmpeg` and `ffprobe` on PATH).
    Frames(FramesArgs),
    /// Render an annotated GIF (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct FramesArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Directory receiving `frame_NNNNN.png` files.
    #[arg(long)]
    out_dir: PathBuf,

    /// Frames per second of source time.
    #[arg(long)]
    fps: Option<f64>,

    /// Window start in seconds.
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Window end in seconds; defaults to the video duration.
    #[arg(long)]
    end: Option<f64>,

    /// Output frame width; height keeps the aspect ratio.
    #[arg(long)]
    width: Option<u32>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input video.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    /// Trim start in seconds.
    #[arg(long)]
    start: Option<f64>,

    /// Trim end in seconds.
    #[arg(long)]
    end: Option<f64>,

    /// Crop box in percent, `x,y,width,height`.
    #[arg(long)]
    crop: Option<String>,

    /// GIF width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// GIF frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// JSON file with `[{"frame": id, "drawings": [...]}]` entries.
    #[arg(long)]
    drawings: Option<PathBuf>,

    /// Keep blobs and frames in this directory instead of memory.
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

#[derive(serde::Deserialize)]
struct FrameDrawings {
    frame: u32,
    drawings: Vec<gifforge::Drawing>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => gifforge::ForgeConfig::from_json_file(path)?,
        None => gifforge::ForgeConfig::from_env()?,
    };
    match cli.cmd {
        Command::Frames(args) => cmd_frames(config, args).await,
        Command::Render(args) => cmd_render(config, args).await,
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("gifforge=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn mime_for_path(path: &Path) -> anyhow::Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    Ok(match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        other => anyhow::bail!("unsupported video extension '{other}'"),
    })
}

async fn read_video(path: &Path) -> anyhow::Result<gifforge::VideoBlob> {
    let mime = mime_for_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read video '{}'", path.display()))?;
    Ok(gifforge::VideoBlob::new(bytes, mime))
}

fn parse_crop(s: &str) -> anyhow::Result<gifforge::CropRect> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("parse crop '{s}'"))?;
    let [x, y, w, h] = parts[..] else {
        anyhow::bail!("crop must be x,y,width,height (got '{s}')");
    };
    Ok(gifforge::CropRect::new(x, y, w, h))
}

async fn cmd_frames(mut config: gifforge::ForgeConfig, args: FramesArgs) -> anyhow::Result<()> {
    if let Some(fps) = args.fps {
        config.extract.fps = fps;
    }
    if args.width.is_some() {
        config.extract.target_width = args.width;
        config.extract.target_height = None;
    }
    config.validate()?;

    let blob = read_video(&args.in_path).await?;
    let source = gifforge::FfmpegVideoSource::open(&blob).await?;
    let end = args
        .end
        .unwrap_or_else(|| gifforge::VideoSource::duration(&source));

    let extractor = gifforge::FrameExtractor::new(config.extract.clone());
    let frames = extractor
        .extract(
            &source,
            config.extract.fps,
            args.start,
            end,
            |done, total| tracing::debug!(done, total, "frame extracted"),
            &CancellationToken::new(),
        )
        .await?;
    extractor.dispose();

    tokio::fs::create_dir_all(&args.out_dir)
        .await
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    for frame in &frames {
        let path = args
            .out_dir
            .join(gifforge::frame_file_name(frame.id as usize));
        tokio::fs::write(&path, &frame.image_data[..])
            .await
            .with_context(|| format!("write png '{}'", path.display()))?;
    }

    eprintln!("wrote {} frames to {}", frames.len(), args.out_dir.display());
    Ok(())
}

async fn cmd_render(mut config: gifforge::ForgeConfig, args: RenderArgs) -> anyhow::Result<()> {
    if let Some(width) = args.width {
        config.gif.width = width;
    }
    if let Some(fps) = args.fps {
        config.gif.fps = fps;
    }
    config.validate()?;

    let annotations: Vec<FrameDrawings> = match &args.drawings {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("read drawings '{}'", path.display()))?;
            serde_json::from_slice(&bytes).with_context(|| "parse drawings JSON")?
        }
        None => Vec::new(),
    };

    let store: Arc<dyn gifforge::FrameStore> = match &args.store_dir {
        Some(dir) => Arc::new(gifforge::DirStore::open(dir.clone()).await?),
        None => Arc::new(gifforge::MemoryStore::new()),
    };
    let transcoder = gifforge::TranscoderHandle::new(Arc::new(gifforge::FfmpegTranscoder::new()?));
    let deps = gifforge::SessionDeps {
        store,
        transcoder,
        opener: Arc::new(gifforge::FfmpegOpener),
    };
    let mut session = gifforge::EditSession::new(config, deps)?;

    session.load_video(read_video(&args.in_path).await?).await?;

    if args.start.is_some() || args.end.is_some() {
        let start = args.start.unwrap_or(0.0);
        let end = args.end.unwrap_or_else(|| session.duration());
        session.set_trim(start, end).await?;
        session.refresh_frames().await?;
    }
    if let Some(crop) = &args.crop {
        session.apply_crop(parse_crop(crop)?).await?;
    }
    for entry in annotations {
        let Some(frame) = session.frames().get(entry.frame) else {
            anyhow::bail!(
                "drawings reference frame {} but only {} frames were extracted",
                entry.frame,
                session.frames().len()
            );
        };
        let edited = frame.with_drawings(entry.drawings);
        session.commit_frame(edited).await?;
    }

    let artifact = session.regenerate_now().await?;
    if let Some(parent) = args.out.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    tokio::fs::write(&args.out, &artifact.bytes[..])
        .await
        .with_context(|| format!("write gif '{}'", args.out.display()))?;

    tracing::info!(
        frames = artifact.stats.frames_total,
        composited = artifact.stats.frames_composited,
        bytes = artifact.bytes.len(),
        "gif rendered"
    );
    if args.store_dir.is_none() {
        session.teardown().await?;
    }
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
