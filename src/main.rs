use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use inkmark::config::Config;
use inkmark::submission::{
    HttpTransport, SubmissionError, SubmissionPipeline, SubmissionStatus, UploadFile,
};
use inkmark::watermark::{
    Anchor, AssetLoader, AssetStatus, CanvasDimensions, CanvasRect, CompositionSession,
    Compositor, PointerEvent, RedrawScheduler,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tokio::time::MissedTickBehavior;

/// Inkmark - watermark compositing and scan submission
#[derive(Parser, Debug)]
#[command(name = "inkmark")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a watermark over a base image and export it as PNG
    Compose(ComposeArgs),
    /// Send a file to the scanning service
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
struct ComposeArgs {
    /// Base image (path, file://, http(s):// or data: URI)
    #[arg(long)]
    base: String,

    /// Watermark image URI
    #[arg(long, conflicts_with = "text", required_unless_present = "text")]
    watermark: Option<String>,

    /// Declared filename of the watermark upload (drives the export name)
    #[arg(long, requires = "watermark")]
    name: Option<String>,

    /// Text watermark
    #[arg(long)]
    text: Option<String>,

    /// Watermark opacity, 0.0 to 1.0
    #[arg(long)]
    opacity: Option<f32>,

    /// Watermark width as a fraction of the canvas width
    #[arg(long)]
    scale: Option<f32>,

    /// Normalized watermark center, "x,y"
    #[arg(long, value_parser = parse_point)]
    anchor: Option<(f32, f32)>,

    /// Drag gesture in canvas pixels, "x,y;x,y;..."
    #[arg(long, value_parser = parse_path)]
    drag: Option<DragPath>,

    /// Output directory
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// File to submit
    #[arg(long)]
    file: PathBuf,

    /// Use the unprotected (unscanned) endpoint
    #[arg(long)]
    unprotected: bool,
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"x,y\", got \"{}\"", s))?;
    let x = x.trim().parse::<f32>().map_err(|e| format!("{}: {}", x, e))?;
    let y = y.trim().parse::<f32>().map_err(|e| format!("{}: {}", y, e))?;
    Ok((x, y))
}

/// Pointer positions of a drag gesture, in canvas pixels.
#[derive(Debug, Clone, PartialEq)]
struct DragPath(Vec<(f32, f32)>);

fn parse_path(s: &str) -> Result<DragPath, String> {
    let points = s
        .split(';')
        .filter(|p| !p.trim().is_empty())
        .map(parse_point)
        .collect::<Result<Vec<_>, _>>()?;
    if points.is_empty() {
        return Err("drag path needs at least one point".to_string());
    }
    Ok(DragPath(points))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path).map_err(anyhow::Error::msg)?,
        None => Config::default(),
    };
    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = inkmark::logging::init_subscriber(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    tracing::info!(
        config_file = ?cli.config,
        canvas_width = config.compositor.canvas_width,
        canvas_height = config.compositor.canvas_height,
        filename_policy = ?config.export.filename_policy,
        "Configuration loaded successfully"
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        match cli.command {
            Command::Compose(args) => match compose(&config, args).await {
                Ok(path) => {
                    println!("{}", path.display());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!(error = %format!("{:#}", e), "Compose failed");
                    eprintln!("Compose failed: {:#}", e);
                    ExitCode::FAILURE
                }
            },
            Command::Submit(args) => submit(&config, args).await,
        }
    })
}

async fn compose(config: &Config, args: ComposeArgs) -> anyhow::Result<PathBuf> {
    let loader = AssetLoader::new(config.loader.to_loader_config())?;
    let compositor = Compositor::with_glyphs(
        config.compositor.glyph_source()?,
        config.compositor.text_style()?,
    );
    let canvas = CanvasDimensions::new(
        config.compositor.canvas_width,
        config.compositor.canvas_height,
    );
    let frame_interval = config.compositor.frame_interval();
    let mut session =
        CompositionSession::new(compositor, canvas, RedrawScheduler::new(frame_interval));

    // Base and watermark load concurrently; each commits against its own ticket.
    let base_ticket = session
        .assign_base(&args.base)
        .context("session closed before loading")?;
    let watermark_ticket = match &args.watermark {
        Some(uri) => {
            let name = args.name.clone().or_else(|| declared_name(uri));
            session.assign_watermark(uri, name.as_deref())
        }
        None => None,
    };

    let (base_outcome, watermark_outcome) = tokio::join!(loader.fetch(&base_ticket), async {
        match &watermark_ticket {
            Some(ticket) => Some(loader.fetch(ticket).await),
            None => None,
        }
    });
    session.complete_base(&base_ticket, base_outcome);
    if let (Some(ticket), Some(outcome)) = (&watermark_ticket, watermark_outcome) {
        session.complete_watermark(ticket, outcome);
    }

    if session.state().base().status() != Some(AssetStatus::Ready) {
        bail!("Base asset {} could not be loaded", args.base);
    }

    if let Some(text) = args.text {
        session.set_text(text);
    }
    if let Some(opacity) = args.opacity {
        session.set_opacity(opacity)?;
    }
    if let Some(scale) = args.scale {
        session.set_scale(scale)?;
    }
    if let Some((x, y)) = args.anchor {
        session.set_anchor(Anchor::new(x, y));
    }

    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if let Some(DragPath(points)) = args.drag {
        let rect = CanvasRect::from_canvas(&canvas);
        let mut events = Vec::with_capacity(points.len() + 1);
        for (i, (x, y)) in points.into_iter().enumerate() {
            events.push(if i == 0 {
                PointerEvent::Down { x, y }
            } else {
                PointerEvent::Move { x, y }
            });
        }
        events.push(PointerEvent::Up);

        for event in events {
            session.pointer(event, &rect);
            session.pump(Instant::now())?;
        }
    }

    while session.needs_redraw() {
        ticker.tick().await;
        session.pump(Instant::now())?;
    }

    let exported = session.export(&config.export.to_encoder())?;
    session.teardown();

    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("creating {}", args.out.display()))?;
    let path = args.out.join(&exported.filename);
    tokio::fs::write(&path, &exported.bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    tracing::info!(path = %path.display(), bytes = exported.size(), "Export written");
    Ok(path)
}

/// Filename a browser would report for an uploaded file at `uri`.
fn declared_name(uri: &str) -> Option<String> {
    if uri.starts_with("data:") {
        return None;
    }
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

async fn submit(config: &Config, args: SubmitArgs) -> ExitCode {
    let file = match UploadFile::from_path(&args.file).await {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let transport = match HttpTransport::new(config.submission.timeout()) {
        Ok(transport) => transport,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let options = config
        .submission
        .to_pipeline_options(config.export.filename_policy);
    let mut pipeline = SubmissionPipeline::new(transport, options);

    let result = match pipeline.submit(&file, !args.unprotected).await {
        Ok(result) => result,
        Err(e @ SubmissionError::Client(_)) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };
    pipeline.teardown();

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render result: {}", e),
    }

    match result.status {
        SubmissionStatus::Succeeded => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}
