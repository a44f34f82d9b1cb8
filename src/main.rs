use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use quilt_viewer::calibration::CalibrationChannel;
use quilt_viewer::config::Configuration;
use quilt_viewer::events::{CalibrationReady, InvalidQuilt, LoadQuilt, QuiltLoaded, ViewerCommand};
use quilt_viewer::quilt::{QuiltImageView, TileGrid, detect_tiling_view};
use quilt_viewer::render::{Viewport, compute_uniforms, render_frame};
use quilt_viewer::tasks::loader::{self, LoaderOptions};
use quilt_viewer::tasks::playlist::{self, Playlist};
use quilt_viewer::tasks::{files, viewer};

#[derive(Debug, Parser)]
#[command(
    name = "quilt-viewer",
    version,
    about = "View quilt images on a lenticular display"
)]
struct Args {
    /// Quilt images or directories containing them
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,
    /// Path to YAML config (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Force a tile grid such as 5x9 instead of detecting it
    #[arg(long, value_name = "XxY")]
    tiles: Option<TileGrid>,
    /// Print the detected tile grid of every quilt and exit
    #[arg(long = "detect-only")]
    detect_only: bool,
    /// Print the resolved calibration profile as JSON and exit
    #[arg(long = "calibration-only")]
    calibration_only: bool,
    /// Composite the first quilt on the CPU and write it as PNG
    #[arg(long = "render-to", value_name = "PNG")]
    render_to: Option<PathBuf>,
    /// Output size for --render-to
    #[arg(long, value_name = "WxH", default_value = "2560x1600", value_parser = parse_viewport)]
    viewport: Viewport,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    if w == 0 || h == 0 {
        return Err(format!("viewport must be non-zero, got '{s}'"));
    }
    Ok(Viewport::new(w, h))
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        n => {
            let level = if n == 1 { Level::DEBUG } else { Level::TRACE };
            EnvFilter::new(format!("quilt_viewer={level}"))
        }
    }
    .add_directive("wgpu=warn".parse()?)
    .add_directive("wgpu_core=warn".parse()?)
    .add_directive("wgpu_hal=warn".parse()?)
    .add_directive("naga=warn".parse()?)
    .add_directive("winit=warn".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let cfg = match args.config.as_ref() {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    }
    .validated()
    .context("invalid configuration values")?;
    tracing::debug!("configuration: {cfg:#?}");

    let channel =
        CalibrationChannel::new(cfg.calibration.bridge_url.clone(), cfg.calibration.timeout);

    if args.calibration_only {
        let resolved = channel.acquire().await;
        println!("{}", resolved.profile.to_json_pretty()?);
        return Ok(());
    }

    let quilts = files::discover_quilts(&args.paths)?;
    let opts = LoaderOptions {
        max_in_flight: cfg.loader_max_concurrent_decodes,
        max_texture_dimension: cfg.max_texture_dimension,
        tiles_override: args.tiles,
        catalog: cfg.catalog(),
    };

    if args.detect_only {
        return run_detect_only(&quilts, &opts).await;
    }

    if let Some(out) = args.render_to.as_ref() {
        let first = quilts
            .first()
            .ok_or_else(|| anyhow!("--render-to needs at least one quilt"))?;
        return run_render_to(first, out, args.viewport, &opts, &channel).await;
    }

    if quilts.is_empty() {
        bail!("no quilt images found; pass png/jpeg files or directories");
    }

    run_viewer(quilts, opts, channel, cfg.fullscreen).await
}

async fn run_detect_only(quilts: &[PathBuf], opts: &LoaderOptions) -> Result<()> {
    for path in quilts {
        let path = path.clone();
        let opts = opts.clone();
        let report = tokio::task::spawn_blocking(move || -> Result<String> {
            let rgba = loader::decode_rgba8(&path)?;
            let (width, height) = rgba.dimensions();
            let view = QuiltImageView::new(width, height, rgba.as_raw())?;
            let grid = match opts.tiles_override {
                Some(grid) => grid,
                None => detect_tiling_view(&view, &opts.catalog),
            };
            Ok(format!("{}: {width}x{height} -> {grid}", path.display()))
        })
        .await??;
        println!("{report}");
    }
    Ok(())
}

async fn run_render_to(
    quilt: &Path,
    out: &Path,
    viewport: Viewport,
    opts: &LoaderOptions,
    channel: &CalibrationChannel,
) -> Result<()> {
    let (resolved, prepared) = tokio::join!(channel.acquire(), {
        let path = quilt.to_path_buf();
        let opts = opts.clone();
        tokio::task::spawn_blocking(move || loader::prepare_quilt(&path, &opts, None))
    });
    let prepared = prepared??;
    let block = compute_uniforms(&resolved.profile, viewport, prepared.tiles);
    let view = QuiltImageView::new(prepared.width, prepared.height, &prepared.pixels)?;
    let frame = render_frame(&block, &view, viewport.width, viewport.height);
    frame
        .save(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(
        out = %out.display(),
        tiles = %prepared.tiles,
        live = resolved.is_live(),
        "composited frame written"
    );
    Ok(())
}

async fn run_viewer(
    quilts: Vec<PathBuf>,
    opts: LoaderOptions,
    channel: CalibrationChannel,
    fullscreen: bool,
) -> Result<()> {
    let (to_load_tx, to_load_rx) = mpsc::channel::<LoadQuilt>(4); // Playlist -> Loader
    let (invalid_tx, mut invalid_rx) = mpsc::channel::<InvalidQuilt>(16); // Loader -> log
    let (loaded_tx, loaded_rx) = mpsc::channel::<QuiltLoaded>(2); // Loader -> Viewer
    let (command_tx, command_rx) = mpsc::channel::<ViewerCommand>(16); // Viewer -> Playlist
    let (calibration_tx, calibration_rx) = mpsc::channel::<CalibrationReady>(1); // Bridge -> Viewer

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    // Calibration runs alongside the first load; the viewer clears until it lands.
    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                resolved = channel.acquire() => {
                    let _ = calibration_tx.send(CalibrationReady(resolved)).await;
                }
            }
            Ok(())
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            playlist::run(Playlist::new(quilts), command_rx, to_load_tx, cancel)
                .await
                .context("playlist task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            loader::run(to_load_rx, invalid_tx, loaded_tx, cancel, opts)
                .await
                .context("loader task failed")
        }
    });

    tasks.spawn({
        let cancel = cancel.clone();
        async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = invalid_rx.recv() => match msg {
                        Some(InvalidQuilt(path)) => {
                            tracing::warn!(path = %path.display(), "skipping unreadable quilt");
                        }
                        None => break,
                    },
                }
            }
            Ok(())
        }
    });

    if let Err(e) = viewer::run_windowed(
        loaded_rx,
        calibration_rx,
        command_tx,
        cancel.clone(),
        viewer::ViewerOptions { fullscreen },
    )
    .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
