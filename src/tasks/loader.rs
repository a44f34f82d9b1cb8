use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{InvalidQuilt, LoadQuilt, PreparedQuilt, QuiltLoaded};
use crate::quilt::{PresetCatalog, TileGrid, detect_tiling};

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub max_in_flight: usize,
    pub max_texture_dimension: u32,
    /// Skip detection and use this grid for every quilt.
    pub tiles_override: Option<TileGrid>,
    pub catalog: PresetCatalog,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 2,
            max_texture_dimension: 8192,
            tiles_override: None,
            catalog: PresetCatalog::builtin(),
        }
    }
}

pub fn decode_rgba8(path: &Path) -> Result<RgbaImage> {
    let img = image::ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok(img.to_rgba8())
}

/// Decode, detect and size a quilt. Detection always runs on the full
/// resolution image; `known` skips it when the grid is already cached.
pub fn prepare_quilt(
    path: &Path,
    opts: &LoaderOptions,
    known: Option<TileGrid>,
) -> Result<PreparedQuilt> {
    let rgba = decode_rgba8(path)?;
    let (width, height) = rgba.dimensions();

    let tiles = match opts.tiles_override.or(known) {
        Some(tiles) => tiles,
        None => detect_tiling(width, height, rgba.as_raw(), &opts.catalog)
            .with_context(|| format!("tiling detection failed for {}", path.display()))?,
    };

    let rgba = fit_within(rgba, opts.max_texture_dimension)?;
    let (width, height) = rgba.dimensions();
    Ok(PreparedQuilt {
        path: path.to_path_buf(),
        width,
        height,
        pixels: rgba.into_raw(),
        tiles,
    })
}

/// Uniformly downsize so neither axis exceeds `max_dim`. Uniform scaling
/// keeps every tile boundary at the same fraction of the canvas.
fn fit_within(source: RgbaImage, max_dim: u32) -> Result<RgbaImage> {
    let (w, h) = source.dimensions();
    let longest = w.max(h);
    if max_dim == 0 || longest <= max_dim {
        return Ok(source);
    }
    let scale = f64::from(max_dim) / f64::from(longest);
    let target_w = ((f64::from(w) * scale).round() as u32).clamp(1, max_dim);
    let target_h = ((f64::from(h) * scale).round() as u32).clamp(1, max_dim);
    debug!(w, h, target_w, target_h, "downsizing quilt for texture limits");

    let src_view = fir::images::ImageRef::new(w, h, source.as_raw(), fir::PixelType::U8x4)
        .context("failed to create source view for quilt resize")?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut dst_image, Some(&options))
        .context("quilt resize failed")?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| anyhow!("failed to construct resized RGBA image"))
}

/// Shrink an already prepared quilt to `max_dim`, keeping its tile grid.
pub fn fit_prepared(quilt: PreparedQuilt, max_dim: u32) -> Result<PreparedQuilt> {
    if quilt.width.max(quilt.height) <= max_dim {
        return Ok(quilt);
    }
    let PreparedQuilt {
        path,
        width,
        height,
        pixels,
        tiles,
    } = quilt;
    let rgba = RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow!("quilt buffer does not match {width}x{height}"))?;
    let rgba = fit_within(rgba, max_dim)?;
    let (width, height) = rgba.dimensions();
    Ok(PreparedQuilt {
        path,
        width,
        height,
        pixels: rgba.into_raw(),
        tiles,
    })
}

type DecodeOutcome = (PathBuf, Result<PreparedQuilt>);

/// Decodes load requests off the async runtime. Only the most recently
/// requested quilt is forwarded; results superseded by a newer request are
/// dropped once their tile grid has been cached.
pub async fn run(
    mut load_rx: Receiver<LoadQuilt>,
    invalid_tx: Sender<InvalidQuilt>,
    to_viewer: Sender<QuiltLoaded>,
    cancel: CancellationToken,
    opts: LoaderOptions,
) -> Result<()> {
    let max_in_flight = opts.max_in_flight.max(1);
    let mut grid_cache: HashMap<PathBuf, TileGrid> = HashMap::new();
    let mut in_flight: HashMap<PathBuf, u64> = HashMap::new();
    let mut tasks: JoinSet<DecodeOutcome> = JoinSet::new();
    let mut latest: u64 = 0;

    loop {
        select! {
            _ = cancel.cancelled() => break,

            Some(LoadQuilt(path)) = load_rx.recv(), if in_flight.len() < max_in_flight => {
                latest += 1;
                if in_flight.insert(path.clone(), latest).is_some() {
                    debug!(path = %path.display(), "quilt already decoding; promoted to latest");
                    continue;
                }
                let known = grid_cache.get(&path).copied();
                let opts = opts.clone();
                tasks.spawn(async move {
                    let p = path.clone();
                    let res = tokio::task::spawn_blocking(move || prepare_quilt(&p, &opts, known))
                        .await
                        .map_err(|err| anyhow!("decode task failed: {err}"))
                        .and_then(|r| r);
                    (path, res)
                });
            }

            Some(join_res) = tasks.join_next() => {
                let Ok((path, outcome)) = join_res else { continue };
                let generation = in_flight.remove(&path).unwrap_or_default();
                match outcome {
                    Ok(prepared) => {
                        grid_cache.insert(path.clone(), prepared.tiles);
                        if generation != latest {
                            debug!(path = %path.display(), "superseded quilt dropped");
                            continue;
                        }
                        info!(
                            path = %path.display(),
                            width = prepared.width,
                            height = prepared.height,
                            tiles = %prepared.tiles,
                            "quilt loaded"
                        );
                        if to_viewer.send(QuiltLoaded(prepared)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %format!("{err:#}"), "invalid quilt");
                        let _ = invalid_tx.send(InvalidQuilt(path)).await;
                    }
                }
            }

            else => {
                if in_flight.is_empty() {
                    break;
                }
            }
        }
    }
    Ok(())
}
