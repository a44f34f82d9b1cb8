//! Tile-grid detection by cross-tile self-similarity.
//!
//! Quilts hold many near-duplicate viewpoints, so the true grid is the one
//! that minimizes luminance variance between tiles at equal intra-tile
//! offsets. Every preset yields exactly one hypothesis: verbatim when the
//! image matches the preset canvas, otherwise the preset's tile counts
//! stretched over the actual image size.

use tracing::{debug, info};

use super::image::QuiltImageView;
use super::preset::{PresetCatalog, QuiltPreset, TileGrid};
use crate::error::Result;

/// One tiling hypothesis for a specific image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingCandidate {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub width: u32,
    pub height: u32,
}

impl TilingCandidate {
    /// A preset matching the image size is used verbatim; any other preset
    /// yields a synthetic candidate with its tile counts at the image size.
    /// Both forms carry the same values.
    fn for_image(preset: &QuiltPreset, width: u32, height: u32) -> Self {
        Self {
            tiles_x: preset.tiles_x,
            tiles_y: preset.tiles_y,
            width,
            height,
        }
    }

    pub fn grid(&self) -> Option<TileGrid> {
        TileGrid::new(self.tiles_x, self.tiles_y).ok()
    }
}

/// A candidate and its accumulated cross-tile variance. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub candidate: TilingCandidate,
    pub score: f64,
}

pub fn build_candidates(catalog: &PresetCatalog, width: u32, height: u32) -> Vec<TilingCandidate> {
    catalog
        .presets()
        .iter()
        .map(|preset| TilingCandidate::for_image(preset, width, height))
        .collect()
}

/// Sampling stride over intra-tile offsets; coarser for wide images.
pub fn sample_stride(width: u32) -> u32 {
    (width >> 9).max(1)
}

/// Sum of squared luminance deviations from the mid-grid reference tile.
///
/// Candidates whose tiles are narrower or shorter than one pixel cannot be
/// sampled and score `+inf`.
pub fn score_candidate(image: &QuiltImageView<'_>, candidate: &TilingCandidate) -> f64 {
    if candidate.tiles_x == 0 || candidate.tiles_y == 0 {
        return f64::INFINITY;
    }
    let tile_w = candidate.width / candidate.tiles_x;
    let tile_h = candidate.height / candidate.tiles_y;
    if tile_w == 0 || tile_h == 0 {
        return f64::INFINITY;
    }

    let skip = sample_stride(image.width) as usize;
    let ref_x = (candidate.tiles_x >> 1) * tile_w;
    let ref_y = (candidate.tiles_y >> 1) * tile_h;

    let mut score = 0.0f64;
    for v in (0..tile_h).step_by(skip) {
        for u in (0..tile_w).step_by(skip) {
            let reference = image.luminance(ref_x + u, ref_y + v);
            let mut variance = 0.0f64;
            for ty in 0..candidate.tiles_y {
                for tx in 0..candidate.tiles_x {
                    let diff = image.luminance(tx * tile_w + u, ty * tile_h + v) - reference;
                    variance += diff * diff;
                }
            }
            score += variance;
        }
    }
    score
}

/// Score every candidate produced by `catalog`, in catalog order.
pub fn score_candidates(image: &QuiltImageView<'_>, catalog: &PresetCatalog) -> Vec<CandidateScore> {
    build_candidates(catalog, image.width, image.height)
        .into_iter()
        .map(|candidate| CandidateScore {
            candidate,
            score: score_candidate(image, &candidate),
        })
        .collect()
}

/// Infer the tile grid of a decoded quilt.
///
/// Fails only for a zero-sized image or a buffer that does not match the
/// declared dimensions. Ties (for instance a uniformly coloured image) go to
/// the earliest candidate in catalog order.
pub fn detect_tiling(
    width: u32,
    height: u32,
    rgba: &[u8],
    catalog: &PresetCatalog,
) -> Result<TileGrid> {
    let image = QuiltImageView::new(width, height, rgba)?;
    Ok(detect_tiling_view(&image, catalog))
}

pub fn detect_tiling_view(image: &QuiltImageView<'_>, catalog: &PresetCatalog) -> TileGrid {
    let candidates = build_candidates(catalog, image.width, image.height);
    let usable: Vec<(TilingCandidate, TileGrid)> = candidates
        .iter()
        .filter_map(|c| c.grid().map(|grid| (*c, grid)))
        .collect();

    match usable.as_slice() {
        [] => {
            let grid = catalog.fallback_grid();
            debug!(%grid, "no tiling candidates; using fallback grid");
            grid
        }
        [(_, only)] => {
            debug!(grid = %only, "single tiling candidate; skipping scoring");
            *only
        }
        _ => {
            let mut best: Option<(f64, TileGrid)> = None;
            for (candidate, grid) in &usable {
                let score = score_candidate(image, candidate);
                debug!(%grid, score, "scored tiling candidate");
                let better = match best {
                    None => true,
                    Some((best_score, _)) => score < best_score,
                };
                if better {
                    best = Some((score, *grid));
                }
            }
            let (score, grid) = best.unwrap_or((f64::INFINITY, usable[0].1));
            info!(
                width = image.width,
                height = image.height,
                %grid,
                score,
                "detected quilt tiling"
            );
            grid
        }
    }
}
