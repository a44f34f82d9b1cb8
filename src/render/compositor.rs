//! CPU reference of the lenticular compositing shader.
//!
//! Mirrors `shaders/lenticular.wgsl` line for line in `f32` so the GPU path
//! can be checked without a device. Screen coordinates `uv` are normalized
//! with the origin in the bottom-left corner.
//!
//! `flip` is not applied to `uv`: the lenticular sheet is fixed to physical
//! pixel columns, so a flipped panel only changes the sign of `tilt`, which
//! [`compute_uniforms`](super::compute_uniforms) already folds in.

use image::RgbaImage;

use super::uniforms::UniformBlock;
use crate::quilt::QuiltImageView;

/// Fold any finite `z` into `[0, 1)`.
///
/// `ceil(|z|)` lifts negative inputs to a non-negative dividend before the
/// GLSL-style `x - floor(x)` modulo. Integral inputs (including `-1.0`) map
/// to exactly `0.0`.
#[inline]
pub fn wrap_unit(z: f32) -> f32 {
    let lifted = z + z.abs().ceil();
    let wrapped = lifted - lifted.floor();
    // `lifted - floor` can round up to 1.0 for tiny negative fractions
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}

/// Blend between `z` and `1 - z` by `inv_view` (0 or 1 in production).
#[inline]
pub fn invert_view(z: f32, inv_view: f32) -> f32 {
    (1.0 - inv_view) * z + inv_view * (1.0 - z)
}

/// View coordinate in `[0, 1)` seen by colour channel `channel` (0 = R,
/// 1 = G, 2 = B) at screen position `uv`.
#[inline]
pub fn channel_depth(block: &UniformBlock, uv: [f32; 2], channel: usize) -> f32 {
    let z = (uv[0] + channel as f32 * block.subp + uv[1] * block.tilt) * block.pitch - block.center;
    invert_view(wrap_unit(z), block.inv_view)
}

/// Index of the view tile selected by depth `z`.
#[inline]
pub fn tile_index(z: f32, tiles: [f32; 2]) -> f32 {
    (z * tiles[0] * tiles[1]).floor()
}

/// Quilt texture coordinate (origin bottom-left) for depth `z` at `uv`.
#[inline]
pub fn tile_sample_coord(uv: [f32; 2], z: f32, tiles: [f32; 2]) -> [f32; 2] {
    let index = tile_index(z, tiles);
    let column = index - tiles[0] * (index / tiles[0]).floor();
    let row = (index / tiles[0]).floor();
    [(column + uv[0]) / tiles[0], (row + uv[1]) / tiles[1]]
}

/// Colour of one output pixel: R, G and B each taken from their own view.
pub fn composite_pixel(block: &UniformBlock, quilt: &QuiltImageView<'_>, uv: [f32; 2]) -> [u8; 4] {
    let mut out = [0u8, 0, 0, 255];
    for (channel, slot) in out.iter_mut().take(3).enumerate() {
        let z = channel_depth(block, uv, channel);
        let [sx, sy] = tile_sample_coord(uv, z, block.tiles);
        *slot = quilt.sample_nearest(sx, sy)[channel];
    }
    out
}

/// Composite a full `width x height` frame. Output rows are top-to-bottom;
/// each pixel is evaluated at its centre.
pub fn render_frame(
    block: &UniformBlock,
    quilt: &QuiltImageView<'_>,
    width: u32,
    height: u32,
) -> RgbaImage {
    let w = width.max(1);
    let h = height.max(1);
    RgbaImage::from_fn(w, h, |x, y| {
        let u = (x as f32 + 0.5) / w as f32;
        let v = 1.0 - (y as f32 + 0.5) / h as f32;
        image::Rgba(composite_pixel(block, quilt, [u, v]))
    })
}
