//! Shader-facing uniform block derived from calibration, viewport and tiling.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::calibration::CalibrationProfile;
use crate::quilt::TileGrid;

/// Number of `f32` slots in [`UniformBlock`], padding included.
pub const UNIFORM_SLOTS: usize = 12;

/// Fixed-layout record uploaded to the GPU (std140 compatible, 48 bytes).
///
/// Slot order: pitch, tilt, center, invView, flip.xy, tiles.xy, subp and
/// three padding slots that keep the block a multiple of 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub pitch: f32,
    pub tilt: f32,
    pub center: f32,
    pub inv_view: f32,
    pub flip: [f32; 2],
    pub tiles: [f32; 2],
    pub subp: f32,
    pub _padding: [f32; 3],
}

impl UniformBlock {
    pub fn as_slots(&self) -> [f32; UNIFORM_SLOTS] {
        bytemuck::cast(*self)
    }

    pub fn tiles_x(&self) -> f32 {
        self.tiles[0]
    }

    pub fn tiles_y(&self) -> f32 {
        self.tiles[1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Zero extents (minimized windows) are clamped to one pixel.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Pure mapping from calibration constants to shader uniforms.
pub fn compute_uniforms(
    profile: &CalibrationProfile,
    viewport: Viewport,
    tiles: TileGrid,
) -> UniformBlock {
    let width = f64::from(viewport.width.max(1));
    let height = f64::from(viewport.height.max(1));
    let slope = profile.slope.value;
    let flip_x = profile.flip_image_x.value;
    let flip_y = profile.flip_image_y.value;

    let screen_inches = width / profile.dpi.value;
    // lenticules are tilted, so measure their pitch along a pixel row
    let pitch = profile.pitch.value * screen_inches * (1.0 / slope).atan().cos();

    let mut tilt = height / (width * slope);
    if flip_x == 1.0 {
        tilt = -tilt;
    }

    let subp = 1.0 / (profile.screen_w.value * 3.0);

    UniformBlock {
        pitch: pitch as f32,
        tilt: tilt as f32,
        center: profile.center.value as f32,
        inv_view: profile.inv_view.value as f32,
        flip: [flip_x as f32, flip_y as f32],
        tiles: [tiles.tiles_x() as f32, tiles.tiles_y() as f32],
        subp: subp as f32,
        _padding: [0.0; 3],
    }
}

/// Render-thread owner of the active uniform inputs.
///
/// Every setter rebuilds a complete block and bumps the version; the
/// renderer pulls it with [`UniformState::take_dirty`] exactly once per
/// version, so a frame never sees a half-updated block.
#[derive(Debug, Clone)]
pub struct UniformState {
    profile: Option<CalibrationProfile>,
    viewport: Viewport,
    tiles: Option<TileGrid>,
    block: Option<UniformBlock>,
    version: u64,
    uploaded: u64,
}

impl UniformState {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            profile: None,
            viewport,
            tiles: None,
            block: None,
            version: 0,
            uploaded: 0,
        }
    }

    pub fn set_profile(&mut self, profile: CalibrationProfile) {
        self.profile = Some(profile);
        self.rebuild();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport == viewport {
            return;
        }
        self.viewport = viewport;
        self.rebuild();
    }

    pub fn set_tiles(&mut self, tiles: TileGrid) {
        self.tiles = Some(tiles);
        self.rebuild();
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.block.is_some() && self.version != self.uploaded
    }

    /// The block to upload, if it changed since the last call.
    pub fn take_dirty(&mut self) -> Option<UniformBlock> {
        if !self.is_dirty() {
            return None;
        }
        self.uploaded = self.version;
        self.block
    }

    fn rebuild(&mut self) {
        let (Some(profile), Some(tiles)) = (self.profile.as_ref(), self.tiles) else {
            return;
        };
        let block = compute_uniforms(profile, self.viewport, tiles);
        self.block = Some(block);
        self.version += 1;
        debug!(
            version = self.version,
            width = self.viewport.width,
            height = self.viewport.height,
            %tiles,
            pitch = block.pitch,
            tilt = block.tilt,
            "uniform block rebuilt"
        );
    }
}
