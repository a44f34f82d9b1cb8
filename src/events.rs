use std::path::PathBuf;

use crate::calibration::ResolvedCalibration;
use crate::quilt::TileGrid;

#[derive(Debug, Clone)]
pub struct LoadQuilt(pub PathBuf);

/// A decoded quilt ready for upload. Rows are top-to-bottom RGBA8.
#[derive(Debug, Clone)]
pub struct PreparedQuilt {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub tiles: TileGrid,
}

#[derive(Debug, Clone)]
pub struct QuiltLoaded(pub PreparedQuilt);

#[derive(Debug)]
pub struct InvalidQuilt(pub PathBuf);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    Next,
    Previous,
}

/// Calibration outcome handed to the viewer once the handshake settles.
#[derive(Debug, Clone)]
pub struct CalibrationReady(pub ResolvedCalibration);
