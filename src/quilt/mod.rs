//! Quilt images: pixel access, the preset catalog and tiling detection.

pub mod detect;
pub mod image;
pub mod preset;

pub use detect::{detect_tiling, detect_tiling_view, CandidateScore, TilingCandidate};
pub use self::image::QuiltImageView;
pub use preset::{PresetCatalog, QuiltPreset, TileGrid, BUILTIN_PRESETS};
