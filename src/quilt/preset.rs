use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::Error;

/// A known quilt canvas layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QuiltPreset {
    pub name: Cow<'static, str>,
    pub width: u32,
    pub height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl QuiltPreset {
    pub const fn builtin(
        name: &'static str,
        width: u32,
        height: u32,
        tiles_x: u32,
        tiles_y: u32,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            width,
            height,
            tiles_x,
            tiles_y,
        }
    }

    pub fn tile_grid(&self) -> Option<TileGrid> {
        TileGrid::new(self.tiles_x, self.tiles_y).ok()
    }
}

/// Historical Looking Glass quilt formats. Order matters: it breaks ties
/// during detection.
pub const BUILTIN_PRESETS: &[QuiltPreset] = &[
    QuiltPreset::builtin("Standard", 2048, 2048, 4, 8),
    QuiltPreset::builtin("High Res", 4096, 4096, 5, 9),
    QuiltPreset::builtin("High View", 4096, 4096, 6, 10),
    QuiltPreset::builtin("Extra Low", 1600, 1600, 4, 6),
];

/// Grid used when there is nothing to detect against.
pub const FALLBACK_GRID: TileGrid = TileGrid {
    tiles_x: 4,
    tiles_y: 8,
};

/// Ordered preset table: built-ins first, then user additions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetCatalog {
    presets: Vec<QuiltPreset>,
}

impl PresetCatalog {
    pub fn builtin() -> Self {
        Self {
            presets: BUILTIN_PRESETS.to_vec(),
        }
    }

    pub fn empty() -> Self {
        Self {
            presets: Vec::new(),
        }
    }

    pub fn from_presets(presets: Vec<QuiltPreset>) -> Self {
        Self { presets }
    }

    /// Built-ins followed by `extra`, in the given order.
    pub fn with_extra(extra: impl IntoIterator<Item = QuiltPreset>) -> Self {
        let mut catalog = Self::builtin();
        catalog.presets.extend(extra);
        catalog
    }

    pub fn presets(&self) -> &[QuiltPreset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// First usable grid in the table, or the built-in Standard grid.
    pub fn fallback_grid(&self) -> TileGrid {
        self.presets
            .first()
            .and_then(QuiltPreset::tile_grid)
            .unwrap_or(FALLBACK_GRID)
    }
}

impl Default for PresetCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// `(tiles_x, tiles_y)` division of a quilt. Both axes are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileGrid {
    tiles_x: u32,
    tiles_y: u32,
}

impl TileGrid {
    pub fn new(tiles_x: u32, tiles_y: u32) -> Result<Self, Error> {
        if tiles_x == 0 || tiles_y == 0 {
            return Err(Error::InvalidTileGrid(format!("{tiles_x}x{tiles_y}")));
        }
        Ok(Self { tiles_x, tiles_y })
    }

    pub const fn tiles_x(&self) -> u32 {
        self.tiles_x
    }

    pub const fn tiles_y(&self) -> u32 {
        self.tiles_y
    }
}

impl fmt::Display for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.tiles_x, self.tiles_y)
    }
}

impl FromStr for TileGrid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::InvalidTileGrid(s.to_string());
        let (x, y) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(bad)?;
        let x = x.trim().parse::<u32>().map_err(|_| bad())?;
        let y = y.trim().parse::<u32>().map_err(|_| bad())?;
        Self::new(x, y)
    }
}
