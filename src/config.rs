use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::calibration::channel::{DEFAULT_BRIDGE_URL, DEFAULT_TIMEOUT};
use crate::quilt::{PresetCatalog, QuiltPreset};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct CalibrationOptions {
    /// WebSocket endpoint of the local display bridge.
    pub bridge_url: String,
    /// How long to wait for the first calibration message.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Display bridge connection settings.
    pub calibration: CalibrationOptions,
    /// Extra quilt layouts appended after the built-in presets.
    pub quilt_presets: Vec<QuiltPreset>,
    /// Start the viewer in borderless fullscreen.
    pub fullscreen: bool,
    /// Quilts larger than this on either axis are downsized before upload.
    pub max_texture_dimension: u32,
    /// Maximum number of concurrent quilt decodes in the loader.
    pub loader_max_concurrent_decodes: usize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            calibration: CalibrationOptions::default(),
            quilt_presets: Vec::new(),
            fullscreen: false,
            max_texture_dimension: 8192,
            loader_max_concurrent_decodes: 2,
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.calibration.bridge_url.trim().is_empty(),
            "calibration.bridge-url must not be empty"
        );
        ensure!(
            self.calibration.bridge_url.starts_with("ws://")
                || self.calibration.bridge_url.starts_with("wss://"),
            "calibration.bridge-url must be a ws:// or wss:// URL"
        );
        ensure!(
            !self.calibration.timeout.is_zero(),
            "calibration.timeout must be greater than zero"
        );
        ensure!(
            self.max_texture_dimension > 0,
            "max-texture-dimension must be greater than zero"
        );
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        for preset in &self.quilt_presets {
            ensure!(
                !preset.name.trim().is_empty(),
                "quilt-presets entries need a name"
            );
            ensure!(
                preset.width > 0 && preset.height > 0,
                "quilt preset '{}' must have a non-zero canvas",
                preset.name
            );
            ensure!(
                preset.tiles_x > 0 && preset.tiles_y > 0,
                "quilt preset '{}' must have at least one tile per axis",
                preset.name
            );
        }
        Ok(self)
    }

    /// Built-in presets followed by the configured extras.
    pub fn catalog(&self) -> PresetCatalog {
        PresetCatalog::with_extra(self.quilt_presets.iter().cloned())
    }
}
