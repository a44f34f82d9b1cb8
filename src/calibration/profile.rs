use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scalar constant as the display bridge encodes it: `{"value": 49.8}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationValue {
    pub value: f64,
}

impl CalibrationValue {
    pub const fn new(value: f64) -> Self {
        Self { value }
    }
}

/// Optical constants of one physical display's lenticular sheet.
///
/// Replaced wholesale when a new profile is resolved; never patched field by
/// field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProfile {
    pub config_version: String,
    pub serial: String,
    pub pitch: CalibrationValue,
    pub slope: CalibrationValue,
    pub center: CalibrationValue,
    pub view_cone: CalibrationValue,
    pub inv_view: CalibrationValue,
    pub vertical_angle: CalibrationValue,
    #[serde(rename = "DPI")]
    pub dpi: CalibrationValue,
    #[serde(rename = "screenW")]
    pub screen_w: CalibrationValue,
    #[serde(rename = "screenH")]
    pub screen_h: CalibrationValue,
    pub flip_image_x: CalibrationValue,
    pub flip_image_y: CalibrationValue,
    pub flip_subp: CalibrationValue,
}

impl CalibrationProfile {
    /// Profile used whenever no live calibration is available.
    pub fn fallback() -> Self {
        Self {
            config_version: "1.0".to_string(),
            serial: "00112".to_string(),
            pitch: CalibrationValue::new(49.825_218_200_683_597),
            slope: CalibrationValue::new(5.216_032_505_035_4),
            center: CalibrationValue::new(-0.233_967_483_043_670_66),
            view_cone: CalibrationValue::new(40.0),
            inv_view: CalibrationValue::new(1.0),
            vertical_angle: CalibrationValue::new(0.0),
            dpi: CalibrationValue::new(338.0),
            screen_w: CalibrationValue::new(2560.0),
            screen_h: CalibrationValue::new(1600.0),
            flip_image_x: CalibrationValue::new(0.0),
            flip_image_y: CalibrationValue::new(0.0),
            flip_subp: CalibrationValue::new(0.0),
        }
    }

    /// Parse a bridge payload and reject profiles the uniform math cannot use.
    pub fn from_json(payload: &str) -> Result<Self> {
        let profile: Self =
            serde_json::from_str(payload).map_err(|err| Error::Calibration(err.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::Calibration(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("pitch", self.pitch.value),
            ("slope", self.slope.value),
            ("center", self.center.value),
            ("viewCone", self.view_cone.value),
            ("invView", self.inv_view.value),
            ("verticalAngle", self.vertical_angle.value),
            ("DPI", self.dpi.value),
            ("screenW", self.screen_w.value),
            ("screenH", self.screen_h.value),
            ("flipImageX", self.flip_image_x.value),
            ("flipImageY", self.flip_image_y.value),
            ("flipSubp", self.flip_subp.value),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::Calibration(format!("{name} is not finite")));
        }
        if self.dpi.value <= 0.0 {
            return Err(Error::Calibration("DPI must be positive".into()));
        }
        if self.slope.value == 0.0 {
            return Err(Error::Calibration("slope must be non-zero".into()));
        }
        if self.screen_w.value <= 0.0 {
            return Err(Error::Calibration("screenW must be positive".into()));
        }
        Ok(())
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIDGE_PAYLOAD: &str = r#"{
        "configVersion": "1.0",
        "serial": "LKG-2K-04512",
        "pitch": {"value": 47.57},
        "slope": {"value": -5.48},
        "center": {"value": 0.131},
        "viewCone": {"value": 40.0},
        "invView": {"value": 1.0},
        "verticalAngle": {"value": 0.0},
        "DPI": {"value": 338.0},
        "screenW": {"value": 2560.0},
        "screenH": {"value": 1600.0},
        "flipImageX": {"value": 0.0},
        "flipImageY": {"value": 0.0},
        "flipSubp": {"value": 0.0}
    }"#;

    #[test]
    fn parses_bridge_payload() {
        let profile = CalibrationProfile::from_json(BRIDGE_PAYLOAD).unwrap();
        assert_eq!(profile.serial, "LKG-2K-04512");
        assert!((profile.slope.value + 5.48).abs() < 1e-12);
        assert!((profile.dpi.value - 338.0).abs() < 1e-12);
    }

    #[test]
    fn json_uses_bridge_key_names() {
        let json = serde_json::to_value(CalibrationProfile::fallback()).unwrap();
        assert!(json.get("DPI").is_some());
        assert!(json.get("screenW").is_some());
        assert!(json.get("flipImageX").is_some());
        assert_eq!(json["invView"]["value"], 1.0);
    }

    #[test]
    fn rejects_missing_fields() {
        let err = CalibrationProfile::from_json(r#"{"serial": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::Calibration(_)));
    }

    #[test]
    fn rejects_unusable_constants() {
        let payload = BRIDGE_PAYLOAD.replace(r#""DPI": {"value": 338.0}"#, r#""DPI": {"value": 0.0}"#);
        assert!(CalibrationProfile::from_json(&payload).is_err());
        let payload = BRIDGE_PAYLOAD.replace(r#""slope": {"value": -5.48}"#, r#""slope": {"value": 0}"#);
        assert!(CalibrationProfile::from_json(&payload).is_err());
    }

    #[test]
    fn fallback_is_valid() {
        CalibrationProfile::fallback().validate().unwrap();
    }
}
