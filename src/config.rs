// Startup settings for a Retro context. Every field has a default, so a JSON
// file only needs the keys it wants to change.

use crate::error::{Error, Result};
use crate::vsync::PacingMode;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_FRAME_RATE: u32 = 25;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetroConfig {
    pub title: String,
    /// Render ticks per second.
    pub frame_rate: u32,
    /// How `wait_for_vsync` waits.
    pub pacing: PacingMode,
    /// Surface size before the first viewport resize.
    pub surface_width: usize,
    pub surface_height: usize,
}

impl Default for RetroConfig {
    fn default() -> Self {
        Self {
            title: "Retro".to_owned(),
            frame_rate: DEFAULT_FRAME_RATE,
            pacing: PacingMode::default(),
            surface_width: 200,
            surface_height: 200,
        }
    }
}

impl RetroConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            return Err(Error::InvalidFrameRate(0));
        }
        if self.surface_width == 0 || self.surface_height == 0 {
            return Err(Error::Config(format!(
                "surface size must be non-zero, got {}x{}",
                self.surface_width, self.surface_height
            )));
        }
        Ok(())
    }

    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingMode) -> Self {
        self.pacing = pacing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_library() {
        let c = RetroConfig::default();
        assert_eq!(c.title, "Retro");
        assert_eq!(c.frame_rate, 25);
        assert_eq!((c.surface_width, c.surface_height), (200, 200));
        assert_eq!(c.pacing, PacingMode::Park);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = RetroConfig::from_json_str(r#"{ "frame_rate": 60, "pacing": "spin" }"#).unwrap();
        assert_eq!(c.frame_rate, 60);
        assert_eq!(c.pacing, PacingMode::Spin);
        assert_eq!(c.title, "Retro");
    }

    #[test]
    fn rejects_zero_frame_rate_and_bad_json() {
        assert!(matches!(
            RetroConfig::from_json_str(r#"{ "frame_rate": 0 }"#),
            Err(Error::InvalidFrameRate(0))
        ));
        assert!(matches!(
            RetroConfig::from_json_str(r#"{ "pacing": "sometimes" }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RetroConfig::default().with_frame_rate(30).validate(),
            Ok(())
        ));
    }
}
