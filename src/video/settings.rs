//! Functions for loading the configuration of the driver.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::*;
use crate::utils::arena::HandleArena;
use crate::video::assets::prelude::FENCE_WAIT_FOR_EVER;
use crate::video::backends::gl::state::MAX_TEXTURE_UNITS;

/// The byte capacities of the tiers of the `HandleArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    /// Tier of 16 bytes blocks.
    pub small: usize,
    /// Tier of 64 bytes blocks.
    pub medium: usize,
    /// Tier of 128 bytes blocks.
    pub large: usize,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        ArenaSettings {
            small: 16 * 1024,
            medium: 64 * 1024,
            large: 128 * 1024,
        }
    }
}

/// A structure containing configuration data for the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub arena: ArenaSettings,
    /// Timeout in nanoseconds of the waits on the fences of stream images, before a
    /// texture fed by a stream gets sampled.
    pub fence_timeout_ns: u64,
    /// Clears with geometry instead of `glClear`, overriding the detected vendor bugs
    /// if set.
    pub force_geometry_clear: Option<bool>,
    /// Never invalidates framebuffers, overriding the detected vendor bugs if set.
    pub disable_invalidate_framebuffer: Option<bool>,
    /// The number of texture units used, clamped to 16 and to the limit of the context.
    pub texture_units: usize,
}

impl Default for DriverSettings {
    fn default() -> Self {
        DriverSettings {
            arena: ArenaSettings::default(),
            fence_timeout_ns: FENCE_WAIT_FOR_EVER,
            force_geometry_clear: None,
            disable_invalidate_framebuffer: None,
            texture_units: MAX_TEXTURE_UNITS,
        }
    }
}

impl DriverSettings {
    /// Loads settings from a JSON file. Missing fields take their default values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let settings = text.parse()?;

        info!("Driver settings loaded from {:?}.", path);
        Ok(settings)
    }

    /// Creates the `HandleArena` described by these settings.
    pub fn arena(&self) -> HandleArena {
        HandleArena::new(self.arena.small, self.arena.medium, self.arena.large)
    }

    /// The number of texture units, clamped to the ones the state cache tracks.
    #[inline]
    pub fn texture_units(&self) -> usize {
        self.texture_units.max(1).min(MAX_TEXTURE_UNITS)
    }
}

impl FromStr for DriverSettings {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let settings: DriverSettings = "{}".parse().unwrap();
        assert_eq!(settings, DriverSettings::default());
        assert_eq!(settings.fence_timeout_ns, FENCE_WAIT_FOR_EVER);
        assert_eq!(settings.texture_units(), 16);
        assert!(settings.force_geometry_clear.is_none());
    }

    #[test]
    fn parse() {
        let text = r#"{
            "arena": { "small": 256 },
            "fence_timeout_ns": 1000,
            "force_geometry_clear": true,
            "texture_units": 64
        }"#;

        let settings = DriverSettings::from_str(text).unwrap();
        assert_eq!(settings.arena.small, 256);
        assert_eq!(settings.arena.medium, ArenaSettings::default().medium);
        assert_eq!(settings.fence_timeout_ns, 1000);
        assert_eq!(settings.force_geometry_clear, Some(true));
        assert_eq!(settings.disable_invalidate_framebuffer, None);
        assert_eq!(settings.texture_units(), 16);
    }

    #[test]
    fn malformed() {
        match DriverSettings::from_str("{ \"texture_units\": \"four\" }") {
            Err(Error::Settings(_)) => {}
            v => panic!("unexpected {:?}", v),
        }

        assert!(DriverSettings::load("/nonexistent/crayon-video.json").is_err());
    }

    #[test]
    fn round_trip() {
        let mut settings = DriverSettings::default();
        settings.disable_invalidate_framebuffer = Some(false);

        let text = serde_json::to_string(&settings).unwrap();
        assert_eq!(DriverSettings::from_str(&text).unwrap(), settings);
    }
}
