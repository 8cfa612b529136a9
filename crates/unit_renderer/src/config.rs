//! Unit drawer configuration. Loaded from a RON file once at drawer construction.

use glam::Vec4;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// File name looked up in the working directory by `DrawerConfig::load_default`.
pub const CONFIG_FILE_NAME: &str = "unit_drawer.ron";

/// Squared icon length per squared configured icon distance.
const ICON_LENGTH_FACTOR: f32 = 750.0;

/// Rendering options for units, icons and ghosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawerConfig {
    /// Distance multiplier (of unit radius) beyond which units use the far-texture renderer.
    #[serde(default = "default_lod_dist")]
    pub unit_lod_dist: f32,
    /// Base icon distance; see `icon_base_length`.
    #[serde(default = "default_icon_dist")]
    pub unit_icon_dist: f32,
    /// Scale of screen-space icons (0.5..=2.0).
    #[serde(default = "default_one")]
    pub unit_icon_scale_ui: f32,
    /// Zoom distance at which overlay icons become fully opaque.
    #[serde(default = "default_fade_start")]
    pub unit_icon_fade_start: f32,
    /// Zoom distance below which overlay icons are not drawn.
    #[serde(default = "default_fade_vanish")]
    pub unit_icon_fade_vanish: f32,
    /// Transparency of cloaked units and ghosts (0 = opaque).
    #[serde(default = "default_transparency")]
    pub unit_transparency: f32,
    /// Draw icons as fixed-size UI sprites instead of world billboards.
    #[serde(default)]
    pub unit_icons_as_ui: bool,
    /// Suppress screen-space icons while the interface is hidden.
    #[serde(default)]
    pub unit_icons_hide_with_ui: bool,
    #[serde(default = "default_max_lights")]
    pub max_dynamic_model_lights: u32,
    /// Use the advanced shading state when the platform supports it.
    #[serde(default = "default_true")]
    pub adv_unit_shading: bool,
    /// Keep silhouettes of enemy buildings that were seen and then lost from sight.
    #[serde(default = "default_true")]
    pub ghosted_buildings: bool,
    /// Tint build wireframes with the team color instead of the unit type's nano color.
    #[serde(default)]
    pub team_nanospray: bool,
    /// Avoid clip planes on wireframe/fill build stages (broken drivers).
    #[serde(default)]
    pub clip_plane_quirk: bool,
    /// Fill the deferred geometry buffers with units before the forward opaque pass.
    #[serde(default)]
    pub draw_deferred: bool,
    /// Upper bound on live units; sizes the ghost slab.
    #[serde(default = "default_max_units")]
    pub max_units: usize,
}

fn default_lod_dist() -> f32 {
    1000.0
}
fn default_icon_dist() -> f32 {
    200.0
}
fn default_one() -> f32 {
    1.0
}
fn default_fade_start() -> f32 {
    3000.0
}
fn default_fade_vanish() -> f32 {
    1000.0
}
fn default_transparency() -> f32 {
    0.7
}
fn default_max_lights() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_max_units() -> usize {
    32_000
}

impl Default for DrawerConfig {
    fn default() -> Self {
        Self {
            unit_lod_dist: default_lod_dist(),
            unit_icon_dist: default_icon_dist(),
            unit_icon_scale_ui: default_one(),
            unit_icon_fade_start: default_fade_start(),
            unit_icon_fade_vanish: default_fade_vanish(),
            unit_transparency: default_transparency(),
            unit_icons_as_ui: false,
            unit_icons_hide_with_ui: false,
            max_dynamic_model_lights: default_max_lights(),
            adv_unit_shading: true,
            ghosted_buildings: true,
            team_nanospray: false,
            clip_plane_quirk: false,
            draw_deferred: false,
            max_units: default_max_units(),
        }
    }
}

impl DrawerConfig {
    /// Load config from `unit_drawer.ron` in the working directory.
    pub fn load_default() -> Self {
        Self::load(&config_path())
    }

    /// Load config from `path`. If the file is missing or invalid, returns default config.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(c) => c,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No drawer config at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                log::warn!("Invalid drawer config at {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Strict variant of `load`: reports IO and parse failures.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_ron(&data)
    }

    pub fn from_ron(data: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(data)?;
        Ok(config.sanitized())
    }

    /// Save current config to `path`. Logs on error.
    pub fn save(&self, path: &Path) {
        match ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default()) {
            Ok(s) => {
                if let Err(e) = std::fs::write(path, s) {
                    log::warn!("Could not write drawer config to {:?}: {}", path, e);
                }
            }
            Err(e) => log::warn!("Could not serialize drawer config: {}", e),
        }
    }

    /// Apply the documented option ranges.
    pub fn sanitized(mut self) -> Self {
        self.unit_lod_dist = self.unit_lod_dist.max(0.0);
        self.unit_icon_dist = self.unit_icon_dist.max(0.0);
        self.unit_icon_scale_ui = self.unit_icon_scale_ui.clamp(0.5, 2.0);
        self.unit_icon_fade_start = self.unit_icon_fade_start.clamp(1.0, 10_000.0);
        self.unit_icon_fade_vanish = self.unit_icon_fade_vanish.clamp(1.0, 10_000.0);
        self.max_units = self.max_units.max(1);
        self
    }

    /// Alpha tiers for translucent drawing: base, +0.1, +0.2, +0.4 (each clamped to 1).
    pub fn alpha_values(&self) -> Vec4 {
        let x = (1.0 - self.unit_transparency).clamp(0.11, 1.0);
        Vec4::new(x, (x + 0.1).min(1.0), (x + 0.2).min(1.0), (x + 0.4).min(1.0))
    }

    /// Squared far-texture hand-off distance multiplier.
    pub fn unit_draw_dist_sqr(&self) -> f32 {
        self.unit_lod_dist * self.unit_lod_dist
    }

    /// World distance at which a unit with icon distance multiplier 1 turns into an icon.
    pub fn icon_base_length(&self) -> f32 {
        (ICON_LENGTH_FACTOR * self.unit_icon_dist * self.unit_icon_dist).sqrt()
    }

    /// Ghost slab capacity: ghosts are rare compared to live units.
    pub fn ghost_capacity(&self) -> usize {
        (self.max_units / 32).max(1)
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_tiers_from_default_transparency() {
        let a = DrawerConfig::default().alpha_values();
        assert!((a.x - 0.3).abs() < 1e-6);
        assert!((a.y - 0.4).abs() < 1e-6);
        assert!((a.z - 0.5).abs() < 1e-6);
        assert!((a.w - 0.7).abs() < 1e-6);
    }

    #[test]
    fn alpha_tiers_clamp_to_one_and_floor() {
        let opaque = DrawerConfig { unit_transparency: 0.0, ..Default::default() };
        assert_eq!(opaque.alpha_values(), Vec4::ONE);

        let invisible = DrawerConfig { unit_transparency: 1.0, ..Default::default() };
        assert!((invisible.alpha_values().x - 0.11).abs() < 1e-6);
    }

    #[test]
    fn partial_ron_fills_defaults_and_clamps() {
        let c = DrawerConfig::from_ron("(unit_icon_scale_ui: 5.0, unit_icons_as_ui: true)").unwrap();
        assert_eq!(c.unit_icon_scale_ui, 2.0);
        assert!(c.unit_icons_as_ui);
        assert_eq!(c.unit_lod_dist, 1000.0);
        assert!(c.adv_unit_shading);
    }

    #[test]
    fn invalid_ron_is_a_parse_error() {
        assert!(matches!(DrawerConfig::from_ron("(unit_lod_dist: \"far\")"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let c = DrawerConfig::load(Path::new("/nonexistent/dir/unit_drawer.ron"));
        assert_eq!(c, DrawerConfig::default());
    }

    #[test]
    fn ghost_capacity_is_small_fraction_of_max_units() {
        let c = DrawerConfig { max_units: 3200, ..Default::default() };
        assert_eq!(c.ghost_capacity(), 100);
    }

    #[test]
    fn saved_config_loads_back() {
        let path = std::env::temp_dir().join(format!("unit_drawer_{}.ron", std::process::id()));
        let c = DrawerConfig { unit_lod_dist: 450.0, team_nanospray: true, ..Default::default() };
        c.save(&path);
        let loaded = DrawerConfig::try_load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, c);
    }
}
