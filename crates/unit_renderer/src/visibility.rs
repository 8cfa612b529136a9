//! Per-unit, per-frame decision between full model, icon and nothing.
//!
//! World-space and screen-space icon modes have independent rules: world mode
//! compares camera distance against the icon distance, screen mode compares
//! the unit's projected radius against the icon's pixel size.

use engine_core::LosBits;

use crate::config::DrawerConfig;
use crate::icons::screen_icon_base;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Full,
    Icon,
    Hidden,
}

impl Visibility {
    pub fn is_icon(self) -> bool {
        self == Visibility::Icon
    }
}

/// Which icon a unit shows to the local viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconChoice {
    /// The unit type's own icon.
    Custom,
    /// The radar blip.
    Default,
    None,
}

/// Inputs of the world-space decision.
#[derive(Debug, Clone, Copy)]
pub struct WorldQuery {
    pub los: LosBits,
    pub spectating: bool,
    pub always_icon: bool,
    /// Squared camera distance (or squared camera height over ground).
    pub dist_sqr: f32,
    /// Icon distance multiplier of the unit's icon.
    pub icon_distance: f32,
}

/// Inputs of the screen-space decision.
#[derive(Debug, Clone, Copy)]
pub struct ScreenQuery {
    pub los: LosBits,
    pub spectating: bool,
    pub always_icon: bool,
    /// Interface hidden by the player.
    pub interface_hidden: bool,
    pub dead_or_being_built: bool,
    /// Projected unit radius in pixels.
    pub screen_radius: f32,
    /// Icon size multiplier, see `icons::size_multiplier`.
    pub size_mult: f32,
    /// Distance from the camera to the ground along the view ray.
    pub zoom_dist: f32,
}

#[derive(Debug, Clone)]
pub struct VisibilityClassifier {
    icon_base_length: f32,
    screen_icon_base: f32,
    icon_scale_ui: f32,
    fade_start: f32,
    hide_with_ui: bool,
}

impl VisibilityClassifier {
    pub fn new(config: &DrawerConfig) -> Self {
        Self {
            icon_base_length: config.icon_base_length(),
            screen_icon_base: 16.0,
            icon_scale_ui: config.unit_icon_scale_ui,
            fade_start: config.unit_icon_fade_start,
            hide_with_ui: config.unit_icons_hide_with_ui,
        }
    }

    /// Recompute the screen icon size after a viewport change.
    pub fn set_viewport(&mut self, viewport: glam::Vec2) {
        self.screen_icon_base = screen_icon_base(viewport, self.icon_scale_ui);
    }

    pub fn screen_icon_base(&self) -> f32 {
        self.screen_icon_base
    }

    /// World distance beyond which a unit with this icon multiplier becomes an icon.
    pub fn icon_threshold(&self, icon_distance: f32) -> f32 {
        self.icon_base_length * icon_distance
    }

    pub fn classify_world(&self, q: &WorldQuery) -> Visibility {
        if !q.los.in_los() && !q.spectating {
            return if q.los.in_radar() { Visibility::Icon } else { Visibility::Hidden };
        }
        if q.always_icon {
            return Visibility::Icon;
        }
        let threshold = self.icon_threshold(q.icon_distance);
        if q.dist_sqr > threshold * threshold {
            Visibility::Icon
        } else {
            Visibility::Full
        }
    }

    pub fn classify_screen(&self, q: &ScreenQuery) -> Visibility {
        let visible = q.los.in_los() || q.spectating;
        if (q.interface_hidden && self.hide_with_ui) || q.dead_or_being_built {
            return if visible { Visibility::Full } else { Visibility::Hidden };
        }
        if !visible {
            return if q.los.in_radar() { Visibility::Icon } else { Visibility::Hidden };
        }
        if q.always_icon {
            return Visibility::Icon;
        }
        // Keep the model while the icon is still fading in, or while the
        // model is at least 90% of the icon's size on screen.
        let limit = self.screen_icon_base / 2.0 * q.size_mult;
        let faded_in = q.zoom_dist / q.size_mult > self.fade_start;
        if faded_in && q.screen_radius < limit * 0.9 {
            Visibility::Icon
        } else {
            Visibility::Full
        }
    }
}

/// Icon shown to the local viewer, if any.
pub fn resolve_icon(los: LosBits, spectating: bool, ghosted_building: bool) -> IconChoice {
    let seen = los.in_los() || (los.in_radar() && los.identified());
    if seen || spectating || (ghosted_building && los.contains(LosBits::PREV_LOS)) {
        IconChoice::Custom
    } else if los.in_radar() {
        IconChoice::Default
    } else {
        IconChoice::None
    }
}

/// Whether an icon is drawn as a radar blip instead of the unit's own icon.
pub fn uses_default_icon(los: LosBits, spectating: bool) -> bool {
    !spectating && !los.in_los() && !los.identified()
}
