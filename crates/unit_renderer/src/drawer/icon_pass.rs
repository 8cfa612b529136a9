//! Icon classification and the two icon renderers (world billboards and
//! screen-space sprites).

use std::collections::BTreeMap;

use glam::{Vec2, Vec3, Vec4};

use super::{DrawUnitState, FramePhase, UnitDrawer};
use crate::commands::DrawCommand;
use crate::icons::{billboard_quad, fade_alpha, screen_quad, size_multiplier, world_icon_scale, IconData, IconId, ICON_FADE_MIN_ALPHA};
use crate::model::TextureId;
use crate::scene::{Scene, UnitView};
use crate::vertex::IconVertex;
use crate::visibility::{uses_default_icon, ScreenQuery, Visibility, WorldQuery};

/// Icon a unit is drawn with, and whether it is the radar blip.
fn icon_for<'s>(view: &UnitView, scene: &Scene<'s>) -> (&'s IconData, bool) {
    let catalog = scene.icons;
    let spectating = scene.viewer.spectating_full_view;
    if uses_default_icon(view.los, spectating) {
        return (catalog.default_icon(), true);
    }
    let is_ally = spectating || view.is_allied_with(scene.viewer);
    let def = scene.assets.presented_def(view.def, is_ally);
    let icon = match scene.assets.def(def).and_then(|d| d.icon) {
        Some(id) => catalog.get(id),
        None => catalog.default_icon(),
    };
    (icon, catalog.is_default(icon.id))
}

/// Drawn icon position: radar contacts jitter, and icons never sink into the ground.
fn icon_position(view: &UnitView, du: &DrawUnitState, scene: &Scene) -> Vec3 {
    let mut pos = du.draw_mid_pos;
    if !scene.viewer.spectating_full_view && !view.los.in_los() && !view.is_allied_with(scene.viewer) {
        pos += view.body.radar_error;
    }
    pos.y = pos.y.max(scene.terrain.height_at(pos.x, pos.z));
    pos
}

fn icon_color(view: &UnitView, scene: &Scene, alpha: f32) -> Vec4 {
    let rgb = if view.status.selected {
        Vec3::ONE
    } else {
        scene.teams.color(view.body.team).map_or(Vec3::ONE, |c| c.truncate())
    };
    rgb.extend(alpha)
}

/// Projected radius in pixels; 0 when the unit is behind the camera.
fn screen_radius(scene: &Scene, pos: Vec3, radius: f32) -> f32 {
    let camera = scene.camera;
    match (
        camera.window_coordinates(pos),
        camera.window_coordinates(pos + camera.right() * radius),
    ) {
        (Some(a), Some(b)) => (a.x - b.x).abs(),
        _ => 0.0,
    }
}

impl UnitDrawer {
    /// Decide full model vs. icon for every unit and refresh draw positions.
    pub(crate) fn classify_units(&mut self, scene: &Scene) {
        self.icon_units.clear();
        let screen_mode = self.config.unit_icons_as_ui;
        let spectating = scene.viewer.spectating_full_view;
        let time_offset = scene.clock.time_offset();

        for (&unit, du) in self.units.iter_mut() {
            let view = match UnitView::read(scene.world, unit, scene.viewer.ally_team) {
                Ok(view) => view,
                Err(e) => {
                    log::debug!("Skipping classification of {:?}: {}", unit, e);
                    continue;
                }
            };
            du.refresh(&view, scene.world, time_offset);

            let (icon, is_default) = icon_for(&view, scene);
            let always_icon = scene.assets.def(view.def).is_some_and(|d| d.always_icon);
            let radius = view.body.radius;
            let visibility = if screen_mode {
                let size_mult = size_multiplier(icon.effective_size(is_default, radius));
                self.classifier.classify_screen(&ScreenQuery {
                    los: view.los,
                    spectating,
                    always_icon,
                    interface_hidden: scene.viewer.hide_interface,
                    dead_or_being_built: view.status.health <= 0.0 || view.status.being_built,
                    screen_radius: screen_radius(scene, du.draw_pos, radius),
                    size_mult,
                    zoom_dist: self.zoom_dist,
                })
            } else {
                self.classifier.classify_world(&WorldQuery {
                    los: view.los,
                    spectating,
                    always_icon,
                    dist_sqr: scene
                        .camera
                        .icon_distance_sqr(du.draw_pos, scene.terrain.average_height()),
                    icon_distance: icon.distance,
                })
            };
            du.is_icon = visibility == Visibility::Icon;

            if !screen_mode
                && du.is_icon
                && !view.status.no_draw
                && !view.status.in_void
                && scene.camera.in_view(du.draw_mid_pos, radius)
            {
                self.icon_units.push(unit);
            }
        }
    }

    /// World-space billboards for units classified as icons this frame.
    pub fn draw_unit_icons(&mut self, scene: &Scene) {
        if self.config.unit_icons_as_ui {
            return;
        }
        self.phase = FramePhase::Icons;

        let (vanish, start) = (self.config.unit_icon_fade_vanish, self.config.unit_icon_fade_start);
        let camera = scene.camera;
        let mut batches: BTreeMap<IconId, (TextureId, Vec<IconVertex>)> = BTreeMap::new();
        for &unit in &self.icon_units {
            let Some(du) = self.units.get(&unit) else {
                continue;
            };
            let Ok(view) = UnitView::read(scene.world, unit, scene.viewer.ally_team) else {
                continue;
            };
            let (icon, is_default) = icon_for(&view, scene);
            let mut pos = icon_position(&view, du, scene);
            let dist = pos.distance(camera.position());
            let scale = world_icon_scale(icon, is_default, view.body.radius, dist);
            let ground = scene.terrain.height_at(pos.x, pos.z);
            pos.y = pos.y.max(ground + scale);

            let mult = size_multiplier(icon.effective_size(is_default, view.body.radius));
            let alpha = fade_alpha(dist / mult, vanish, start).unwrap_or(ICON_FADE_MIN_ALPHA) / 255.0;
            let quad = billboard_quad(pos, camera.right(), camera.up(), scale, icon_color(&view, scene, alpha));
            batches
                .entry(icon.id)
                .or_insert_with(|| (icon.texture, Vec::new()))
                .1
                .extend_from_slice(&quad);
        }
        if batches.is_empty() {
            return;
        }

        self.state.with_icon_drawing(false, |st| {
            for (icon, (texture, vertices)) in batches {
                st.emit(DrawCommand::DrawIcons {
                    icon,
                    texture,
                    screen: false,
                    vertices,
                });
            }
        });
    }

    /// Screen-space sprites: icon units at full alpha, plus overlay icons
    /// fading in over units that are still drawn as models.
    pub fn draw_unit_icons_screen(&mut self, scene: &Scene) {
        if !self.config.unit_icons_as_ui {
            return;
        }
        if scene.viewer.hide_interface && self.config.unit_icons_hide_with_ui {
            return;
        }
        self.phase = FramePhase::Icons;

        let (vanish, start) = (self.config.unit_icon_fade_vanish, self.config.unit_icon_fade_start);
        let viewport = scene.camera.viewport();
        let base = self.classifier.screen_icon_base();
        let mut batches = Vec::new();
        for (icon_id, units) in self.icons.groups() {
            let icon = scene.icons.get(icon_id);
            let is_default = scene.icons.is_default(icon_id);
            let mut vertices: Vec<IconVertex> = Vec::new();
            for &unit in units {
                let Some(du) = self.units.get(&unit) else {
                    continue;
                };
                let Ok(view) = UnitView::read(scene.world, unit, scene.viewer.ally_team) else {
                    continue;
                };
                if view.status.no_draw || view.status.in_void {
                    continue;
                }
                if view.status.health <= 0.0 || view.status.being_built {
                    continue;
                }
                let Some(win) = scene.camera.window_coordinates(icon_position(&view, du, scene)) else {
                    continue;
                };
                let mult = size_multiplier(icon.effective_size(is_default, view.body.radius));
                let alpha = if du.is_icon {
                    255.0
                } else {
                    match fade_alpha(self.zoom_dist / mult, vanish, start) {
                        Some(a) => a,
                        None => continue,
                    }
                };
                let half = base / 2.0 * mult;
                let center = Vec2::new(win.x, win.y);
                if center.x + half < 0.0
                    || center.y + half < 0.0
                    || center.x - half > viewport.x
                    || center.y - half > viewport.y
                {
                    continue;
                }
                vertices.extend_from_slice(&screen_quad(center, half, icon_color(&view, scene, alpha / 255.0)));
            }
            if !vertices.is_empty() {
                batches.push((icon_id, icon.texture, vertices));
            }
        }
        if batches.is_empty() {
            return;
        }

        self.state.with_icon_drawing(true, |st| {
            for (icon, texture, vertices) in batches {
                st.emit(DrawCommand::DrawIcons {
                    icon,
                    texture,
                    screen: true,
                    vertices,
                });
            }
        });
    }
}
