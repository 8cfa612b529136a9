//! Deferred, opaque, translucent and shadow passes plus single-unit draws.

use std::collections::HashMap;

use engine_core::{Entity, LosBits, Transform, UnitDefId};
use glam::{Mat4, Vec3, Vec4};

use super::{CustomMaterialHandler, DrawUnitState, FramePhase, UnitDrawer};
use crate::bins::{BinKind, ModelBinSet};
use crate::build_stage::{draw_being_built, BuildDraw};
use crate::commands::{DrawCommand, MaterialPass};
use crate::config::DrawerConfig;
use crate::ghosts::GhostRegistry;
use crate::model::{Model, ModelType};
use crate::scene::{Scene, UnitView};
use crate::state::RenderStateMachine;
use crate::temp_units::{TempDrawUnit, TEMP_UNIT_CULL_RADIUS};
use crate::vertex::UnitInstance;

const GHOST_GREY: f32 = 0.6;
const RADAR_GHOST_GREY: f32 = 0.9;
const BORDER_GREEN: Vec3 = Vec3::new(0.2, 1.0, 0.2);

/// Read-only inputs shared by the pass functions of one frame.
struct PassCtx<'a> {
    scene: &'a Scene<'a>,
    config: &'a DrawerConfig,
    units: &'a HashMap<Entity, DrawUnitState>,
    alpha: Vec4,
    custom: Option<&'a dyn CustomMaterialHandler>,
}

impl<'a> PassCtx<'a> {
    fn new(
        scene: &'a Scene<'a>,
        config: &'a DrawerConfig,
        units: &'a HashMap<Entity, DrawUnitState>,
        alpha: Vec4,
        custom: &'a Option<Box<dyn CustomMaterialHandler>>,
    ) -> Self {
        Self {
            scene,
            config,
            units,
            alpha,
            custom: custom.as_deref(),
        }
    }

    fn spectating(&self) -> bool {
        self.scene.viewer.spectating_full_view
    }

    fn visible(&self, los: LosBits) -> bool {
        los.in_los() || self.spectating()
    }

    fn claimed(&self, unit: Entity, pass: MaterialPass) -> bool {
        self.custom.is_some_and(|c| c.claims(unit, pass))
    }

    fn team_color(&self, team: i32, alpha: f32) -> Vec4 {
        self.scene
            .teams
            .color(team)
            .map_or(Vec3::ONE, |c| c.truncate())
            .extend(alpha)
    }

    /// Unit components plus draw state, or `None` for units the world no longer has.
    fn unit(&self, unit: Entity) -> Option<(UnitView, DrawUnitState)> {
        let du = *self.units.get(&unit)?;
        match UnitView::read(self.scene.world, unit, self.scene.viewer.ally_team) {
            Ok(view) => Some((view, du)),
            Err(e) => {
                log::debug!("Not drawing {:?}: {}", unit, e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct OpaqueFlags {
    reflection: bool,
    refraction: bool,
    pass: MaterialPass,
}

/// Mirror-plane test used by reflection passes: the point where the line
/// from the camera through the unit crosses the water plane must not be
/// buried deeper than the unit's radius.
fn visible_in_reflection(scene: &Scene, mid: Vec3, radius: f32) -> bool {
    let cam = scene.camera.position();
    let zero = if mid.y < 0.0 {
        mid
    } else {
        let dif = mid.y - cam.y;
        if dif.abs() <= f32::EPSILON {
            return true;
        }
        cam * (mid.y / dif) + mid * (-cam.y / dif)
    };
    scene.terrain.height_at(zero.x, zero.z) <= radius
}

fn can_draw_opaque(ctx: &PassCtx, view: &UnitView, du: &DrawUnitState, model: &Model, flags: OpaqueFlags) -> bool {
    let scene = ctx.scene;
    if scene.viewer.controlled_unit == Some(view.entity) && !flags.reflection {
        return false;
    }
    if view.status.no_draw || view.status.in_void || du.is_icon {
        return false;
    }
    if !ctx.visible(view.los) {
        return false;
    }
    if flags.refraction && !view.status.in_water {
        return false;
    }
    if flags.reflection && !visible_in_reflection(scene, du.draw_mid_pos, model.draw_radius) {
        return false;
    }
    scene.camera.in_view(du.draw_mid_pos, model.draw_radius)
}

/// Emit the unit's model, revealing it in build stages while under construction.
fn draw_unit_model(st: &mut RenderStateMachine, ctx: &PassCtx, view: &UnitView, du: &DrawUnitState, model: &Model, alpha: f32) {
    let unit = view.entity;
    let instance = UnitInstance::new(view.transform.at(du.draw_pos).to_matrix(), ctx.team_color(view.body.team, alpha));
    let def = ctx.scene.assets.def(view.def);
    let nano_frame = def.is_some_and(|d| d.show_nano_frame);
    if !(view.status.being_built && nano_frame) {
        st.emit(DrawCommand::DrawUnit { unit, instance });
        return;
    }
    let color = if ctx.config.team_nanospray {
        ctx.team_color(view.body.team, 1.0).truncate()
    } else {
        def.map_or(Vec3::ONE, |d| d.nano_color.truncate())
    };
    let build = BuildDraw {
        progress: view.status.build_progress,
        height: model.height,
        color,
        sim_frame: ctx.scene.clock.sim_frame(),
        clip_plane_quirk: ctx.config.clip_plane_quirk,
    };
    draw_being_built(st, &build, &mut |st: &mut RenderStateMachine| {
        st.emit(DrawCommand::DrawUnit { unit, instance })
    });
}

fn draw_opaque_unit(st: &mut RenderStateMachine, ctx: &PassCtx, unit: Entity, flags: OpaqueFlags, torn_off: &mut Vec<Entity>) {
    let Some((view, du)) = ctx.unit(unit) else {
        return;
    };
    let model = ctx.scene.assets.model_for_def(view.def);
    if !can_draw_opaque(ctx, &view, &du, model, flags) {
        return;
    }
    let cam_dist_sqr = view.transform.position.distance_squared(ctx.scene.camera.position());
    let radius_sqr = view.body.radius * view.body.radius;
    if cam_dist_sqr > radius_sqr * ctx.config.unit_draw_dist_sqr() {
        st.emit(DrawCommand::DrawFarTexture { unit });
        return;
    }
    if ctx.claimed(unit, flags.pass) {
        torn_off.push(unit);
        return;
    }
    st.set_team_color(view.body.team, 1.0, ctx.scene.teams);
    draw_unit_model(st, ctx, &view, &du, model, 1.0);
}

/// Bins of one model type followed by that type's temp units.
fn draw_opaque_model_type(
    st: &mut RenderStateMachine,
    ctx: &PassCtx,
    bins: &ModelBinSet,
    temps: &[TempDrawUnit],
    model_type: ModelType,
    flags: OpaqueFlags,
    torn_off: &mut Vec<Entity>,
) {
    st.with_model_state(model_type, |st| {
        for (texture, units) in bins.bins(BinKind::Opaque, model_type).iter() {
            st.bind_model_textures(model_type, texture);
            for &unit in units {
                draw_opaque_unit(st, ctx, unit, flags, torn_off);
            }
        }
        if flags.pass == MaterialPass::Opaque {
            for temp in temps {
                draw_temp_unit(st, ctx, temp, 1.0);
            }
        }
    });
}

fn draw_temp_unit(st: &mut RenderStateMachine, ctx: &PassCtx, temp: &TempDrawUnit, alpha: f32) -> bool {
    if !ctx.scene.camera.in_view(temp.pos, TEMP_UNIT_CULL_RADIUS) {
        return false;
    }
    let model = ctx.scene.assets.model_for_def(temp.def);
    st.bind_model_textures(model.model_type, model.texture);
    st.set_team_color(temp.team, alpha, ctx.scene.teams);
    st.emit(DrawCommand::DrawModel {
        model: model.id,
        instance: UnitInstance::new(temp.matrix(), ctx.team_color(temp.team, alpha)),
    });
    true
}

fn draw_alpha_unit(st: &mut RenderStateMachine, ctx: &PassCtx, unit: Entity, torn_off: &mut Vec<Entity>) {
    let Some((view, du)) = ctx.unit(unit) else {
        return;
    };
    let model = ctx.scene.assets.model_for_def(view.def);
    if !ctx.scene.camera.in_view(du.draw_mid_pos, model.draw_radius) {
        return;
    }
    if ctx.claimed(unit, MaterialPass::Alpha) {
        torn_off.push(unit);
        return;
    }
    if du.is_icon || view.status.no_draw || view.status.in_void {
        return;
    }
    if ctx.visible(view.los) {
        st.set_team_color(view.body.team, ctx.alpha.x, ctx.scene.teams);
        draw_unit_model(st, ctx, &view, &du, model, ctx.alpha.x);
    }
}

/// Dead ghosts and live ghosted buildings of the local ally-team for one model type.
fn draw_ghosts(st: &mut RenderStateMachine, ctx: &PassCtx, ghosts: &mut GhostRegistry, model_type: ModelType) {
    let scene = ctx.scene;
    let ally = scene.viewer.ally_team;
    let (y, z) = (ctx.alpha.y, ctx.alpha.z);

    let dead: Vec<_> = ghosts.dead(ally, model_type).map(|(h, g)| (h, g.clone())).collect();
    if !dead.is_empty() {
        st.set_color(Vec4::new(GHOST_GREY, GHOST_GREY, GHOST_GREY, y));
    }
    for (handle, ghost) in dead {
        let model = scene.assets.model_or_placeholder(ghost.model);
        if !scene.camera.in_view(ghost.pos, model.draw_radius) {
            continue;
        }
        st.bind_model_textures(model_type, ghost.texture);
        st.set_team_color(ghost.team, y, scene.teams);
        st.emit(DrawCommand::DrawModel {
            model: ghost.model,
            instance: UnitInstance::new(ghost.matrix(), ctx.team_color(ghost.team, y)),
        });
        ghosts.mark_drawn(handle, scene.clock.draw_frame());
    }

    for &unit in ghosts.live(ally, model_type) {
        let Ok(view) = UnitView::read(scene.world, unit, ally) else {
            continue;
        };
        let shown = scene.assets.presented_def(view.def, false);
        let model = scene.assets.model_for_def(shown);
        if model.model_type != model_type {
            continue;
        }
        let pos = ctx.units.get(&unit).map_or(view.transform.position, |du| du.draw_pos);
        if !scene.camera.in_view(pos, model.draw_radius) {
            continue;
        }
        let (grey, alpha) = if view.los.contains(LosBits::CONT_RADAR) {
            (RADAR_GHOST_GREY, z)
        } else {
            (GHOST_GREY, y)
        };
        st.set_color(Vec3::splat(grey).extend(alpha));
        st.bind_model_textures(model_type, model.texture);
        st.set_team_color(view.body.team, alpha, scene.teams);
        st.emit(DrawCommand::DrawModel {
            model: model.id,
            instance: UnitInstance::new(
                Transform::from_position_facing(pos, view.body.build_facing).to_matrix(),
                ctx.team_color(view.body.team, alpha),
            ),
        });
    }
    st.set_color(Vec4::ONE);
}

fn draw_alpha_temp_unit(st: &mut RenderStateMachine, ctx: &PassCtx, temp: &TempDrawUnit) {
    if !draw_temp_unit(st, ctx, temp, ctx.alpha.x) || !temp.draw_border {
        return;
    }
    let footprint = ctx
        .scene
        .assets
        .def(temp.def)
        .map_or(glam::Vec2::splat(16.0), |d| d.footprint);
    let color = BORDER_GREEN.extend(ctx.alpha.w);
    st.set_color(color);
    st.emit(DrawCommand::DrawBuildBorder {
        corners: temp.border(footprint),
        color,
    });
    st.set_color(Vec4::ONE);
}

fn draw_shadow_unit(st: &mut RenderStateMachine, ctx: &PassCtx, unit: Entity, torn_off: &mut Vec<Entity>) {
    let Some((view, du)) = ctx.unit(unit) else {
        return;
    };
    if view.status.no_draw || view.status.in_void || du.is_icon || view.status.cloaked {
        return;
    }
    if !ctx.visible(view.los) {
        return;
    }
    let model = ctx.scene.assets.model_for_def(view.def);
    if !ctx.scene.camera.in_view(du.draw_mid_pos, model.draw_radius) {
        return;
    }
    if ctx.claimed(unit, MaterialPass::Shadow) {
        torn_off.push(unit);
        return;
    }
    draw_unit_model(st, ctx, &view, &du, model, 1.0);
}

fn emit_custom(st: &mut RenderStateMachine, torn_off: Vec<Entity>, pass: MaterialPass) {
    for unit in torn_off {
        st.emit(DrawCommand::CustomMaterial { unit, pass });
    }
}

impl UnitDrawer {
    /// Deferred geometry (when enabled, never in reflection or refraction
    /// sub-renders) followed by the forward opaque pass.
    pub fn draw(&mut self, scene: &Scene, reflection: bool, refraction: bool) {
        let Self { config, state, bins, temp_units, units, alpha_values, custom_materials, phase, .. } = self;
        let ctx = PassCtx::new(scene, config, units, *alpha_values, custom_materials);

        if config.draw_deferred && !(reflection || refraction) {
            *phase = FramePhase::Deferred;
            let flags = OpaqueFlags { reflection, refraction, pass: MaterialPass::Deferred };
            let mut torn_off = Vec::new();
            state.with_opaque_drawing(|st| {
                st.emit(DrawCommand::DeferredGeometry);
                for model_type in ModelType::ALL {
                    draw_opaque_model_type(st, &ctx, bins, &[], model_type, flags, &mut torn_off);
                }
            });
            emit_custom(state, torn_off, MaterialPass::Deferred);
        }

        *phase = FramePhase::Opaque;
        let flags = OpaqueFlags { reflection, refraction, pass: MaterialPass::Opaque };
        let mut torn_off = Vec::new();
        state.with_opaque_drawing(|st| {
            for model_type in ModelType::ALL {
                let temps = temp_units.opaque(model_type);
                draw_opaque_model_type(st, &ctx, bins, temps, model_type, flags, &mut torn_off);
            }
        });
        emit_custom(state, torn_off, MaterialPass::Opaque);
    }

    /// Cloaked units, ghosts and translucent overlay units, blended over
    /// the opaque depth buffer.
    pub fn draw_alpha_pass(&mut self, scene: &Scene) {
        if !matches!(self.phase, FramePhase::Opaque | FramePhase::Shadow) {
            log::warn!("Translucent pass without a preceding opaque pass this frame ({:?})", self.phase);
        }
        self.phase = FramePhase::Translucent;

        let Self { config, state, bins, ghosts, temp_units, units, alpha_values, custom_materials, .. } = self;
        let ctx = PassCtx::new(scene, config, units, *alpha_values, custom_materials);
        let mut torn_off = Vec::new();
        state.with_alpha_drawing(|st| {
            for model_type in ModelType::ALL {
                st.with_model_state(model_type, |st| {
                    for (texture, units) in bins.bins(BinKind::Alpha, model_type).iter() {
                        st.bind_model_textures(model_type, texture);
                        for &unit in units {
                            draw_alpha_unit(st, &ctx, unit, &mut torn_off);
                        }
                    }
                    if !ctx.spectating() {
                        draw_ghosts(st, &ctx, ghosts, model_type);
                    }
                    for temp in temp_units.alpha(model_type) {
                        draw_alpha_temp_unit(st, &ctx, temp);
                    }
                });
            }
        });
        emit_custom(state, torn_off, MaterialPass::Alpha);
    }

    /// Shadow-map pass; `scene.camera` must be the shadow camera.
    pub fn draw_shadow_pass(&mut self, scene: &Scene) {
        let Self { config, state, bins, units, alpha_values, custom_materials, phase, .. } = self;
        *phase = FramePhase::Shadow;
        let ctx = PassCtx::new(scene, config, units, *alpha_values, custom_materials);
        let mut torn_off = Vec::new();
        state.with_shadow_drawing(|st| {
            for model_type in ModelType::ALL {
                st.with_model_state(model_type, |st| {
                    for (texture, units) in bins.bins(BinKind::Opaque, model_type).iter() {
                        st.bind_model_textures(model_type, texture);
                        for &unit in units {
                            draw_shadow_unit(st, &ctx, unit, &mut torn_off);
                        }
                        st.unbind_shadow_textures();
                    }
                });
            }
        });
        emit_custom(state, torn_off, MaterialPass::Shadow);
    }

    /// One live unit with full opaque state, for UI previews.
    pub fn draw_individual(&mut self, unit: Entity, scene: &Scene) {
        let view = match UnitView::read(scene.world, unit, scene.viewer.ally_team) {
            Ok(view) => view,
            Err(e) => {
                log::debug!("Cannot draw {:?} individually: {}", unit, e);
                return;
            }
        };
        let Some(model) = scene.assets.loaded_model_for_def(view.def) else {
            return;
        };
        let Self { config, state, units, alpha_values, custom_materials, .. } = self;
        let du = units.get(&unit).copied().unwrap_or_else(|| DrawUnitState::new(&view));
        let ctx = PassCtx::new(scene, config, units, *alpha_values, custom_materials);
        state.with_individual_opaque(model, view.body.team, scene.teams, |st| {
            draw_unit_model(st, &ctx, &view, &du, model, 1.0);
        });
    }

    /// Static model of a unit type, e.g. a build-order preview.
    pub fn draw_individual_def_opaque(&mut self, def: UnitDefId, team: i32, matrix: Mat4, scene: &Scene) {
        let Some(model) = scene.assets.loaded_model_for_def(def) else {
            return;
        };
        let color = scene.teams.color(team).unwrap_or(Vec4::ONE);
        self.state.with_individual_opaque(model, team, scene.teams, |st| {
            st.emit(DrawCommand::DrawModel {
                model: model.id,
                instance: UnitInstance::new(matrix, color),
            });
        });
    }

    pub fn draw_individual_def_alpha(&mut self, def: UnitDefId, team: i32, matrix: Mat4, scene: &Scene) {
        let Some(model) = scene.assets.loaded_model_for_def(def) else {
            return;
        };
        let alpha = self.alpha_values.x;
        let color = scene.teams.color(team).unwrap_or(Vec4::ONE).truncate().extend(alpha);
        self.state.with_individual_alpha(model, team, alpha, scene.teams, |st| {
            st.emit(DrawCommand::DrawModel {
                model: model.id,
                instance: UnitInstance::new(matrix, color),
            });
        });
    }

    pub fn draw_debris(&mut self, scene: &Scene) {
        self.debris
            .draw(&mut self.state, scene.camera, scene.teams, scene.clock.time_offset());
    }
}
