//! The unit drawer: owns every piece of per-unit render bookkeeping and
//! turns it into a command stream once per frame.
//!
//! Frame order driven by the caller:
//! `update` → `draw` (deferred + opaque) → `draw_shadow_pass` →
//! `draw_alpha_pass` → `draw_unit_icons` / `draw_unit_icons_screen` →
//! `draw_debris` → `take_commands`.

mod icon_pass;
mod lifecycle;
mod passes;

use std::collections::HashMap;

use engine_core::{Entity, World};
use glam::{Vec3, Vec4};

use crate::bins::ModelBinSet;
use crate::commands::{DrawCommand, MaterialPass};
use crate::config::DrawerConfig;
use crate::debris::{DebrisField, PieceSpawn};
use crate::events::{UnitEventQueue, UnitEventSender};
use crate::ghosts::{GhostDecals, GhostRegistry};
use crate::icons::IconGroups;
use crate::model::Assets;
use crate::scene::{Scene, UnitView};
use crate::state::{RenderStateMachine, ShadingCaps};
use crate::temp_units::{TempDrawUnit, TempDrawUnits};
use crate::visibility::VisibilityClassifier;

/// Renderer for units with their own materials (scripted shaders).
/// Units it claims are torn off the default path and handed over as
/// `CustomMaterial` commands once the pass state has been reset.
pub trait CustomMaterialHandler {
    fn claims(&self, unit: Entity, pass: MaterialPass) -> bool;
}

/// Where the drawer is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    Deferred,
    Opaque,
    Shadow,
    Translucent,
    Icons,
}

/// Interpolated per-unit draw state, refreshed by `update`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrawUnitState {
    pub draw_pos: Vec3,
    pub draw_mid_pos: Vec3,
    pub is_icon: bool,
}

impl DrawUnitState {
    fn new(view: &UnitView) -> Self {
        let pos = view.transform.position;
        Self {
            draw_pos: pos,
            draw_mid_pos: pos + view.body.mid_offset,
            is_icon: false,
        }
    }

    /// `pos + speed * time_offset`, following the transporter when carried.
    fn refresh(&mut self, view: &UnitView, world: &World, time_offset: f32) {
        let speed = view
            .body
            .transporter
            .and_then(|t| world.get::<&engine_core::UnitBody>(t).ok().map(|b| b.speed))
            .unwrap_or(view.body.speed);
        self.draw_pos = view.transform.position + speed * time_offset;
        self.draw_mid_pos = self.draw_pos + view.body.mid_offset;
    }
}

pub struct UnitDrawer {
    config: DrawerConfig,
    classifier: VisibilityClassifier,
    state: RenderStateMachine,
    bins: ModelBinSet,
    ghosts: GhostRegistry,
    icons: IconGroups,
    units: HashMap<Entity, DrawUnitState>,
    /// World-mode icon units that passed the frustum test this frame.
    icon_units: Vec<Entity>,
    temp_units: TempDrawUnits,
    debris: DebrisField,
    debris_frame: Option<u64>,
    events: UnitEventQueue,
    custom_materials: Option<Box<dyn CustomMaterialHandler>>,
    decals: Box<dyn GhostDecals>,
    alpha_values: Vec4,
    phase: FramePhase,
    zoom_dist: f32,
}

impl UnitDrawer {
    pub fn new(config: DrawerConfig, caps: ShadingCaps, num_ally_teams: usize) -> Self {
        let config = config.sanitized();
        log::info!(
            "Unit drawer started: lod {} icon dist {} ({}), transparency {}, ghosts {} (slab {}), advanced shading {}",
            config.unit_lod_dist,
            config.unit_icon_dist,
            if config.unit_icons_as_ui { "screen icons" } else { "world icons" },
            config.unit_transparency,
            config.ghosted_buildings,
            config.ghost_capacity(),
            config.adv_unit_shading,
        );
        Self {
            classifier: VisibilityClassifier::new(&config),
            state: RenderStateMachine::new(caps, config.adv_unit_shading),
            bins: ModelBinSet::new(),
            ghosts: GhostRegistry::new(config.ghost_capacity(), num_ally_teams),
            icons: IconGroups::new(),
            units: HashMap::new(),
            icon_units: Vec::new(),
            temp_units: TempDrawUnits::new(),
            debris: DebrisField::default(),
            debris_frame: None,
            events: UnitEventQueue::new(),
            custom_materials: None,
            decals: Box::new(()),
            alpha_values: config.alpha_values(),
            phase: FramePhase::Idle,
            zoom_dist: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &DrawerConfig {
        &self.config
    }

    pub fn set_custom_materials(&mut self, handler: Box<dyn CustomMaterialHandler>) {
        self.custom_materials = Some(handler);
    }

    pub fn set_ghost_decals(&mut self, decals: Box<dyn GhostDecals>) {
        self.decals = decals;
    }

    pub fn set_debris_field(&mut self, debris: DebrisField) {
        self.debris = debris;
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.state.set_wireframe(wireframe);
    }

    /// Handle for posting lifecycle events from the simulation side.
    pub fn event_sender(&self) -> UnitEventSender {
        self.events.sender()
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Camera-to-ground distance computed by the last `update`.
    pub fn zoom_distance(&self) -> f32 {
        self.zoom_dist
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn is_icon(&self, unit: Entity) -> bool {
        self.units.get(&unit).is_some_and(|u| u.is_icon)
    }

    pub fn draw_pos(&self, unit: Entity) -> Option<Vec3> {
        self.units.get(&unit).map(|u| u.draw_pos)
    }

    pub fn bins(&self) -> &ModelBinSet {
        &self.bins
    }

    pub fn ghosts(&self) -> &GhostRegistry {
        &self.ghosts
    }

    pub fn icon_groups(&self) -> &IconGroups {
        &self.icons
    }

    pub fn temp_units(&self) -> &TempDrawUnits {
        &self.temp_units
    }

    pub fn debris(&self) -> &DebrisField {
        &self.debris
    }

    pub fn render_state(&self) -> &RenderStateMachine {
        &self.state
    }

    /// Queue an overlay unit; it is sorted by the model type of its unit type.
    pub fn add_temp_draw_unit(&mut self, unit: TempDrawUnit, assets: &Assets) {
        let model_type = assets.model_for_def(unit.def).model_type;
        self.temp_units.add(unit, model_type);
    }

    pub fn spawn_debris(&mut self, spawn: PieceSpawn) -> bool {
        self.debris.spawn_piece(spawn)
    }

    /// Per-frame refresh: lifecycle events, temp-unit expiry, debris ticks,
    /// icon classification, interpolated draw positions and ghost release.
    pub fn update(&mut self, scene: &Scene) {
        for event in self.events.drain() {
            if let Err(e) = self.handle(event, scene) {
                log::error!("Dropped unit lifecycle event: {}", e);
            }
        }

        let sim_frame = scene.clock.sim_frame();
        self.temp_units.expire(sim_frame);

        let last = self.debris_frame.unwrap_or(sim_frame);
        for _ in last..sim_frame {
            self.debris.tick(scene.terrain);
        }
        self.debris_frame = Some(sim_frame);

        self.zoom_dist = scene.camera.ground_zoom_distance(scene.terrain);
        self.classifier.set_viewport(scene.camera.viewport());
        self.classify_units(scene);

        let los = scene.los;
        self.ghosts.update(|pos, ally| los.in_los(pos, ally), self.decals.as_mut());
        self.phase = FramePhase::Idle;
    }

    /// Commands produced since the last call.
    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        debug_assert_eq!(self.state.depth(), 0, "unbalanced render state at frame end");
        self.state.take_commands()
    }

    /// Release every ghost and forget all units. The drawer can be reused afterwards.
    pub fn shutdown(&mut self) {
        log::info!(
            "Unit drawer shutting down: {} units, {} ghosts, {} debris pieces",
            self.units.len(),
            self.ghosts.len(),
            self.debris.len()
        );
        self.ghosts.release_all(self.decals.as_mut());
        self.bins.clear();
        self.icons.clear();
        self.units.clear();
        self.icon_units.clear();
        self.temp_units.clear();
        self.debris.clear();
        self.events.drain();
        self.phase = FramePhase::Idle;
    }
}

#[cfg(test)]
mod tests;
