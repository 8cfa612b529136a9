//! Lifecycle event handling: bin membership, ghosts and icon assignment.

use engine_core::Entity;

use super::{DrawUnitState, UnitDrawer};
use crate::bins::BinKind;
use crate::error::DrawerError;
use crate::events::{UnitEvent, UnitRemains};
use crate::icons::IconId;
use crate::scene::{Scene, UnitView};
use crate::visibility::{resolve_icon, IconChoice};

impl UnitDrawer {
    /// Apply one lifecycle event. Events must arrive exactly once and in
    /// simulation order; violations are reported and leave the drawer unchanged.
    pub fn handle(&mut self, event: UnitEvent, scene: &Scene) -> Result<(), DrawerError> {
        match event {
            UnitEvent::Created(unit) => self.unit_created(unit, scene),
            UnitEvent::Destroyed { unit, remains } => self.unit_destroyed(unit, &remains, scene),
            UnitEvent::Cloaked(unit) => self.bins.transfer(unit, BinKind::Alpha),
            UnitEvent::Decloaked(unit) => self.bins.transfer(unit, BinKind::Opaque),
            UnitEvent::EnteredLos { unit, ally_team } => {
                self.ensure_known(unit)?;
                if self.leaves_live_ghost(unit, scene) {
                    self.ghosts.remove_live_for(unit, ally_team);
                }
                self.refresh_icon_for(unit, ally_team, scene)
            }
            UnitEvent::LeftLos { unit, ally_team } => {
                self.ensure_known(unit)?;
                if self.leaves_live_ghost(unit, scene) {
                    let view = UnitView::read(scene.world, unit, ally_team)?;
                    let shown = scene.assets.presented_def(view.def, false);
                    let model_type = scene.assets.model_for_def(shown).model_type;
                    self.ghosts.add_live(unit, ally_team, model_type);
                }
                self.refresh_icon_for(unit, ally_team, scene)
            }
            UnitEvent::EnteredRadar { unit, ally_team } | UnitEvent::LeftRadar { unit, ally_team } => {
                self.ensure_known(unit)?;
                self.refresh_icon_for(unit, ally_team, scene)
            }
        }
    }

    /// The local player changed team or started spectating: every icon is reassigned.
    pub fn player_changed(&mut self, scene: &Scene) {
        self.icons.clear();
        let units: Vec<Entity> = self.units.keys().copied().collect();
        for unit in units {
            match UnitView::read(scene.world, unit, scene.viewer.ally_team) {
                Ok(view) => self.update_unit_icon(&view, scene),
                Err(e) => log::warn!("Skipping icon for {:?}: {}", unit, e),
            }
        }
    }

    fn ensure_known(&self, unit: Entity) -> Result<(), DrawerError> {
        if self.units.contains_key(&unit) {
            Ok(())
        } else {
            Err(DrawerError::UnknownUnit(unit))
        }
    }

    fn unit_created(&mut self, unit: Entity, scene: &Scene) -> Result<(), DrawerError> {
        if self.units.contains_key(&unit) {
            return Err(DrawerError::DuplicateUnit(unit));
        }
        let view = UnitView::read(scene.world, unit, scene.viewer.ally_team)?;
        let model = scene.assets.model_for_def(view.def);
        let kind = if view.status.cloaked { BinKind::Alpha } else { BinKind::Opaque };
        self.bins.add(unit, model.model_type, model.texture, kind)?;
        self.units.insert(unit, DrawUnitState::new(&view));
        self.update_unit_icon(&view, scene);
        log::debug!("Unit {:?} binned as {} {:?}", unit, kind.name(), model.model_type);
        Ok(())
    }

    fn unit_destroyed(&mut self, unit: Entity, remains: &UnitRemains, scene: &Scene) -> Result<(), DrawerError> {
        if !self.units.contains_key(&unit) && self.bins.slot(unit).is_none() {
            return Err(DrawerError::UnknownUnit(unit));
        }
        self.units.remove(&unit);
        self.bins.remove(unit);
        self.icons.remove(unit);
        self.icon_units.retain(|&u| u != unit);

        let leaves_ghost = self.config.ghosted_buildings
            && scene
                .assets
                .def(remains.def)
                .is_some_and(|d| d.is_building && d.leaves_ghost);
        if leaves_ghost {
            // Enemies remember the decoy, if the type has one.
            let shown = scene.assets.presented_def(remains.def, false);
            let model = scene.assets.model_for_def(shown);
            self.ghosts.on_building_destroyed(
                unit,
                remains.pos,
                remains.facing,
                remains.team,
                model,
                &remains.los,
                self.decals.as_mut(),
            );
        } else {
            self.ghosts.remove_live(unit);
        }
        Ok(())
    }

    fn leaves_live_ghost(&self, unit: Entity, scene: &Scene) -> bool {
        if !self.config.ghosted_buildings {
            return false;
        }
        scene
            .world
            .get::<&engine_core::UnitDefRef>(unit)
            .ok()
            .and_then(|d| scene.assets.def(d.0))
            .is_some_and(|d| d.is_building && d.leaves_ghost)
    }

    /// Icons only depend on the local player's ally-team.
    fn refresh_icon_for(&mut self, unit: Entity, ally_team: usize, scene: &Scene) -> Result<(), DrawerError> {
        if ally_team != scene.viewer.ally_team {
            return Ok(());
        }
        let view = UnitView::read(scene.world, unit, ally_team)?;
        self.update_unit_icon(&view, scene);
        Ok(())
    }

    pub(crate) fn update_unit_icon(&mut self, view: &UnitView, scene: &Scene) {
        let icon = unit_icon(view, scene, self.config.ghosted_buildings);
        self.icons.assign(view.entity, icon);
    }
}

/// Icon group a unit belongs to for the local viewer.
fn unit_icon(view: &UnitView, scene: &Scene, ghosted_buildings: bool) -> Option<IconId> {
    let spectating = scene.viewer.spectating_full_view;
    let is_ally = spectating || view.is_allied_with(scene.viewer);
    let def = scene.assets.def(scene.assets.presented_def(view.def, is_ally));
    let ghosted = ghosted_buildings && def.is_some_and(|d| d.is_building && d.leaves_ghost);
    let default_icon = scene.icons.default_icon().id;
    match resolve_icon(view.los, spectating, ghosted) {
        IconChoice::Custom => Some(def.and_then(|d| d.icon).unwrap_or(default_icon)),
        IconChoice::Default => Some(default_icon),
        IconChoice::None => None,
    }
}
