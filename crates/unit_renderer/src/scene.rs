//! External collaborators the drawer reads each frame, bundled into a `Scene`.

use engine_core::{
    Entity, FrameClock, LosBits, LosStatus, Transform, UnitBody, UnitDefId, UnitDefRef, UnitStatus, World,
};
use glam::{Vec3, Vec4};

use crate::camera::Camera;
use crate::error::DrawerError;
use crate::icons::IconCatalog;
use crate::model::Assets;

/// Height field queries.
pub trait Terrain {
    fn height_at(&self, x: f32, z: f32) -> f32;

    /// Average height over the map; used for icon distance-to-ground.
    fn average_height(&self) -> f32 {
        0.0
    }
}

/// Positional line-of-sight queries (ghost re-acquisition).
pub trait LosOracle {
    fn in_los(&self, pos: Vec3, ally_team: usize) -> bool;
}

/// Team colors, indexed by team number.
#[derive(Debug, Clone, Default)]
pub struct TeamPalette {
    colors: Vec<Vec4>,
}

impl TeamPalette {
    pub fn new(colors: Vec<Vec4>) -> Self {
        Self { colors }
    }

    /// Color of a valid team; `None` for out-of-range ids.
    pub fn color(&self, team: i32) -> Option<Vec4> {
        usize::try_from(team).ok().and_then(|t| self.colors.get(t)).copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// The local player as far as drawing is concerned.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub team: i32,
    pub ally_team: usize,
    /// Spectator with full view: sees everything, no ghosts.
    pub spectating_full_view: bool,
    /// Whether the interface is currently hidden.
    pub hide_interface: bool,
    /// Unit being driven in first person, never drawn from its own eyes.
    pub controlled_unit: Option<Entity>,
}

impl Viewer {
    pub fn new(team: i32, ally_team: usize) -> Self {
        Self { team, ally_team, ..Default::default() }
    }

    pub fn is_ally(&self, ally_team: usize) -> bool {
        self.ally_team == ally_team
    }
}

/// Everything a draw pass borrows for one frame.
#[derive(Clone, Copy)]
pub struct Scene<'a> {
    pub world: &'a World,
    pub assets: &'a Assets,
    pub icons: &'a IconCatalog,
    pub terrain: &'a dyn Terrain,
    pub los: &'a dyn LosOracle,
    pub teams: &'a TeamPalette,
    pub viewer: &'a Viewer,
    pub camera: &'a Camera,
    pub clock: &'a FrameClock,
}

/// Per-frame copy of the unit components a pass needs.
#[derive(Debug, Clone, Copy)]
pub struct UnitView {
    pub entity: Entity,
    pub transform: Transform,
    pub body: UnitBody,
    pub status: UnitStatus,
    pub def: UnitDefId,
    /// Visibility bits for the viewing ally-team.
    pub los: LosBits,
}

impl UnitView {
    pub fn read(world: &World, entity: Entity, ally_team: usize) -> Result<Self, DrawerError> {
        let transform = *world
            .get::<&Transform>(entity)
            .map_err(|_| DrawerError::MissingComponent(entity, "Transform"))?;
        let body = *world
            .get::<&UnitBody>(entity)
            .map_err(|_| DrawerError::MissingComponent(entity, "UnitBody"))?;
        let status = world.get::<&UnitStatus>(entity).map(|s| *s).unwrap_or_default();
        let def = world
            .get::<&UnitDefRef>(entity)
            .map_err(|_| DrawerError::MissingComponent(entity, "UnitDefRef"))?
            .0;
        let los = world
            .get::<&LosStatus>(entity)
            .map(|l| l.get(ally_team))
            .unwrap_or_default();
        Ok(Self { entity, transform, body, status, def, los })
    }

    pub fn is_allied_with(&self, viewer: &Viewer) -> bool {
        viewer.is_ally(self.body.ally_team)
    }
}
