//! Shared fixtures for unit tests: flat terrain, scripted sight and a
//! small battlefield with a few unit types.

use engine_core::{
    Entity, FrameClock, LosBits, LosStatus, Transform, UnitBody, UnitDefId, UnitDefRef, UnitStatus, World,
};
use glam::{Vec3, Vec4};

use crate::camera::Camera;
use crate::icons::{IconCatalog, IconData, IconId};
use crate::model::{Assets, Model, ModelId, ModelType, TextureId, UnitDef};
use crate::scene::{LosOracle, Scene, TeamPalette, Terrain, Viewer};

pub struct FlatTerrain(pub f32);

impl Terrain for FlatTerrain {
    fn height_at(&self, _x: f32, _z: f32) -> f32 {
        self.0
    }

    fn average_height(&self) -> f32 {
        self.0
    }
}

/// Circles of sight per ally-team.
#[derive(Default)]
pub struct ScriptedLos {
    pub areas: Vec<(Vec3, f32, usize)>,
}

impl LosOracle for ScriptedLos {
    fn in_los(&self, pos: Vec3, ally_team: usize) -> bool {
        self.areas
            .iter()
            .any(|&(c, r, a)| a == ally_team && c.distance(pos) <= r)
    }
}

pub const TANK: UnitDefId = UnitDefId(1);
pub const FACTORY: UnitDefId = UnitDefId(2);
pub const WALL: UnitDefId = UnitDefId(3);
pub const DECOY_FACTORY: UnitDefId = UnitDefId(4);

pub const TANK_ICON: IconId = IconId(1);
pub const TANK_TEXTURE: TextureId = TextureId(3);
pub const FACTORY_TEXTURE: TextureId = TextureId(4);

pub const NUM_ALLY_TEAMS: usize = 2;

/// Camera at `(0, 50, 0)` looking down the negative Z axis; ally-team 0 is the viewer.
pub struct Battlefield {
    pub world: World,
    pub assets: Assets,
    pub icons: IconCatalog,
    pub teams: TeamPalette,
    pub viewer: Viewer,
    pub camera: Camera,
    pub clock: FrameClock,
    pub terrain: FlatTerrain,
    pub los: ScriptedLos,
}

impl Battlefield {
    pub fn new() -> Self {
        let mut assets = Assets::new();
        assets.add_model(Model::new(ModelId(1), ModelType::Textured, TANK_TEXTURE, 10.0, 8.0));
        assets.add_model(Model::new(ModelId(2), ModelType::Imported, FACTORY_TEXTURE, 30.0, 20.0));
        assets.add_model(Model::new(ModelId(3), ModelType::Legacy, TextureId(9), 12.0, 6.0));
        assets.add_def(UnitDef::new(TANK, "tank").with_model(ModelId(1)).with_icon(TANK_ICON));
        assets.add_def(UnitDef::new(FACTORY, "factory").with_model(ModelId(2)).building());
        assets.add_def(UnitDef::new(WALL, "wall").with_model(ModelId(3)).building());
        let mut decoy = UnitDef::new(DECOY_FACTORY, "fake_factory").with_model(ModelId(3)).building();
        decoy.decoy = Some(FACTORY);
        assets.add_def(decoy);

        let mut icons = IconCatalog::default();
        icons.add(IconData::new(TANK_ICON, "tank", TextureId(20)));

        Self {
            world: World::new(),
            assets,
            icons,
            teams: TeamPalette::new(vec![Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 1.0)]),
            viewer: Viewer::new(0, 0),
            camera: Camera::looking_at(Vec3::new(0.0, 50.0, 0.0), Vec3::new(0.0, 50.0, -100.0)),
            clock: FrameClock::new(),
            terrain: FlatTerrain(0.0),
            los: ScriptedLos::default(),
        }
    }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            world: &self.world,
            assets: &self.assets,
            icons: &self.icons,
            terrain: &self.terrain,
            los: &self.los,
            teams: &self.teams,
            viewer: &self.viewer,
            camera: &self.camera,
            clock: &self.clock,
        }
    }

    /// Unit of `team` (ally-team == team) seen by ally-team 0 with `los`.
    pub fn spawn(&mut self, def: UnitDefId, pos: Vec3, team: i32, los: LosBits) -> Entity {
        let ally = usize::try_from(team).unwrap_or(0);
        let mut status = LosStatus::new(NUM_ALLY_TEAMS);
        status.set(ally, LosBits::IN_LOS | LosBits::PREV_LOS);
        status.set(0, los);
        let mut body = UnitBody::new(10.0, team, ally);
        body.mid_offset = Vec3::ZERO;
        self.world.spawn((
            Transform::from_position(pos),
            body,
            UnitStatus::default(),
            UnitDefRef(def),
            status,
        ))
    }

    pub fn set_los(&mut self, unit: Entity, ally: usize, bits: LosBits) {
        if let Ok(mut los) = self.world.get::<&mut LosStatus>(unit) {
            los.set(ally, bits);
        }
    }

    pub fn status_mut(&mut self, unit: Entity) -> hecs::RefMut<'_, UnitStatus> {
        self.world.get::<&mut UnitStatus>(unit).unwrap()
    }
}
