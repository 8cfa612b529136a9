//! Headless driver for the unit drawer: builds a small two-team battle,
//! runs the frame loop for a few simulated seconds and logs what each
//! frame would submit to the GPU.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use engine_core::{
    Entity, FrameClock, LosBits, LosStatus, Transform, UnitBody, UnitDefId, UnitDefRef, UnitStatus, World,
};
use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::Rng;
use unit_renderer::debris::EXPLOSION_SPEED;
use unit_renderer::vertex::DebrisVertex;
use unit_renderer::{
    Assets, Camera, DrawCommand, DrawerConfig, IconCatalog, IconData, IconId, LosOracle, Model, ModelId,
    ModelType, PieceMesh, PieceSpawn, Scene, ShadingCaps, TeamPalette, TempDrawUnit, Terrain, TextureId,
    UnitDef, UnitDrawer, UnitEvent, Viewer,
};

const NUM_ALLY_TEAMS: usize = 2;
const SIGHT_RANGE: f32 = 400.0;
const RADAR_RANGE: f32 = 1200.0;
const FRAMES: u32 = 90;

const TANK: UnitDefId = UnitDefId(1);
const FACTORY: UnitDefId = UnitDefId(2);
const TURRET: UnitDefId = UnitDefId(3);

/// Gently rolling ground.
struct Hills;

impl Terrain for Hills {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        (x * 0.002).sin() * 20.0 + (z * 0.003).cos() * 15.0
    }

    fn average_height(&self) -> f32 {
        0.0
    }
}

/// Sight circles around every unit of an ally-team, rebuilt each tick.
#[derive(Default)]
struct SightMap {
    eyes: Vec<(Vec3, usize)>,
}

impl SightMap {
    fn rebuild(&mut self, world: &World) {
        self.eyes = world
            .query::<(&Transform, &UnitBody)>()
            .iter()
            .map(|(_, (t, b))| (t.position, b.ally_team))
            .collect();
    }

    fn distance_to(&self, pos: Vec3, ally_team: usize) -> f32 {
        self.eyes
            .iter()
            .filter(|(_, a)| *a == ally_team)
            .map(|(p, _)| p.distance(pos))
            .fold(f32::INFINITY, f32::min)
    }
}

impl LosOracle for SightMap {
    fn in_los(&self, pos: Vec3, ally_team: usize) -> bool {
        self.distance_to(pos, ally_team) <= SIGHT_RANGE
    }
}

fn assets() -> (Assets, IconCatalog) {
    let mut assets = Assets::new();
    assets.add_model(Model::new(ModelId(1), ModelType::Textured, TextureId(1), 12.0, 8.0));
    assets.add_model(Model::new(ModelId(2), ModelType::Imported, TextureId(2), 40.0, 30.0));
    assets.add_model(Model::new(ModelId(3), ModelType::Legacy, TextureId::ATLAS, 15.0, 12.0));
    assets.add_def(UnitDef::new(TANK, "tank").with_model(ModelId(1)).with_icon(IconId(1)));
    assets.add_def(UnitDef::new(FACTORY, "factory").with_model(ModelId(2)).with_icon(IconId(2)).building());
    assets.add_def(UnitDef::new(TURRET, "turret").with_model(ModelId(3)).building());

    let mut icons = IconCatalog::default();
    icons.add(IconData::new(IconId(1), "tank", TextureId(10)));
    let mut factory = IconData::new(IconId(2), "factory", TextureId(11));
    factory.size = 1.8;
    icons.add(factory);
    (assets, icons)
}

fn spawn_army(world: &mut World, rng: &mut impl Rng, team: i32, origin: Vec3) -> Vec<Entity> {
    let ally = usize::try_from(team).unwrap_or(0);
    let mut units = Vec::new();
    for i in 0..24 {
        let offset = Vec3::new((i % 6) as f32 * 60.0, 0.0, (i / 6) as f32 * 60.0);
        let mut body = UnitBody::new(12.0, team, ally);
        body.speed = Vec3::new(rng.gen_range(-0.5..0.5), 0.0, if team == 0 { -1.5 } else { 1.5 });
        let status = UnitStatus {
            cloaked: i == 5,
            ..Default::default()
        };
        units.push(world.spawn((
            Transform::from_position(origin + offset),
            body,
            status,
            UnitDefRef(TANK),
            LosStatus::new(NUM_ALLY_TEAMS),
        )));
    }
    for (i, def) in [FACTORY, TURRET, TURRET].into_iter().enumerate() {
        let mut body = UnitBody::new(30.0, team, ally);
        body.build_facing = i as u8;
        let status = if i == 2 { UnitStatus::under_construction(0.5) } else { UnitStatus::default() };
        units.push(world.spawn((
            Transform::from_position(origin + Vec3::new(i as f32 * 120.0, 0.0, -150.0 * (team as f32 * 2.0 - 1.0))),
            body,
            status,
            UnitDefRef(def),
            LosStatus::new(NUM_ALLY_TEAMS),
        )));
    }
    units
}

/// Simulation side: move units, refresh sight bits and report changes as events.
fn simulate(world: &mut World, sight: &SightMap, events: &unit_renderer::UnitEventSender) {
    for (_, (transform, body)) in world.query_mut::<(&mut Transform, &UnitBody)>() {
        transform.translate(body.speed);
    }
    for (unit, (transform, body, los)) in world.query_mut::<(&Transform, &UnitBody, &mut LosStatus)>() {
        for ally in 0..NUM_ALLY_TEAMS {
            let before = los.get(ally);
            let mut bits = before;
            let dist = if ally == body.ally_team { 0.0 } else { sight.distance_to(transform.position, ally) };
            if dist <= SIGHT_RANGE {
                bits.insert(LosBits::IN_LOS | LosBits::PREV_LOS);
            } else {
                bits.remove(LosBits::IN_LOS);
            }
            if dist <= RADAR_RANGE {
                bits.insert(LosBits::IN_RADAR);
            } else {
                bits.remove(LosBits::IN_RADAR);
            }
            // Contact stays continuous while radar keeps tracking a unit seen before.
            if bits.in_los() {
                bits.insert(LosBits::CONT_RADAR);
            } else if !bits.in_radar() {
                bits.remove(LosBits::CONT_RADAR);
            }
            los.set(ally, bits);

            let ally_team = ally;
            match (before.in_los(), bits.in_los()) {
                (false, true) => events.send(UnitEvent::EnteredLos { unit, ally_team }),
                (true, false) => events.send(UnitEvent::LeftLos { unit, ally_team }),
                _ => {}
            }
            match (before.in_radar(), bits.in_radar()) {
                (false, true) => events.send(UnitEvent::EnteredRadar { unit, ally_team }),
                (true, false) => events.send(UnitEvent::LeftRadar { unit, ally_team }),
                _ => {}
            }
        }
    }
}

fn cube_piece() -> Arc<PieceMesh> {
    let corners = [
        Vec3::new(-4.0, 0.0, -4.0),
        Vec3::new(4.0, 0.0, -4.0),
        Vec3::new(4.0, 0.0, 4.0),
        Vec3::new(-4.0, 0.0, 4.0),
        Vec3::new(-4.0, 8.0, -4.0),
        Vec3::new(4.0, 8.0, -4.0),
        Vec3::new(4.0, 8.0, 4.0),
        Vec3::new(-4.0, 8.0, 4.0),
    ];
    let vertices = corners
        .iter()
        .map(|&p| DebrisVertex::new(p, p.normalize_or_zero(), Vec2::new(p.x, p.z) / 8.0 + 0.5))
        .collect();
    let indices = vec![
        0, 1, 2, 0, 2, 3, 4, 6, 5, 4, 7, 6, 0, 4, 5, 0, 5, 1, 1, 5, 6, 1, 6, 2, 2, 6, 7, 2, 7, 3, 3, 7, 4, 3, 4, 0,
    ];
    Arc::new(PieceMesh { vertices, indices })
}

fn summarize(cmds: &[DrawCommand]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for cmd in cmds {
        let name = match cmd {
            DrawCommand::DrawUnit { .. } => "unit",
            DrawCommand::DrawModel { .. } => "model",
            DrawCommand::DrawFarTexture { .. } => "far",
            DrawCommand::DrawIcons { .. } => "icon batch",
            DrawCommand::DrawDebris { .. } => "debris batch",
            DrawCommand::DrawBuildBorder { .. } => "border",
            DrawCommand::CustomMaterial { .. } => "custom",
            DrawCommand::PushState(_) => "push",
            _ => continue,
        };
        *counts.entry(name).or_insert(0) += 1;
    }
    counts
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => DrawerConfig::try_load(&path).with_context(|| format!("loading {}", path.display()))?,
        None => DrawerConfig::load_default(),
    };
    let mut drawer = UnitDrawer::new(config, ShadingCaps::default(), NUM_ALLY_TEAMS);
    let events = drawer.event_sender();

    let (assets, icons) = assets();
    let teams = TeamPalette::new(vec![Vec4::new(0.9, 0.2, 0.2, 1.0), Vec4::new(0.2, 0.4, 0.9, 1.0)]);
    let viewer = Viewer::new(0, 0);
    let terrain = Hills;
    let mut camera = Camera::looking_at(Vec3::new(150.0, 600.0, 900.0), Vec3::new(150.0, 0.0, 0.0));
    camera.set_viewport(1920, 1080);
    let shadow_camera = Camera::looking_at(Vec3::new(-800.0, 1500.0, 800.0), Vec3::new(150.0, 0.0, 0.0));
    let mut clock = FrameClock::new();
    let mut world = World::new();
    let mut sight = SightMap::default();
    let mut rng = rand::thread_rng();

    let mut armies = spawn_army(&mut world, &mut rng, 0, Vec3::new(0.0, 0.0, 500.0));
    armies.extend(spawn_army(&mut world, &mut rng, 1, Vec3::new(0.0, 0.0, -1400.0)));
    for &unit in &armies {
        events.send(UnitEvent::Created(unit));
    }
    drawer.add_temp_draw_unit(
        TempDrawUnit {
            def: FACTORY,
            team: 0,
            pos: Vec3::new(400.0, 0.0, 350.0),
            rotation: 0.0,
            facing: 1,
            timeout: 60,
            draw_alpha: true,
            draw_border: true,
        },
        &assets,
    );

    let mut casualties = armies
        .iter()
        .rev()
        .copied()
        .filter(|&u| world.get::<&UnitBody>(u).is_ok_and(|b| b.team == 1))
        .collect::<Vec<_>>()
        .into_iter();
    for frame in 0..FRAMES {
        for _ in 0..clock.advance(Duration::from_millis(16)) {
            sight.rebuild(&world);
            simulate(&mut world, &sight, &events);
        }
        clock.begin_draw_frame();

        // Every second, an enemy unit explodes.
        if frame % 30 == 29 {
            if let Some(unit) = casualties.next() {
                let pos = world.get::<&Transform>(unit).map(|t| t.position).context("casualty without transform")?;
                events.send(UnitEvent::destroyed(&world, unit)?);
                world.despawn(unit).context("despawning casualty")?;
                for _ in 0..6 {
                    let dir = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(0.2..1.0), rng.gen_range(-1.0..1.0));
                    drawer.spawn_debris(PieceSpawn {
                        mesh: cube_piece(),
                        matrix: Mat4::from_translation(pos),
                        speed: dir.normalize_or_zero() * EXPLOSION_SPEED,
                        radius: 6.0,
                        chance: 0.8,
                        team: 1,
                        texture: TextureId(2),
                    });
                }
            }
        }

        let scene = Scene {
            world: &world,
            assets: &assets,
            icons: &icons,
            terrain: &terrain,
            los: &sight,
            teams: &teams,
            viewer: &viewer,
            camera: &camera,
            clock: &clock,
        };
        drawer.update(&scene);
        drawer.draw(&scene, false, false);
        drawer.draw_shadow_pass(&Scene {
            camera: &shadow_camera,
            ..scene
        });
        drawer.draw_alpha_pass(&scene);
        drawer.draw_unit_icons(&scene);
        drawer.draw_unit_icons_screen(&scene);
        drawer.draw_debris(&scene);
        let cmds = drawer.take_commands();

        if frame % 15 == 0 {
            log::info!(
                "frame {:3} (sim {:3}, zoom {:.0}): {} commands, {:?}, {} ghosts, {} debris pieces",
                frame,
                clock.sim_frame(),
                drawer.zoom_distance(),
                cmds.len(),
                summarize(&cmds),
                drawer.ghosts().len(),
                drawer.debris().len(),
            );
        }
    }

    drawer.shutdown();
    Ok(())
}
