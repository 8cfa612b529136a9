use engine_core::{Entity, LosBits, UnitDefId};
use glam::{Vec3, Vec4};

use super::*;
use crate::bins::BinKind;
use crate::commands::{DrawCommand, MaterialPass};
use crate::error::DrawerError;
use crate::events::UnitEvent;
use crate::icons::IconId;
use crate::model::{ModelId, ModelType, TextureId};
use crate::test_support::*;

fn config() -> DrawerConfig {
    // Icon threshold of 1000 world units.
    DrawerConfig {
        unit_icon_dist: 1000.0 / 750f32.sqrt(),
        ..Default::default()
    }
}

fn drawer(config: DrawerConfig) -> UnitDrawer {
    UnitDrawer::new(config, ShadingCaps::default(), NUM_ALLY_TEAMS)
}

fn create(drawer: &mut UnitDrawer, bf: &Battlefield, unit: Entity) {
    drawer.handle(UnitEvent::Created(unit), &bf.scene()).unwrap();
}

fn unit_draws(cmds: &[DrawCommand], unit: Entity) -> usize {
    cmds.iter()
        .filter(|c| matches!(c, DrawCommand::DrawUnit { unit: u, .. } if *u == unit))
        .count()
}

fn model_draws(cmds: &[DrawCommand], model: ModelId) -> usize {
    cmds.iter()
        .filter(|c| matches!(c, DrawCommand::DrawModel { model: m, .. } if *m == model))
        .count()
}

fn icon_batches(cmds: &[DrawCommand]) -> Vec<(IconId, bool, usize)> {
    cmds.iter()
        .filter_map(|c| match c {
            DrawCommand::DrawIcons { icon, screen, vertices, .. } => Some((*icon, *screen, vertices.len())),
            _ => None,
        })
        .collect()
}

/// update + opaque + shadow + translucent, the regular frame order.
fn frame(drawer: &mut UnitDrawer, bf: &Battlefield) -> Vec<DrawCommand> {
    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, false);
    drawer.draw_shadow_pass(&scene);
    drawer.draw_alpha_pass(&scene);
    drawer.draw_unit_icons(&scene);
    drawer.draw_unit_icons_screen(&scene);
    drawer.draw_debris(&scene);
    drawer.take_commands()
}

#[test]
fn created_cloaked_and_destroyed_units_move_between_bins() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);

    create(&mut drawer, &bf, tank);
    let slot = drawer.bins().slot(tank).unwrap();
    assert_eq!((slot.kind, slot.model_type, slot.texture), (BinKind::Opaque, ModelType::Textured, TANK_TEXTURE));

    drawer.handle(UnitEvent::Cloaked(tank), &bf.scene()).unwrap();
    assert_eq!(drawer.bins().slot(tank).unwrap().kind, BinKind::Alpha);
    drawer.handle(UnitEvent::Decloaked(tank), &bf.scene()).unwrap();
    assert_eq!(drawer.bins().slot(tank).unwrap().kind, BinKind::Opaque);

    let event = UnitEvent::destroyed(&bf.world, tank).unwrap();
    bf.world.despawn(tank).unwrap();
    drawer.handle(event, &bf.scene()).unwrap();
    assert!(drawer.bins().is_empty());
    assert_eq!(drawer.unit_count(), 0);
    assert!(drawer.icon_groups().is_empty());
}

#[test]
fn lifecycle_violations_are_errors() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);

    assert!(matches!(
        drawer.handle(UnitEvent::Cloaked(tank), &bf.scene()),
        Err(DrawerError::UnknownUnit(u)) if u == tank
    ));
    assert!(matches!(
        drawer.handle(UnitEvent::EnteredLos { unit: tank, ally_team: 0 }, &bf.scene()),
        Err(DrawerError::UnknownUnit(_))
    ));

    create(&mut drawer, &bf, tank);
    assert!(matches!(
        drawer.handle(UnitEvent::Created(tank), &bf.scene()),
        Err(DrawerError::DuplicateUnit(_))
    ));

    let stranger = bf.spawn(TANK, Vec3::ZERO, 0, LosBits::IN_LOS);
    let event = UnitEvent::destroyed(&bf.world, stranger).unwrap();
    assert!(matches!(drawer.handle(event, &bf.scene()), Err(DrawerError::UnknownUnit(_))));
    assert_eq!(drawer.unit_count(), 1);
}

#[test]
fn units_past_icon_distance_become_icons() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let near = bf.spawn(TANK, Vec3::new(0.0, 0.0, -500.0), 0, LosBits::IN_LOS);
    let far = bf.spawn(TANK, Vec3::new(0.0, 0.0, -1500.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, near);
    create(&mut drawer, &bf, far);

    let cmds = frame(&mut drawer, &bf);
    assert!(!drawer.is_icon(near));
    assert!(drawer.is_icon(far));
    assert_eq!(unit_draws(&cmds, near), 2, "opaque and shadow");
    assert_eq!(unit_draws(&cmds, far), 0);
    assert_eq!(icon_batches(&cmds), vec![(TANK_ICON, false, 6)]);
}

#[test]
fn radar_contacts_use_the_default_icon() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let contact = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::IN_RADAR);
    create(&mut drawer, &bf, contact);

    assert_eq!(drawer.icon_groups().icon_of(contact), Some(bf.icons.default_icon().id));
    let cmds = frame(&mut drawer, &bf);
    assert!(drawer.is_icon(contact));
    assert_eq!(unit_draws(&cmds, contact), 0);
    assert_eq!(icon_batches(&cmds), vec![(IconId(0), false, 6)]);

    // Seen once and tracked since: the real icon.
    bf.set_los(contact, 0, LosBits::IN_RADAR | LosBits::PREV_LOS | LosBits::CONT_RADAR);
    drawer
        .handle(UnitEvent::EnteredRadar { unit: contact, ally_team: 0 }, &bf.scene())
        .unwrap();
    assert_eq!(drawer.icon_groups().icon_of(contact), Some(TANK_ICON));
}

#[test]
fn distant_units_hand_off_to_far_textures() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(DrawerConfig {
        unit_lod_dist: 20.0,
        ..config()
    });
    let near = bf.spawn(TANK, Vec3::new(0.0, 0.0, -100.0), 0, LosBits::IN_LOS);
    let far = bf.spawn(TANK, Vec3::new(0.0, 0.0, -500.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, near);
    create(&mut drawer, &bf, far);

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, false);
    let cmds = drawer.take_commands();
    assert_eq!(unit_draws(&cmds, near), 1);
    assert_eq!(unit_draws(&cmds, far), 0);
    assert!(cmds.contains(&DrawCommand::DrawFarTexture { unit: far }));
}

#[test]
fn far_hand_off_wins_over_custom_materials() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(DrawerConfig {
        unit_lod_dist: 20.0,
        ..config()
    });
    drawer.set_custom_materials(Box::new(ClaimsOpaque));
    let near = bf.spawn(TANK, Vec3::new(0.0, 0.0, -100.0), 0, LosBits::IN_LOS);
    let far = bf.spawn(TANK, Vec3::new(0.0, 0.0, -500.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, near);
    create(&mut drawer, &bf, far);

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, false);
    let cmds = drawer.take_commands();
    assert!(cmds.contains(&DrawCommand::DrawFarTexture { unit: far }));
    assert!(!cmds.contains(&DrawCommand::CustomMaterial { unit: far, pass: MaterialPass::Opaque }));
    assert!(cmds.contains(&DrawCommand::CustomMaterial { unit: near, pass: MaterialPass::Opaque }));
}

#[test]
fn lost_building_leaves_shared_ghost_until_seen_again() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let pos = Vec3::new(0.0, 0.0, -300.0);
    let factory = bf.spawn(FACTORY, pos, 1, LosBits::PREV_LOS);
    create(&mut drawer, &bf, factory);
    bf.set_los(factory, 1, LosBits::PREV_LOS);

    let event = UnitEvent::destroyed(&bf.world, factory).unwrap();
    bf.world.despawn(factory).unwrap();
    drawer.handle(event, &bf.scene()).unwrap();

    assert_eq!(drawer.ghosts().len(), 1);
    let (handle, ghost) = drawer.ghosts().dead(0, ModelType::Imported).next().unwrap();
    assert_eq!(ghost.ref_count, 2);
    assert_eq!(ghost.model, ModelId(2));

    bf.clock.begin_draw_frame();
    let cmds = frame(&mut drawer, &bf);
    assert_eq!(model_draws(&cmds, ModelId(2)), 1);
    let grey = drawer.config().alpha_values().y;
    assert!(cmds.contains(&DrawCommand::SetColor(Vec4::new(0.6, 0.6, 0.6, grey))));
    assert_eq!(drawer.ghosts().get(handle).unwrap().last_draw_frame, 1);

    bf.los.areas.push((pos, 50.0, 0));
    drawer.update(&bf.scene());
    assert_eq!(drawer.ghosts().ref_count(handle), Some(1));
    assert_eq!(drawer.ghosts().dead(0, ModelType::Imported).count(), 0);

    bf.los.areas.push((pos, 50.0, 1));
    drawer.update(&bf.scene());
    assert!(drawer.ghosts().is_empty());
}

#[test]
fn only_buildings_out_of_sight_leave_ghosts() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let seen = bf.spawn(FACTORY, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::IN_LOS | LosBits::PREV_LOS);
    let unfinished = bf.spawn(FACTORY, Vec3::new(50.0, 0.0, -300.0), 1, LosBits::PREV_LOS);
    *bf.status_mut(unfinished) = engine_core::UnitStatus::under_construction(0.4);
    create(&mut drawer, &bf, seen);
    create(&mut drawer, &bf, unfinished);

    for unit in [seen, unfinished] {
        let event = UnitEvent::destroyed(&bf.world, unit).unwrap();
        bf.world.despawn(unit).unwrap();
        drawer.handle(event, &bf.scene()).unwrap();
    }
    assert_eq!(drawer.ghosts().len(), 1);
    let (_, ghost) = drawer.ghosts().dead(0, ModelType::Imported).next().unwrap();
    assert_eq!(ghost.ref_count, 1);
    assert_eq!(ghost.pos, Vec3::new(50.0, 0.0, -300.0));
}

#[test]
fn destroying_an_unknown_building_leaves_no_ghost() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let stranger = bf.spawn(FACTORY, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::PREV_LOS);

    let event = UnitEvent::destroyed(&bf.world, stranger).unwrap();
    bf.world.despawn(stranger).unwrap();
    assert!(matches!(
        drawer.handle(event, &bf.scene()),
        Err(DrawerError::UnknownUnit(u)) if u == stranger
    ));
    assert!(drawer.ghosts().is_empty());
}

#[test]
fn spectators_see_no_ghosts() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let factory = bf.spawn(FACTORY, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::PREV_LOS);
    create(&mut drawer, &bf, factory);
    let event = UnitEvent::destroyed(&bf.world, factory).unwrap();
    bf.world.despawn(factory).unwrap();
    drawer.handle(event, &bf.scene()).unwrap();
    assert_eq!(drawer.ghosts().len(), 1);

    bf.viewer.spectating_full_view = true;
    let cmds = frame(&mut drawer, &bf);
    assert_eq!(model_draws(&cmds, ModelId(2)), 0);
}

#[test]
fn live_ghost_shows_decoy_to_enemies() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let fake = bf.spawn(DECOY_FACTORY, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::IN_LOS | LosBits::PREV_LOS);
    create(&mut drawer, &bf, fake);

    bf.set_los(fake, 0, LosBits::PREV_LOS | LosBits::CONT_RADAR | LosBits::IN_RADAR);
    drawer
        .handle(UnitEvent::LeftLos { unit: fake, ally_team: 0 }, &bf.scene())
        .unwrap();
    assert_eq!(drawer.ghosts().live(0, ModelType::Imported), &[fake]);

    let cmds = frame(&mut drawer, &bf);
    assert_eq!(model_draws(&cmds, ModelId(2)), 1);
    assert_eq!(model_draws(&cmds, ModelId(3)), 0);
    let radar_alpha = drawer.config().alpha_values().z;
    assert!(cmds.contains(&DrawCommand::SetColor(Vec4::new(0.9, 0.9, 0.9, radar_alpha))));

    bf.set_los(fake, 0, LosBits::IN_LOS | LosBits::PREV_LOS);
    drawer
        .handle(UnitEvent::EnteredLos { unit: fake, ally_team: 0 }, &bf.scene())
        .unwrap();
    assert!(drawer.ghosts().live(0, ModelType::Imported).is_empty());
}

#[test]
fn live_ghost_is_drawn_at_its_interpolated_position() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let factory = bf.spawn(FACTORY, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::IN_LOS | LosBits::PREV_LOS);
    bf.world.get::<&mut engine_core::UnitBody>(factory).unwrap().speed = Vec3::new(2.0, 0.0, 0.0);
    bf.clock.set_time_offset(0.5);
    create(&mut drawer, &bf, factory);

    bf.set_los(factory, 0, LosBits::PREV_LOS);
    drawer
        .handle(UnitEvent::LeftLos { unit: factory, ally_team: 0 }, &bf.scene())
        .unwrap();
    let cmds = frame(&mut drawer, &bf);
    let positions: Vec<Vec3> = cmds
        .iter()
        .filter_map(|c| match c {
            DrawCommand::DrawModel { model, instance } if *model == ModelId(2) => Some(instance.position()),
            _ => None,
        })
        .collect();
    assert_eq!(positions, vec![Vec3::new(1.0, 0.0, -300.0)]);
}

#[test]
fn shadow_pass_skips_cloaked_units() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, tank);
    bf.status_mut(tank).cloaked = true;

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw_shadow_pass(&scene);
    let cmds = drawer.take_commands();
    assert_eq!(unit_draws(&cmds, tank), 0);
    assert!(cmds.contains(&DrawCommand::SelectShading(crate::commands::ShadingKind::ShadowGen)));
}

#[test]
fn controlled_unit_only_appears_in_reflections() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, tank);
    bf.viewer.controlled_unit = Some(tank);

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, false);
    assert_eq!(unit_draws(&drawer.take_commands(), tank), 0);
    drawer.draw(&scene, true, false);
    assert_eq!(unit_draws(&drawer.take_commands(), tank), 1);
}

#[test]
fn refraction_pass_only_draws_units_in_water() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let dry = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    let wet = bf.spawn(TANK, Vec3::new(30.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    bf.status_mut(wet).in_water = true;
    create(&mut drawer, &bf, dry);
    create(&mut drawer, &bf, wet);

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, true);
    let cmds = drawer.take_commands();
    assert_eq!(unit_draws(&cmds, dry), 0);
    assert_eq!(unit_draws(&cmds, wet), 1);
}

#[test]
fn deferred_geometry_is_skipped_in_sub_renders() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(DrawerConfig {
        draw_deferred: true,
        ..config()
    });
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, tank);

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, false);
    let cmds = drawer.take_commands();
    assert!(cmds.contains(&DrawCommand::DeferredGeometry));
    assert_eq!(unit_draws(&cmds, tank), 2);

    drawer.draw(&scene, true, false);
    assert!(!drawer.take_commands().contains(&DrawCommand::DeferredGeometry));
}

struct ClaimsOpaque;

impl CustomMaterialHandler for ClaimsOpaque {
    fn claims(&self, _unit: Entity, pass: MaterialPass) -> bool {
        pass == MaterialPass::Opaque
    }
}

#[test]
fn custom_material_units_are_handed_over_after_the_pass() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    drawer.set_custom_materials(Box::new(ClaimsOpaque));
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, tank);

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, false);
    let cmds = drawer.take_commands();
    assert_eq!(unit_draws(&cmds, tank), 0);
    assert_eq!(
        &cmds[cmds.len() - 2..],
        &[
            DrawCommand::PopState,
            DrawCommand::CustomMaterial { unit: tank, pass: MaterialPass::Opaque },
        ]
    );

    // Shadows still come from the default path.
    drawer.draw_shadow_pass(&scene);
    assert_eq!(unit_draws(&drawer.take_commands(), tank), 1);
}

#[test]
fn unit_under_construction_draws_in_build_stages() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    *bf.status_mut(tank) = engine_core::UnitStatus::under_construction(0.9);
    create(&mut drawer, &bf, tank);

    let scene = bf.scene();
    drawer.update(&scene);
    drawer.draw(&scene, false, false);
    let cmds = drawer.take_commands();
    assert!(unit_draws(&cmds, tank) >= 2);
    assert!(cmds.iter().any(|c| matches!(c, DrawCommand::SetClipPlanes { .. })));
    assert!(cmds.contains(&DrawCommand::DisableClipPlanes));
}

#[test]
fn screen_icons_hide_with_interface() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(DrawerConfig {
        unit_icons_as_ui: true,
        unit_icons_hide_with_ui: true,
        ..config()
    });
    let contact = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::IN_RADAR);
    create(&mut drawer, &bf, contact);

    let cmds = frame(&mut drawer, &bf);
    assert!(drawer.is_icon(contact));
    assert_eq!(icon_batches(&cmds), vec![(IconId(0), true, 6)]);

    bf.viewer.hide_interface = true;
    let cmds = frame(&mut drawer, &bf);
    assert!(icon_batches(&cmds).is_empty());
}

#[test]
fn overlay_units_draw_border_and_expire() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let pos = Vec3::new(0.0, 0.0, -200.0);
    drawer.add_temp_draw_unit(
        TempDrawUnit {
            def: TANK,
            team: 0,
            pos,
            rotation: 0.0,
            facing: 0,
            timeout: 10,
            draw_alpha: true,
            draw_border: true,
        },
        &bf.assets,
    );

    let cmds = frame(&mut drawer, &bf);
    assert_eq!(model_draws(&cmds, ModelId(1)), 1);
    let border = cmds
        .iter()
        .find_map(|c| match c {
            DrawCommand::DrawBuildBorder { corners, color } => Some((*corners, *color)),
            _ => None,
        })
        .unwrap();
    assert_eq!(border.0[0], pos + Vec3::new(8.0, 1.0, 8.0));
    assert_eq!(border.1.w, drawer.config().alpha_values().w);

    for _ in 0..10 {
        bf.clock.step_sim();
    }
    drawer.update(&bf.scene());
    assert!(drawer.temp_units().is_empty());
}

#[test]
fn events_posted_from_the_simulation_are_applied_on_update() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    let stranger = bf.spawn(TANK, Vec3::ZERO, 0, LosBits::IN_LOS);

    let tx = drawer.event_sender();
    tx.send(UnitEvent::Created(tank));
    // Rejected and logged; must not disturb the rest of the queue.
    tx.send(UnitEvent::Cloaked(stranger));
    tx.send(UnitEvent::Cloaked(tank));
    drawer.update(&bf.scene());

    assert_eq!(drawer.unit_count(), 1);
    assert_eq!(drawer.bins().slot(tank).unwrap().kind, BinKind::Alpha);
}

#[test]
fn full_frame_leaves_render_state_balanced() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    for (i, def) in [TANK, FACTORY, WALL].into_iter().enumerate() {
        let unit = bf.spawn(def, Vec3::new(i as f32 * 40.0, 0.0, -300.0), 0, LosBits::IN_LOS);
        create(&mut drawer, &bf, unit);
    }

    let cmds = frame(&mut drawer, &bf);
    let pushes = cmds.iter().filter(|c| matches!(c, DrawCommand::PushState(_))).count();
    let pops = cmds.iter().filter(|c| matches!(c, DrawCommand::PopState)).count();
    assert_eq!(pushes, pops);
    assert_eq!(drawer.render_state().depth(), 0);
    assert_eq!(drawer.phase(), FramePhase::Icons);
    assert!(cmds.contains(&DrawCommand::BindModelTextures(crate::commands::TextureBinding::Atlas)));
    assert!(cmds.contains(&DrawCommand::BindModelTextures(crate::commands::TextureBinding::Pair(
        FACTORY_TEXTURE
    ))));
}

#[test]
fn individual_draws_skip_units_without_models() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    let unknown = bf.spawn(UnitDefId(99), Vec3::ZERO, 0, LosBits::IN_LOS);

    let scene = bf.scene();
    drawer.draw_individual(tank, &scene);
    drawer.draw_individual(unknown, &scene);
    drawer.draw_individual_def_alpha(FACTORY, 1, glam::Mat4::IDENTITY, &scene);
    drawer.draw_individual_def_opaque(WALL, 0, glam::Mat4::IDENTITY, &scene);
    drawer.draw_individual_def_opaque(UnitDefId(99), 0, glam::Mat4::IDENTITY, &scene);
    let cmds = drawer.take_commands();
    assert_eq!(unit_draws(&cmds, tank), 1);
    assert_eq!(unit_draws(&cmds, unknown), 0);
    assert_eq!(model_draws(&cmds, ModelId(2)), 1);
    assert_eq!(model_draws(&cmds, ModelId(3)), 1);
    assert_eq!(drawer.render_state().depth(), 0);
    assert!(cmds.contains(&DrawCommand::BindModelTextures(crate::commands::TextureBinding::Pair(
        TextureId(3)
    ))));
}

#[test]
fn shutdown_releases_ghosts_and_units() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let factory = bf.spawn(FACTORY, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::PREV_LOS);
    let tank = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 0, LosBits::IN_LOS);
    create(&mut drawer, &bf, factory);
    create(&mut drawer, &bf, tank);
    let event = UnitEvent::destroyed(&bf.world, factory).unwrap();
    bf.world.despawn(factory).unwrap();
    drawer.handle(event, &bf.scene()).unwrap();

    drawer.shutdown();
    assert!(drawer.ghosts().is_empty());
    assert_eq!(drawer.unit_count(), 0);
    assert!(drawer.bins().is_empty());
}

#[test]
fn draw_positions_extrapolate_by_speed_and_follow_transporters() {
    let mut bf = Battlefield::new();
    let truck = bf.spawn(TANK, Vec3::new(0.0, 0.0, -200.0), 0, LosBits::IN_LOS);
    let cargo = bf.spawn(TANK, Vec3::new(5.0, 0.0, -200.0), 0, LosBits::IN_LOS);
    bf.world.get::<&mut engine_core::UnitBody>(truck).unwrap().speed = Vec3::new(4.0, 0.0, 0.0);
    bf.world.get::<&mut engine_core::UnitBody>(cargo).unwrap().transporter = Some(truck);
    bf.clock.set_time_offset(0.5);

    let mut d = drawer(config());
    create(&mut d, &bf, truck);
    create(&mut d, &bf, cargo);
    d.update(&bf.scene());

    assert_eq!(d.draw_pos(truck), Some(Vec3::new(2.0, 0.0, -200.0)));
    assert_eq!(d.draw_pos(cargo), Some(Vec3::new(7.0, 0.0, -200.0)));
}

#[test]
fn player_change_reassigns_icons_for_the_new_view() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let contact = bf.spawn(TANK, Vec3::new(0.0, 0.0, -300.0), 1, LosBits::IN_RADAR);
    let unseen = bf.spawn(TANK, Vec3::new(40.0, 0.0, -300.0), 1, LosBits::NONE);
    create(&mut drawer, &bf, contact);
    create(&mut drawer, &bf, unseen);
    assert_eq!(drawer.icon_groups().icon_of(contact), Some(bf.icons.default_icon().id));
    assert_eq!(drawer.icon_groups().icon_of(unseen), None);

    bf.viewer.spectating_full_view = true;
    drawer.player_changed(&bf.scene());
    assert_eq!(drawer.icon_groups().icon_of(contact), Some(TANK_ICON));
    assert_eq!(drawer.icon_groups().icon_of(unseen), Some(TANK_ICON));
}

#[derive(Default)]
struct DecalLog {
    created: usize,
    destroyed: usize,
}

struct SharedDecals(std::rc::Rc<std::cell::RefCell<DecalLog>>);

impl crate::ghosts::GhostDecals for SharedDecals {
    fn ghost_created(&mut self, _: crate::ghosts::GhostHandle, _: &crate::ghosts::GhostSolidObject) {
        self.0.borrow_mut().created += 1;
    }

    fn ghost_destroyed(&mut self, _: crate::ghosts::GhostHandle) {
        self.0.borrow_mut().destroyed += 1;
    }
}

#[test]
fn decal_claims_follow_ghost_lifetime() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    let log = std::rc::Rc::new(std::cell::RefCell::new(DecalLog::default()));
    drawer.set_ghost_decals(Box::new(SharedDecals(log.clone())));

    let pos = Vec3::new(0.0, 0.0, -300.0);
    let factory = bf.spawn(FACTORY, pos, 1, LosBits::PREV_LOS);
    create(&mut drawer, &bf, factory);
    let event = UnitEvent::destroyed(&bf.world, factory).unwrap();
    bf.world.despawn(factory).unwrap();
    drawer.handle(event, &bf.scene()).unwrap();
    assert_eq!(log.borrow().created, 1);
    assert_eq!(log.borrow().destroyed, 0);

    bf.los.areas.push((pos, 50.0, 0));
    drawer.update(&bf.scene());
    assert_eq!(log.borrow().destroyed, 1);
}

#[test]
fn debris_ticks_with_simulation_frames() {
    let mut bf = Battlefield::new();
    let mut drawer = drawer(config());
    drawer.set_debris_field(crate::debris::DebrisField::with_seed(crate::debris::DEFAULT_GRAVITY, 3));
    let mesh = std::sync::Arc::new(crate::debris::PieceMesh {
        vertices: [Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)]
            .into_iter()
            .map(|p| crate::vertex::DebrisVertex::new(p, Vec3::Z, glam::Vec2::ZERO))
            .collect(),
        indices: vec![0, 1, 2],
    });
    assert!(drawer.spawn_debris(crate::debris::PieceSpawn {
        mesh,
        matrix: glam::Mat4::from_translation(Vec3::new(0.0, 20.0, -200.0)),
        speed: Vec3::ZERO,
        radius: 2.0,
        chance: 1.0,
        team: 0,
        texture: TANK_TEXTURE,
    }));

    drawer.update(&bf.scene());
    let cmds = frame(&mut drawer, &bf);
    assert!(cmds.iter().any(|c| matches!(c, DrawCommand::DrawDebris { team: 0, .. })));

    // Buried long before the first liveness check after ten seconds of falling.
    for _ in 0..300 {
        bf.clock.step_sim();
    }
    drawer.update(&bf.scene());
    assert!(drawer.debris().is_empty());
}
