//! Flying debris from destroyed units.
//!
//! Each piece is a set of triangles torn from one model piece. Fragment
//! motion is stateless: position at age `t` follows from the initial speed
//! and gravity through two closed-form drag factors, so a piece stores
//! nothing per frame except its integer age.
//!
//! With air drag `d` the iterative scheme
//! `pos += speed; speed *= d; speed.y += g` sums to
//! `pos(t) = pos0 + speed0 * S(t) + g * G(t)` where
//! `S(t) = (1 - d^t) / (1 - d)` and `G(t) = (t - S(t)) / (1 - d)`.

use std::sync::Arc;

use engine_core::GAME_SPEED;
use glam::{Mat4, Quat, Vec3};
use rand::prelude::*;

use crate::camera::Camera;
use crate::commands::DrawCommand;
use crate::model::{ModelType, TextureId};
use crate::scene::{TeamPalette, Terrain};
use crate::state::RenderStateMachine;
use crate::vertex::DebrisVertex;

pub const AIR_DRAG: f32 = 0.995;
/// Extra outward speed given to each fragment, scaled by a random factor.
pub const EXPLOSION_SPEED: f32 = 3.0;
/// Gravity per tick squared, used when the map does not provide one.
pub const DEFAULT_GRAVITY: f32 = -0.1;

const INV_AIR_DRAG: f32 = 1.0 / (1.0 - AIR_DRAG);

/// Displacement multipliers for speed and gravity at one (interpolated) age.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragFactors {
    pub speed: f32,
    pub gravity: f32,
    /// Interpolated age in ticks; drives fragment spin.
    pub age: f32,
}

impl DragFactors {
    pub fn at(age: f32) -> Self {
        let speed = (1.0 - AIR_DRAG.powf(age)) * INV_AIR_DRAG;
        let gravity = (age - speed) * INV_AIR_DRAG;
        Self { speed, gravity, age }
    }
}

/// Triangle mesh of one model piece in piece space.
#[derive(Debug, Clone, Default)]
pub struct PieceMesh {
    pub vertices: Vec<DebrisVertex>,
    pub indices: Vec<u32>,
}

impl PieceMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn vertex(&self, i: usize) -> Option<&DebrisVertex> {
        self.indices.get(i).and_then(|&v| self.vertices.get(v as usize))
    }

    /// Direction from the piece origin to a triangle's centroid.
    fn triangle_dir(&self, first: usize) -> Vec3 {
        let mid = (0..3)
            .filter_map(|j| self.vertex(first + j))
            .map(|v| Vec3::from(v.position))
            .sum::<Vec3>()
            * 0.333;
        mid.try_normalize().unwrap_or(Vec3::ZERO)
    }
}

#[derive(Debug, Clone, Copy)]
struct Fragment {
    /// Index of the triangle's first index in `PieceMesh::indices`.
    first_index: usize,
    speed: Vec3,
    axis: Vec3,
    spin: f32,
}

/// Everything needed to blow one piece apart.
#[derive(Debug, Clone)]
pub struct PieceSpawn {
    pub mesh: Arc<PieceMesh>,
    /// World matrix of the piece at the moment of destruction.
    pub matrix: Mat4,
    /// Speed of the dying unit.
    pub speed: Vec3,
    pub radius: f32,
    /// Share of the piece's triangles that become fragments.
    pub chance: f32,
    pub team: i32,
    pub texture: TextureId,
}

#[derive(Debug, Clone)]
pub struct FlyingPiece {
    mesh: Arc<PieceMesh>,
    matrix: Mat4,
    pos0: Vec3,
    speed: Vec3,
    piece_radius: f32,
    team: i32,
    texture: TextureId,
    age: u32,
    fragments: Vec<Fragment>,
    /// Culling sphere, refreshed every tick.
    pos: Vec3,
    radius: f32,
}

impl FlyingPiece {
    pub fn new(spawn: PieceSpawn, rng: &mut impl Rng) -> Self {
        let triangles = spawn.mesh.triangle_count();
        let chance = spawn.chance.clamp(0.0, 1.0);
        let expected = ((chance * triangles as f32) as usize).max(1);

        let mut fragments = Vec::with_capacity(expected.min(triangles));
        for t in 0..triangles {
            if rng.gen::<f32>() > chance {
                continue;
            }
            let first_index = t * 3;
            let dir = spawn.mesh.triangle_dir(first_index);
            fragments.push(Fragment {
                first_index,
                speed: spawn.speed + dir * EXPLOSION_SPEED * rng.gen::<f32>(),
                axis: random_axis(rng),
                spin: rng.gen::<f32>() * 0.1,
            });
            if fragments.len() >= expected {
                break;
            }
        }

        let pos0 = spawn.matrix.w_axis.truncate();
        Self {
            mesh: spawn.mesh,
            matrix: spawn.matrix,
            pos0,
            speed: spawn.speed,
            piece_radius: spawn.radius,
            team: spawn.team,
            texture: spawn.texture,
            age: 0,
            fragments,
            pos: pos0,
            radius: spawn.radius + 10.0,
        }
    }

    pub fn team(&self) -> i32 {
        self.team
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Culling sphere center.
    pub fn pos(&self) -> Vec3 {
        self.pos
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Center of the piece at the given drag factors.
    pub fn center_at(&self, f: &DragFactors, gravity: f32) -> Vec3 {
        self.pos0 + self.speed * f.speed + Vec3::Y * gravity * f.gravity
    }

    fn fragment_matrix(&self, frag: &Fragment, f: &DragFactors, gravity: f32) -> Mat4 {
        let offset = frag.speed * f.speed + Vec3::Y * gravity * f.gravity;
        Mat4::from_translation(offset) * self.matrix * Mat4::from_quat(Quat::from_axis_angle(frag.axis, frag.spin * f.age))
    }

    /// Advance one tick. Every `GAME_SPEED` ticks the piece is retired once
    /// all fragments have sunk below the terrain.
    pub fn tick(&mut self, gravity: f32, terrain: &dyn Terrain) -> bool {
        self.age += 1;
        let f = DragFactors::at(self.age as f32);
        self.pos = self.center_at(&f, gravity);
        self.radius = self.piece_radius + EXPLOSION_SPEED * f.speed + 10.0;

        if self.age % GAME_SPEED != 0 {
            return true;
        }
        self.fragments.iter().any(|frag| {
            let p = self.fragment_matrix(frag, &f, gravity).w_axis.truncate();
            p.y + 10.0 >= terrain.height_at(p.x, p.z)
        })
    }

    /// World-space triangles at the given drag factors.
    pub fn append_vertices(&self, f: &DragFactors, gravity: f32, out: &mut Vec<DebrisVertex>) {
        out.reserve(self.fragments.len() * 3);
        for frag in &self.fragments {
            let m = self.fragment_matrix(frag, f, gravity);
            for j in 0..3 {
                let Some(v) = self.mesh.vertex(frag.first_index + j) else {
                    continue;
                };
                let p = m.transform_point3(Vec3::from(v.position));
                let n = m.transform_vector3(Vec3::from(v.normal)).normalize_or_zero();
                out.push(DebrisVertex::new(p, n, v.tex_coords.into()));
            }
        }
    }
}

fn random_axis(rng: &mut impl Rng) -> Vec3 {
    Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
        .try_normalize()
        .unwrap_or(Vec3::Y)
}

/// All live debris pieces.
pub struct DebrisField {
    pieces: Vec<FlyingPiece>,
    gravity: f32,
    max_triangles: usize,
    rng: StdRng,
}

impl Default for DebrisField {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY)
    }
}

impl DebrisField {
    pub fn new(gravity: f32) -> Self {
        Self::with_rng(gravity, StdRng::from_entropy())
    }

    /// Deterministic scatter for replays and tests.
    pub fn with_seed(gravity: f32, seed: u64) -> Self {
        Self::with_rng(gravity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(gravity: f32, rng: StdRng) -> Self {
        Self {
            pieces: Vec::new(),
            gravity,
            max_triangles: 20_000,
            rng,
        }
    }

    pub fn set_max_triangles(&mut self, max: usize) {
        self.max_triangles = max;
    }

    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn pieces(&self) -> &[FlyingPiece] {
        &self.pieces
    }

    pub fn triangle_count(&self) -> usize {
        self.pieces.iter().map(FlyingPiece::fragment_count).sum()
    }

    /// Spawn a piece unless the triangle budget is spent. Returns whether it was added.
    pub fn spawn_piece(&mut self, spawn: PieceSpawn) -> bool {
        if self.triangle_count() >= self.max_triangles {
            log::debug!("Debris budget of {} triangles reached, dropping piece", self.max_triangles);
            return false;
        }
        let piece = FlyingPiece::new(spawn, &mut self.rng);
        self.pieces.push(piece);
        true
    }

    /// Advance all pieces one simulation tick and drop the buried ones.
    pub fn tick(&mut self, terrain: &dyn Terrain) {
        let gravity = self.gravity;
        self.pieces.retain_mut(|p| p.tick(gravity, terrain));
    }

    /// Emit visible pieces, batched by team and texture.
    pub fn draw(&self, st: &mut RenderStateMachine, camera: &Camera, teams: &TeamPalette, time_offset: f32) {
        let mut visible: Vec<&FlyingPiece> = self
            .pieces
            .iter()
            .filter(|p| camera.in_view(p.pos, p.radius))
            .collect();
        if visible.is_empty() {
            return;
        }
        visible.sort_by_key(|p| (p.team, p.texture));

        let gravity = self.gravity;
        st.with_debris_drawing(|st| {
            let mut batch: Vec<DebrisVertex> = Vec::new();
            let mut current: Option<(i32, TextureId)> = None;
            for piece in visible {
                let key = (piece.team, piece.texture);
                if current != Some(key) {
                    flush(st, current, &mut batch);
                    st.set_team_color(piece.team, 1.0, teams);
                    st.bind_model_textures(ModelType::Textured, piece.texture);
                    current = Some(key);
                }
                let f = DragFactors::at(piece.age as f32 + time_offset);
                piece.append_vertices(&f, gravity, &mut batch);
            }
            flush(st, current, &mut batch);
        });
    }

    pub fn clear(&mut self) {
        self.pieces.clear();
    }
}

fn flush(st: &mut RenderStateMachine, key: Option<(i32, TextureId)>, batch: &mut Vec<DebrisVertex>) {
    let Some((team, texture)) = key else {
        return;
    };
    if batch.is_empty() {
        return;
    }
    st.emit(DrawCommand::DrawDebris {
        team,
        texture,
        vertices: std::mem::take(batch),
    });
}
