//! Ghosts of buildings: silhouettes kept for ally-teams that saw a building
//! and then lost sight of it.
//!
//! Dead ghosts (the building was destroyed while unobserved) live in a
//! fixed-capacity slab and are shared across ally-teams with an explicit
//! reference count. Live ghosts are plain per-ally-team entity lists of
//! buildings that are still alive but out of sight.

use engine_core::{Entity, LosBits, LosStatus};
use glam::{Mat4, Vec3};

use crate::model::{Model, ModelId, ModelType, TextureId};

/// Stable handle into the ghost slab. The generation rejects stale handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GhostHandle {
    index: u32,
    generation: u32,
}

/// Last-seen state of a destroyed building.
#[derive(Debug, Clone, PartialEq)]
pub struct GhostSolidObject {
    pub pos: Vec3,
    pub model: ModelId,
    pub model_type: ModelType,
    pub texture: TextureId,
    /// Build facing (quarter turns).
    pub facing: u8,
    pub team: i32,
    /// Number of ally-teams currently holding this ghost.
    pub ref_count: u32,
    pub last_draw_frame: u64,
}

impl GhostSolidObject {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(engine_core::facing_rotation(self.facing), self.pos)
    }
}

/// Ground decals (building footprints, scorch marks) tied to a ghost.
pub trait GhostDecals {
    fn ghost_created(&mut self, handle: GhostHandle, ghost: &GhostSolidObject);
    /// The ghost is about to be freed; drop any claim on it.
    fn ghost_destroyed(&mut self, handle: GhostHandle);
}

impl GhostDecals for () {
    fn ghost_created(&mut self, _handle: GhostHandle, _ghost: &GhostSolidObject) {}
    fn ghost_destroyed(&mut self, _handle: GhostHandle) {}
}

struct Slot {
    generation: u32,
    value: Option<GhostSolidObject>,
}

/// Fixed-capacity slab with a free list.
pub struct GhostArena {
    slots: Box<[Slot]>,
    free_list: Vec<u32>,
    allocated: usize,
}

impl GhostArena {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots: Vec<Slot> = (0..capacity).map(|_| Slot { generation: 0, value: None }).collect();
        Self {
            slots: slots.into_boxed_slice(),
            free_list: (0..capacity as u32).rev().collect(),
            allocated: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    /// `None` when the slab is full.
    pub fn allocate(&mut self, value: GhostSolidObject) -> Option<GhostHandle> {
        let index = self.free_list.pop()?;
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.allocated += 1;
        Some(GhostHandle { index, generation: slot.generation })
    }

    pub fn free(&mut self, handle: GhostHandle) -> Option<GhostSolidObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.allocated -= 1;
        Some(value)
    }

    pub fn get(&self, handle: GhostHandle) -> Option<&GhostSolidObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: GhostHandle) -> Option<&mut GhostSolidObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }
}

type PerModelType<T> = [Vec<T>; ModelType::COUNT];

/// Dead and live ghosts of every ally-team.
pub struct GhostRegistry {
    arena: GhostArena,
    dead: Vec<PerModelType<GhostHandle>>,
    live: Vec<PerModelType<Entity>>,
}

impl GhostRegistry {
    pub fn new(capacity: usize, num_ally_teams: usize) -> Self {
        Self {
            arena: GhostArena::new(capacity),
            dead: (0..num_ally_teams).map(|_| Default::default()).collect(),
            live: (0..num_ally_teams).map(|_| Default::default()).collect(),
        }
    }

    pub fn num_ally_teams(&self) -> usize {
        self.dead.len()
    }

    fn ensure_ally_teams(&mut self, n: usize) {
        if self.dead.len() < n {
            self.dead.resize_with(n, Default::default);
            self.live.resize_with(n, Default::default);
        }
    }

    /// A ghost-leaving building died. Every ally-team that saw it before but
    /// now has neither sight nor radar contact gets a reference to one shared
    /// record. Returns the record's handle if one was created.
    pub fn on_building_destroyed(
        &mut self,
        unit: Entity,
        pos: Vec3,
        facing: u8,
        team: i32,
        model: &Model,
        los: &LosStatus,
        decals: &mut dyn GhostDecals,
    ) -> Option<GhostHandle> {
        self.remove_live(unit);
        self.ensure_ally_teams(los.num_ally_teams());

        let mut handle: Option<GhostHandle> = None;
        for ally in 0..self.dead.len() {
            let bits = los.get(ally);
            let sees_ghost =
                bits.contains(LosBits::PREV_LOS) && !bits.intersects(LosBits::IN_LOS | LosBits::CONT_RADAR);
            if !sees_ghost {
                continue;
            }
            let h = match handle {
                Some(h) => h,
                None => {
                    let ghost = GhostSolidObject {
                        pos,
                        model: model.id,
                        model_type: model.model_type,
                        texture: model.texture,
                        facing,
                        team,
                        ref_count: 0,
                        last_draw_frame: 0,
                    };
                    let Some(h) = self.arena.allocate(ghost) else {
                        log::warn!(
                            "Ghost slab full ({} records), no ghost for {:?}",
                            self.arena.capacity(),
                            unit
                        );
                        return None;
                    };
                    if let Some(g) = self.arena.get(h) {
                        decals.ghost_created(h, g);
                    }
                    handle = Some(h);
                    h
                }
            };
            if let Some(g) = self.arena.get_mut(h) {
                g.ref_count += 1;
            }
            self.dead[ally][model.model_type.index()].push(h);
        }
        handle
    }

    /// Drop every dead ghost an ally-team can see again.
    pub fn update(&mut self, in_los: impl Fn(Vec3, usize) -> bool, decals: &mut dyn GhostDecals) {
        for ally in 0..self.dead.len() {
            for mt in ModelType::ALL {
                let mut i = 0;
                while i < self.dead[ally][mt.index()].len() {
                    let h = self.dead[ally][mt.index()][i];
                    let visible = self.arena.get(h).map_or(true, |g| in_los(g.pos, ally));
                    if visible {
                        self.dead[ally][mt.index()].swap_remove(i);
                        self.release(h, decals);
                    } else {
                        i += 1;
                    }
                }
            }
        }
    }

    fn release(&mut self, handle: GhostHandle, decals: &mut dyn GhostDecals) {
        let Some(ghost) = self.arena.get_mut(handle) else {
            log::error!("Stale ghost handle {:?}", handle);
            return;
        };
        ghost.ref_count = ghost.ref_count.saturating_sub(1);
        if ghost.ref_count == 0 {
            decals.ghost_destroyed(handle);
            self.arena.free(handle);
        }
    }

    /// A live building left an ally-team's sight.
    pub fn add_live(&mut self, unit: Entity, ally: usize, model_type: ModelType) {
        self.ensure_ally_teams(ally + 1);
        let list = &mut self.live[ally][model_type.index()];
        if !list.contains(&unit) {
            list.push(unit);
        }
    }

    /// A live building came back into an ally-team's sight.
    pub fn remove_live_for(&mut self, unit: Entity, ally: usize) {
        if let Some(lists) = self.live.get_mut(ally) {
            for list in lists.iter_mut() {
                list.retain(|&u| u != unit);
            }
        }
    }

    pub fn remove_live(&mut self, unit: Entity) {
        for lists in &mut self.live {
            for list in lists.iter_mut() {
                list.retain(|&u| u != unit);
            }
        }
    }

    pub fn live(&self, ally: usize, model_type: ModelType) -> &[Entity] {
        self.live
            .get(ally)
            .map(|l| l[model_type.index()].as_slice())
            .unwrap_or(&[])
    }

    pub fn dead(&self, ally: usize, model_type: ModelType) -> impl Iterator<Item = (GhostHandle, &GhostSolidObject)> {
        self.dead
            .get(ally)
            .map(|l| l[model_type.index()].as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|&h| self.arena.get(h).map(|g| (h, g)))
    }

    pub fn mark_drawn(&mut self, handle: GhostHandle, frame: u64) {
        if let Some(g) = self.arena.get_mut(handle) {
            g.last_draw_frame = frame;
        }
    }

    pub fn get(&self, handle: GhostHandle) -> Option<&GhostSolidObject> {
        self.arena.get(handle)
    }

    pub fn ref_count(&self, handle: GhostHandle) -> Option<u32> {
        self.arena.get(handle).map(|g| g.ref_count)
    }

    /// Number of allocated ghost records.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Release every reference held by every ally-team.
    pub fn release_all(&mut self, decals: &mut dyn GhostDecals) {
        let held: Vec<GhostHandle> = self
            .dead
            .iter_mut()
            .flat_map(|lists| lists.iter_mut().flat_map(std::mem::take))
            .collect();
        for h in held {
            self.release(h, decals);
        }
        for lists in &mut self.live {
            lists.iter_mut().for_each(Vec::clear);
        }
    }
}
