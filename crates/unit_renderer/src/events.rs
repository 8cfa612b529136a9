//! Unit lifecycle events delivered by the simulation.
//!
//! Events may be posted from the simulation thread through a
//! [`UnitEventSender`]; the drawer drains the queue on the render thread at
//! the start of every update, so handlers always run serialized with drawing.

use crossbeam_channel::{unbounded, Receiver, Sender};
use engine_core::{Entity, LosStatus, Transform, UnitBody, UnitDefId, UnitDefRef, World};
use glam::Vec3;

use crate::error::DrawerError;

/// What the drawer needs to know about a unit after it is gone.
#[derive(Debug, Clone)]
pub struct UnitRemains {
    pub def: UnitDefId,
    pub pos: Vec3,
    pub facing: u8,
    pub team: i32,
    /// Visibility at the moment of death, for every ally-team.
    pub los: LosStatus,
}

impl UnitRemains {
    /// Snapshot a unit that is about to be despawned.
    pub fn capture(world: &World, unit: Entity) -> Result<Self, DrawerError> {
        let pos = world
            .get::<&Transform>(unit)
            .map_err(|_| DrawerError::MissingComponent(unit, "Transform"))?
            .position;
        let body = *world
            .get::<&UnitBody>(unit)
            .map_err(|_| DrawerError::MissingComponent(unit, "UnitBody"))?;
        let def = world
            .get::<&UnitDefRef>(unit)
            .map_err(|_| DrawerError::MissingComponent(unit, "UnitDefRef"))?
            .0;
        let los = world.get::<&LosStatus>(unit).map(|l| (*l).clone()).unwrap_or_default();
        Ok(Self {
            def,
            pos,
            facing: body.build_facing,
            team: body.team,
            los,
        })
    }
}

#[derive(Debug, Clone)]
pub enum UnitEvent {
    Created(Entity),
    Destroyed { unit: Entity, remains: UnitRemains },
    Cloaked(Entity),
    Decloaked(Entity),
    EnteredLos { unit: Entity, ally_team: usize },
    LeftLos { unit: Entity, ally_team: usize },
    EnteredRadar { unit: Entity, ally_team: usize },
    LeftRadar { unit: Entity, ally_team: usize },
}

impl UnitEvent {
    /// Build a `Destroyed` event while the unit's components are still readable.
    pub fn destroyed(world: &World, unit: Entity) -> Result<Self, DrawerError> {
        Ok(UnitEvent::Destroyed {
            unit,
            remains: UnitRemains::capture(world, unit)?,
        })
    }

    pub fn unit(&self) -> Entity {
        match self {
            UnitEvent::Created(u) | UnitEvent::Cloaked(u) | UnitEvent::Decloaked(u) => *u,
            UnitEvent::Destroyed { unit, .. }
            | UnitEvent::EnteredLos { unit, .. }
            | UnitEvent::LeftLos { unit, .. }
            | UnitEvent::EnteredRadar { unit, .. }
            | UnitEvent::LeftRadar { unit, .. } => *unit,
        }
    }
}

/// Single-consumer queue owned by the drawer.
///
/// Unbounded: lifecycle events must never be dropped, and the render thread
/// drains the queue every frame.
pub struct UnitEventQueue {
    sender: Sender<UnitEvent>,
    receiver: Receiver<UnitEvent>,
}

impl Default for UnitEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitEventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Producer handle; clone it for every simulation-side poster.
    pub fn sender(&self) -> UnitEventSender {
        UnitEventSender {
            sender: self.sender.clone(),
        }
    }

    /// Everything posted so far, in posting order.
    pub fn drain(&self) -> Vec<UnitEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

#[derive(Clone)]
pub struct UnitEventSender {
    sender: Sender<UnitEvent>,
}

impl UnitEventSender {
    pub fn send(&self, event: UnitEvent) {
        if self.sender.send(event).is_err() {
            log::warn!("Unit drawer is gone, lifecycle event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::LosBits;

    #[test]
    fn events_drain_in_posting_order_across_threads() {
        let queue = UnitEventQueue::new();
        let mut world = World::new();
        let a = world.spawn((Transform::default(),));
        let b = world.spawn((Transform::default(),));

        let tx = queue.sender();
        std::thread::spawn(move || {
            tx.send(UnitEvent::Created(a));
            tx.send(UnitEvent::Cloaked(a));
            tx.send(UnitEvent::Created(b));
        })
        .join()
        .unwrap();

        assert_eq!(queue.pending(), 3);
        let units: Vec<_> = queue.drain().iter().map(UnitEvent::unit).collect();
        assert_eq!(units, vec![a, a, b]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn remains_capture_keeps_visibility_at_death() {
        let mut world = World::new();
        let mut los = LosStatus::new(2);
        los.set(1, LosBits::PREV_LOS);
        let mut body = UnitBody::new(20.0, 3, 0);
        body.build_facing = 2;
        let unit = world.spawn((
            Transform::from_position(Vec3::new(10.0, 0.0, 5.0)),
            body,
            UnitDefRef(UnitDefId(4)),
            los,
        ));

        let UnitEvent::Destroyed { remains, .. } = UnitEvent::destroyed(&world, unit).unwrap() else {
            panic!("expected a Destroyed event");
        };
        world.despawn(unit).unwrap();
        assert_eq!(remains.facing, 2);
        assert_eq!(remains.team, 3);
        assert_eq!(remains.los.get(1), LosBits::PREV_LOS);
    }
}
