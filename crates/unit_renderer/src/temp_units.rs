//! Short-lived overlay units (build previews, AI placement ghosts) that are
//! not simulated and disappear at an explicit simulation frame.

use engine_core::UnitDefId;
use glam::{Mat4, Quat, Vec2, Vec3};

use crate::model::ModelType;

/// Radius used to frustum-test temp units; they carry no bounds of their own.
pub const TEMP_UNIT_CULL_RADIUS: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TempDrawUnit {
    pub def: UnitDefId,
    pub team: i32,
    pub pos: Vec3,
    /// Heading in radians.
    pub rotation: f32,
    /// Build facing, used for the footprint border.
    pub facing: u8,
    /// Simulation frame at which the unit is dropped.
    pub timeout: u64,
    pub draw_alpha: bool,
    pub draw_border: bool,
}

impl TempDrawUnit {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(Quat::from_rotation_y(self.rotation), self.pos)
    }

    /// Closed footprint outline one unit above `pos`. Facings 1 and 3 swap the axes.
    pub fn border(&self, footprint: Vec2) -> [Vec3; 5] {
        let size = if self.facing % 2 == 1 { Vec2::new(footprint.y, footprint.x) } else { footprint };
        let half = size * 0.5;
        let c = self.pos + Vec3::Y;
        [
            c + Vec3::new(half.x, 0.0, half.y),
            c + Vec3::new(-half.x, 0.0, half.y),
            c + Vec3::new(-half.x, 0.0, -half.y),
            c + Vec3::new(half.x, 0.0, -half.y),
            c + Vec3::new(half.x, 0.0, half.y),
        ]
    }
}

/// Temp units by model type, split by opaque/translucent drawing. Not sorted.
#[derive(Debug, Default)]
pub struct TempDrawUnits {
    opaque: [Vec<TempDrawUnit>; ModelType::COUNT],
    alpha: [Vec<TempDrawUnit>; ModelType::COUNT],
}

impl TempDrawUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, unit: TempDrawUnit, model_type: ModelType) {
        let lists = if unit.draw_alpha { &mut self.alpha } else { &mut self.opaque };
        lists[model_type.index()].push(unit);
    }

    /// Drop every unit whose timeout frame has been reached. Survivor order is not kept.
    pub fn expire(&mut self, sim_frame: u64) {
        for list in self.opaque.iter_mut().chain(self.alpha.iter_mut()) {
            let mut n = 0;
            while n < list.len() {
                if list[n].timeout <= sim_frame {
                    list.swap_remove(n);
                } else {
                    n += 1;
                }
            }
        }
    }

    pub fn opaque(&self, model_type: ModelType) -> &[TempDrawUnit] {
        &self.opaque[model_type.index()]
    }

    pub fn alpha(&self, model_type: ModelType) -> &[TempDrawUnit] {
        &self.alpha[model_type.index()]
    }

    pub fn len(&self) -> usize {
        self.opaque.iter().chain(self.alpha.iter()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.opaque.iter_mut().chain(self.alpha.iter_mut()).for_each(Vec::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp(timeout: u64, alpha: bool) -> TempDrawUnit {
        TempDrawUnit {
            def: UnitDefId(1),
            team: 0,
            pos: Vec3::ZERO,
            rotation: 0.0,
            facing: 0,
            timeout,
            draw_alpha: alpha,
            draw_border: false,
        }
    }

    #[test]
    fn expired_units_are_removed_and_others_survive() {
        let mut temps = TempDrawUnits::new();
        for t in [10, 20, 15, 30] {
            temps.add(temp(t, false), ModelType::Textured);
        }
        temps.add(temp(12, true), ModelType::Legacy);

        temps.expire(9);
        assert_eq!(temps.len(), 5);

        temps.expire(15);
        let mut left: Vec<u64> = temps.opaque(ModelType::Textured).iter().map(|u| u.timeout).collect();
        left.sort_unstable();
        assert_eq!(left, vec![20, 30]);
        assert!(temps.alpha(ModelType::Legacy).is_empty());

        temps.expire(100);
        assert!(temps.is_empty());
    }

    #[test]
    fn border_swaps_axes_for_side_facings() {
        let mut t = temp(1, true);
        t.facing = 1;
        let corners = t.border(Vec2::new(32.0, 16.0));
        assert_eq!(corners[0], Vec3::new(8.0, 1.0, 16.0));
        assert_eq!(corners[0], corners[4]);
    }
}
