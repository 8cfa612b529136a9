//! Unit icons: the icon catalog, per-unit icon assignment grouped for
//! batched drawing, and the sizing/fade math shared by both icon modes.

use std::collections::{BTreeMap, HashMap};

use engine_core::Entity;
use glam::{Vec2, Vec3, Vec4};

use crate::model::TextureId;
use crate::vertex::IconVertex;

/// Largest camera distance that still grows world-space icons.
const MAX_ICON_SCALE_DIST: f32 = 8000.0;
/// Alpha floor of an icon that has just faded in.
pub const ICON_FADE_MIN_ALPHA: f32 = 64.0;
pub const ICON_FADE_MAX_ALPHA: f32 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IconId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct IconData {
    pub id: IconId,
    pub name: String,
    pub texture: TextureId,
    /// Relative size; 1.0 is the standard blip.
    pub size: f32,
    /// Scale the icon with the unit radius.
    pub radius_adjust: bool,
    /// Unit radius that maps to an unscaled icon when `radius_adjust` is set.
    pub radius_scale: f32,
    /// Multiplier on the icon distance at which units of this icon turn into icons.
    pub distance: f32,
}

impl IconData {
    pub fn new(id: IconId, name: impl Into<String>, texture: TextureId) -> Self {
        Self {
            id,
            name: name.into(),
            texture,
            size: 1.0,
            radius_adjust: false,
            radius_scale: 30.0,
            distance: 1.0,
        }
    }

    /// Icon size, scaled by unit radius when the icon asks for it.
    /// Radar blips never scale.
    pub fn effective_size(&self, is_default: bool, unit_radius: f32) -> f32 {
        if self.radius_adjust && !is_default && self.radius_scale > 0.0 {
            self.size * unit_radius / self.radius_scale
        } else {
            self.size
        }
    }
}

/// Growth factor of screen sprites (and fade distances) for oversized icons.
pub fn size_multiplier(effective_size: f32) -> f32 {
    (effective_size - 1.0) * 0.75 + 1.0
}

/// Icon assets, with a default radar blip as fallback for missing ones.
#[derive(Debug, Clone)]
pub struct IconCatalog {
    icons: HashMap<IconId, IconData>,
    default_icon: IconData,
}

impl Default for IconCatalog {
    fn default() -> Self {
        Self::new(IconData::new(IconId(0), "default", TextureId(0)))
    }
}

impl IconCatalog {
    pub fn new(default_icon: IconData) -> Self {
        Self {
            icons: HashMap::new(),
            default_icon,
        }
    }

    pub fn add(&mut self, icon: IconData) {
        self.icons.insert(icon.id, icon);
    }

    pub fn default_icon(&self) -> &IconData {
        &self.default_icon
    }

    pub fn is_default(&self, id: IconId) -> bool {
        id == self.default_icon.id
    }

    /// Icon by id; unknown ids resolve to the default icon.
    pub fn get(&self, id: IconId) -> &IconData {
        if id == self.default_icon.id {
            return &self.default_icon;
        }
        self.icons.get(&id).unwrap_or_else(|| {
            log::debug!("Icon {:?} not loaded, using default", id);
            &self.default_icon
        })
    }
}

/// Which icon each unit currently shows, grouped by icon.
///
/// A unit is in at most one group. Reassignment removes the unit from its
/// old group before inserting it into the new one.
#[derive(Debug, Default)]
pub struct IconGroups {
    assigned: HashMap<Entity, IconId>,
    groups: BTreeMap<IconId, Vec<Entity>>,
}

impl IconGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the icon of a unit; `None` removes it from all groups.
    pub fn assign(&mut self, unit: Entity, icon: Option<IconId>) {
        if self.assigned.get(&unit).copied() == icon {
            return;
        }
        self.remove(unit);
        if let Some(icon) = icon {
            self.assigned.insert(unit, icon);
            self.groups.entry(icon).or_default().push(unit);
        }
    }

    pub fn remove(&mut self, unit: Entity) {
        let Some(old) = self.assigned.remove(&unit) else {
            return;
        };
        if let Some(group) = self.groups.get_mut(&old) {
            if let Some(i) = group.iter().position(|&u| u == unit) {
                group.swap_remove(i);
            }
            if group.is_empty() {
                self.groups.remove(&old);
            }
        }
    }

    pub fn icon_of(&self, unit: Entity) -> Option<IconId> {
        self.assigned.get(&unit).copied()
    }

    /// Groups in icon order.
    pub fn groups(&self) -> impl Iterator<Item = (IconId, &[Entity])> {
        self.groups.iter().map(|(id, units)| (*id, units.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
        self.groups.clear();
    }
}

/// Icon alpha (64..=255) for a distance already divided by the unit's radius multiplier.
/// `None` when the icon has not faded in yet.
pub fn fade_alpha(dist: f32, fade_vanish: f32, fade_start: f32) -> Option<f32> {
    if dist < fade_vanish {
        return None;
    }
    if dist >= fade_start || fade_start <= fade_vanish {
        return Some(ICON_FADE_MAX_ALPHA);
    }
    let t = (dist - fade_vanish) / (fade_start - fade_vanish);
    Some(ICON_FADE_MIN_ALPHA + (ICON_FADE_MAX_ALPHA - ICON_FADE_MIN_ALPHA) * t)
}

/// Half-extent of a world billboard.
pub fn world_icon_scale(icon: &IconData, is_default: bool, unit_radius: f32, cam_dist: f32) -> f32 {
    icon.effective_size(is_default, unit_radius) * 0.4 * cam_dist.clamp(0.0, MAX_ICON_SCALE_DIST).sqrt()
}

/// Pixel size of a standard screen-space icon.
pub fn screen_icon_base(viewport: Vec2, icon_scale_ui: f32) -> f32 {
    (viewport.max_element() * 0.0125 * icon_scale_ui).max(12.0)
}

/// Two triangles facing the camera.
pub fn billboard_quad(center: Vec3, right: Vec3, up: Vec3, scale: f32, color: Vec4) -> [IconVertex; 6] {
    let r = right * scale;
    let u = up * scale;
    quad(
        [center - r - u, center + r - u, center + r + u, center - r + u],
        color,
    )
}

/// Pixel-space quad centred on `center`.
pub fn screen_quad(center: Vec2, half_size: f32, color: Vec4) -> [IconVertex; 6] {
    let c = center.extend(0.0);
    let h = half_size;
    quad(
        [
            c + Vec3::new(-h, -h, 0.0),
            c + Vec3::new(h, -h, 0.0),
            c + Vec3::new(h, h, 0.0),
            c + Vec3::new(-h, h, 0.0),
        ],
        color,
    )
}

fn quad(corners: [Vec3; 4], color: Vec4) -> [IconVertex; 6] {
    let uv = [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0)];
    let v = |i: usize| IconVertex::new(corners[i], uv[i], color);
    [v(0), v(1), v(2), v(0), v(2), v(3)]
}
