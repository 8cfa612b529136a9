//! Unit components shared by the simulation and the unit drawer.
//!
//! Units are `hecs` entities owned by the simulation. The drawer only reads
//! these components; it never spawns or despawns units.

use glam::Vec3;

/// Per-ally-team visibility bits of a single unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LosBits(u8);

impl LosBits {
    /// Currently inside line of sight.
    pub const IN_LOS: Self = Self(1 << 0);
    /// Currently detected by radar.
    pub const IN_RADAR: Self = Self(1 << 1);
    /// Has been in line of sight at some point.
    pub const PREV_LOS: Self = Self(1 << 2);
    /// Radar contact has been continuous since the last time it was seen.
    pub const CONT_RADAR: Self = Self(1 << 3);

    pub const NONE: Self = Self(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn in_los(self) -> bool {
        self.intersects(Self::IN_LOS)
    }

    pub const fn in_radar(self) -> bool {
        self.intersects(Self::IN_RADAR)
    }

    /// Seen before and radar contact never broken since.
    pub const fn identified(self) -> bool {
        self.contains(Self(Self::PREV_LOS.0 | Self::CONT_RADAR.0))
    }
}

impl std::ops::BitOr for LosBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Visibility of a unit for every ally-team, indexed by ally-team number.
#[derive(Debug, Clone, Default)]
pub struct LosStatus {
    pub per_ally: Vec<LosBits>,
}

impl LosStatus {
    pub fn new(num_ally_teams: usize) -> Self {
        Self {
            per_ally: vec![LosBits::NONE; num_ally_teams],
        }
    }

    /// Bits for an ally-team; teams outside the table see nothing.
    pub fn get(&self, ally_team: usize) -> LosBits {
        self.per_ally.get(ally_team).copied().unwrap_or_default()
    }

    pub fn set(&mut self, ally_team: usize, bits: LosBits) {
        if ally_team >= self.per_ally.len() {
            self.per_ally.resize(ally_team + 1, LosBits::NONE);
        }
        self.per_ally[ally_team] = bits;
    }

    pub fn num_ally_teams(&self) -> usize {
        self.per_ally.len()
    }
}

/// Identifier of a unit type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitDefId(pub u32);

/// Links a unit entity to its type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDefRef(pub UnitDefId);

/// Physical and ownership data of a unit. Position and orientation live in `Transform`.
#[derive(Debug, Clone, Copy)]
pub struct UnitBody {
    /// Bounding radius.
    pub radius: f32,
    /// Owning team; negative values mean "no team".
    pub team: i32,
    pub ally_team: usize,
    /// Build facing for structures (quarter turns).
    pub build_facing: u8,
    /// Per-tick displacement, used to interpolate between simulation ticks.
    pub speed: Vec3,
    /// Offset from the base position to the model mid point.
    pub mid_offset: Vec3,
    /// Radar jitter applied when drawing radar-only contacts.
    pub radar_error: Vec3,
    /// Carrying unit, if this unit is being transported.
    pub transporter: Option<hecs::Entity>,
}

impl UnitBody {
    pub fn new(radius: f32, team: i32, ally_team: usize) -> Self {
        Self {
            radius,
            team,
            ally_team,
            build_facing: 0,
            speed: Vec3::ZERO,
            mid_offset: Vec3::new(0.0, radius * 0.5, 0.0),
            radar_error: Vec3::ZERO,
            transporter: None,
        }
    }
}

/// Mutable simulation state the drawer needs per frame.
#[derive(Debug, Clone, Copy)]
pub struct UnitStatus {
    pub health: f32,
    pub cloaked: bool,
    pub being_built: bool,
    /// Build progress in `[0, 1]`; only meaningful while `being_built`.
    pub build_progress: f32,
    /// Hidden by script.
    pub no_draw: bool,
    /// Removed from the map (e.g. loaded into a transport that hides cargo).
    pub in_void: bool,
    pub in_water: bool,
    pub selected: bool,
}

impl Default for UnitStatus {
    fn default() -> Self {
        Self {
            health: 100.0,
            cloaked: false,
            being_built: false,
            build_progress: 1.0,
            no_draw: false,
            in_void: false,
            in_water: false,
            selected: false,
        }
    }
}

impl UnitStatus {
    pub fn under_construction(progress: f32) -> Self {
        Self {
            being_built: true,
            build_progress: progress.clamp(0.0, 1.0),
            ..Default::default()
        }
    }
}
