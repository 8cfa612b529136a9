//! Texture-keyed buckets of units, one opaque and one translucent set per
//! model type. A unit lives in exactly one bin at a time.

use std::collections::{BTreeMap, HashMap};

use engine_core::Entity;

use crate::error::DrawerError;
use crate::model::{ModelType, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinKind {
    Opaque,
    /// Cloaked units, drawn in the translucent pass.
    Alpha,
}

impl BinKind {
    pub const fn name(self) -> &'static str {
        match self {
            BinKind::Opaque => "opaque",
            BinKind::Alpha => "translucent",
        }
    }
}

/// Units of one model type, grouped by texture in texture order.
#[derive(Debug, Default)]
pub struct ModelBins {
    bins: BTreeMap<TextureId, Vec<Entity>>,
}

impl ModelBins {
    fn insert(&mut self, texture: TextureId, unit: Entity) {
        self.bins.entry(texture).or_default().push(unit);
    }

    fn remove(&mut self, texture: TextureId, unit: Entity) -> bool {
        let Some(bin) = self.bins.get_mut(&texture) else {
            return false;
        };
        let Some(i) = bin.iter().position(|&u| u == unit) else {
            return false;
        };
        bin.swap_remove(i);
        if bin.is_empty() {
            self.bins.remove(&texture);
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &[Entity])> {
        self.bins.iter().map(|(tex, units)| (*tex, units.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.bins.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinSlot {
    pub kind: BinKind,
    pub model_type: ModelType,
    pub texture: TextureId,
}

/// Opaque and translucent bins for every model type.
#[derive(Debug, Default)]
pub struct ModelBinSet {
    opaque: [ModelBins; ModelType::COUNT],
    alpha: [ModelBins; ModelType::COUNT],
    slots: HashMap<Entity, BinSlot>,
}

impl ModelBinSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn bins_mut(&mut self, kind: BinKind, model_type: ModelType) -> &mut ModelBins {
        match kind {
            BinKind::Opaque => &mut self.opaque[model_type.index()],
            BinKind::Alpha => &mut self.alpha[model_type.index()],
        }
    }

    pub fn bins(&self, kind: BinKind, model_type: ModelType) -> &ModelBins {
        match kind {
            BinKind::Opaque => &self.opaque[model_type.index()],
            BinKind::Alpha => &self.alpha[model_type.index()],
        }
    }

    /// Bin a unit. Fails if the unit is already in any bin.
    pub fn add(
        &mut self,
        unit: Entity,
        model_type: ModelType,
        texture: TextureId,
        kind: BinKind,
    ) -> Result<(), DrawerError> {
        if let Some(slot) = self.slots.get(&unit) {
            return Err(DrawerError::AlreadyBinned {
                unit,
                model_type: slot.model_type,
                existing: slot.kind.name(),
            });
        }
        self.bins_mut(kind, model_type).insert(texture, unit);
        self.slots.insert(unit, BinSlot { kind, model_type, texture });
        Ok(())
    }

    /// Move a unit between its opaque and translucent bin (cloak changes).
    pub fn transfer(&mut self, unit: Entity, to: BinKind) -> Result<(), DrawerError> {
        let slot = *self.slots.get(&unit).ok_or(DrawerError::UnknownUnit(unit))?;
        if slot.kind == to {
            return Ok(());
        }
        self.bins_mut(slot.kind, slot.model_type).remove(slot.texture, unit);
        self.bins_mut(to, slot.model_type).insert(slot.texture, unit);
        self.slots.insert(unit, BinSlot { kind: to, ..slot });
        Ok(())
    }

    pub fn remove(&mut self, unit: Entity) -> Option<BinSlot> {
        let slot = self.slots.remove(&unit)?;
        let removed = self.bins_mut(slot.kind, slot.model_type).remove(slot.texture, unit);
        debug_assert!(removed, "bin slot for {unit:?} pointed at the wrong bin");
        Some(slot)
    }

    pub fn slot(&self, unit: Entity) -> Option<BinSlot> {
        self.slots.get(&unit).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
