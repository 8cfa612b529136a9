//! Model and unit-type descriptions as the drawer sees them.
//!
//! Mesh data itself belongs to the model-loading subsystem; the drawer only
//! needs ids, the model kind (which decides texture-binding conventions) and
//! bounding sizes.

use std::collections::{HashMap, HashSet};

use engine_core::UnitDefId;
use glam::{Vec2, Vec4};

use crate::icons::IconId;

/// Mesh-source format. Each kind binds its textures differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelType {
    /// Piece-based legacy format with per-face textures in a shared atlas.
    Legacy,
    /// Single-texture-pair format.
    Textured,
    /// Imported scene-format model.
    Imported,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [ModelType::Legacy, ModelType::Textured, ModelType::Imported];
    pub const COUNT: usize = Self::ALL.len();

    pub const fn index(self) -> usize {
        match self {
            ModelType::Legacy => 0,
            ModelType::Textured => 1,
            ModelType::Imported => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u32);

/// Texture set id. Legacy models all share `TextureId::ATLAS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const ATLAS: TextureId = TextureId(0);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub id: ModelId,
    pub model_type: ModelType,
    pub texture: TextureId,
    /// Bounding radius used for culling.
    pub draw_radius: f32,
    /// Height used by build-stage clip planes.
    pub height: f32,
}

impl Model {
    pub fn new(id: ModelId, model_type: ModelType, texture: TextureId, draw_radius: f32, height: f32) -> Self {
        let texture = if model_type == ModelType::Legacy { TextureId::ATLAS } else { texture };
        Self { id, model_type, texture, draw_radius, height }
    }
}

/// Drawing-relevant part of a unit type definition.
#[derive(Debug, Clone)]
pub struct UnitDef {
    pub id: UnitDefId,
    pub name: String,
    pub model: Option<ModelId>,
    /// Type shown to enemies instead of this one.
    pub decoy: Option<UnitDefId>,
    pub icon: Option<IconId>,
    pub is_building: bool,
    /// Never drawn as a full model, only as an icon.
    pub always_icon: bool,
    /// Leaves a ghost silhouette when destroyed out of sight.
    pub leaves_ghost: bool,
    /// Draw wireframe/flat stages while under construction.
    pub show_nano_frame: bool,
    pub nano_color: Vec4,
    /// Footprint size in world units (x, z), used for build borders.
    pub footprint: Vec2,
}

impl UnitDef {
    pub fn new(id: UnitDefId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            model: None,
            decoy: None,
            icon: None,
            is_building: false,
            always_icon: false,
            leaves_ghost: false,
            show_nano_frame: true,
            nano_color: Vec4::new(0.2, 0.7, 0.2, 1.0),
            footprint: Vec2::splat(16.0),
        }
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_icon(mut self, icon: IconId) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Mark as a structure that leaves a ghost when lost from sight.
    pub fn building(mut self) -> Self {
        self.is_building = true;
        self.leaves_ghost = true;
        self
    }
}

/// Read-only lookup of models and unit types, filled by the asset loader.
#[derive(Debug)]
pub struct Assets {
    models: HashMap<ModelId, Model>,
    defs: HashMap<UnitDefId, UnitDef>,
    placeholder: Model,
    reported_missing: std::cell::RefCell<HashSet<UnitDefId>>,
}

impl Default for Assets {
    fn default() -> Self {
        Self::new()
    }
}

impl Assets {
    /// Id of the built-in substitute model for units whose model is absent.
    pub const PLACEHOLDER_MODEL: ModelId = ModelId(u32::MAX);

    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
            defs: HashMap::new(),
            placeholder: Model::new(Self::PLACEHOLDER_MODEL, ModelType::Textured, TextureId(u32::MAX), 16.0, 16.0),
            reported_missing: Default::default(),
        }
    }

    pub fn add_model(&mut self, model: Model) {
        self.models.insert(model.id, model);
    }

    pub fn add_def(&mut self, def: UnitDef) {
        self.defs.insert(def.id, def);
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(&id)
    }

    pub fn def(&self, id: UnitDefId) -> Option<&UnitDef> {
        self.defs.get(&id)
    }

    /// Model of a unit type, or the placeholder when the type has none loaded.
    pub fn model_for_def(&self, def: UnitDefId) -> &Model {
        let found = self
            .defs
            .get(&def)
            .and_then(|d| d.model)
            .and_then(|m| self.models.get(&m));
        match found {
            Some(model) => model,
            None => {
                if self.reported_missing.borrow_mut().insert(def) {
                    log::debug!("No model for unit type {:?}, drawing placeholder", def);
                }
                &self.placeholder
            }
        }
    }

    /// Model by id; unknown ids (including the placeholder's) resolve to the placeholder.
    pub fn model_or_placeholder(&self, id: ModelId) -> &Model {
        self.models.get(&id).unwrap_or(&self.placeholder)
    }

    /// Like `model_for_def` but without the placeholder fallback.
    pub fn loaded_model_for_def(&self, def: UnitDefId) -> Option<&Model> {
        self.defs
            .get(&def)
            .and_then(|d| d.model)
            .and_then(|m| self.models.get(&m))
    }

    /// Type to present to the given viewer: the decoy type for enemies, if any.
    pub fn presented_def(&self, def: UnitDefId, is_ally: bool) -> UnitDefId {
        if is_ally {
            return def;
        }
        self.defs.get(&def).and_then(|d| d.decoy).unwrap_or(def)
    }
}
