//! Error types for the unit drawer.
//!
//! Only lifecycle bookkeeping can fail. Per-frame drawing never returns an
//! error; problems there resolve to skipping the unit or drawing a placeholder.

use hecs::Entity;
use thiserror::Error;

use crate::model::ModelType;

#[derive(Debug, Error)]
pub enum DrawerError {
    /// A unit was added to a bin while already binned for its model type.
    /// Indicates the caller delivered lifecycle events out of order.
    #[error("unit {unit:?} is already in the {existing} bin for {model_type:?} models")]
    AlreadyBinned {
        unit: Entity,
        model_type: ModelType,
        existing: &'static str,
    },

    #[error("unit {0:?} is not known to the drawer (missing UnitCreated event?)")]
    UnknownUnit(Entity),

    #[error("unit {0:?} was already registered with the drawer")]
    DuplicateUnit(Entity),

    #[error("unit {0:?} lacks component {1}")]
    MissingComponent(Entity, &'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read drawer config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse drawer config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to serialize drawer config: {0}")]
    Serialize(#[from] ron::Error),
}
