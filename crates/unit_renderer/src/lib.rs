//! Unit drawer for the RTS client: sorts units into model bins, decides
//! model vs. icon per unit, keeps ghosts of lost buildings, animates
//! debris and emits an ordered stream of draw commands per pass.

pub mod bins;
pub mod build_stage;
pub mod camera;
pub mod commands;
pub mod config;
pub mod debris;
pub mod drawer;
pub mod error;
pub mod events;
pub mod ghosts;
pub mod icons;
pub mod model;
pub mod scene;
pub mod state;
pub mod temp_units;
pub mod vertex;
pub mod visibility;

#[cfg(test)]
mod test_support;

pub use camera::Camera;
pub use commands::{DrawCommand, MaterialPass, RenderState};
pub use config::DrawerConfig;
pub use debris::{DebrisField, PieceMesh, PieceSpawn};
pub use drawer::{CustomMaterialHandler, FramePhase, UnitDrawer};
pub use error::{ConfigError, DrawerError};
pub use events::{UnitEvent, UnitEventSender, UnitRemains};
pub use ghosts::GhostDecals;
pub use icons::{IconCatalog, IconData, IconId};
pub use model::{Assets, Model, ModelId, ModelType, TextureId, UnitDef};
pub use scene::{LosOracle, Scene, TeamPalette, Terrain, Viewer};
pub use state::ShadingCaps;
pub use temp_units::TempDrawUnit;
