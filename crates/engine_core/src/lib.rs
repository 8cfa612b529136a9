//! Core engine types shared between the unit simulation and the unit drawer.
//!
//! This crate provides the foundational types used across all engine systems:
//! - Transform and spatial components
//! - Simulation/draw frame timing
//! - Unit components read by the renderer

pub mod components;
pub mod time;
pub mod transform;

pub use components::*;
pub use time::*;
pub use transform::*;

// Re-export commonly used types
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use hecs::{Entity, World};
