//! The command stream handed to the GPU binding layer each frame.
//!
//! The drawer never talks to a device. Every pass appends `DrawCommand`s;
//! the binding layer maps `RenderState` onto pipeline descriptors and issues
//! the actual draws.

use engine_core::Entity;
use glam::{Vec3, Vec4};

use crate::icons::IconId;
use crate::model::{ModelId, TextureId};
use crate::vertex::{DebrisVertex, IconVertex, UnitInstance};

/// Fixed-function part of a pipeline, in wgpu terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub cull_mode: Option<wgpu::Face>,
    pub polygon_mode: wgpu::PolygonMode,
    pub blend: Option<wgpu::BlendState>,
    /// Fragments with alpha at or below the reference are discarded.
    pub alpha_test: Option<f32>,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub depth_bias: wgpu::DepthBiasState,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            blend: None,
            alpha_test: None,
            depth_write: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            depth_bias: wgpu::DepthBiasState::default(),
        }
    }
}

fn fill_or_line(wireframe: bool) -> wgpu::PolygonMode {
    if wireframe {
        wgpu::PolygonMode::Line
    } else {
        wgpu::PolygonMode::Fill
    }
}

impl RenderState {
    /// Back-face culled, alpha-tested at 0.5.
    pub fn opaque(wireframe: bool) -> Self {
        Self {
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: fill_or_line(wireframe),
            alpha_test: Some(0.5),
            ..Default::default()
        }
    }

    /// Alpha-blended over the opaque depth buffer without writing depth.
    pub fn translucent(wireframe: bool) -> Self {
        Self {
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: fill_or_line(wireframe),
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            alpha_test: Some(0.1),
            depth_write: false,
            ..Default::default()
        }
    }

    /// Shadow-map generation: polygon offset and alpha masking.
    pub fn shadow() -> Self {
        Self {
            cull_mode: Some(wgpu::Face::Back),
            alpha_test: Some(0.5),
            depth_bias: wgpu::DepthBiasState {
                constant: 1,
                slope_scale: 1.0,
                clamp: 0.0,
            },
            ..Default::default()
        }
    }

    /// Icons ignore depth. World billboards are alpha-tested, screen sprites blended.
    pub fn icons(screen: bool) -> Self {
        Self {
            blend: screen.then_some(wgpu::BlendState::ALPHA_BLENDING),
            alpha_test: Some(0.05),
            depth_write: false,
            depth_compare: wgpu::CompareFunction::Always,
            ..Default::default()
        }
    }

    /// Debris fragments: plain opaque, both faces.
    pub fn debris() -> Self {
        Self {
            alpha_test: Some(0.5),
            ..Default::default()
        }
    }
}

/// Shading state variant chosen for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadingKind {
    /// Programmable shading with normal/specular/reflection maps.
    Advanced,
    /// Minimal fallback that only needs the diffuse texture.
    Basic,
    /// Depth-only shadow generation.
    ShadowGen,
}

/// Texture set to bind before drawing a bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureBinding {
    /// Diffuse plus team-color/specular textures of a texture set.
    Pair(TextureId),
    /// Both legacy atlas textures.
    Atlas,
    /// Specular-only texture of a set, for alpha masking in shadow passes.
    Shadow(TextureId),
    ShadowAtlas,
}

/// Pass a custom-material unit was torn off from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialPass {
    Deferred,
    Opaque,
    Alpha,
    Shadow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    PushState(RenderState),
    PopState,
    SetAlphaTest(Option<f32>),
    SetPolygonMode(wgpu::PolygonMode),
    SetPolygonOffset(bool),
    SelectShading(ShadingKind),
    BindModelTextures(TextureBinding),
    UnbindShadowTextures,
    SetTeamColor { team: i32, color: Vec4 },
    /// Global tint (ghosts, borders).
    SetColor(Vec4),
    /// Build-stage tint; alpha 0 turns it off.
    SetNanoColor(Vec4),
    /// Model-space clip planes; `lower` is disabled when `None`.
    SetClipPlanes { upper: Vec4, lower: Option<Vec4> },
    DisableClipPlanes,
    /// Deferred geometry buffer fill for units.
    DeferredGeometry,
    /// Full unit model with its animated pieces.
    DrawUnit { unit: Entity, instance: UnitInstance },
    /// Static (unanimated) model: ghosts, temp units, previews.
    DrawModel { model: ModelId, instance: UnitInstance },
    /// Flat impostor for distant units.
    DrawFarTexture { unit: Entity },
    /// Unit handed to the custom-material renderer.
    CustomMaterial { unit: Entity, pass: MaterialPass },
    /// Closed line strip around a building footprint.
    DrawBuildBorder { corners: [Vec3; 5], color: Vec4 },
    DrawIcons {
        icon: IconId,
        texture: TextureId,
        screen: bool,
        vertices: Vec<IconVertex>,
    },
    DrawDebris {
        team: i32,
        texture: TextureId,
        vertices: Vec<DebrisVertex>,
    },
}

impl DrawCommand {
    /// True for commands that put pixels on screen.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            DrawCommand::DeferredGeometry
                | DrawCommand::DrawUnit { .. }
                | DrawCommand::DrawModel { .. }
                | DrawCommand::DrawFarTexture { .. }
                | DrawCommand::CustomMaterial { .. }
                | DrawCommand::DrawBuildBorder { .. }
                | DrawCommand::DrawIcons { .. }
                | DrawCommand::DrawDebris { .. }
        )
    }
}
