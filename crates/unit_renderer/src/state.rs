//! Render-state machine: scoped pass setup, shading selection, texture
//! binding and team colors.
//!
//! Every `with_*` scope pushes its state, runs the closure and pops, so a
//! pass can never leak state into the next one. The machine mirrors the
//! live GPU state in `GpuState` while appending the matching commands.

use glam::Vec4;

use crate::commands::{DrawCommand, RenderState, ShadingKind, TextureBinding};
use crate::model::{Model, ModelType, TextureId};
use crate::scene::TeamPalette;

/// What the platform offers for advanced shading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadingCaps {
    /// Hardware and driver support programmable unit shading.
    pub supported: bool,
    /// The advanced state compiled and linked at startup.
    pub initialized: bool,
    /// The advanced state can render alpha-blended materials.
    pub can_draw_alpha: bool,
}

impl Default for ShadingCaps {
    fn default() -> Self {
        Self {
            supported: true,
            initialized: true,
            can_draw_alpha: true,
        }
    }
}

/// Kind of pass currently open; decides texture binding and team-color behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassKind {
    #[default]
    None,
    Opaque,
    Alpha,
    Shadow,
    Icons,
}

/// Snapshot of the state the binding layer holds after replaying the commands.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuState {
    pub render: RenderState,
    pub pass: PassKind,
    pub shading: Option<ShadingKind>,
    pub textures: Option<TextureBinding>,
    pub team_color: Option<(i32, Vec4)>,
    pub color: Vec4,
    pub nano_color: Vec4,
    pub clip_planes: Option<(Vec4, Option<Vec4>)>,
    pub polygon_offset: bool,
}

impl Default for GpuState {
    fn default() -> Self {
        Self {
            render: RenderState::default(),
            pass: PassKind::None,
            shading: None,
            textures: None,
            team_color: None,
            color: Vec4::ONE,
            nano_color: Vec4::new(1.0, 1.0, 1.0, 0.0),
            clip_planes: None,
            polygon_offset: false,
        }
    }
}

pub struct RenderStateMachine {
    caps: ShadingCaps,
    adv_shading: bool,
    wireframe: bool,
    current: GpuState,
    stack: Vec<GpuState>,
    commands: Vec<DrawCommand>,
}

impl RenderStateMachine {
    pub fn new(caps: ShadingCaps, adv_shading: bool) -> Self {
        if adv_shading && !(caps.supported && caps.initialized) {
            log::warn!("Advanced unit shading unavailable ({:?}), using basic shading", caps);
        }
        Self {
            caps,
            adv_shading,
            wireframe: false,
            current: GpuState::default(),
            stack: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn set_wireframe(&mut self, wireframe: bool) {
        self.wireframe = wireframe;
    }

    /// Shading state for a pass. Alpha passes only get advanced shading if it can blend.
    pub fn wanted_shading(&self, alpha_pass: bool) -> ShadingKind {
        let enable = self.adv_shading && self.caps.supported && self.caps.initialized;
        let permit = !alpha_pass || self.caps.can_draw_alpha;
        if enable && permit {
            ShadingKind::Advanced
        } else {
            ShadingKind::Basic
        }
    }

    pub fn state(&self) -> &GpuState {
        &self.current
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn in_shadow_pass(&self) -> bool {
        self.current.pass == PassKind::Shadow
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn emit(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    fn push(&mut self, render: RenderState, pass: PassKind) {
        self.stack.push(self.current.clone());
        self.current.render = render;
        self.current.pass = pass;
        self.commands.push(DrawCommand::PushState(render));
    }

    fn pop(&mut self) {
        match self.stack.pop() {
            Some(prev) => {
                self.current = prev;
                self.commands.push(DrawCommand::PopState);
            }
            None => log::error!("Render state stack underflow"),
        }
    }

    fn scoped<R>(&mut self, render: RenderState, pass: PassKind, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push(render, pass);
        let r = f(self);
        self.pop();
        r
    }

    fn select_shading(&mut self, kind: ShadingKind) {
        if self.current.shading != Some(kind) {
            self.current.shading = Some(kind);
            self.commands.push(DrawCommand::SelectShading(kind));
        }
    }

    /// Opaque setup: back-face culling, alpha test at 0.5, shading chosen once for the pass.
    pub fn with_opaque_drawing<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let render = RenderState::opaque(self.wireframe);
        let shading = self.wanted_shading(false);
        self.scoped(render, PassKind::Opaque, |st| {
            st.select_shading(shading);
            f(st)
        })
    }

    /// Translucent setup: alpha blending, no depth writes. Advanced shading
    /// handles alpha itself, so the alpha test is dropped under it.
    pub fn with_alpha_drawing<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let render = RenderState::translucent(self.wireframe);
        let shading = self.wanted_shading(true);
        self.scoped(render, PassKind::Alpha, |st| {
            st.select_shading(shading);
            if shading == ShadingKind::Advanced {
                st.set_alpha_test(None);
            }
            f(st)
        })
    }

    /// Shadow-map generation under the shadow camera.
    pub fn with_shadow_drawing<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scoped(RenderState::shadow(), PassKind::Shadow, |st| {
            st.select_shading(ShadingKind::ShadowGen);
            st.set_color(Vec4::ONE);
            f(st)
        })
    }

    pub fn with_icon_drawing<R>(&mut self, screen: bool, f: impl FnOnce(&mut Self) -> R) -> R {
        self.scoped(RenderState::icons(screen), PassKind::Icons, f)
    }

    pub fn with_debris_drawing<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let shading = self.wanted_shading(false);
        self.scoped(RenderState::debris(), PassKind::Opaque, |st| {
            st.select_shading(shading);
            f(st)
        })
    }

    /// Per-model-type state. Legacy models bind the shared atlas up front and
    /// draw double-sided; the other kinds need nothing here.
    pub fn with_model_state<R>(&mut self, model_type: ModelType, f: impl FnOnce(&mut Self) -> R) -> R {
        match model_type {
            ModelType::Legacy => {
                let render = RenderState {
                    cull_mode: None,
                    ..self.current.render
                };
                let pass = self.current.pass;
                self.scoped(render, pass, |st| {
                    if !st.in_shadow_pass() {
                        st.bind(TextureBinding::Atlas);
                    }
                    f(st)
                })
            }
            ModelType::Textured | ModelType::Imported => f(self),
        }
    }

    /// Full opaque state for one model outside the regular passes (UI previews).
    pub fn with_individual_opaque<R>(
        &mut self,
        model: &Model,
        team: i32,
        teams: &TeamPalette,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        // The caller's depth state is unknown at this point.
        let depth = RenderState {
            depth_write: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            ..self.current.render
        };
        let pass = self.current.pass;
        self.scoped(depth, pass, |st| {
            st.with_opaque_drawing(|st| {
                st.with_model_state(model.model_type, |st| {
                    st.bind_model_textures(model.model_type, model.texture);
                    st.set_team_color(team, 1.0, teams);
                    f(st)
                })
            })
        })
    }

    pub fn with_individual_alpha<R>(
        &mut self,
        model: &Model,
        team: i32,
        alpha: f32,
        teams: &TeamPalette,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.with_alpha_drawing(|st| {
            st.with_model_state(model.model_type, |st| {
                st.bind_model_textures(model.model_type, model.texture);
                st.set_team_color(team, alpha, teams);
                f(st)
            })
        })
    }

    /// Bind the textures of a bin, dispatched on model type and pass kind.
    pub fn bind_model_textures(&mut self, model_type: ModelType, texture: TextureId) {
        let binding = match (self.in_shadow_pass(), model_type) {
            // Already bound by `with_model_state`.
            (false, ModelType::Legacy) => return,
            (false, ModelType::Textured | ModelType::Imported) => TextureBinding::Pair(texture),
            (true, ModelType::Legacy) => TextureBinding::ShadowAtlas,
            (true, ModelType::Textured | ModelType::Imported) => TextureBinding::Shadow(texture),
        };
        self.bind(binding);
    }

    fn bind(&mut self, binding: TextureBinding) {
        if self.current.textures != Some(binding) {
            self.current.textures = Some(binding);
            self.commands.push(DrawCommand::BindModelTextures(binding));
        }
    }

    /// Release the specular texture bound for a shadow bin.
    pub fn unbind_shadow_textures(&mut self) {
        if matches!(
            self.current.textures,
            Some(TextureBinding::Shadow(_) | TextureBinding::ShadowAtlas)
        ) {
            self.current.textures = None;
            self.commands.push(DrawCommand::UnbindShadowTextures);
        }
    }

    /// Apply a team color with the given alpha. Unknown teams and shadow
    /// passes take the no-op path.
    pub fn set_team_color(&mut self, team: i32, alpha: f32, teams: &TeamPalette) {
        if self.in_shadow_pass() {
            return;
        }
        let Some(rgb) = teams.color(team) else {
            return;
        };
        let color = rgb.truncate().extend(alpha);
        if self.current.team_color == Some((team, color)) {
            return;
        }
        self.current.team_color = Some((team, color));
        self.commands.push(DrawCommand::SetTeamColor { team, color });
    }

    pub fn set_color(&mut self, color: Vec4) {
        if self.current.color != color {
            self.current.color = color;
            self.commands.push(DrawCommand::SetColor(color));
        }
    }

    pub fn set_nano_color(&mut self, color: Vec4) {
        if self.current.nano_color != color {
            self.current.nano_color = color;
            self.commands.push(DrawCommand::SetNanoColor(color));
        }
    }

    pub fn set_alpha_test(&mut self, alpha_test: Option<f32>) {
        if self.current.render.alpha_test != alpha_test {
            self.current.render.alpha_test = alpha_test;
            self.commands.push(DrawCommand::SetAlphaTest(alpha_test));
        }
    }

    pub fn set_polygon_mode(&mut self, mode: wgpu::PolygonMode) {
        if self.current.render.polygon_mode != mode {
            self.current.render.polygon_mode = mode;
            self.commands.push(DrawCommand::SetPolygonMode(mode));
        }
    }

    pub fn set_polygon_offset(&mut self, enabled: bool) {
        if self.current.polygon_offset != enabled {
            self.current.polygon_offset = enabled;
            self.commands.push(DrawCommand::SetPolygonOffset(enabled));
        }
    }

    pub fn set_clip_planes(&mut self, upper: Vec4, lower: Option<Vec4>) {
        self.current.clip_planes = Some((upper, lower));
        self.commands.push(DrawCommand::SetClipPlanes { upper, lower });
    }

    pub fn disable_clip_planes(&mut self) {
        if self.current.clip_planes.take().is_some() {
            self.commands.push(DrawCommand::DisableClipPlanes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelId;

    fn palette() -> TeamPalette {
        TeamPalette::new(vec![Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 1.0)])
    }

    #[test]
    fn team_color_is_idempotent() {
        let mut st = RenderStateMachine::new(ShadingCaps::default(), true);
        st.with_opaque_drawing(|st| {
            st.set_team_color(1, 1.0, &palette());
            let once = st.state().clone();
            let n = st.commands().len();
            st.set_team_color(1, 1.0, &palette());
            assert_eq!(st.state(), &once);
            assert_eq!(st.commands().len(), n);
        });
    }

    #[test]
    fn team_color_noop_for_invalid_team_and_shadow_pass() {
        let mut st = RenderStateMachine::new(ShadingCaps::default(), true);
        st.with_opaque_drawing(|st| {
            st.set_team_color(7, 1.0, &palette());
            st.set_team_color(-1, 1.0, &palette());
            assert_eq!(st.state().team_color, None);
        });
        st.with_shadow_drawing(|st| {
            st.set_team_color(0, 1.0, &palette());
            assert_eq!(st.state().team_color, None);
        });
        assert!(!st
            .commands()
            .iter()
            .any(|c| matches!(c, DrawCommand::SetTeamColor { .. })));
    }

    #[test]
    fn scopes_are_balanced_and_restore_state() {
        let mut st = RenderStateMachine::new(ShadingCaps::default(), true);
        let before = st.state().clone();
        let inner_depth = st.with_alpha_drawing(|st| {
            st.with_model_state(ModelType::Legacy, |st| {
                assert_eq!(st.state().render.cull_mode, None);
                st.depth()
            })
        });
        assert_eq!(inner_depth, 2);
        assert_eq!(st.depth(), 0);
        assert_eq!(st.state(), &before);
        let cmds = st.take_commands();
        let pushes = cmds.iter().filter(|c| matches!(c, DrawCommand::PushState(_))).count();
        let pops = cmds.iter().filter(|c| matches!(c, DrawCommand::PopState)).count();
        assert_eq!(pushes, pops);
    }

    #[test]
    fn alpha_pass_falls_back_when_advanced_cannot_blend() {
        let caps = ShadingCaps { can_draw_alpha: false, ..Default::default() };
        let st = RenderStateMachine::new(caps, true);
        assert_eq!(st.wanted_shading(false), ShadingKind::Advanced);
        assert_eq!(st.wanted_shading(true), ShadingKind::Basic);

        let st = RenderStateMachine::new(ShadingCaps { initialized: false, ..Default::default() }, true);
        assert_eq!(st.wanted_shading(false), ShadingKind::Basic);

        let st = RenderStateMachine::new(ShadingCaps::default(), false);
        assert_eq!(st.wanted_shading(false), ShadingKind::Basic);
    }

    #[test]
    fn advanced_alpha_pass_drops_alpha_test() {
        let mut st = RenderStateMachine::new(ShadingCaps::default(), true);
        st.with_alpha_drawing(|st| assert_eq!(st.state().render.alpha_test, None));
        let mut st = RenderStateMachine::new(ShadingCaps::default(), false);
        st.with_alpha_drawing(|st| assert_eq!(st.state().render.alpha_test, Some(0.1)));
    }

    #[test]
    fn texture_binding_dispatch() {
        let mut st = RenderStateMachine::new(ShadingCaps::default(), true);
        st.with_opaque_drawing(|st| {
            st.with_model_state(ModelType::Legacy, |st| {
                st.bind_model_textures(ModelType::Legacy, TextureId::ATLAS);
                assert_eq!(st.state().textures, Some(TextureBinding::Atlas));
            });
            st.bind_model_textures(ModelType::Imported, TextureId(4));
            assert_eq!(st.state().textures, Some(TextureBinding::Pair(TextureId(4))));
        });
        st.with_shadow_drawing(|st| {
            st.bind_model_textures(ModelType::Textured, TextureId(2));
            assert_eq!(st.state().textures, Some(TextureBinding::Shadow(TextureId(2))));
            st.unbind_shadow_textures();
            assert_eq!(st.state().textures, None);
            st.bind_model_textures(ModelType::Legacy, TextureId::ATLAS);
            assert_eq!(st.state().textures, Some(TextureBinding::ShadowAtlas));
        });
    }

    #[test]
    fn individual_opaque_sets_team_and_textures() {
        let model = Model::new(ModelId(1), ModelType::Textured, TextureId(6), 10.0, 10.0);
        let mut st = RenderStateMachine::new(ShadingCaps::default(), true);
        st.with_individual_opaque(&model, 0, &palette(), |st| {
            assert_eq!(st.state().pass, PassKind::Opaque);
            assert_eq!(st.state().textures, Some(TextureBinding::Pair(TextureId(6))));
            assert_eq!(st.state().team_color.map(|(t, _)| t), Some(0));
            assert_eq!(st.depth(), 2);
        });
        assert_eq!(st.depth(), 0);
    }
}
