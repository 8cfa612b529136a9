//! Build-in-progress visualisation.
//!
//! A unit under construction is revealed in three overlapping stages: a
//! wireframe, a flat nano-colored shell and finally the shaded model. Two
//! model-space clip planes sweep upward with build progress; the upper one
//! reveals a stage and the lower one erases the previous stage behind it.

use glam::{Vec3, Vec4};

use crate::state::RenderStateMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Wire,
    Flat,
    Fill,
}

impl BuildStage {
    pub const ALL: [BuildStage; 3] = [BuildStage::Wire, BuildStage::Flat, BuildStage::Fill];

    /// Progress a stage must exceed before it is drawn.
    pub const fn threshold(self) -> f32 {
        match self {
            BuildStage::Wire => 0.0,
            BuildStage::Flat => 0.333,
            BuildStage::Fill => 0.666,
        }
    }

    pub fn is_active(self, progress: f32) -> bool {
        progress > self.threshold()
    }

    /// Clip planes `(upper, lower)` for this stage, as `(a, b, c, d)` with
    /// the visible side satisfying `a*x + b*y + c*z + d >= 0`.
    pub fn planes(self, height: f32, progress: f32) -> (Vec4, Option<Vec4>) {
        let p = progress;
        match self {
            BuildStage::Wire => (
                Vec4::new(0.0, -1.0, 0.0, height * (p * 3.0)),
                Some(Vec4::new(0.0, 1.0, 0.0, -height * (p * 10.0 - 9.0))),
            ),
            BuildStage::Flat => (
                Vec4::new(0.0, -1.0, 0.0, height * (p * 3.0 - 1.0)),
                Some(Vec4::new(0.0, 1.0, 0.0, -height * (p * 3.0 - 2.0))),
            ),
            BuildStage::Fill => (Vec4::new(0.0, -1.0, 0.0, height * (p * 3.0 - 2.0)), None),
        }
    }
}

/// Pulsing brightness of the wireframe stage; the flat stage pulses inversely.
pub fn wire_color_mult(sim_frame: u64) -> f32 {
    let phase = ((sim_frame * 4) & 255) as f32;
    (128.0 - phase).abs() / 255.0 + 0.5
}

pub fn flat_color_mult(sim_frame: u64) -> f32 {
    1.5 - wire_color_mult(sim_frame)
}

/// Inputs for drawing one unit under construction.
#[derive(Debug, Clone, Copy)]
pub struct BuildDraw {
    pub progress: f32,
    pub height: f32,
    /// Nano color (unit type's or team's), RGB.
    pub color: Vec3,
    pub sim_frame: u64,
    /// Broken-driver variant: no clip planes on wire and fill stages.
    pub clip_plane_quirk: bool,
}

/// Emit all active stages; `draw_model` emits the model draw itself.
pub fn draw_being_built(
    st: &mut RenderStateMachine,
    b: &BuildDraw,
    draw_model: &mut dyn FnMut(&mut RenderStateMachine),
) {
    let shadow = st.in_shadow_pass();
    for stage in BuildStage::ALL {
        if !shadow {
            let tint = match stage {
                BuildStage::Wire => (b.color * wire_color_mult(b.sim_frame)).extend(1.0),
                BuildStage::Flat => (b.color * flat_color_mult(b.sim_frame)).extend(1.0),
                BuildStage::Fill => Vec4::new(1.0, 1.0, 1.0, 0.0),
            };
            st.set_nano_color(tint);
        }
        if !stage.is_active(b.progress) {
            continue;
        }
        let (upper, lower) = stage.planes(b.height, b.progress);
        match (stage, b.clip_plane_quirk) {
            (BuildStage::Wire, false) => {
                st.set_clip_planes(upper, lower);
                wireframe(st, draw_model);
            }
            (BuildStage::Wire, true) => {
                st.disable_clip_planes();
                wireframe(st, draw_model);
            }
            (BuildStage::Flat, _) => {
                st.set_clip_planes(upper, lower);
                draw_model(st);
            }
            (BuildStage::Fill, _) if shadow => {
                st.disable_clip_planes();
                draw_model(st);
            }
            (BuildStage::Fill, quirk) => {
                if quirk {
                    st.disable_clip_planes();
                } else {
                    st.set_clip_planes(upper, None);
                }
                st.set_polygon_offset(true);
                draw_model(st);
                st.set_polygon_offset(false);
            }
        }
    }
    st.disable_clip_planes();
    if !shadow {
        st.set_nano_color(Vec4::new(1.0, 1.0, 1.0, 0.0));
    }
}

fn wireframe(st: &mut RenderStateMachine, draw_model: &mut dyn FnMut(&mut RenderStateMachine)) {
    let prev = st.state().render.polygon_mode;
    st.set_polygon_mode(wgpu::PolygonMode::Line);
    draw_model(st);
    st.set_polygon_mode(prev);
}
