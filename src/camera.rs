// src/camera.rs
//! Per-frame camera state consumed by the culling kernel.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::frustum::Frustum;

/// The frustum descriptor: every matrix the culling dispatch reads, plus the
/// camera position and the derived frustum planes.
///
/// Refreshed once per frame by the camera subsystem and treated as immutable
/// for the duration of a dispatch; all tasks share it read-only.
#[derive(Clone, Copy, Debug)]
pub struct CameraFrame {
    pub view: Mat4,
    /// View matrix with the translation column stripped (rotation only).
    pub view_nt: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view: Mat4,
    pub inv_view_nt: Mat4,
    pub inv_proj: Mat4,
    pub inv_view_proj: Mat4,
    /// Camera position in world space.
    pub position: Vec3,
    pub frustum: Frustum,
}

impl CameraFrame {
    /// Derive the full frame from a view matrix, a projection matrix and the
    /// camera's world position.
    pub fn new(view: Mat4, proj: Mat4, position: Vec3) -> Self {
        let mut view_nt = view;
        view_nt.w_axis = Vec4::W;
        let view_proj = proj * view;

        Self {
            view,
            view_nt,
            proj,
            view_proj,
            inv_view: view.inverse(),
            inv_view_nt: view_nt.inverse(),
            inv_proj: proj.inverse(),
            inv_view_proj: view_proj.inverse(),
            position,
            frustum: Frustum::from_view_proj(&view_proj),
        }
    }

    /// Frame for a camera at `eye` looking along `look_dir` (right-handed,
    /// `up` usually `Vec3::Y`).
    pub fn from_look_at(eye: Vec3, look_dir: Vec3, up: Vec3, proj: Mat4) -> Self {
        let view = Mat4::look_at_rh(eye, eye + look_dir, up);
        Self::new(view, proj, eye)
    }
}

/// GPU mirror of [`CameraFrame`] (matches the `Globals` uniform block in the
/// culling shader, field for field).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct FrustumUniform {
    pub vp: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub view_nt: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub inv_vp: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub inv_view_nt: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 4],
    pub frustum: [[f32; 4]; 6],
}

impl FrustumUniform {
    pub fn from_frame(frame: &CameraFrame) -> Self {
        let planes = frame.frustum.planes();
        Self {
            vp: frame.view_proj.to_cols_array_2d(),
            view: frame.view.to_cols_array_2d(),
            view_nt: frame.view_nt.to_cols_array_2d(),
            proj: frame.proj.to_cols_array_2d(),
            inv_vp: frame.inv_view_proj.to_cols_array_2d(),
            inv_view: frame.inv_view.to_cols_array_2d(),
            inv_view_nt: frame.inv_view_nt.to_cols_array_2d(),
            inv_proj: frame.inv_proj.to_cols_array_2d(),
            camera_pos: frame.position.extend(0.0).to_array(),
            frustum: [
                planes[0].to_array(),
                planes[1].to_array(),
                planes[2].to_array(),
                planes[3].to_array(),
                planes[4].to_array(),
                planes[5].to_array(),
            ],
        }
    }
}
