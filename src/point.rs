// src/point.rs
//! Candidate point data shared by the CPU and GPU culling paths.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// One culling candidate: a world-space position plus a bounding radius.
///
/// Packed as a single `vec4` (`xyz` = position, `w` = radius) so source and
/// destination buffers share the same 16-byte encoding on both the CPU and
/// GPU paths. Compacted survivors reuse this type unchanged.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CandidatePoint {
    pub position: [f32; 3],
    pub radius: f32,
}

impl CandidatePoint {
    pub fn new(position: Vec3, radius: f32) -> Self {
        Self {
            position: position.to_array(),
            radius,
        }
    }

    /// World-space position as a vector.
    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// Homogeneous position `(x, y, z, 1)` as consumed by the plane test.
    #[inline]
    pub fn homogeneous(&self) -> Vec4 {
        self.position().extend(1.0)
    }
}
