// src/lib.rs
//! Frustum culling and stream compaction for point batches.
//!
//! One parallel pass: classify candidate points (position + bounding radius)
//! against the six camera frustum planes, then pack the survivors into a
//! dense output with a shared atomic counter handing out destination slots.
//! The same kernel runs on the CPU ([`PointCuller`], rayon) and on the GPU
//! ([`GpuCuller`], wgpu compute).
//!
//! Upstream collaborators own the candidate list and the camera state; the
//! downstream consumer turns the survivor count into an indirect draw
//! argument. Both stay outside this crate.

pub mod camera;
pub mod culling;
pub mod error;
pub mod frustum;
pub mod gpu_culling;
pub mod point;

pub use camera::{CameraFrame, FrustumUniform};
pub use culling::{CullConfig, CullStats, PointCuller, DEFAULT_CHUNK_SIZE};
pub use error::{CullError, Result};
pub use frustum::Frustum;
pub use gpu_culling::{GpuCuller, WORKGROUP_SIZE};
pub use point::CandidatePoint;
