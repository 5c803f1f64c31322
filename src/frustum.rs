// src/frustum.rs
//! Frustum planes and the sphere visibility predicate.

use glam::{Mat4, Vec3, Vec4};

/// Number of half-space planes bounding a camera frustum.
pub const PLANE_COUNT: usize = 6;

/// Six half-space planes `(a, b, c, d)` with `a*x + b*y + c*z + d >= 0` on
/// the visible side, ordered left, right, bottom, top, near, far.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    planes: [Vec4; PLANE_COUNT],
}

impl Frustum {
    /// Extract the planes from a view-projection matrix (Gribb-Hartmann).
    ///
    /// Assumes the 0..1 clip-depth convention of `glam`'s `perspective_*`
    /// constructors and wgpu, so the near plane comes from clip row 2 alone.
    /// Planes are normalized by the length of their `xyz` normal so the `d`
    /// term is a world-space distance and radius offsets stay meaningful.
    pub fn from_view_proj(vp: &Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        Self {
            planes: [
                normalize_plane(r3 + r0), // left
                normalize_plane(r3 - r0), // right
                normalize_plane(r3 + r1), // bottom
                normalize_plane(r3 - r1), // top
                normalize_plane(r2),      // near
                normalize_plane(r3 - r2), // far
            ],
        }
    }

    /// Build a frustum from explicit planes. No normalization is applied.
    pub fn from_planes(planes: [Vec4; PLANE_COUNT]) -> Self {
        Self { planes }
    }

    #[inline]
    pub fn planes(&self) -> &[Vec4; PLANE_COUNT] {
        &self.planes
    }

    /// Conservative sphere test: the sphere survives unless it lies wholly
    /// outside a single plane, and the first failing plane rejects it with no
    /// further tests. A sphere touching a plane exactly (`dot == -radius`)
    /// counts as visible; `radius == 0` degenerates to exact point
    /// containment.
    #[inline]
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        let p = center.extend(1.0);
        for plane in &self.planes {
            if plane.dot(p) < -radius {
                return false;
            }
        }
        true
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.truncate().length();
    if len > 0.0 {
        plane / len
    } else {
        plane
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    /// Camera at the origin looking down +Z, near 1, far 10, 90 degree cone
    /// (side planes at 45 degrees).
    fn origin_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::Z, Vec3::Y);
        let proj = Mat4::perspective_rh(FRAC_PI_2, 1.0, 1.0, 10.0);
        Frustum::from_view_proj(&(proj * view))
    }

    #[test]
    fn points_inside_and_outside() {
        let frustum = origin_frustum();

        assert!(frustum.contains_sphere(Vec3::new(0.0, 0.0, 5.0), 0.0));
        // Behind the camera.
        assert!(!frustum.contains_sphere(Vec3::new(0.0, 0.0, -5.0), 0.0));
        // Past the far plane.
        assert!(!frustum.contains_sphere(Vec3::new(100.0, 100.0, 100.0), 0.0));
        // Inside the 45 degree side planes.
        assert!(frustum.contains_sphere(Vec3::new(4.0, 0.0, 5.0), 0.0));
        assert!(!frustum.contains_sphere(Vec3::new(6.0, 0.0, 5.0), 0.0));
    }

    #[test]
    fn near_and_far_planes_use_world_distances() {
        let frustum = origin_frustum();

        assert!(frustum.contains_sphere(Vec3::new(0.0, 0.0, 1.01), 0.0));
        assert!(!frustum.contains_sphere(Vec3::new(0.0, 0.0, 0.9), 0.0));
        assert!(frustum.contains_sphere(Vec3::new(0.0, 0.0, 9.9), 0.0));
        assert!(!frustum.contains_sphere(Vec3::new(0.0, 0.0, 10.5), 0.0));
    }

    #[test]
    fn radius_inflates_the_test() {
        let frustum = origin_frustum();

        // Center is behind the near plane but the sphere reaches inside.
        assert!(!frustum.contains_sphere(Vec3::new(0.0, 0.0, 0.5), 0.0));
        assert!(frustum.contains_sphere(Vec3::new(0.0, 0.0, 0.5), 1.0));
    }

    #[test]
    fn sphere_touching_a_plane_is_visible() {
        // Half-space z >= 0 on every slot keeps the test exact.
        let plane = Vec4::new(0.0, 0.0, 1.0, 0.0);
        let frustum = Frustum::from_planes([plane; PLANE_COUNT]);

        // dot == -radius exactly: visible (the test uses >=, not >).
        assert!(frustum.contains_sphere(Vec3::new(0.0, 0.0, -2.0), 2.0));
        assert!(!frustum.contains_sphere(Vec3::new(0.0, 0.0, -2.0), 1.5));
        // Zero radius on the plane itself.
        assert!(frustum.contains_sphere(Vec3::ZERO, 0.0));
    }
}
