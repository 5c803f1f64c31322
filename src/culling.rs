// src/culling.rs
//! Frustum culling and stream compaction for point batches.
//!
//! This is the hot path of the crate: a data-parallel classify-then-compact
//! pass. Every candidate is tested against the six frustum planes; each
//! survivor claims a unique destination slot from a shared atomic counter and
//! is written there. Rejected candidates touch neither the counter nor the
//! destination, so the compacted output is dense with no holes and no
//! sentinels.
//!
//! Slot order is a race artifact with no relation to source order. Consumers
//! must treat the compacted range as an unordered set.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use bytemuck::Zeroable;
use log::debug;
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::{CullError, Result};
use crate::frustum::Frustum;
use crate::point::CandidatePoint;

// ---------------------------------------------------------------------------
// Configuration & stats
// ---------------------------------------------------------------------------

/// Default scheduling batch width, matching the dispatch granularity the
/// GPU path uses per workgroup.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Configuration knobs for the CPU pass.
#[derive(Clone, Copy, Debug)]
pub struct CullConfig {
    /// Number of candidates handed to one worker task at a time. Pure
    /// scheduling granularity: every value yields the same survivor set.
    /// Values below 1 are treated as 1.
    pub chunk_size: usize,
}

impl Default for CullConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Profiling counters for the most recent pass.
#[derive(Clone, Debug, Default)]
pub struct CullStats {
    /// Candidates classified.
    pub tested: usize,
    /// Candidates that passed all six plane tests.
    pub visible: usize,
    /// Wall time of the parallel pass.
    pub cull_time: Duration,
}

// ---------------------------------------------------------------------------
// Culler
// ---------------------------------------------------------------------------

/// The culling stage. Create once, run one pass per frame.
pub struct PointCuller {
    config: CullConfig,
    stats: Mutex<CullStats>,
}

/// Raw destination cursor shared across worker tasks. The atomic counter
/// hands out each slot index exactly once, so concurrent writes through this
/// pointer are disjoint.
struct DestPtr(*mut CandidatePoint);

unsafe impl Send for DestPtr {}
unsafe impl Sync for DestPtr {}

impl PointCuller {
    pub fn new(config: CullConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(CullStats::default()),
        }
    }

    /// Classify `source` against `frustum` and compact the survivors into the
    /// memory behind `dest`, claiming slots from `counter` with a
    /// sequentially consistent fetch-and-add.
    ///
    /// Returns the counter value observed after every task has finished. With
    /// a zeroed counter that is exactly the survivor count.
    ///
    /// # Safety
    ///
    /// `dest` must be valid for writes of at least `counter + source.len()`
    /// points, and nothing else may touch `counter` while the pass runs. No
    /// bounds are checked; an undersized destination is an out-of-bounds
    /// write.
    pub unsafe fn cull_into_unchecked(
        &self,
        frustum: &Frustum,
        source: &[CandidatePoint],
        dest: *mut CandidatePoint,
        counter: &AtomicU32,
    ) -> u32 {
        let start = Instant::now();
        let before = counter.load(Ordering::SeqCst);
        let chunk_size = self.config.chunk_size.max(1);
        let dest = DestPtr(dest);

        source.par_chunks(chunk_size).for_each(|batch| {
            for point in batch {
                if !frustum.contains_sphere(point.position(), point.radius) {
                    continue;
                }
                let slot = counter.fetch_add(1, Ordering::SeqCst);
                // The fetch-and-add made this slot ours alone.
                unsafe { dest.0.add(slot as usize).write(*point) };
            }
        });

        let after = counter.load(Ordering::SeqCst);
        let elapsed = start.elapsed();
        {
            let mut stats = self.stats.lock();
            stats.tested = source.len();
            stats.visible = (after - before) as usize;
            stats.cull_time = elapsed;
        }
        debug!(
            "culled {} candidates, {} visible in {:?}",
            source.len(),
            after - before,
            elapsed
        );
        after
    }

    /// Safe variant of [`cull_into_unchecked`](Self::cull_into_unchecked):
    /// verifies up front that the destination can absorb the worst case
    /// (every candidate survives) and fails with
    /// [`CullError::DestinationTooSmall`] otherwise. The check runs once per
    /// pass, never per candidate.
    pub fn cull_into(
        &self,
        frustum: &Frustum,
        source: &[CandidatePoint],
        dest: &mut [CandidatePoint],
        counter: &AtomicU32,
    ) -> Result<u32> {
        let required = counter.load(Ordering::SeqCst) as usize + source.len();
        if dest.len() < required {
            return Err(CullError::DestinationTooSmall {
                required,
                capacity: dest.len(),
            });
        }
        // SAFETY: the destination was checked against the worst case above,
        // and the counter advances at most once per source candidate.
        Ok(unsafe { self.cull_into_unchecked(frustum, source, dest.as_mut_ptr(), counter) })
    }

    /// Allocate a destination, run one pass with a fresh counter and return
    /// just the survivors.
    pub fn cull(&self, frustum: &Frustum, source: &[CandidatePoint]) -> Vec<CandidatePoint> {
        let counter = AtomicU32::new(0);
        let mut dest = vec![CandidatePoint::zeroed(); source.len()];
        // SAFETY: dest holds source.len() points and the counter starts at 0.
        let visible =
            unsafe { self.cull_into_unchecked(frustum, source, dest.as_mut_ptr(), &counter) };
        dest.truncate(visible as usize);
        dest
    }

    /// Counters from the most recent pass.
    pub fn stats(&self) -> CullStats {
        self.stats.lock().clone()
    }
}

impl Default for PointCuller {
    fn default() -> Self {
        Self::new(CullConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::FRAC_PI_2;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Camera at the origin looking down +Z, near 1, far 10, sides at 45
    /// degrees.
    fn origin_frustum() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::Z, Vec3::Y);
        let proj = Mat4::perspective_rh(FRAC_PI_2, 1.0, 1.0, 10.0);
        Frustum::from_view_proj(&(proj * view))
    }

    fn sorted(mut points: Vec<CandidatePoint>) -> Vec<CandidatePoint> {
        points.sort_by(|a, b| {
            let a: [f32; 4] = bytemuck::cast(*a);
            let b: [f32; 4] = bytemuck::cast(*b);
            a.partial_cmp(&b).unwrap()
        });
        points
    }

    fn random_points(count: usize, seed: u64) -> Vec<CandidatePoint> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                CandidatePoint::new(
                    Vec3::new(
                        rng.gen_range(-20.0..20.0),
                        rng.gen_range(-20.0..20.0),
                        rng.gen_range(-20.0..20.0),
                    ),
                    rng.gen_range(0.0..2.0),
                )
            })
            .collect()
    }

    fn reference_cull(frustum: &Frustum, source: &[CandidatePoint]) -> Vec<CandidatePoint> {
        source
            .iter()
            .copied()
            .filter(|p| frustum.contains_sphere(p.position(), p.radius))
            .collect()
    }

    #[test]
    fn single_survivor() {
        init_logs();
        let frustum = origin_frustum();
        let source = [
            CandidatePoint::new(Vec3::new(0.0, 0.0, 5.0), 0.0),
            CandidatePoint::new(Vec3::new(0.0, 0.0, -5.0), 0.0),
            CandidatePoint::new(Vec3::new(100.0, 100.0, 100.0), 0.0),
        ];

        let culler = PointCuller::default();
        let mut dest = [CandidatePoint::zeroed(); 3];
        let counter = AtomicU32::new(0);
        let count = culler
            .cull_into(&frustum, &source, &mut dest, &counter)
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(dest[0], CandidatePoint::new(Vec3::new(0.0, 0.0, 5.0), 0.0));
    }

    #[test]
    fn empty_source_leaves_counter_at_zero() {
        let culler = PointCuller::default();
        let counter = AtomicU32::new(0);
        let count = culler
            .cull_into(&origin_frustum(), &[], &mut [], &counter)
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(culler.cull(&origin_frustum(), &[]).is_empty());
    }

    #[test]
    fn trivially_visible_points_all_survive() {
        let frustum = origin_frustum();
        let source =
            vec![CandidatePoint::new(Vec3::new(3.0, -7.0, 1.0), 1.0e6); 1000];

        let culler = PointCuller::default();
        let survivors = culler.cull(&frustum, &source);

        assert_eq!(survivors.len(), 1000);
        // The output is a permutation of the source multiset.
        assert_eq!(sorted(survivors), sorted(source));
    }

    #[test]
    fn survivor_set_matches_sequential_reference() {
        init_logs();
        let frustum = origin_frustum();
        let source = random_points(5000, 7);
        let expected = sorted(reference_cull(&frustum, &source));

        let culler = PointCuller::default();
        let survivors = culler.cull(&frustum, &source);

        assert_eq!(culler.stats().visible, expected.len());
        assert_eq!(sorted(survivors), expected);
    }

    #[test]
    fn chunk_size_does_not_change_the_survivor_set() {
        let frustum = origin_frustum();
        let source = random_points(4096, 21);
        let expected = sorted(reference_cull(&frustum, &source));

        for chunk_size in [0, 1, 3, 64, 1000, 1 << 20] {
            let culler = PointCuller::new(CullConfig { chunk_size });
            let survivors = sorted(culler.cull(&frustum, &source));
            assert_eq!(survivors, expected, "chunk_size {}", chunk_size);
        }
    }

    #[test]
    fn stress_counter_hands_out_every_slot_once() {
        init_logs();
        let frustum = origin_frustum();
        let source = random_points(100_000, 1234);
        let expected = sorted(reference_cull(&frustum, &source));

        let culler = PointCuller::new(CullConfig { chunk_size: 16 });
        let mut dest = vec![CandidatePoint::zeroed(); source.len()];
        let counter = AtomicU32::new(0);
        let count = culler
            .cull_into(&frustum, &source, &mut dest, &counter)
            .unwrap();

        // Dense output: no dropped slots, no duplicates, exact multiset.
        assert_eq!(count as usize, expected.len());
        dest.truncate(count as usize);
        assert_eq!(sorted(dest), expected);
    }

    #[test]
    fn repeated_passes_agree_on_the_survivor_set() {
        let frustum = origin_frustum();
        let source = random_points(10_000, 99);

        let culler = PointCuller::default();
        let first = sorted(culler.cull(&frustum, &source));
        let second = sorted(culler.cull(&frustum, &source));
        assert_eq!(first, second);
    }

    #[test]
    fn undersized_destination_is_rejected() {
        let frustum = origin_frustum();
        let source = vec![CandidatePoint::new(Vec3::new(0.0, 0.0, 5.0), 0.0); 10];

        let culler = PointCuller::default();
        let mut dest = vec![CandidatePoint::zeroed(); 9];
        let counter = AtomicU32::new(0);
        let err = culler
            .cull_into(&frustum, &source, &mut dest, &counter)
            .unwrap_err();

        assert_eq!(
            err,
            CullError::DestinationTooSmall {
                required: 10,
                capacity: 9
            }
        );
        assert!(err.is_destination_too_small());
        // Nothing ran: the counter and destination are untouched.
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(dest.iter().all(|p| *p == CandidatePoint::zeroed()));
    }

    #[test]
    fn counter_offset_shifts_the_written_range() {
        let frustum = origin_frustum();
        let source = vec![CandidatePoint::new(Vec3::new(0.0, 0.0, 5.0), 0.0); 4];

        let culler = PointCuller::default();
        let mut dest = vec![CandidatePoint::zeroed(); 9];
        let counter = AtomicU32::new(5);
        let count = culler
            .cull_into(&frustum, &source, &mut dest, &counter)
            .unwrap();

        assert_eq!(count, 9);
        assert!(dest[..5].iter().all(|p| *p == CandidatePoint::zeroed()));
        assert!(dest[5..].iter().all(|p| *p == source[0]));

        // One more candidate than the remaining capacity is rejected.
        let err = culler
            .cull_into(&frustum, &source, &mut dest, &counter)
            .unwrap_err();
        assert_eq!(
            err,
            CullError::DestinationTooSmall {
                required: 13,
                capacity: 9
            }
        );
    }
}
