use glam::DVec2;

/// SPMD communicator seam. Every rank owns a disjoint set of cells plus halo
/// ("buffer") layers owned by other ranks; the methods here are the only
/// suspension points of a time step and must be executed by all ranks in the
/// same order.
///
/// Only the single-rank implementation ships. A distributed implementation
/// replaces this trait object without touching any call site.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn n_ranks(&self) -> usize;

    fn main_rank(&self) -> usize {
        0
    }

    fn is_main(&self) -> bool {
        self.rank() == self.main_rank()
    }

    /// Global maximum reduction.
    fn max(&self, x: f64) -> f64;

    /// Global minimum reduction.
    fn min(&self, x: f64) -> f64;

    /// Halo exchange for a per-cell scalar array.
    fn sync_scalar(&self, values: &mut [f64]);

    /// Halo exchange for a per-cell vector array.
    fn sync_vector(&self, values: &mut [DVec2]);

    /// Concatenate per-rank samples on `root`; other ranks receive empty.
    fn gatherv_points(&self, root: usize, local: Vec<DVec2>) -> Vec<DVec2>;

    fn gatherv_scalars(&self, root: usize, local: Vec<f64>) -> Vec<f64>;

    /// Broadcast a vector value from `root`.
    fn broadcast(&self, root: usize, v: DVec2) -> DVec2;
}

/// Single-rank communicator: reductions are the identity, halo exchanges are
/// no-ops because there is no halo to fill.
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn n_ranks(&self) -> usize {
        1
    }

    fn max(&self, x: f64) -> f64 {
        x
    }

    fn min(&self, x: f64) -> f64 {
        x
    }

    fn sync_scalar(&self, _values: &mut [f64]) {}

    fn sync_vector(&self, _values: &mut [DVec2]) {}

    fn gatherv_points(&self, _root: usize, local: Vec<DVec2>) -> Vec<DVec2> {
        local
    }

    fn gatherv_scalars(&self, _root: usize, local: Vec<f64>) -> Vec<f64> {
        local
    }

    fn broadcast(&self, _root: usize, v: DVec2) -> DVec2 {
        v
    }
}
