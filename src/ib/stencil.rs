use glam::DVec2;
use nalgebra::{Matrix4, Vector4};

use crate::discretization::mesh::{Mesh, ZoneId};
use crate::error::Error;
use crate::geometry::Shape;

/// Ghost-cell stencil for one interface-band cell.
///
/// Expresses the ghost value at the cell centroid C through the value
/// interpolated at the image point I, the reflection of C through its
/// closest boundary point B. Donor cells are fluid-zone cells whose
/// centroids enclose I; their weights reproduce constants exactly.
pub struct GhostCellStencil {
    pub cell: usize,
    pub boundary_point: DVec2,
    pub image_point: DVec2,
    /// Unit outward wall normal at the boundary point.
    pub wall_normal: DVec2,
    pub donors: Vec<usize>,
    pub weights: Vec<f64>,
    /// Distance from the cell centroid to the image point.
    length: f64,
}

impl GhostCellStencil {
    /// Stencil through the closest point of `shape` to the cell centroid.
    pub fn new(
        cell: usize,
        shape: &Shape,
        mesh: &Mesh,
        fluid: ZoneId,
        rank: usize,
    ) -> Result<Self, Error> {
        let xc = mesh.cells[cell].centroid;
        let bp = shape.nearest_intersect(xc);
        let normal = shape.nearest_edge_normal(bp);
        Self::from_boundary_point(cell, bp, normal, mesh, fluid, rank)
    }

    /// Stencil through an explicit boundary point, used by the contact-line
    /// probes where B comes from a ray-shape intersection.
    pub fn from_boundary_point(
        cell: usize,
        boundary_point: DVec2,
        wall_normal: DVec2,
        mesh: &Mesh,
        fluid: ZoneId,
        rank: usize,
    ) -> Result<Self, Error> {
        let xc = mesh.cells[cell].centroid;
        let image_point = xc + 2.0 * (boundary_point - xc);
        let length = (image_point - xc).length().max(1e-14);

        let (donors, weights) = build_interpolant(cell, image_point, mesh, fluid, rank)?;

        Ok(Self {
            cell,
            boundary_point,
            image_point,
            wall_normal,
            donors,
            weights,
            length,
        })
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Row coefficients imposing a Dirichlet value at B:
    /// `phi_C + sum_k w_k phi_Dk = 2 phi_B`. Columns are `(cell, donors...)`;
    /// the caller adds the source `-2 phi_B`.
    pub fn dirichlet_coeffs(&self) -> (Vec<usize>, Vec<f64>) {
        let mut cols = Vec::with_capacity(1 + self.donors.len());
        let mut coeffs = Vec::with_capacity(1 + self.donors.len());
        cols.push(self.cell);
        coeffs.push(1.0);
        cols.extend_from_slice(&self.donors);
        coeffs.extend_from_slice(&self.weights);
        (cols, coeffs)
    }

    /// Row coefficients imposing a wall-normal gradient g at B:
    /// `phi_C - sum_k w_k phi_Dk = -|I - C| g`. The caller adds the source
    /// `+|I - C| g`.
    pub fn neumann_coeffs(&self) -> (Vec<usize>, Vec<f64>) {
        let mut cols = Vec::with_capacity(1 + self.donors.len());
        let mut coeffs = Vec::with_capacity(1 + self.donors.len());
        cols.push(self.cell);
        coeffs.push(1.0);
        cols.extend_from_slice(&self.donors);
        coeffs.extend(self.weights.iter().map(|w| -w));
        (cols, coeffs)
    }

    /// Interpolated field value at the image point.
    pub fn ip_value<T>(&self, cells: &[T]) -> T
    where
        T: Copy + Default + std::ops::Mul<f64, Output = T> + std::ops::Add<Output = T>,
    {
        let mut acc = T::default();
        for (&d, &w) in self.donors.iter().zip(&self.weights) {
            acc = acc + cells[d] * w;
        }
        acc
    }

    /// Field value at the boundary point, the midpoint of the ghost value
    /// at C and the interpolated value at I.
    pub fn bp_value<T>(&self, cells: &[T]) -> T
    where
        T: Copy
            + Default
            + std::ops::Mul<f64, Output = T>
            + std::ops::Add<Output = T>,
    {
        (cells[self.cell] + self.ip_value(cells)) * 0.5
    }

    /// Wall-normal derivative of a field at the boundary point,
    /// `(phi_I - phi_C) / |I - C|`.
    pub fn bp_grad<T>(&self, cells: &[T]) -> T
    where
        T: Copy
            + Default
            + std::ops::Mul<f64, Output = T>
            + std::ops::Add<Output = T>
            + std::ops::Sub<Output = T>,
    {
        (self.ip_value(cells) - cells[self.cell]) * (1.0 / self.length)
    }
}

/// Find donor cells around `image_point` and their interpolation weights.
///
/// The search walks from the stencil cell towards the image point, collects
/// the two-ring fluid neighbourhood of the host cell and picks the nearest
/// fluid centroid in each quadrant around I, giving the smallest enclosing
/// quadrilateral for bilinear interpolation. Near the outer domain, where a
/// quadrant may be empty, the stencil degrades to inverse-distance weights
/// over the available fluid cells.
fn build_interpolant(
    cell: usize,
    image_point: DVec2,
    mesh: &Mesh,
    fluid: ZoneId,
    rank: usize,
) -> Result<(Vec<usize>, Vec<f64>), Error> {
    let host = walk_towards(cell, image_point, mesh);

    // Two-ring neighbourhood of the host, fluid cells only
    let mut candidates: Vec<usize> = Vec::with_capacity(24);
    let mut push = |id: usize, candidates: &mut Vec<usize>| {
        if mesh.zones.contains(fluid, id) && !candidates.contains(&id) {
            candidates.push(id);
        }
    };
    push(host, &mut candidates);
    let first_ring: Vec<usize> = mesh.cells[host]
        .interior_links
        .iter()
        .map(|l| l.cell)
        .chain(mesh.cells[host].diagonal_links.iter().copied())
        .collect();
    for &n in &first_ring {
        push(n, &mut candidates);
        for l in &mesh.cells[n].interior_links {
            push(l.cell, &mut candidates);
        }
        for &d in &mesh.cells[n].diagonal_links {
            push(d, &mut candidates);
        }
    }

    // Nearest fluid centroid in each quadrant around the image point
    let mut quadrant: [Option<(usize, f64)>; 4] = [None; 4];
    for &id in &candidates {
        let r = mesh.cells[id].centroid - image_point;
        let q = match (r.x >= 0.0, r.y >= 0.0) {
            (true, true) => 0,
            (false, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        };
        let d = r.length_squared();
        if quadrant[q].map_or(true, |(_, best)| d < best) {
            quadrant[q] = Some((id, d));
        }
    }

    let donors: Vec<usize> = quadrant.iter().filter_map(|q| q.map(|(id, _)| id)).collect();
    if donors.len() == 4 {
        if let Some(weights) = bilinear_weights(&donors, image_point, mesh) {
            return Ok((donors, weights));
        }
    }

    inverse_distance_weights(cell, image_point, candidates, mesh, rank)
}

/// Greedy walk from `start` to the cell whose centroid is nearest the
/// target. Starts from the face-neighbour nearest to the target, as the
/// image point always lies on the far side of the boundary from the cell.
fn walk_towards(start: usize, target: DVec2, mesh: &Mesh) -> usize {
    let mut current = mesh.cells[start]
        .interior_links
        .iter()
        .map(|l| l.cell)
        .min_by(|&a, &b| {
            let da = (mesh.cells[a].centroid - target).length_squared();
            let db = (mesh.cells[b].centroid - target).length_squared();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(start);

    loop {
        let d_current = (mesh.cells[current].centroid - target).length_squared();
        let next = mesh.cells[current]
            .interior_links
            .iter()
            .map(|l| l.cell)
            .chain(mesh.cells[current].diagonal_links.iter().copied())
            .min_by(|&a, &b| {
                let da = (mesh.cells[a].centroid - target).length_squared();
                let db = (mesh.cells[b].centroid - target).length_squared();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            });
        match next {
            Some(n) if (mesh.cells[n].centroid - target).length_squared() < d_current => {
                current = n;
            }
            _ => return current,
        }
    }
}

/// Bilinear weights from the 4x4 Vandermonde system in the basis
/// `(1, x, y, xy)`. Returns `None` when the donor centroids are degenerate
/// (e.g. collinear), in which case the caller falls back.
fn bilinear_weights(donors: &[usize], image_point: DVec2, mesh: &Mesh) -> Option<Vec<f64>> {
    let a = Matrix4::from_fn(|r, c| {
        let p = mesh.cells[donors[r]].centroid;
        match c {
            0 => 1.0,
            1 => p.x,
            2 => p.y,
            _ => p.x * p.y,
        }
    });
    let b = Vector4::new(
        1.0,
        image_point.x,
        image_point.y,
        image_point.x * image_point.y,
    );

    // phi(I) = b^T A^{-1} phi  =>  w = A^{-T} b
    let w = a.transpose().lu().solve(&b)?;
    if !w.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(w.iter().copied().collect())
}

fn inverse_distance_weights(
    cell: usize,
    image_point: DVec2,
    candidates: Vec<usize>,
    mesh: &Mesh,
    rank: usize,
) -> Result<(Vec<usize>, Vec<f64>), Error> {
    if candidates.len() < 2 {
        return Err(Error::StencilUnderdetermined {
            cell,
            rank,
            donors: candidates.len(),
        });
    }

    let mut weights: Vec<f64> = candidates
        .iter()
        .map(|&id| {
            let d = (mesh.cells[id].centroid - image_point).length().max(1e-14);
            1.0 / (d * d)
        })
        .collect();
    let total: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    Ok((candidates, weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::rectilinear_mesh;

    fn fluid_everywhere(mesh: &mut Mesh) -> ZoneId {
        let fluid = mesh.zones.create_zone("fluid");
        mesh.zones.add_all(fluid, 0..mesh.n_cells());
        fluid
    }

    #[test]
    fn weights_sum_to_one_and_reproduce_linear_fields() {
        let mut mesh = rectilinear_mesh(16, 16, 1.0, 1.0);
        let fluid = fluid_everywhere(&mut mesh);
        let shape = Shape::circle(DVec2::new(0.5, 0.5), 0.2).unwrap();

        // A cell just inside the circle on the +x side
        let cell = mesh.cell_at(DVec2::new(0.67, 0.5)).unwrap();
        let st = GhostCellStencil::new(cell, &shape, &mesh, fluid, 0).unwrap();

        let sum: f64 = st.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);

        // Interpolating a linear field must be exact at the image point
        let phi: Vec<f64> = mesh
            .cells
            .iter()
            .map(|c| 3.0 * c.centroid.x - 2.0 * c.centroid.y + 1.0)
            .collect();
        let exact = 3.0 * st.image_point.x - 2.0 * st.image_point.y + 1.0;
        assert!((st.ip_value(&phi) - exact).abs() < 1e-9);
    }

    #[test]
    fn image_point_is_reflection_through_boundary() {
        let mut mesh = rectilinear_mesh(20, 20, 1.0, 1.0);
        let fluid = fluid_everywhere(&mut mesh);
        let shape = Shape::circle(DVec2::new(0.5, 0.5), 0.2).unwrap();

        let cell = mesh.cell_at(DVec2::new(0.33, 0.5)).unwrap();
        let st = GhostCellStencil::new(cell, &shape, &mesh, fluid, 0).unwrap();

        let xc = mesh.cells[cell].centroid;
        let mid = 0.5 * (xc + st.image_point);
        assert!((mid - st.boundary_point).length() < 1e-12);
        assert!(!shape.is_inside(st.image_point));
    }

    #[test]
    fn falls_back_to_inverse_distance_near_domain_edge() {
        let mut mesh = rectilinear_mesh(10, 10, 1.0, 1.0);
        let fluid = fluid_everywhere(&mut mesh);
        // Circle poking out of the bottom-left corner: image points near the
        // domain edge see fewer than four donors
        let shape = Shape::circle(DVec2::new(0.0, 0.0), 0.18).unwrap();

        let cell = mesh.cell_at(DVec2::new(0.05, 0.05)).unwrap();
        let st = GhostCellStencil::new(cell, &shape, &mesh, fluid, 0).unwrap();
        assert!(st.donors.len() >= 2);
        let sum: f64 = st.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
    }
}
