use std::collections::BTreeSet;

use glam::DVec2;

use crate::geometry::{Aabb, Shape};

/// A node of the grid.
pub struct Node {
    pub position: DVec2,
}

/// An interface between two cells, or between a cell and a boundary patch.
pub struct Face {
    pub id: usize,
    /// Edge length (2D "area").
    pub area: f64,
    /// Unit normal, oriented from `cells.0` towards `cells.1`; outward on
    /// boundary faces.
    pub normal: DVec2,
    pub centroid: DVec2,
    /// (owner, optional neighbour). `None` marks a boundary face.
    pub cells: (usize, Option<usize>),
    /// Patch id for boundary faces.
    pub patch: Option<usize>,
}

impl Face {
    pub fn is_boundary(&self) -> bool {
        self.cells.1.is_none()
    }
}

/// Link from a cell to a face-neighbour cell.
pub struct InteriorLink {
    pub cell: usize,
    pub face: usize,
    /// Face normal scaled by area, pointing out of the owning cell.
    pub outward_norm: DVec2,
}

/// Link from a cell to one of its boundary faces.
pub struct BoundaryLink {
    pub face: usize,
    pub patch: usize,
    pub outward_norm: DVec2,
}

/// A single control volume.
pub struct Cell {
    pub id: usize,
    pub volume: f64,
    pub centroid: DVec2,
    pub faces: Vec<usize>,
    pub nodes: Vec<usize>,
    pub interior_links: Vec<InteriorLink>,
    pub boundary_links: Vec<BoundaryLink>,
    /// Corner-sharing cells that are not face-neighbours.
    pub diagonal_links: Vec<usize>,
}

/// A named group of boundary faces sharing a boundary condition.
pub struct Patch {
    pub id: usize,
    pub name: String,
    pub faces: Vec<usize>,
}

/// Identifier of a cell zone inside the registry.
pub type ZoneId = usize;

struct Zone {
    name: String,
    cells: BTreeSet<usize>,
}

/// Single-owner map from cell to its current zone. Inserting a cell into a
/// zone removes it from whichever zone held it before, so the zones always
/// partition the claimed cells.
pub struct ZoneRegistry {
    owner: Vec<Option<ZoneId>>,
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    fn new(n_cells: usize) -> Self {
        Self {
            owner: vec![None; n_cells],
            zones: Vec::new(),
        }
    }

    pub fn create_zone(&mut self, name: impl Into<String>) -> ZoneId {
        let id = self.zones.len();
        self.zones.push(Zone {
            name: name.into(),
            cells: BTreeSet::new(),
        });
        id
    }

    pub fn zone_named(&self, name: &str) -> Option<ZoneId> {
        self.zones.iter().position(|z| z.name == name)
    }

    pub fn add(&mut self, zone: ZoneId, cell: usize) {
        if let Some(prev) = self.owner[cell] {
            if prev == zone {
                return;
            }
            self.zones[prev].cells.remove(&cell);
        }
        self.owner[cell] = Some(zone);
        self.zones[zone].cells.insert(cell);
    }

    pub fn add_all<I: IntoIterator<Item = usize>>(&mut self, zone: ZoneId, cells: I) {
        for cell in cells {
            self.add(zone, cell);
        }
    }

    pub fn remove(&mut self, zone: ZoneId, cell: usize) {
        if self.owner[cell] == Some(zone) {
            self.owner[cell] = None;
            self.zones[zone].cells.remove(&cell);
        }
    }

    pub fn owner_of(&self, cell: usize) -> Option<ZoneId> {
        self.owner[cell]
    }

    pub fn contains(&self, zone: ZoneId, cell: usize) -> bool {
        self.owner[cell] == Some(zone)
    }

    pub fn cells(&self, zone: ZoneId) -> impl Iterator<Item = usize> + '_ {
        self.zones[zone].cells.iter().copied()
    }

    pub fn len(&self, zone: ZoneId) -> usize {
        self.zones[zone].cells.len()
    }

    pub fn is_empty(&self, zone: ZoneId) -> bool {
        self.zones[zone].cells.is_empty()
    }

    pub fn name(&self, zone: ZoneId) -> &str {
        &self.zones[zone].name
    }
}

/// Uniform-bin spatial index over cell centroids, for broad-phase queries.
struct CellIndex {
    origin: DVec2,
    inv_h: DVec2,
    nx: usize,
    ny: usize,
    bins: Vec<Vec<usize>>,
}

impl CellIndex {
    fn build(cells: &[Cell], bounds: &Aabb) -> Self {
        let n = cells.len().max(1);
        let nx = (n as f64).sqrt().ceil() as usize;
        let ny = nx;
        let extent = (bounds.max - bounds.min).max(DVec2::splat(1e-12));
        let inv_h = DVec2::new(nx as f64 / extent.x, ny as f64 / extent.y);
        let mut bins = vec![Vec::new(); nx * ny];
        for cell in cells {
            let (i, j) = Self::bin_of(cell.centroid, bounds.min, inv_h, nx, ny);
            bins[j * nx + i].push(cell.id);
        }
        Self {
            origin: bounds.min,
            inv_h,
            nx,
            ny,
            bins,
        }
    }

    fn bin_of(p: DVec2, origin: DVec2, inv_h: DVec2, nx: usize, ny: usize) -> (usize, usize) {
        let i = (((p.x - origin.x) * inv_h.x) as isize).clamp(0, nx as isize - 1) as usize;
        let j = (((p.y - origin.y) * inv_h.y) as isize).clamp(0, ny as isize - 1) as usize;
        (i, j)
    }

    fn query(&self, aabb: &Aabb) -> impl Iterator<Item = usize> + '_ {
        let (i0, j0) = Self::bin_of(aabb.min, self.origin, self.inv_h, self.nx, self.ny);
        let (i1, j1) = Self::bin_of(aabb.max, self.origin, self.inv_h, self.nx, self.ny);
        (j0..=j1)
            .flat_map(move |j| (i0..=i1).map(move |i| j * self.nx + i))
            .flat_map(move |b| self.bins[b].iter().copied())
    }
}

/// The complete computational grid: geometry, connectivity, patches, and the
/// cell-zone registry. Geometry and connectivity are immutable after
/// construction; only zone membership changes over a run.
pub struct Mesh {
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
    pub nodes: Vec<Node>,
    pub patches: Vec<Patch>,
    pub zones: ZoneRegistry,
    /// Dense matrix-row index per cell, reassigned after classification.
    pub global_indices: Vec<usize>,
    bounds: Aabb,
    index: CellIndex,
}

impl Mesh {
    pub fn assemble(
        cells: Vec<Cell>,
        faces: Vec<Face>,
        nodes: Vec<Node>,
        patches: Vec<Patch>,
    ) -> Self {
        let mut min = DVec2::splat(f64::INFINITY);
        let mut max = DVec2::splat(f64::NEG_INFINITY);
        for node in &nodes {
            min = min.min(node.position);
            max = max.max(node.position);
        }
        let bounds = Aabb { min, max };
        let index = CellIndex::build(&cells, &bounds);
        let n = cells.len();
        let zones = ZoneRegistry::new(n);
        Mesh {
            cells,
            faces,
            nodes,
            patches,
            zones,
            global_indices: (0..n).collect(),
            bounds,
            index,
        }
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn patch_named(&self, name: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.name == name)
    }

    /// Cells of `zone` whose centroid lies inside `shape`. Broad-phase AABB
    /// query over the cell index, then exact containment.
    pub fn zone_cells_within(&self, zone: ZoneId, shape: &Shape) -> Vec<usize> {
        let aabb = shape.aabb();
        let mut out: Vec<usize> = self
            .index
            .query(&aabb)
            .filter(|&id| {
                self.zones.contains(zone, id) && shape.is_inside(self.cells[id].centroid)
            })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Cell containing `p`, if any.
    pub fn cell_at(&self, p: DVec2) -> Option<usize> {
        if !self.bounds.contains(p) {
            return None;
        }
        let margin = DVec2::new(1.0 / self.index.inv_h.x, 1.0 / self.index.inv_h.y);
        let probe = Aabb {
            min: p - margin,
            max: p + margin,
        };
        self.index.query(&probe).find(|&id| self.cell_contains(id, p))
    }

    fn cell_contains(&self, cell: usize, p: DVec2) -> bool {
        let cell = &self.cells[cell];
        let n = cell.nodes.len();
        let mut inside = false;
        for i in 0..n {
            let a = self.nodes[cell.nodes[i]].position;
            let b = self.nodes[cell.nodes[(i + 1) % n]].position;
            if (a.y > p.y) != (b.y > p.y) {
                let x_int = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x_int {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Reassign dense global (matrix-row) indices. With a single rank this
    /// is the identity ordering; the call marks the renumbering point that
    /// follows every classification epoch.
    pub fn renumber_active(&mut self) {
        for (i, g) in self.global_indices.iter_mut().enumerate() {
            *g = i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::rectilinear_mesh;

    #[test]
    fn zone_membership_is_single_owner() {
        let mut mesh = rectilinear_mesh(4, 4, 1.0, 1.0);
        let a = mesh.zones.create_zone("a");
        let b = mesh.zones.create_zone("b");

        mesh.zones.add(a, 5);
        assert!(mesh.zones.contains(a, 5));

        mesh.zones.add(b, 5);
        assert!(!mesh.zones.contains(a, 5));
        assert!(mesh.zones.contains(b, 5));
        assert_eq!(mesh.zones.owner_of(5), Some(b));
        assert_eq!(mesh.zones.len(a), 0);
    }

    #[test]
    fn cells_within_circle() {
        let mut mesh = rectilinear_mesh(10, 10, 1.0, 1.0);
        let fluid = mesh.zones.create_zone("fluid");
        mesh.zones.add_all(fluid, 0..mesh.n_cells());

        let shape = Shape::circle(DVec2::new(0.5, 0.5), 0.25).unwrap();
        let inside = mesh.zone_cells_within(fluid, &shape);

        for &id in &inside {
            assert!(shape.is_inside(mesh.cells[id].centroid));
        }
        let brute: Vec<usize> = (0..mesh.n_cells())
            .filter(|&id| shape.is_inside(mesh.cells[id].centroid))
            .collect();
        assert_eq!(inside, brute);
    }

    #[test]
    fn cell_lookup_roundtrip() {
        let mesh = rectilinear_mesh(8, 4, 2.0, 1.0);
        for cell in &mesh.cells {
            assert_eq!(mesh.cell_at(cell.centroid), Some(cell.id));
        }
        assert_eq!(mesh.cell_at(DVec2::new(-0.1, 0.5)), None);
    }
}
