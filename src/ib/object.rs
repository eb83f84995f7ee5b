use std::collections::{BTreeSet, HashMap};

use glam::DVec2;

use crate::discretization::mesh::{Mesh, ZoneId};
use crate::error::Error;
use crate::geometry::{rotate_vec, Ray2, Shape};
use crate::ib::motion::Motion;
use crate::ib::stencil::GhostCellStencil;
use crate::parallel::Communicator;
use crate::physics::equation::Equation;
use crate::physics::field::{ScalarField, VectorField};
use crate::physics::BoundaryType;

/// One immersed rigid body: its shape, kinematics, the cells it currently
/// claims from the fluid zone, and the ghost-cell stencils of its interface
/// band.
pub struct IbObject {
    pub name: String,
    pub id: usize,
    pub shape: Shape,
    pub rho: f64,
    pub motion: Option<Motion>,
    /// Zone holding every cell the body claims (interface band + interior).
    zone: ZoneId,
    fluid: ZoneId,
    pub ib_cells: Vec<usize>,
    pub solid_cells: Vec<usize>,
    /// Uncovered this step: were solid or interface, centroid now outside.
    pub fresh_cells: Vec<usize>,
    /// Covered this step: were fluid, now strictly interior.
    pub dead_cells: Vec<usize>,
    pub stencils: Vec<GhostCellStencil>,
    boundary_types: HashMap<String, BoundaryType>,
    boundary_values: HashMap<String, f64>,
    pub force: DVec2,
    pub torque: f64,
    /// Completed classification epochs. Fresh/dead tracking needs a
    /// previous epoch to diff against.
    epoch: usize,
}

impl IbObject {
    pub fn new(
        name: impl Into<String>,
        id: usize,
        shape: Shape,
        rho: f64,
        mesh: &mut Mesh,
        fluid: ZoneId,
    ) -> Self {
        let name = name.into();
        let zone = mesh.zones.create_zone(format!("ib:{name}"));
        Self {
            name,
            id,
            shape,
            rho,
            motion: None,
            zone,
            fluid,
            ib_cells: Vec::new(),
            solid_cells: Vec::new(),
            fresh_cells: Vec::new(),
            dead_cells: Vec::new(),
            stencils: Vec::new(),
            boundary_types: HashMap::new(),
            boundary_values: HashMap::new(),
            force: DVec2::ZERO,
            torque: 0.0,
            epoch: 0,
        }
    }

    pub fn set_motion(&mut self, motion: Option<Motion>) {
        self.motion = motion;
    }

    pub fn add_boundary_type(&mut self, field: impl Into<String>, bc: BoundaryType) {
        self.boundary_types.insert(field.into(), bc);
    }

    pub fn add_boundary_ref_value(&mut self, field: impl Into<String>, value: f64) {
        self.boundary_values.insert(field.into(), value);
    }

    pub fn is_inside(&self, p: DVec2) -> bool {
        self.shape.is_inside(p)
    }

    /// Wall velocity at a point on (or in) the body.
    pub fn velocity(&self, p: DVec2) -> DVec2 {
        match &self.motion {
            Some(m) => m.velocity(p, self.shape.centroid()),
            None => DVec2::ZERO,
        }
    }

    /// Wall acceleration at a point on the body.
    pub fn acceleration(&self, p: DVec2) -> DVec2 {
        match &self.motion {
            Some(m) => m.acceleration(p, self.shape.centroid()),
            None => DVec2::ZERO,
        }
    }

    pub fn add_force(&mut self, f: DVec2) {
        self.force += f;
    }

    /// Reclassify the cells covered by the body at its current position and
    /// rebuild the interface-band stencils.
    ///
    /// Cells the body claimed last epoch return to the fluid zone first, so
    /// classification twice at the same position is a no-op. Cells claimed
    /// by a lower-id body are no longer in the fluid zone and stay with
    /// their owner.
    pub fn update_cells(&mut self, mesh: &mut Mesh, rank: usize) -> Result<(), Error> {
        let prev: Vec<usize> = mesh.zones.cells(self.zone).collect();
        let prev_set: BTreeSet<usize> = prev.iter().copied().collect();

        mesh.zones.add_all(self.fluid, prev.iter().copied());

        self.ib_cells.clear();
        self.solid_cells.clear();
        self.dead_cells.clear();
        self.fresh_cells.clear();

        let track_changes = self.motion.is_some() && self.epoch > 0;
        if track_changes {
            // Uncovered cells stay in the fluid zone and get reseeded
            for &c in &prev {
                if !self.shape.is_inside(mesh.cells[c].centroid) {
                    self.fresh_cells.push(c);
                }
            }
        }

        let candidates = mesh.zone_cells_within(self.fluid, &self.shape);
        for c in candidates {
            let cell = &mesh.cells[c];
            let has_outside_neighbour = cell
                .interior_links
                .iter()
                .map(|l| l.cell)
                .chain(cell.diagonal_links.iter().copied())
                .any(|n| !self.shape.is_inside(mesh.cells[n].centroid));

            if has_outside_neighbour {
                self.ib_cells.push(c);
            } else {
                self.solid_cells.push(c);
                if track_changes && !prev_set.contains(&c) {
                    self.dead_cells.push(c);
                }
            }
            mesh.zones.add(self.zone, c);
        }
        self.epoch += 1;

        self.stencils.clear();
        for &c in &self.ib_cells {
            self.stencils
                .push(GhostCellStencil::new(c, &self.shape, mesh, self.fluid, rank)?);
        }
        Ok(())
    }

    fn boundary_type_for(&self, field: &str) -> Result<BoundaryType, Error> {
        self.boundary_types.get(field).copied().ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "no boundary type registered for field \"{field}\" on body \"{}\"",
                self.name
            ))
        })
    }

    fn boundary_value_for(&self, field: &str) -> f64 {
        self.boundary_values.get(field).copied().unwrap_or(0.0)
    }

    /// Generic scalar boundary condition rows for this body's cells.
    pub fn bcs(&self, field: &ScalarField, mesh: &Mesh) -> Result<Equation<f64>, Error> {
        let mut eqn = Equation::new(format!("{}:{}", self.name, field.name), mesh.n_cells());
        let reference = self.boundary_value_for(&field.name);

        match self.boundary_type_for(&field.name)? {
            BoundaryType::Fixed => {
                for st in &self.stencils {
                    let (cols, coeffs) = st.dirichlet_coeffs();
                    eqn.add_row(st.cell, &cols, &coeffs);
                    eqn.add_source(st.cell, -2.0 * reference);
                }
                for &c in &self.solid_cells {
                    eqn.add(c, c, 1.0);
                    eqn.add_source(c, -reference);
                }
            }
            BoundaryType::NormalGradient => {
                for st in &self.stencils {
                    let (cols, coeffs) = st.neumann_coeffs();
                    eqn.add_row(st.cell, &cols, &coeffs);
                    eqn.add_source(st.cell, st.length() * reference);
                }
                for &c in &self.solid_cells {
                    eqn.add(c, c, 1.0);
                }
            }
            BoundaryType::Symmetry => {
                return Err(Error::InvalidConfiguration(format!(
                    "symmetry is not a valid immersed boundary type for field \"{}\"",
                    field.name
                )));
            }
        }
        Ok(eqn)
    }

    /// No-slip velocity rows: the ghost relation pins the wall velocity at
    /// each boundary point, interior cells are pinned to the local body
    /// velocity so the solid region is dragged along rigidly.
    pub fn velocity_bcs(&self, u: &VectorField, mesh: &Mesh) -> Result<Equation<DVec2>, Error> {
        let mut eqn = Equation::new(format!("{}:{}", self.name, u.name), mesh.n_cells());

        let btype = self
            .boundary_types
            .get(&u.name)
            .copied()
            .unwrap_or(BoundaryType::Fixed);
        if btype != BoundaryType::Fixed {
            return Err(Error::InvalidConfiguration(format!(
                "velocity on body \"{}\" supports only the fixed (no-slip) boundary type",
                self.name
            )));
        }

        for st in &self.stencils {
            let (cols, coeffs) = st.dirichlet_coeffs();
            eqn.add_row(st.cell, &cols, &coeffs);
            eqn.add_source(st.cell, -2.0 * self.velocity(st.boundary_point));
        }
        for &c in &self.solid_cells {
            eqn.add(c, c, 1.0);
            eqn.add_source(c, -self.velocity(mesh.cells[c].centroid));
        }
        Ok(eqn)
    }

    /// Consistent pressure rows for a rigid wall: homogeneous Neumann for a
    /// stationary body, `dp/dn = rho (a_B . n)` when the body accelerates.
    pub fn pressure_bcs(&self, rho: f64, p: &ScalarField, mesh: &Mesh) -> Equation<f64> {
        let mut eqn = Equation::new(format!("{}:{}", self.name, p.name), mesh.n_cells());

        for st in &self.stencils {
            let (cols, coeffs) = st.neumann_coeffs();
            eqn.add_row(st.cell, &cols, &coeffs);
        }
        if self.motion.is_some() {
            for st in &self.stencils {
                let du_dn = self.acceleration(st.boundary_point).dot(st.wall_normal);
                eqn.add_source(st.cell, st.length() * rho * du_dn);
            }
        }
        for &c in &self.solid_cells {
            eqn.add(c, c, 1.0);
        }
        eqn
    }

    /// Contact-angle rows for a volume-fraction field. For each interface
    /// cell, two probe stencils are cast along rays rotated by
    /// `+-(pi/2 - theta)` off the wall normal; the one whose image point
    /// sits deeper in the preferred phase imposes its homogeneous Neumann
    /// relation.
    pub fn contact_line_bcs(
        &self,
        gamma: &ScalarField,
        theta: f64,
        mesh: &Mesh,
        rank: usize,
    ) -> Result<Equation<f64>, Error> {
        let mut eqn = Equation::new(format!("{}:{}", self.name, gamma.name), mesh.n_cells());
        let half_pi = std::f64::consts::FRAC_PI_2;

        for st in &self.stencils {
            let xc = mesh.cells[st.cell].centroid;
            // Probe rays leave the ghost centroid through the surface,
            // tilted off the fluid-ward wall normal
            let wn = self.shape.nearest_edge_normal(st.boundary_point);

            let mut probes = Vec::with_capacity(2);
            for angle in [half_pi - theta, theta - half_pi] {
                let ray = Ray2::new(xc, rotate_vec(wn, angle));
                if let Some(&hit) = self.shape.intersections(&ray).first() {
                    probes.push(GhostCellStencil::from_boundary_point(
                        st.cell, hit, ray.dir, mesh, self.fluid, rank,
                    )?);
                }
            }

            let chosen = match probes.len() {
                2 => {
                    let g0 = probes[0].ip_value(&gamma.cells);
                    let g1 = probes[1].ip_value(&gamma.cells);
                    let first_wins = if theta < half_pi { g0 > g1 } else { g0 < g1 };
                    if first_wins {
                        &probes[0]
                    } else {
                        &probes[1]
                    }
                }
                1 => &probes[0],
                _ => st,
            };

            let (cols, coeffs) = chosen.neumann_coeffs();
            eqn.add_row(st.cell, &cols, &coeffs);
        }

        for &c in &self.solid_cells {
            eqn.add(c, c, 1.0);
        }
        Ok(eqn)
    }

    /// Integrate pressure and viscous surface stresses into the net
    /// hydrodynamic force and torque on the body.
    ///
    /// Each rank samples its own stencils; samples are gathered on the main
    /// rank, ordered by contour arc length (total on straight edges, unlike
    /// the polar angle), integrated with the trapezoid rule around the
    /// closed contour and broadcast back.
    pub fn compute_force(
        &mut self,
        mu: f64,
        u: &VectorField,
        p: &ScalarField,
        comm: &dyn Communicator,
    ) {
        let mut points = Vec::with_capacity(self.stencils.len());
        let mut pressures = Vec::with_capacity(self.stencils.len());
        let mut shears = Vec::with_capacity(self.stencils.len());

        for st in &self.stencils {
            let n = st.wall_normal;
            let tangent = DVec2::new(-n.y, n.x);
            points.push(st.boundary_point);
            pressures.push(st.bp_value(&p.cells));
            shears.push(mu * st.bp_grad(&u.cells).dot(tangent));
        }

        let root = comm.main_rank();
        let points = comm.gatherv_points(root, points);
        let pressures = comm.gatherv_scalars(root, pressures);
        let shears = comm.gatherv_scalars(root, shears);

        let mut force = DVec2::ZERO;
        let mut torque = 0.0;

        if comm.is_main() && points.len() > 1 {
            let mut samples: Vec<(f64, DVec2, f64, f64)> = points
                .iter()
                .zip(&pressures)
                .zip(&shears)
                .map(|((&pt, &pr), &sh)| (self.shape.contour_parameter(pt), pt, pr, sh))
                .collect();
            samples.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let centroid = self.shape.centroid();
            for i in 0..samples.len() {
                let (_, pt_a, pr_a, sh_a) = samples[i];
                let (_, pt_b, pr_b, sh_b) = samples[(i + 1) % samples.len()];
                let seg = pt_b - pt_a;
                // Outward normal of the segment, length |seg|
                let seg_normal = DVec2::new(seg.y, -seg.x);
                let df = -0.5 * (pr_a + pr_b) * seg_normal + 0.5 * (sh_a + sh_b) * seg;
                force += df;
                torque += (0.5 * (pt_a + pt_b) - centroid).perp_dot(df);
            }
        }

        self.force = comm.broadcast(root, force);
        self.torque = comm.broadcast(root, DVec2::new(torque, 0.0)).x;
    }
}
