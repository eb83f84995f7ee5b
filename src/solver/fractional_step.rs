use glam::DVec2;

use crate::config::{CaseConfig, IbConfig};
use crate::discretization::mesh::{Mesh, ZoneId};
use crate::error::Error;
use crate::ib::ImmersedBoundarySet;
use crate::numerics::linear::LinearSolveParams;
use crate::numerics::timing::record_assembly;
use crate::parallel::Communicator;
use crate::physics::equation::Equation;
use crate::physics::field::{ScalarField, VectorField};
use crate::physics::BoundaryType;
use crate::solver::schemes;

/// Residuals and stability numbers of one completed time step.
#[derive(Clone, Copy, Debug)]
pub struct StepReport {
    pub time: f64,
    pub dt: f64,
    pub u_residual: f64,
    pub p_residual: f64,
    pub max_divergence: f64,
    pub max_cfl: f64,
}

/// One-step fractional-step (projection) solver for unsteady incompressible
/// flow with immersed boundaries.
///
/// Per step: predictor momentum solve with the immersed no-slip rows,
/// pressure Poisson with the consistent wall condition, divergence-free
/// velocity correction, body advance + reclassification, and force
/// integration. The collective operations inside run in a fixed order, one
/// phase after another.
pub struct FractionalStep {
    pub mesh: Mesh,
    pub u: VectorField,
    pub p: ScalarField,
    pub ib: ImmersedBoundarySet,
    comm: Box<dyn Communicator>,
    rho: f64,
    mu: f64,
    gravity: DVec2,
    fluid: ZoneId,
    linear: LinearSolveParams,
    max_dt: f64,
    pressure_ref: Option<(usize, f64)>,
    pub time: f64,
    pub step: usize,
}

impl FractionalStep {
    pub fn new(
        case: &CaseConfig,
        ib_cfg: &IbConfig,
        mut mesh: Mesh,
        comm: Box<dyn Communicator>,
    ) -> Result<Self, Error> {
        let fluid = mesh.zones.create_zone("fluid");
        mesh.zones.add_all(fluid, 0..mesh.n_cells());

        let u = VectorField::new("u", &mesh);
        let p = ScalarField::new("p", &mesh);

        let mut ib = ImmersedBoundarySet::from_config(ib_cfg, case, &mut mesh, fluid)?;
        ib.init(&mut mesh, comm.as_ref())?;

        Ok(Self {
            mesh,
            u,
            p,
            ib,
            comm,
            rho: case.rho,
            mu: case.mu,
            gravity: case.gravity,
            fluid,
            linear: case.linear,
            max_dt: case.max_dt,
            pressure_ref: None,
            time: 0.0,
            step: 0,
        })
    }

    /// Pin the pressure in one cell. Needed when every patch and body
    /// carries a Neumann pressure condition and the Poisson system would
    /// otherwise be singular up to a constant.
    pub fn set_pressure_reference(&mut self, cell: usize, value: f64) {
        self.pressure_ref = Some((cell, value));
    }

    pub fn fluid_zone(&self) -> ZoneId {
        self.fluid
    }

    pub fn comm(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Make face values consistent with the initial cell values and patch
    /// rules. Call once after setting initial conditions.
    pub fn initialize(&mut self) {
        crate::numerics::timing::reset_timing();
        self.u.interpolate_faces(&self.mesh);
        self.u.set_boundary_faces(&self.mesh);
        self.p.interpolate_faces(&self.mesh);
        self.p.set_boundary_faces(&self.mesh);
    }

    /// Advance one time step. A diverged linear solve is retried once with
    /// half the step from the saved state before giving up.
    pub fn advance(&mut self, dt: f64) -> Result<StepReport, Error> {
        let saved = (
            self.u.cells.clone(),
            self.u.faces.clone(),
            self.p.cells.clone(),
            self.p.faces.clone(),
        );

        match self.try_step(dt) {
            Err(Error::LinearSolveDiverged { system, detail }) => {
                println!(
                    "Linear solve for \"{system}\" diverged ({detail}); retrying with dt/2"
                );
                self.u.cells = saved.0;
                self.u.faces = saved.1;
                self.p.cells = saved.2;
                self.p.faces = saved.3;
                self.try_step(dt / 2.0)
            }
            other => other,
        }
    }

    fn try_step(&mut self, dt: f64) -> Result<StepReport, Error> {
        let u_residual = self.solve_u_eqn(dt)?;
        let p_residual = self.solve_p_eqn(dt)?;
        self.correct_velocity(dt);

        let max_divergence = self.max_divergence_error();
        let max_cfl = self.max_courant_number(dt);

        self.ib.update(
            dt,
            &mut self.mesh,
            &mut self.u,
            &mut self.p,
            self.comm.as_ref(),
        )?;
        self.ib
            .compute_forces(self.mu, &self.u, &self.p, &self.mesh, self.comm.as_ref());

        self.time += dt;
        self.step += 1;

        Ok(StepReport {
            time: self.time,
            dt,
            u_residual,
            p_residual,
            max_divergence,
            max_cfl,
        })
    }

    /// Predictor: `ddt(u) + div(u u) - nu lap(u) - g = 0` over the fluid
    /// zone plus the immersed no-slip rows, Crank-Nicolson on diffusion and
    /// first-order upwind on advection with the previous corrected face
    /// fluxes.
    fn solve_u_eqn(&mut self, dt: f64) -> Result<f64, Error> {
        self.u.save_previous();
        let nu = self.mu / self.rho;

        let eqn = record_assembly(|| -> Result<Equation<DVec2>, Error> {
            let mut eqn = Equation::new("uEqn", self.mesh.n_cells());
            schemes::ddt(&mut eqn, &self.mesh, self.fluid, self.u.prev_cells(), dt);
            schemes::div_upwind(&mut eqn, &self.mesh, self.fluid, self.u.prev_faces(), &self.u);
            schemes::diffusion(&mut eqn, &self.mesh, self.fluid, nu, &self.u, 0.5);
            schemes::body_force(&mut eqn, &self.mesh, self.fluid, self.gravity);
            eqn += self.ib.velocity_bcs(&self.u, &self.mesh)?;
            Ok(eqn)
        })?;

        let residual = eqn.solve(&mut self.u.cells, &self.linear)?;

        self.comm.sync_vector(&mut self.u.cells);
        self.u.interpolate_faces(&self.mesh);
        self.u.set_boundary_faces(&self.mesh);
        Ok(residual)
    }

    /// Pressure Poisson: `div(dt/rho grad p) = div(u*)` with the consistent
    /// immersed-wall condition.
    fn solve_p_eqn(&mut self, dt: f64) -> Result<f64, Error> {
        let eqn = record_assembly(|| {
            let mut eqn = Equation::new("pEqn", self.mesh.n_cells());
            schemes::poisson(&mut eqn, &self.mesh, self.fluid, dt / self.rho, &self.p);
            schemes::div_source(&mut eqn, &self.mesh, self.fluid, &self.u);
            eqn += self.ib.pressure_bcs(self.rho, &self.p, &self.mesh);
            if let Some((cell, value)) = self.pressure_ref {
                eqn.add(cell, cell, 1.0);
                eqn.add_source(cell, -value);
            }
            eqn
        });

        let residual = eqn.solve(&mut self.p.cells, &self.linear)?;

        self.comm.sync_scalar(&mut self.p.cells);
        self.p.interpolate_faces(&self.mesh);
        self.p.set_boundary_faces(&self.mesh);
        Ok(residual)
    }

    /// Project the predictor velocity onto the divergence-free space: cell
    /// values by the Green-Gauss gradient, face values by the compact
    /// normal gradient that entered the Poisson stencil.
    fn correct_velocity(&mut self, dt: f64) {
        let coeff = dt / self.rho;
        let grad_p = self.p.cell_gradient(&self.mesh);

        for c in self.mesh.zones.cells(self.fluid) {
            self.u.cells[c] -= coeff * grad_p[c];
        }
        self.comm.sync_vector(&mut self.u.cells);

        for face in &self.mesh.faces {
            if !face.is_boundary() {
                let dpdn = self.p.face_normal_gradient(&self.mesh, face.id);
                self.u.faces[face.id] -= coeff * dpdn * face.normal;
            }
        }

        for patch in &self.mesh.patches {
            let bc = self.u.patch_bc(patch.id);
            match bc.bc_type {
                BoundaryType::Fixed => {}
                BoundaryType::NormalGradient => {
                    for &f in &patch.faces {
                        let face = &self.mesh.faces[f];
                        let owner = face.cells.0;
                        let d = (face.centroid - self.mesh.cells[owner].centroid)
                            .length()
                            .max(1e-14);
                        let dpdn = (self.p.faces[f] - self.p.cells[owner]) / d;
                        self.u.faces[f] -= coeff * dpdn * face.normal;
                    }
                }
                BoundaryType::Symmetry => {
                    for &f in &patch.faces {
                        let face = &self.mesh.faces[f];
                        let owner = face.cells.0;
                        let uc = self.u.cells[owner];
                        self.u.faces[f] = uc - uc.dot(face.normal) * face.normal;
                    }
                }
            }
        }
    }

    /// Largest cell-wise divergence magnitude `|sum_f u_f . S_f| / V`.
    pub fn max_divergence_error(&self) -> f64 {
        let mut max_err = 0.0f64;
        for c in self.mesh.zones.cells(self.fluid) {
            let cell = &self.mesh.cells[c];
            let mut div = 0.0;
            for link in &cell.interior_links {
                div += self.u.faces[link.face].dot(link.outward_norm);
            }
            for link in &cell.boundary_links {
                div += self.u.faces[link.face].dot(link.outward_norm);
            }
            max_err = max_err.max((div / cell.volume).abs());
        }
        self.comm.max(max_err)
    }

    /// Largest cell Courant number for the given step.
    pub fn max_courant_number(&self, dt: f64) -> f64 {
        let mut max_co = 0.0f64;
        for c in self.mesh.zones.cells(self.fluid) {
            let cell = &self.mesh.cells[c];
            let mut co = 0.0;
            for link in &cell.interior_links {
                co += self.u.faces[link.face].dot(link.outward_norm).max(0.0);
            }
            for link in &cell.boundary_links {
                co += self.u.faces[link.face].dot(link.outward_norm).max(0.0);
            }
            max_co = max_co.max(co * dt / cell.volume);
        }
        self.comm.max(max_co)
    }

    /// Monotone step-size controller: grow towards the target Courant
    /// number by at most 10% of the headroom and a factor 1.2 per step,
    /// capped by the configured maximum step.
    pub fn compute_max_time_step(&self, max_cfl: f64, prev_dt: f64) -> f64 {
        let lambda1 = 0.1;
        let lambda2 = 1.2;
        let co = self.max_courant_number(prev_dt).max(1e-14);
        let ratio = max_cfl / co;

        let dt = (ratio * prev_dt)
            .min((1.0 + lambda1 * ratio) * prev_dt)
            .min(lambda2 * prev_dt)
            .min(self.max_dt);
        self.comm.min(dt)
    }
}
