pub mod collision;
pub mod motion;
pub mod object;
pub mod stencil;

use std::collections::BTreeSet;

use glam::DVec2;

use crate::config::{CaseConfig, FieldBcType, IbConfig, IbMethod, MotionConfig};
use crate::discretization::mesh::{Mesh, ZoneId};
use crate::error::Error;
use crate::ib::collision::CollisionModel;
use crate::ib::motion::Motion;
use crate::ib::object::IbObject;
use crate::parallel::Communicator;
use crate::physics::equation::Equation;
use crate::physics::field::{ScalarField, VectorField};
use crate::physics::BoundaryType;

/// Classification of a cell after an epoch. The codes are what lands in the
/// exported status field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum CellStatus {
    Fluid = 1,
    Ib = 2,
    Solid = 3,
    Fresh = 4,
    Dead = 5,
    Buffer = 6,
}

/// The collection of immersed bodies: builds them from configuration,
/// drives classification, aggregates their boundary-condition equations and
/// applies the collision model on top of the hydrodynamic forces.
pub struct ImmersedBoundarySet {
    pub objects: Vec<IbObject>,
    pub collision: CollisionModel,
    fluid: ZoneId,
    pub cell_status: Vec<i32>,
}

impl ImmersedBoundarySet {
    pub fn from_config(
        cfg: &IbConfig,
        case: &CaseConfig,
        mesh: &mut Mesh,
        fluid: ZoneId,
    ) -> Result<Self, Error> {
        let mut object_cfgs = cfg.objects.clone();
        if let Some(array) = &cfg.array {
            object_cfgs.extend(array.expand()?);
        }

        let mut objects = Vec::with_capacity(object_cfgs.len());
        for (id, obj_cfg) in object_cfgs.iter().enumerate() {
            println!("Initializing immersed boundary object \"{}\".", obj_cfg.name);

            if obj_cfg.method != IbMethod::GhostCell {
                return Err(Error::InvalidConfiguration(format!(
                    "body \"{}\": only the ghost-cell method is implemented",
                    obj_cfg.name
                )));
            }

            let shape = obj_cfg.shape.build()?;
            let mut obj = IbObject::new(&obj_cfg.name, id, shape, obj_cfg.rho, mesh, fluid);

            for (field, bc) in &obj_cfg.field_bcs {
                let bc_type = match bc.bc_type {
                    FieldBcType::Fixed => BoundaryType::Fixed,
                    FieldBcType::NormalGradient => BoundaryType::NormalGradient,
                    FieldBcType::PartialSlip => {
                        return Err(Error::InvalidConfiguration(format!(
                            "body \"{}\", field \"{field}\": partial_slip is reserved and not implemented",
                            obj_cfg.name
                        )));
                    }
                };
                obj.add_boundary_type(field.clone(), bc_type);
                obj.add_boundary_ref_value(field.clone(), bc.value);
            }

            let motion = match &obj_cfg.motion {
                MotionConfig::None => None,
                MotionConfig::Translating {
                    velocity,
                    acceleration,
                } => Some(Motion::translating(*velocity, *acceleration)),
                MotionConfig::Oscillating {
                    frequency,
                    amplitude,
                    phase,
                } => Some(Motion::oscillating(
                    *frequency,
                    *amplitude,
                    *phase,
                    obj.shape.centroid(),
                )),
                MotionConfig::SolidBody { velocity } => {
                    if obj_cfg.rho <= 0.0 {
                        return Err(Error::InvalidConfiguration(format!(
                            "body \"{}\": solidBody motion needs a positive properties.rho",
                            obj_cfg.name
                        )));
                    }
                    Some(Motion::solid_body(
                        *velocity,
                        case.gravity,
                        obj_cfg.rho,
                        &obj.shape,
                    ))
                }
            };
            obj.set_motion(motion);

            objects.push(obj);
        }

        if objects.is_empty() {
            println!("No immersed boundaries present.");
        }

        let collisions = cfg.collisions.unwrap_or_default();
        Ok(Self {
            objects,
            collision: CollisionModel::new(collisions.stiffness, collisions.range),
            fluid,
            cell_status: vec![0; mesh.n_cells()],
        })
    }

    /// First classification after the fluid zone is populated.
    pub fn init(&mut self, mesh: &mut Mesh, comm: &dyn Communicator) -> Result<(), Error> {
        for obj in &mut self.objects {
            obj.update_cells(mesh, comm.rank())?;
        }
        self.set_cell_status(mesh, comm);
        mesh.renumber_active();
        Ok(())
    }

    /// Advance every body over `dt` with the forces integrated last step,
    /// reclassify, reseed freshly uncovered cells, refresh the status field
    /// and renumber.
    pub fn update(
        &mut self,
        dt: f64,
        mesh: &mut Mesh,
        u: &mut VectorField,
        p: &mut ScalarField,
        comm: &dyn Communicator,
    ) -> Result<(), Error> {
        for obj in &mut self.objects {
            let force = obj.force;
            let torque = obj.torque;
            if let Some(motion) = &mut obj.motion {
                motion.advance(&mut obj.shape, dt, force, torque);
            }
            obj.update_cells(mesh, comm.rank())?;
        }

        self.seed_fresh_cells(mesh, u, p);
        self.set_cell_status(mesh, comm);
        mesh.renumber_active();
        Ok(())
    }

    /// Inverse-distance average of face-neighbour fluid values into every
    /// freshly uncovered cell, so the predictor never sees stale solid-body
    /// values there.
    ///
    /// Sweeps in passes: a fresh cell whose face-neighbours are all fresh
    /// themselves (the inner edge of an uncovered band) picks up its value
    /// once those neighbours have been seeded.
    pub fn seed_fresh_cells(&self, mesh: &Mesh, u: &mut VectorField, p: &mut ScalarField) {
        let mut unseeded: BTreeSet<usize> = self
            .objects
            .iter()
            .flat_map(|o| o.fresh_cells.iter().copied())
            .collect();

        loop {
            let mut seeded_this_pass = Vec::new();
            for &c in &unseeded {
                let mut u_acc = DVec2::ZERO;
                let mut p_acc = 0.0;
                let mut w_sum = 0.0;
                for link in &mesh.cells[c].interior_links {
                    let n = link.cell;
                    if !mesh.zones.contains(self.fluid, n) || unseeded.contains(&n) {
                        continue;
                    }
                    let d = (mesh.cells[n].centroid - mesh.cells[c].centroid)
                        .length()
                        .max(1e-14);
                    let w = 1.0 / d;
                    u_acc += w * u.cells[n];
                    p_acc += w * p.cells[n];
                    w_sum += w;
                }
                if w_sum > 0.0 {
                    u.cells[c] = u_acc / w_sum;
                    p.cells[c] = p_acc / w_sum;
                    seeded_this_pass.push(c);
                }
            }
            if seeded_this_pass.is_empty() {
                break;
            }
            for c in seeded_this_pass {
                unseeded.remove(&c);
            }
        }
    }

    /// Assign the per-cell status codes for this epoch and exchange them
    /// across halo layers.
    pub fn set_cell_status(&mut self, mesh: &Mesh, comm: &dyn Communicator) {
        self.cell_status.fill(0);

        for c in mesh.zones.cells(self.fluid) {
            self.cell_status[c] = CellStatus::Fluid as i32;
        }

        for obj in &self.objects {
            for &c in &obj.ib_cells {
                self.cell_status[c] = CellStatus::Ib as i32;
            }
            for &c in &obj.solid_cells {
                self.cell_status[c] = CellStatus::Solid as i32;
            }
            for &c in &obj.fresh_cells {
                self.cell_status[c] = CellStatus::Fresh as i32;
            }
            for &c in &obj.dead_cells {
                self.cell_status[c] = CellStatus::Dead as i32;
            }
        }

        let mut buf: Vec<f64> = self.cell_status.iter().map(|&s| s as f64).collect();
        comm.sync_scalar(&mut buf);
        for (s, v) in self.cell_status.iter_mut().zip(buf) {
            *s = v as i32;
        }
    }

    pub fn fluid_zone(&self) -> ZoneId {
        self.fluid
    }

    pub fn ib_cells(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .objects
            .iter()
            .flat_map(|o| o.ib_cells.iter().copied())
            .collect();
        out.sort_unstable();
        out
    }

    pub fn solid_cells(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .objects
            .iter()
            .flat_map(|o| o.solid_cells.iter().copied())
            .collect();
        out.sort_unstable();
        out
    }

    /// The body containing `p`, if any.
    pub fn ib_obj_at(&self, p: DVec2) -> Option<&IbObject> {
        self.objects.iter().find(|o| o.is_inside(p))
    }

    /// Closest boundary point over all bodies.
    pub fn nearest_intersect(&self, p: DVec2) -> Option<(&IbObject, DVec2)> {
        self.objects
            .iter()
            .map(|o| {
                let xc = o.shape.nearest_intersect(p);
                (o, xc, (xc - p).length_squared())
            })
            .min_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(o, xc, _)| (o, xc))
    }

    pub fn velocity_bcs(&self, u: &VectorField, mesh: &Mesh) -> Result<Equation<DVec2>, Error> {
        let mut eqn = Equation::new(format!("ib:{}", u.name), mesh.n_cells());
        for obj in &self.objects {
            eqn += obj.velocity_bcs(u, mesh)?;
        }
        Ok(eqn)
    }

    pub fn pressure_bcs(&self, rho: f64, p: &ScalarField, mesh: &Mesh) -> Equation<f64> {
        let mut eqn = Equation::new(format!("ib:{}", p.name), mesh.n_cells());
        for obj in &self.objects {
            eqn += obj.pressure_bcs(rho, p, mesh);
        }
        eqn
    }

    pub fn bcs(&self, field: &ScalarField, mesh: &Mesh) -> Result<Equation<f64>, Error> {
        let mut eqn = Equation::new(format!("ib:{}", field.name), mesh.n_cells());
        for obj in &self.objects {
            eqn += obj.bcs(field, mesh)?;
        }
        Ok(eqn)
    }

    pub fn contact_line_bcs(
        &self,
        gamma: &ScalarField,
        theta: f64,
        mesh: &Mesh,
        comm: &dyn Communicator,
    ) -> Result<Equation<f64>, Error> {
        let mut eqn = Equation::new(format!("ib:{}", gamma.name), mesh.n_cells());
        for obj in &self.objects {
            eqn += obj.contact_line_bcs(gamma, theta, mesh, comm.rank())?;
        }
        Ok(eqn)
    }

    /// Hydrodynamic force and torque per body, plus pairwise and wall
    /// collision forces.
    pub fn compute_forces(
        &mut self,
        mu: f64,
        u: &VectorField,
        p: &ScalarField,
        mesh: &Mesh,
        comm: &dyn Communicator,
    ) {
        for obj in &mut self.objects {
            obj.compute_force(mu, u, p, comm);
        }

        let n = self.objects.len();
        let mut contact = vec![DVec2::ZERO; n];
        for i in 0..n {
            for j in 0..n {
                contact[i] += self.collision.pair_force(&self.objects[i], &self.objects[j]);
            }
            contact[i] += self.collision.wall_force(&self.objects[i], mesh.bounds());
        }
        for (obj, f) in self.objects.iter_mut().zip(contact) {
            obj.add_force(f);
        }
    }
}
