use std::ops::{Mul, Sub};

use glam::DVec2;

use crate::discretization::mesh::{Mesh, ZoneId};
use crate::physics::equation::{Equation, SystemValue};
use crate::physics::field::{Field, FieldValue, ScalarField, VectorField};
use crate::physics::BoundaryType;

/// Finite-volume operators. Each one appends to an [`Equation`] in the
/// shared residual convention `sum_k a_k phi_k + s = 0`, over the cells of
/// one zone, so operators and immersed-boundary rows compose by summation.

/// Implicit Euler time derivative: `(V / dt)(phi - phi_old)`.
pub fn ddt<T>(eqn: &mut Equation<T>, mesh: &Mesh, zone: ZoneId, old: &[T], dt: f64)
where
    T: SystemValue + Mul<f64, Output = T>,
{
    for c in mesh.zones.cells(zone) {
        let a = mesh.cells[c].volume / dt;
        eqn.add(c, c, a);
        eqn.add_source(c, -(old[c] * a));
    }
}

/// First-order upwind advection with the mass flux frozen at the previous
/// face velocities (Picard linearization): `sum_f mdot_f phi_upwind`.
pub fn div_upwind<T>(
    eqn: &mut Equation<T>,
    mesh: &Mesh,
    zone: ZoneId,
    flux_faces: &[DVec2],
    field: &Field<T>,
) where
    T: SystemValue + FieldValue + Mul<f64, Output = T>,
{
    for c in mesh.zones.cells(zone) {
        let cell = &mesh.cells[c];
        for link in &cell.interior_links {
            let mdot = flux_faces[link.face].dot(link.outward_norm);
            if mdot >= 0.0 {
                eqn.add(c, c, mdot);
            } else {
                eqn.add(c, link.cell, mdot);
            }
        }
        for link in &cell.boundary_links {
            let mdot = flux_faces[link.face].dot(link.outward_norm);
            if mdot >= 0.0 {
                eqn.add(c, c, mdot);
            } else {
                // Inflow carries the known boundary-face value
                eqn.add_source(c, field.faces[link.face] * mdot);
            }
        }
    }
}

/// Diffusion `-div(gamma grad phi)` with Crank-Nicolson blending: `theta`
/// of the flux is implicit, the remainder is evaluated at the current cell
/// values and moved to the source.
pub fn diffusion<T>(
    eqn: &mut Equation<T>,
    mesh: &Mesh,
    zone: ZoneId,
    gamma: f64,
    field: &Field<T>,
    theta: f64,
) where
    T: SystemValue + FieldValue + Mul<f64, Output = T> + Sub<Output = T>,
{
    for c in mesh.zones.cells(zone) {
        let cell = &mesh.cells[c];
        for link in &cell.interior_links {
            let n = link.cell;
            let d = (mesh.cells[n].centroid - cell.centroid).length().max(1e-14);
            let a = gamma * mesh.faces[link.face].area / d;

            eqn.add(c, c, theta * a);
            eqn.add(c, n, -theta * a);
            eqn.add_source(c, (field.cells[n] - field.cells[c]) * (-(1.0 - theta) * a));
        }
        for link in &cell.boundary_links {
            let face = &mesh.faces[link.face];
            let bc = field.patch_bc(link.patch);
            match bc.bc_type {
                BoundaryType::Fixed => {
                    let d = (face.centroid - cell.centroid).length().max(1e-14);
                    let a = gamma * face.area / d;
                    eqn.add(c, c, theta * a);
                    eqn.add_source(c, bc.value * (-theta * a));
                    eqn.add_source(c, (bc.value - field.cells[c]) * (-(1.0 - theta) * a));
                }
                BoundaryType::NormalGradient => {
                    eqn.add_source(c, bc.value * (-gamma * face.area));
                }
                // Zero diffusive flux through a symmetry plane
                BoundaryType::Symmetry => {}
            }
        }
    }
}

/// Pressure Laplacian `+div(gamma grad p)`, fully implicit.
pub fn poisson(eqn: &mut Equation<f64>, mesh: &Mesh, zone: ZoneId, gamma: f64, p: &ScalarField) {
    for c in mesh.zones.cells(zone) {
        let cell = &mesh.cells[c];
        for link in &cell.interior_links {
            let n = link.cell;
            let d = (mesh.cells[n].centroid - cell.centroid).length().max(1e-14);
            let a = gamma * mesh.faces[link.face].area / d;
            eqn.add(c, c, -a);
            eqn.add(c, n, a);
        }
        for link in &cell.boundary_links {
            let face = &mesh.faces[link.face];
            let bc = p.patch_bc(link.patch);
            match bc.bc_type {
                BoundaryType::Fixed => {
                    let d = (face.centroid - cell.centroid).length().max(1e-14);
                    let a = gamma * face.area / d;
                    eqn.add(c, c, -a);
                    eqn.add_source(c, a * bc.value);
                }
                BoundaryType::NormalGradient => {
                    eqn.add_source(c, gamma * face.area * bc.value);
                }
                BoundaryType::Symmetry => {}
            }
        }
    }
}

/// Velocity divergence source for the pressure equation:
/// `s -= sum_f u_f . S_f`.
pub fn div_source(eqn: &mut Equation<f64>, mesh: &Mesh, zone: ZoneId, u: &VectorField) {
    for c in mesh.zones.cells(zone) {
        let cell = &mesh.cells[c];
        for link in &cell.interior_links {
            eqn.add_source(c, -u.faces[link.face].dot(link.outward_norm));
        }
        for link in &cell.boundary_links {
            eqn.add_source(c, -u.faces[link.face].dot(link.outward_norm));
        }
    }
}

/// Constant body force per unit mass: `s -= V g`.
pub fn body_force(eqn: &mut Equation<DVec2>, mesh: &Mesh, zone: ZoneId, g: DVec2) {
    if g == DVec2::ZERO {
        return;
    }
    for c in mesh.zones.cells(zone) {
        eqn.add_source(c, g * (-mesh.cells[c].volume));
    }
}
