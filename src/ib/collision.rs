use glam::DVec2;

use crate::geometry::Aabb;
use crate::ib::object::IbObject;

/// Short-range soft-contact model: a stiffness and an interaction range,
/// no state. The repulsion law is `k * max(0, eps - d)^2` along the line of
/// centres.
pub struct CollisionModel {
    pub stiffness: f64,
    pub range: f64,
}

impl Default for CollisionModel {
    fn default() -> Self {
        Self {
            stiffness: 1e-4,
            range: 0.0,
        }
    }
}

impl CollisionModel {
    pub fn new(stiffness: f64, range: f64) -> Self {
        Self { stiffness, range }
    }

    /// Repulsive force on `a` from `b`. Zero for the self pair and outside
    /// the interaction range. Antisymmetric in (a, b), so action equals
    /// reaction.
    pub fn pair_force(&self, a: &IbObject, b: &IbObject) -> DVec2 {
        if a.id == b.id || self.range <= 0.0 {
            return DVec2::ZERO;
        }

        let d = a.shape.surface_distance(&b.shape);
        if d >= self.range {
            return DVec2::ZERO;
        }

        let axis = a.shape.centroid() - b.shape.centroid();
        let len = axis.length();
        if len < 1e-14 {
            return DVec2::ZERO;
        }

        let overlap = self.range - d;
        self.stiffness * overlap * overlap * axis / len
    }

    /// Repulsive force from the nearest domain wall.
    pub fn wall_force(&self, a: &IbObject, bounds: &Aabb) -> DVec2 {
        if self.range <= 0.0 {
            return DVec2::ZERO;
        }

        let bb = a.shape.aabb();
        // (gap to wall, inward direction) for each side of the bounding box
        let walls = [
            (bb.min.x - bounds.min.x, DVec2::X),
            (bounds.max.x - bb.max.x, -DVec2::X),
            (bb.min.y - bounds.min.y, DVec2::Y),
            (bounds.max.y - bb.max.y, -DVec2::Y),
        ];

        let nearest = walls
            .iter()
            .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        match nearest {
            Some(&(gap, dir)) if gap < self.range => {
                let overlap = self.range - gap.max(0.0);
                self.stiffness * overlap * overlap * dir
            }
            _ => DVec2::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::rectilinear_mesh;
    use crate::geometry::Shape;

    fn body(id: usize, center: DVec2, r: f64) -> (IbObject, crate::discretization::mesh::Mesh) {
        let mut mesh = rectilinear_mesh(4, 4, 4.0, 4.0);
        let fluid = mesh.zones.create_zone("fluid");
        let shape = Shape::circle(center, r).unwrap();
        let obj = IbObject::new(format!("b{id}"), id, shape, 1.0, &mut mesh, fluid);
        (obj, mesh)
    }

    #[test]
    fn newtons_third_law() {
        let (a, _ma) = body(0, DVec2::new(1.0, 1.0), 0.4);
        let (b, _mb) = body(1, DVec2::new(1.7, 1.0), 0.4);
        let model = CollisionModel::new(1e-2, 0.2);

        let f_ab = model.pair_force(&a, &b);
        let f_ba = model.pair_force(&b, &a);
        assert!((f_ab + f_ba).length() < 1e-14);
        assert!(f_ab.length() > 0.0);
        // a is to the left, so it is pushed further left
        assert!(f_ab.x < 0.0);
    }

    #[test]
    fn self_pair_is_skipped() {
        let (a, _m) = body(0, DVec2::new(1.0, 1.0), 0.4);
        let model = CollisionModel::new(1e-2, 0.5);
        assert_eq!(model.pair_force(&a, &a), DVec2::ZERO);
    }

    #[test]
    fn out_of_range_pairs_do_not_interact() {
        let (a, _ma) = body(0, DVec2::new(1.0, 1.0), 0.3);
        let (b, _mb) = body(1, DVec2::new(3.0, 1.0), 0.3);
        let model = CollisionModel::new(1e-2, 0.1);
        assert_eq!(model.pair_force(&a, &b), DVec2::ZERO);
    }

    #[test]
    fn wall_pushes_body_back_inside() {
        let (a, mesh) = body(0, DVec2::new(0.35, 2.0), 0.3);
        let model = CollisionModel::new(1e-2, 0.2);
        let f = model.wall_force(&a, mesh.bounds());
        // Nearest wall is x = 0, force points inward (+x)
        assert!(f.x > 0.0);
        assert!(f.y.abs() < 1e-14);
    }
}
