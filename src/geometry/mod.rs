use glam::DVec2;

use crate::error::Error;

/// Counter-clockwise rotation of a vector by `angle` radians.
pub fn rotate_vec(v: DVec2, angle: f64) -> DVec2 {
    let (s, c) = angle.sin_cos();
    DVec2::new(c * v.x - s * v.y, s * v.x + c * v.y)
}

/// Right-handed perpendicular, `(y, -x)`. For a CCW contour traversal this
/// points out of the enclosed region.
pub fn normal_vec(v: DVec2) -> DVec2 {
    DVec2::new(v.y, -v.x)
}

/// Half-line from `origin` along the unit direction `dir`.
#[derive(Clone, Copy, Debug)]
pub struct Ray2 {
    pub origin: DVec2,
    pub dir: DVec2,
}

impl Ray2 {
    pub fn new(origin: DVec2, dir: DVec2) -> Self {
        Self {
            origin,
            dir: dir.normalize(),
        }
    }

    pub fn point_at(&self, t: f64) -> DVec2 {
        self.origin + t * self.dir
    }
}

/// Axis-aligned bounding box used for broad-phase cell queries.
#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min: DVec2,
    pub max: DVec2,
}

impl Aabb {
    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

#[derive(Clone, Debug)]
pub struct Circle {
    pub center: DVec2,
    pub radius: f64,
}

/// Simple polygon with CCW vertex ordering. Orientation is enforced and
/// self-intersecting input is rejected at construction.
#[derive(Clone, Debug)]
pub struct Polygon {
    verts: Vec<DVec2>,
    centroid: DVec2,
    area: f64,
}

impl Polygon {
    pub fn new(mut verts: Vec<DVec2>) -> Result<Self, Error> {
        if verts.len() < 3 {
            return Err(Error::GeometryDegenerate(format!(
                "polygon needs at least 3 vertices, got {}",
                verts.len()
            )));
        }

        let signed = signed_area(&verts);
        if signed < 0.0 {
            verts.reverse();
        }

        let area = signed.abs();
        if area < 1e-14 {
            return Err(Error::GeometryDegenerate("zero-area polygon".to_string()));
        }

        if is_self_intersecting(&verts) {
            return Err(Error::GeometryDegenerate(
                "self-intersecting polygon".to_string(),
            ));
        }

        let centroid = polygon_centroid(&verts, signed_area(&verts));

        Ok(Self {
            verts,
            centroid,
            area,
        })
    }

    /// Axis-aligned rectangle centered on `center`.
    pub fn rectangle(center: DVec2, width: f64, height: f64) -> Result<Self, Error> {
        let (hw, hh) = (width / 2.0, height / 2.0);
        Self::new(vec![
            center + DVec2::new(-hw, -hh),
            center + DVec2::new(hw, -hh),
            center + DVec2::new(hw, hh),
            center + DVec2::new(-hw, hh),
        ])
    }

    pub fn vertices(&self) -> &[DVec2] {
        &self.verts
    }

    fn edges(&self) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
        let n = self.verts.len();
        (0..n).map(move |i| (self.verts[i], self.verts[(i + 1) % n]))
    }
}

fn signed_area(verts: &[DVec2]) -> f64 {
    let n = verts.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = verts[i];
        let b = verts[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum / 2.0
}

fn polygon_centroid(verts: &[DVec2], signed: f64) -> DVec2 {
    let n = verts.len();
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let a = verts[i];
        let b = verts[(i + 1) % n];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    DVec2::new(cx, cy) / (6.0 * signed)
}

/// Segment-segment proper intersection, excluding shared endpoints.
fn segments_cross(p1: DVec2, p2: DVec2, q1: DVec2, q2: DVec2) -> bool {
    let d = |a: DVec2, b: DVec2, c: DVec2| (b - a).perp_dot(c - a);
    let d1 = d(q1, q2, p1);
    let d2 = d(q1, q2, p2);
    let d3 = d(p1, p2, q1);
    let d4 = d(p1, p2, q2);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn is_self_intersecting(verts: &[DVec2]) -> bool {
    let n = verts.len();
    for i in 0..n {
        let (a1, a2) = (verts[i], verts[(i + 1) % n]);
        for j in i + 1..n {
            // Adjacent edges share an endpoint, skip them
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let (b1, b2) = (verts[j], verts[(j + 1) % n]);
            if segments_cross(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

fn nearest_point_on_segment(p: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-28 {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + t * ab
}

/// A rigid body outline: a circle or a simple CCW polygon. Both variants
/// answer the same set of geometric queries.
#[derive(Clone, Debug)]
pub enum Shape {
    Circle(Circle),
    Polygon(Polygon),
}

impl Shape {
    pub fn circle(center: DVec2, radius: f64) -> Result<Self, Error> {
        if radius <= 0.0 {
            return Err(Error::GeometryDegenerate(format!(
                "circle radius must be positive, got {radius}"
            )));
        }
        Ok(Shape::Circle(Circle { center, radius }))
    }

    pub fn polygon(verts: Vec<DVec2>) -> Result<Self, Error> {
        Ok(Shape::Polygon(Polygon::new(verts)?))
    }

    pub fn centroid(&self) -> DVec2 {
        match self {
            Shape::Circle(c) => c.center,
            Shape::Polygon(p) => p.centroid,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Shape::Circle(c) => std::f64::consts::PI * c.radius * c.radius,
            Shape::Polygon(p) => p.area,
        }
    }

    /// Polar second moment of area about the centroid, for rigid-body
    /// rotation (multiply by density for the mass moment of inertia).
    pub fn second_moment_area(&self) -> f64 {
        match self {
            Shape::Circle(c) => std::f64::consts::PI * c.radius.powi(4) / 2.0,
            Shape::Polygon(p) => {
                // Shoelace-type sums for Ix + Iy about the origin, then
                // shifted to the centroid with the parallel-axis theorem.
                let mut ix = 0.0;
                let mut iy = 0.0;
                for (a, b) in p.edges() {
                    let cross = a.perp_dot(b);
                    ix += cross * (a.y * a.y + a.y * b.y + b.y * b.y);
                    iy += cross * (a.x * a.x + a.x * b.x + b.x * b.x);
                }
                let j_origin = (ix + iy) / 12.0;
                j_origin.abs() - p.area * p.centroid.length_squared()
            }
        }
    }

    pub fn aabb(&self) -> Aabb {
        match self {
            Shape::Circle(c) => Aabb {
                min: c.center - DVec2::splat(c.radius),
                max: c.center + DVec2::splat(c.radius),
            },
            Shape::Polygon(p) => {
                let mut min = DVec2::splat(f64::INFINITY);
                let mut max = DVec2::splat(f64::NEG_INFINITY);
                for v in &p.verts {
                    min = min.min(*v);
                    max = max.max(*v);
                }
                Aabb { min, max }
            }
        }
    }

    pub fn is_inside(&self, p: DVec2) -> bool {
        match self {
            Shape::Circle(c) => (p - c.center).length_squared() < c.radius * c.radius,
            Shape::Polygon(poly) => {
                // Crossing-number test
                let mut inside = false;
                for (a, b) in poly.edges() {
                    if (a.y > p.y) != (b.y > p.y) {
                        let x_int = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                        if p.x < x_int {
                            inside = !inside;
                        }
                    }
                }
                inside
            }
        }
    }

    /// Closest point on the shape boundary to `p`.
    pub fn nearest_intersect(&self, p: DVec2) -> DVec2 {
        match self {
            Shape::Circle(c) => {
                let d = p - c.center;
                let len = d.length();
                if len < 1e-14 {
                    c.center + DVec2::new(c.radius, 0.0)
                } else {
                    c.center + d * (c.radius / len)
                }
            }
            Shape::Polygon(poly) => {
                let mut best = poly.verts[0];
                let mut best_d = f64::INFINITY;
                for (a, b) in poly.edges() {
                    let q = nearest_point_on_segment(p, a, b);
                    let d = (q - p).length_squared();
                    if d < best_d {
                        best_d = d;
                        best = q;
                    }
                }
                best
            }
        }
    }

    /// Unit outward normal of the boundary nearest to `p`.
    pub fn nearest_edge_normal(&self, p: DVec2) -> DVec2 {
        match self {
            Shape::Circle(c) => {
                let d = p - c.center;
                let len = d.length();
                if len < 1e-14 {
                    DVec2::X
                } else {
                    d / len
                }
            }
            Shape::Polygon(poly) => {
                let mut best_n = DVec2::X;
                let mut best_d = f64::INFINITY;
                for (a, b) in poly.edges() {
                    let q = nearest_point_on_segment(p, a, b);
                    let d = (q - p).length_squared();
                    if d < best_d {
                        best_d = d;
                        best_n = normal_vec(b - a).normalize();
                    }
                }
                best_n
            }
        }
    }

    /// Ray-boundary intersection points, ordered by ray parameter.
    pub fn intersections(&self, ray: &Ray2) -> Vec<DVec2> {
        let mut ts: Vec<f64> = Vec::new();

        match self {
            Shape::Circle(c) => {
                let oc = ray.origin - c.center;
                let b = oc.dot(ray.dir);
                let disc = b * b - (oc.length_squared() - c.radius * c.radius);
                if disc >= 0.0 {
                    let sq = disc.sqrt();
                    for t in [-b - sq, -b + sq] {
                        if t >= 0.0 {
                            ts.push(t);
                        }
                    }
                }
            }
            Shape::Polygon(poly) => {
                for (a, b) in poly.edges() {
                    let e = b - a;
                    let denom = ray.dir.perp_dot(e);
                    if denom.abs() < 1e-14 {
                        continue;
                    }
                    let ao = a - ray.origin;
                    let t = ao.perp_dot(e) / denom;
                    let s = ao.perp_dot(ray.dir) / denom;
                    if t >= 0.0 && (0.0..=1.0).contains(&s) {
                        ts.push(t);
                    }
                }
            }
        }

        ts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        ts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
        ts.iter().map(|&t| ray.point_at(t)).collect()
    }

    /// Scale about the centroid.
    pub fn scale(&mut self, factor: f64) {
        match self {
            Shape::Circle(c) => c.radius *= factor,
            Shape::Polygon(p) => {
                let c = p.centroid;
                for v in &mut p.verts {
                    *v = c + factor * (*v - c);
                }
                p.area *= factor * factor;
            }
        }
    }

    /// Rotate about the centroid by `angle` radians.
    pub fn rotate(&mut self, angle: f64) {
        if let Shape::Polygon(p) = self {
            let c = p.centroid;
            for v in &mut p.verts {
                *v = c + rotate_vec(*v - c, angle);
            }
        }
    }

    pub fn translate(&mut self, dx: DVec2) {
        match self {
            Shape::Circle(c) => c.center += dx,
            Shape::Polygon(p) => {
                for v in &mut p.verts {
                    *v += dx;
                }
                p.centroid += dx;
            }
        }
    }

    pub fn move_to(&mut self, centroid: DVec2) {
        self.translate(centroid - self.centroid());
    }

    pub fn perimeter(&self) -> f64 {
        match self {
            Shape::Circle(c) => 2.0 * std::f64::consts::PI * c.radius,
            Shape::Polygon(p) => p.edges().map(|(a, b)| (b - a).length()).sum(),
        }
    }

    /// Arc-length position of a boundary point along the contour, measured
    /// CCW. Monotone along the contour even on straight edges, which makes
    /// it a total ordering for surface samples.
    pub fn contour_parameter(&self, p: DVec2) -> f64 {
        match self {
            Shape::Circle(c) => {
                let d = p - c.center;
                let theta = d.y.atan2(d.x).rem_euclid(2.0 * std::f64::consts::PI);
                theta * c.radius
            }
            Shape::Polygon(poly) => {
                let mut best = 0.0;
                let mut best_d = f64::INFINITY;
                let mut walked = 0.0;
                for (a, b) in poly.edges() {
                    let q = nearest_point_on_segment(p, a, b);
                    let d = (q - p).length_squared();
                    if d < best_d {
                        best_d = d;
                        best = walked + (q - a).length();
                    }
                    walked += (b - a).length();
                }
                best
            }
        }
    }

    /// Shortest distance between the boundaries of two shapes, clamped at
    /// zero when they touch or overlap.
    pub fn surface_distance(&self, other: &Shape) -> f64 {
        let d = match (self, other) {
            (Shape::Circle(a), Shape::Circle(b)) => {
                (a.center - b.center).length() - a.radius - b.radius
            }
            (Shape::Circle(c), Shape::Polygon(p)) | (Shape::Polygon(p), Shape::Circle(c)) => {
                let mut min_d = f64::INFINITY;
                for (a, b) in p.edges() {
                    let q = nearest_point_on_segment(c.center, a, b);
                    min_d = min_d.min((q - c.center).length() - c.radius);
                }
                min_d
            }
            (Shape::Polygon(a), Shape::Polygon(b)) => {
                let mut min_d = f64::INFINITY;
                for v in &a.verts {
                    let q = other.nearest_intersect(*v);
                    min_d = min_d.min((q - *v).length());
                }
                for v in &b.verts {
                    let q = self.nearest_intersect(*v);
                    min_d = min_d.min((q - *v).length());
                }
                min_d
            }
        };
        d.max(0.0)
    }
}
