use glam::DVec2;

use crate::geometry::Shape;

/// Rigid-body kinematics of one immersed boundary. Motions are plain value
/// objects; the shape they drive is passed into every call, so nothing here
/// refers back to the owning body.
pub enum Motion {
    /// Constant velocity plus optional constant acceleration.
    Translating {
        velocity: DVec2,
        acceleration: DVec2,
    },
    /// Per-component harmonic oscillation about the starting centroid,
    /// `x(t) = x0 + A sin(omega t + phi)`.
    Oscillating {
        frequency: DVec2,
        amplitude: DVec2,
        phase: DVec2,
        origin: DVec2,
        time: f64,
    },
    /// Free body driven by the integrated fluid force and torque plus
    /// gravity, advanced by semi-implicit Euler.
    SolidBody {
        velocity: DVec2,
        omega: f64,
        gravity: DVec2,
        mass: f64,
        moment_of_inertia: f64,
        acceleration: DVec2,
        angular_acceleration: f64,
    },
}

impl Motion {
    pub fn translating(velocity: DVec2, acceleration: DVec2) -> Self {
        Motion::Translating {
            velocity,
            acceleration,
        }
    }

    pub fn oscillating(frequency: DVec2, amplitude: DVec2, phase: DVec2, origin: DVec2) -> Self {
        Motion::Oscillating {
            frequency,
            amplitude,
            phase,
            origin,
            time: 0.0,
        }
    }

    /// Mass and moment of inertia derive from the body density and shape.
    pub fn solid_body(velocity: DVec2, gravity: DVec2, rho: f64, shape: &Shape) -> Self {
        Motion::SolidBody {
            velocity,
            omega: 0.0,
            gravity,
            mass: rho * shape.area(),
            moment_of_inertia: rho * shape.second_moment_area(),
            acceleration: DVec2::ZERO,
            angular_acceleration: 0.0,
        }
    }

    /// Velocity of the body surface at point `p`.
    pub fn velocity(&self, p: DVec2, centroid: DVec2) -> DVec2 {
        match self {
            Motion::Translating { velocity, .. } => *velocity,
            Motion::Oscillating {
                frequency,
                amplitude,
                phase,
                time,
                ..
            } => {
                let arg = *frequency * *time + *phase;
                DVec2::new(
                    amplitude.x * frequency.x * arg.x.cos(),
                    amplitude.y * frequency.y * arg.y.cos(),
                )
            }
            Motion::SolidBody {
                velocity, omega, ..
            } => {
                let r = p - centroid;
                *velocity + *omega * DVec2::new(-r.y, r.x)
            }
        }
    }

    /// Acceleration of the body surface at point `p`.
    pub fn acceleration(&self, p: DVec2, centroid: DVec2) -> DVec2 {
        match self {
            Motion::Translating { acceleration, .. } => *acceleration,
            Motion::Oscillating {
                frequency,
                amplitude,
                phase,
                time,
                ..
            } => {
                let arg = *frequency * *time + *phase;
                DVec2::new(
                    -amplitude.x * frequency.x * frequency.x * arg.x.sin(),
                    -amplitude.y * frequency.y * frequency.y * arg.y.sin(),
                )
            }
            Motion::SolidBody {
                acceleration,
                omega,
                ..
            } => {
                let r = p - centroid;
                *acceleration - *omega * *omega * r
            }
        }
    }

    /// Advance the kinematic state over `dt` and move `shape` accordingly.
    /// `applied_force` and `applied_torque` are the integrated hydrodynamic
    /// and collision loads from the previous step; only the free body uses
    /// them.
    pub fn advance(&mut self, shape: &mut Shape, dt: f64, applied_force: DVec2, applied_torque: f64) {
        match self {
            Motion::Translating {
                velocity,
                acceleration,
            } => {
                shape.translate(*velocity * dt + 0.5 * *acceleration * dt * dt);
                *velocity += *acceleration * dt;
            }
            Motion::Oscillating {
                frequency,
                amplitude,
                phase,
                origin,
                time,
            } => {
                *time += dt;
                let arg = *frequency * *time + *phase;
                let offset = DVec2::new(amplitude.x * arg.x.sin(), amplitude.y * arg.y.sin());
                shape.move_to(*origin + offset);
            }
            Motion::SolidBody {
                velocity,
                omega,
                gravity,
                mass,
                moment_of_inertia,
                acceleration,
                angular_acceleration,
            } => {
                *acceleration = applied_force / *mass + *gravity;
                *velocity += *acceleration * dt;
                shape.translate(*velocity * dt);

                *angular_acceleration = if *moment_of_inertia > 0.0 {
                    applied_torque / *moment_of_inertia
                } else {
                    0.0
                };
                *omega += *angular_acceleration * dt;
                shape.rotate(*omega * dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translating_body_moves_at_constant_velocity() {
        let mut shape = Shape::circle(DVec2::ZERO, 0.5).unwrap();
        let mut motion = Motion::translating(DVec2::new(1.0, 0.0), DVec2::ZERO);
        for _ in 0..10 {
            motion.advance(&mut shape, 0.1, DVec2::ZERO, 0.0);
        }
        assert!((shape.centroid() - DVec2::new(1.0, 0.0)).length() < 1e-12);
        assert!((motion.velocity(shape.centroid(), shape.centroid()) - DVec2::X).length() < 1e-12);
    }

    #[test]
    fn oscillating_body_returns_to_origin_after_a_period() {
        let mut shape = Shape::circle(DVec2::new(0.3, 0.3), 0.1).unwrap();
        let omega = 2.0 * std::f64::consts::PI;
        let mut motion = Motion::oscillating(
            DVec2::splat(omega),
            DVec2::new(0.1, 0.0),
            DVec2::ZERO,
            shape.centroid(),
        );
        let n = 1000;
        let dt = 1.0 / n as f64;
        for _ in 0..n {
            motion.advance(&mut shape, dt, DVec2::ZERO, 0.0);
        }
        assert!((shape.centroid() - DVec2::new(0.3, 0.3)).length() < 1e-9);
    }

    #[test]
    fn free_fall_under_gravity() {
        let mut shape = Shape::circle(DVec2::ZERO, 0.1).unwrap();
        let g = DVec2::new(0.0, -9.81);
        let mut motion = Motion::solid_body(DVec2::ZERO, g, 2.0, &shape);
        let dt = 1e-3;
        for _ in 0..1000 {
            motion.advance(&mut shape, dt, DVec2::ZERO, 0.0);
        }
        // Semi-implicit Euler free fall over 1 s
        let expect_v = -9.81;
        match motion {
            Motion::SolidBody { velocity, .. } => {
                assert!((velocity.y - expect_v).abs() < 1e-9);
            }
            _ => unreachable!(),
        }
        assert!(shape.centroid().y < -4.8 && shape.centroid().y > -5.0);
    }

    #[test]
    fn surface_velocity_includes_rotation() {
        let shape = Shape::circle(DVec2::ZERO, 1.0).unwrap();
        let mut motion = Motion::solid_body(DVec2::ZERO, DVec2::ZERO, 1.0, &shape);
        if let Motion::SolidBody { omega, .. } = &mut motion {
            *omega = 2.0;
        }
        let v = motion.velocity(DVec2::new(1.0, 0.0), DVec2::ZERO);
        assert!((v - DVec2::new(0.0, 2.0)).length() < 1e-12);
    }
}
