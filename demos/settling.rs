//! Two circles settling under gravity in a closed tank, with the
//! soft-contact collision model keeping them apart as the lower one packs
//! against the bottom wall.

use std::fs;

use glam::DVec2;

use ibfvm_rs::config::{
    CaseConfig, CollisionConfig, GeometryConfig, IbConfig, IbObjectConfig, MotionConfig,
    ShapeConfig,
};
use ibfvm_rs::discretization::generator::rectilinear_mesh;
use ibfvm_rs::parallel::SerialComm;
use ibfvm_rs::physics::BoundaryType;
use ibfvm_rs::processing::writer::BodyHistoryWriter;
use ibfvm_rs::solver::fractional_step::FractionalStep;
use ibfvm_rs::Error;

fn main() {
    if let Err(e) = run() {
        eprintln!("run failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    fs::create_dir_all("output/settling")?;

    let radius = 0.05;
    let case = CaseConfig {
        rho: 1.0,
        mu: 0.05,
        gravity: DVec2::new(0.0, -9.81),
        initial_dt: 5e-4,
        max_dt: 1e-3,
        max_cfl: 0.3,
        ..CaseConfig::default()
    };

    let circle = |name: &str, y: f64| {
        IbObjectConfig::new(
            name,
            ShapeConfig::new(GeometryConfig::Circle {
                center: DVec2::new(0.5, y),
                radius,
            }),
        )
        .with_rho(1.1)
        .with_motion(MotionConfig::SolidBody {
            velocity: DVec2::ZERO,
        })
    };

    let ib_cfg = IbConfig {
        objects: vec![circle("lower", 0.8), circle("upper", 0.8 + 2.2 * radius)],
        array: None,
        collisions: Some(CollisionConfig {
            stiffness: 1e-2,
            range: 0.05 * radius,
        }),
    };

    let mesh = rectilinear_mesh(80, 80, 1.0, 1.0);
    let mut solver = FractionalStep::new(&case, &ib_cfg, mesh, Box::new(SerialComm))?;

    for name in ["left", "right", "bottom", "top"] {
        let patch = solver
            .mesh
            .patch_named(name)
            .ok_or_else(|| Error::InvalidConfiguration("missing patch".to_string()))?
            .id;
        solver.u.set_patch_bc(patch, BoundaryType::Fixed, DVec2::ZERO);
        solver.p.set_patch_bc(patch, BoundaryType::NormalGradient, 0.0);
    }
    solver.set_pressure_reference(0, 0.0);
    solver.initialize();

    let mut history = BodyHistoryWriter::create("output/settling", &solver.ib)?;

    let t_end = 1.5;
    let mut dt = case.initial_dt;

    println!("Starting settling run: t = 0 -> {t_end}");
    while solver.time < t_end {
        let report = solver.advance(dt)?;
        history.append(report.time, &solver.ib)?;

        let gap = solver.ib.objects[0]
            .shape
            .surface_distance(&solver.ib.objects[1].shape);
        if solver.step % 100 == 0 {
            println!(
                "Step {:>5} | t = {:.4e} | dt = {:.3e} | gap = {:.4e} | y = ({:.4}, {:.4})",
                solver.step,
                report.time,
                report.dt,
                gap,
                solver.ib.objects[0].shape.centroid().y,
                solver.ib.objects[1].shape.centroid().y
            );
        }

        dt = solver.compute_max_time_step(case.max_cfl, report.dt);
    }
    history.flush()?;

    println!("Final centroids:");
    for obj in &solver.ib.objects {
        let c = obj.shape.centroid();
        println!("  {:<8} ({:.4}, {:.4})", obj.name, c.x, c.y);
    }
    Ok(())
}
