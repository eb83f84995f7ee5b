use std::fs;

use glam::DVec2;

use ibfvm_rs::config::{CaseConfig, GeometryConfig, IbConfig, IbObjectConfig, ShapeConfig};
use ibfvm_rs::discretization::generator::rectilinear_mesh;
use ibfvm_rs::parallel::SerialComm;
use ibfvm_rs::physics::BoundaryType;
use ibfvm_rs::processing::summary::RunSummary;
use ibfvm_rs::processing::writer::{self, BodyHistoryWriter};
use ibfvm_rs::solver::fractional_step::FractionalStep;
use ibfvm_rs::Error;

/// Uniform flow past a stationary circular cylinder at Re = 20 in a 2 x 1
/// channel, the reference configuration for the immersed-boundary force
/// integration.
fn main() {
    if let Err(e) = run() {
        eprintln!("run failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    fs::create_dir_all("output/cylinder")?;

    let inflow = 1.0;
    let radius = 0.1;

    let case = CaseConfig {
        rho: 1.0,
        mu: 0.01, // Re = U * 2R / nu = 20
        initial_dt: 2e-3,
        max_dt: 5e-3,
        max_cfl: 0.4,
        ..CaseConfig::default()
    };

    let cylinder = IbObjectConfig::new(
        "cylinder",
        ShapeConfig::new(GeometryConfig::Circle {
            center: DVec2::new(0.5, 0.5),
            radius,
        }),
    )
    .with_rho(1.0);

    let ib_cfg = IbConfig {
        objects: vec![cylinder],
        array: None,
        collisions: None,
    };

    let mesh = rectilinear_mesh(160, 80, 2.0, 1.0);
    let mut solver = FractionalStep::new(&case, &ib_cfg, mesh, Box::new(SerialComm))?;

    // Channel boundary conditions: inflow left, outflow right, slip walls
    let left = solver.mesh.patch_named("left").map(|p| p.id);
    let right = solver.mesh.patch_named("right").map(|p| p.id);
    let bottom = solver.mesh.patch_named("bottom").map(|p| p.id);
    let top = solver.mesh.patch_named("top").map(|p| p.id);
    for (patch, u_bc, p_bc) in [
        (left, BoundaryType::Fixed, BoundaryType::NormalGradient),
        (right, BoundaryType::NormalGradient, BoundaryType::Fixed),
        (bottom, BoundaryType::Symmetry, BoundaryType::NormalGradient),
        (top, BoundaryType::Symmetry, BoundaryType::NormalGradient),
    ] {
        let patch = patch.ok_or_else(|| {
            Error::InvalidConfiguration("channel mesh is missing a patch".to_string())
        })?;
        solver
            .u
            .set_patch_bc(patch, u_bc, DVec2::new(inflow, 0.0));
        solver.p.set_patch_bc(patch, p_bc, 0.0);
    }

    // Impulsive start
    for c in solver.mesh.zones.cells(solver.fluid_zone()).collect::<Vec<_>>() {
        solver.u.cells[c] = DVec2::new(inflow, 0.0);
    }
    solver.initialize();

    let mut history = BodyHistoryWriter::create("output/cylinder", &solver.ib)?;

    let t_end = 8.0;
    let write_every = 50;
    let mut dt = case.initial_dt;
    let mut last = None;
    let run_start = std::time::Instant::now();

    println!("Starting cylinder run: t = 0 -> {t_end}");
    while solver.time < t_end {
        let report = solver.advance(dt)?;
        history.append(report.time, &solver.ib)?;

        if solver.step % write_every == 0 {
            println!(
                "Step {:>5} | t = {:.4e} | dt = {:.3e} | div = {:.3e} | CFL = {:.3}",
                solver.step, report.time, report.dt, report.max_divergence, report.max_cfl
            );
            writer::write_cell_status(
                format!("output/cylinder/status_{:06}.csv", solver.step),
                &solver.mesh,
                &solver.ib.cell_status,
            )?;
        }

        dt = solver.compute_max_time_step(case.max_cfl, report.dt);
        last = Some(report);
    }
    history.flush()?;
    ibfvm_rs::numerics::timing::finalize_and_print(run_start.elapsed());

    if let Some(report) = last {
        let drag = solver.ib.objects[0].force.x;
        let cd = drag / (0.5 * case.rho * inflow * inflow * 2.0 * radius);
        println!("Final drag = {drag:.6e} (Cd = {cd:.4})");

        let summary = RunSummary::collect(&solver.mesh, &solver.ib, solver.step, &report);
        summary.write_to_file("output/cylinder/summary.txt")?;
        summary.print_to_console();
    }
    println!("Output written to output/cylinder/");

    Ok(())
}
