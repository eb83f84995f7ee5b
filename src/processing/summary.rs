use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::discretization::mesh::Mesh;
use crate::ib::ImmersedBoundarySet;
use crate::solver::fractional_step::StepReport;

/// End-of-run record: mesh and body counts plus the final step's residuals
/// and stability numbers, written next to the CSV output.
pub struct RunSummary {
    pub num_cells: usize,
    pub num_faces: usize,
    pub num_nodes: usize,
    pub num_bodies: usize,
    pub num_ib_cells: usize,
    pub num_solid_cells: usize,
    pub steps: usize,
    pub final_time: f64,
    pub final_dt: f64,
    pub final_u_residual: f64,
    pub final_p_residual: f64,
    pub final_max_divergence: f64,
    pub final_max_cfl: f64,
}

impl RunSummary {
    pub fn collect(mesh: &Mesh, ib: &ImmersedBoundarySet, steps: usize, last: &StepReport) -> Self {
        Self {
            num_cells: mesh.cells.len(),
            num_faces: mesh.faces.len(),
            num_nodes: mesh.nodes.len(),
            num_bodies: ib.objects.len(),
            num_ib_cells: ib.ib_cells().len(),
            num_solid_cells: ib.solid_cells().len(),
            steps,
            final_time: last.time,
            final_dt: last.dt,
            final_u_residual: last.u_residual,
            final_p_residual: last.p_residual,
            final_max_divergence: last.max_divergence,
            final_max_cfl: last.max_cfl,
        }
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = File::create(path)?;
        write!(file, "{}", self.render())
    }

    pub fn print_to_console(&self) {
        print!("{}", self.render());
    }

    fn render(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("{}\n", "=".repeat(50)));
        s.push_str(&format!("{:^50}\n", "RUN SUMMARY"));
        s.push_str(&format!("{}\n", "=".repeat(50)));
        s.push_str(&format!(
            "Mesh: {} cells, {} faces, {} nodes\n",
            self.num_cells, self.num_faces, self.num_nodes
        ));
        s.push_str(&format!(
            "Bodies: {} ({} interface cells, {} solid cells)\n",
            self.num_bodies, self.num_ib_cells, self.num_solid_cells
        ));
        s.push_str(&format!(
            "Steps: {} to t = {:.4e} (last dt = {:.3e})\n",
            self.steps, self.final_time, self.final_dt
        ));
        s.push_str(&format!(
            "Final residuals: u = {:.3e}, p = {:.3e}\n",
            self.final_u_residual, self.final_p_residual
        ));
        s.push_str(&format!(
            "Max divergence = {:.4e}, max CFL = {:.4}\n",
            self.final_max_divergence, self.final_max_cfl
        ));
        s.push_str(&format!("{}\n", "=".repeat(50)));
        s
    }
}
