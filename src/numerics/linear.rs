use std::sync::Arc;

use kryst::solver::LinearSolver;
use kryst::{
    parallel::{NoComm, UniverseComm},
    preconditioner::PcSide,
};

use crate::error::Error;
use crate::numerics::timing::record_solve;

/// Tolerance and iteration cap for one sparse solve.
#[derive(Clone, Copy, Debug)]
pub struct LinearSolveParams {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LinearSolveParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 2000,
        }
    }
}

/// Solve `A x = b` for one CSR system with BiCGStab, after Jacobi row
/// scaling to tame the mix of scheme rows and identity rows. `x` carries the
/// initial guess in and the solution out. Returns the unscaled final
/// residual norm.
#[allow(clippy::too_many_arguments)]
pub fn solve_csr(
    system: &str,
    n: usize,
    indptr: &[usize],
    indices: &[usize],
    data: &[f64],
    rhs: &[f64],
    x: &mut [f64],
    params: &LinearSolveParams,
) -> Result<f64, Error> {
    if !rhs.iter().all(|v| v.is_finite()) {
        return Err(Error::LinearSolveDiverged {
            system: system.to_string(),
            detail: "right-hand side contains NaN or Inf".to_string(),
        });
    }

    // Row scaling factors from the diagonal
    let d: Vec<f64> = (0..n)
        .map(|row| {
            let diag = (indptr[row]..indptr[row + 1])
                .find(|&idx| indices[idx] == row)
                .map(|idx| data[idx])
                .unwrap_or(1.0);
            if diag.abs() < 1e-14 {
                1.0
            } else {
                diag
            }
        })
        .collect();

    let mut scaled = data.to_vec();
    for row in 0..n {
        let inv = 1.0 / d[row];
        for idx in indptr[row]..indptr[row + 1] {
            scaled[idx] *= inv;
        }
    }
    let b: Vec<f64> = rhs.iter().zip(&d).map(|(v, di)| v / di).collect();

    let csr =
        kryst::matrix::sparse::CsrMatrix::from_csr(n, n, indptr.to_vec(), indices.to_vec(), scaled);
    let op = kryst::matrix::op::CsrOp::new(Arc::new(csr));

    let mut solver = kryst::solver::bicgstab::BiCgStabSolver::new(
        params.tolerance,
        params.max_iterations,
    );
    let mut workspace = kryst::context::ksp_context::Workspace::new(n);
    solver.setup_workspace(&mut workspace);

    let result = record_solve(|| {
        solver.solve(
            &op,
            None,
            &b,
            x,
            PcSide::Left,
            &UniverseComm::NoComm(NoComm {}),
            None,
            Some(&mut workspace),
        )
    });

    if let Err(e) = result {
        return Err(Error::LinearSolveDiverged {
            system: system.to_string(),
            detail: format!("{e:?}"),
        });
    }

    if !x.iter().all(|v| v.is_finite()) {
        return Err(Error::LinearSolveDiverged {
            system: system.to_string(),
            detail: "solution contains NaN or Inf".to_string(),
        });
    }

    // Unscaled residual norm, computed directly on the CSR arrays
    let mut res_sq = 0.0;
    for row in 0..n {
        let mut ax = 0.0;
        for idx in indptr[row]..indptr[row + 1] {
            ax += data[idx] * x[indices[idx]];
        }
        let r = rhs[row] - ax;
        res_sq += r * r;
    }
    Ok(res_sq.sqrt())
}
