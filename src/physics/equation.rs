use glam::DVec2;

use crate::error::Error;
use crate::numerics::linear::{solve_csr, LinearSolveParams};

/// Values a sparse system can be solved for. Vector systems share one scalar
/// coefficient matrix and solve per component.
pub trait SystemValue: Copy + Default + std::ops::AddAssign + std::ops::Neg<Output = Self> {
    const COMPONENTS: usize;
    fn component(&self, k: usize) -> f64;
    fn set_component(&mut self, k: usize, v: f64);
}

impl SystemValue for f64 {
    const COMPONENTS: usize = 1;

    fn component(&self, _k: usize) -> f64 {
        *self
    }

    fn set_component(&mut self, _k: usize, v: f64) {
        *self = v;
    }
}

impl SystemValue for DVec2 {
    const COMPONENTS: usize = 2;

    fn component(&self, k: usize) -> f64 {
        if k == 0 {
            self.x
        } else {
            self.y
        }
    }

    fn set_component(&mut self, k: usize, v: f64) {
        if k == 0 {
            self.x = v;
        } else {
            self.y = v;
        }
    }
}

/// Sparse-linear-system accumulator over cells.
///
/// Every row states a residual `R = sum_k a_k * phi_{c_k} + s = 0`;
/// [`Equation::solve`] solves `A phi = -s`. Assemblers only ever append
/// coefficients and sources, so independently built equations (interior
/// scheme + immersed-boundary rows) compose by summation.
pub struct Equation<T: SystemValue> {
    name: String,
    rows: Vec<Vec<(usize, f64)>>,
    sources: Vec<T>,
}

impl<T: SystemValue> Equation<T> {
    pub fn new(name: impl Into<String>, n_rows: usize) -> Self {
        Self {
            name: name.into(),
            rows: vec![Vec::new(); n_rows],
            sources: vec![T::default(); n_rows],
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, row: usize, col: usize, coeff: f64) {
        self.rows[row].push((col, coeff));
    }

    pub fn add_row(&mut self, row: usize, cols: &[usize], coeffs: &[f64]) {
        debug_assert_eq!(cols.len(), coeffs.len());
        for (&c, &a) in cols.iter().zip(coeffs) {
            self.rows[row].push((c, a));
        }
    }

    pub fn add_source(&mut self, row: usize, value: T) {
        self.sources[row] += value;
    }

    /// Whether any coefficient was assembled into `row`.
    pub fn row_is_empty(&self, row: usize) -> bool {
        self.rows[row].is_empty()
    }

    /// Compress to CSR, merging duplicate column entries.
    fn to_csr(&self) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        let n = self.rows.len();
        let mut indptr = Vec::with_capacity(n + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        let mut scratch: Vec<(usize, f64)> = Vec::new();
        for row in &self.rows {
            scratch.clear();
            scratch.extend_from_slice(row);
            scratch.sort_unstable_by_key(|&(c, _)| c);

            let mut it = scratch.iter();
            if let Some(&(mut col, mut acc)) = it.next() {
                for &(c, a) in it {
                    if c == col {
                        acc += a;
                    } else {
                        indices.push(col);
                        data.push(acc);
                        col = c;
                        acc = a;
                    }
                }
                indices.push(col);
                data.push(acc);
            }
            indptr.push(indices.len());
        }
        (indptr, indices, data)
    }

    /// Solve `A phi = -s` component-wise and write the solution back into
    /// `values`, which doubles as the initial guess. Returns the worst
    /// per-component final residual reported by the linear solver.
    pub fn solve(&self, values: &mut [T], params: &LinearSolveParams) -> Result<f64, Error> {
        assert_eq!(values.len(), self.rows.len());
        let n = self.rows.len();
        let (indptr, indices, data) = self.to_csr();

        let mut worst = 0.0f64;
        for k in 0..T::COMPONENTS {
            let rhs: Vec<f64> = self.sources.iter().map(|s| -s.component(k)).collect();
            let mut x: Vec<f64> = values.iter().map(|v| v.component(k)).collect();

            let residual = solve_csr(
                &self.name,
                n,
                &indptr,
                &indices,
                &data,
                &rhs,
                &mut x,
                params,
            )?;
            worst = worst.max(residual);

            for (v, xi) in values.iter_mut().zip(&x) {
                v.set_component(k, *xi);
            }
        }
        Ok(worst)
    }
}

impl<T: SystemValue> std::ops::AddAssign for Equation<T> {
    fn add_assign(&mut self, rhs: Self) {
        assert_eq!(self.rows.len(), rhs.rows.len());
        for (mine, theirs) in self.rows.iter_mut().zip(rhs.rows) {
            mine.extend(theirs);
        }
        for (mine, theirs) in self.sources.iter_mut().zip(rhs.sources) {
            *mine += theirs;
        }
    }
}
