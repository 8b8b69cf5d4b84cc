/// Dense row-major symmetric matrix, enough for the normal equations.
#[derive(Debug, Clone)]
pub(crate) struct SymMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SymMatrix {
    pub(crate) fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub(crate) fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub(crate) fn add(&mut self, i: usize, j: usize, v: f64) {
        self.data[i * self.n + j] += v;
    }

    /// Adds the outer product `x xᵀ`.
    pub(crate) fn add_outer(&mut self, x: &[f64]) {
        for i in 0..self.n {
            let xi = x[i];
            if xi == 0.0 {
                continue;
            }
            for j in 0..self.n {
                self.data[i * self.n + j] += xi * x[j];
            }
        }
    }
}

/// Solves `A x = b` for symmetric positive-definite `A` by Cholesky
/// factorization. Returns `None` when `A` is not positive definite.
pub(crate) fn solve_spd(a: &SymMatrix, b: &[f64]) -> Option<Vec<f64>> {
    let n = a.n;
    debug_assert_eq!(b.len(), n);

    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a.get(i, j);
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i * n + i] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }

    // L z = b
    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * z[k];
        }
        z[i] = sum / l[i * n + i];
    }

    // Lᵀ x = z
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = z[i];
        for k in (i + 1)..n {
            sum -= l[k * n + i] * x[k];
        }
        x[i] = sum / l[i * n + i];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_small_system() {
        // [[4, 2], [2, 3]] x = [2, 1] => x = [0.5, 0]
        let mut a = SymMatrix::zeros(2);
        a.add(0, 0, 4.0);
        a.add(0, 1, 2.0);
        a.add(1, 0, 2.0);
        a.add(1, 1, 3.0);
        let x = solve_spd(&a, &[2.0, 1.0]).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn rejects_singular_matrix() {
        let mut a = SymMatrix::zeros(2);
        a.add_outer(&[1.0, 1.0]);
        assert!(solve_spd(&a, &[1.0, 1.0]).is_none());
    }
}
