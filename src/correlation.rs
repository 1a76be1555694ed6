//! Cross-location correlation for the joint-draw portfolio path.
//!
//! Correlated standard normals are produced as `x = L·z` where `L` is the
//! lower Cholesky factor of the correlation matrix and `z` is i.i.d.
//! `N(0, 1)`.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Result, RiskError};

/// Symmetry / diagonal tolerance for explicit matrices.
const ENTRY_TOL: f64 = 1e-9;
/// Pivot tolerance in the factorisation. Pivots in `[-PIVOT_TOL, PIVOT_TOL]`
/// are treated as exact zeros (rank-deficient but PSD).
const PIVOT_TOL: f64 = 1e-10;

/// Square, symmetric, unit-diagonal matrix with entries in `[-1, 1]`.
/// Row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    n: usize,
    data: Vec<f64>,
}

impl CorrelationMatrix {
    /// Validate an explicit matrix.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(RiskError::invalid(format!(
                "correlation matrix must be square: row {i} has {} entries, expected {n}",
                row.len()
            )));
        }
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        let m = CorrelationMatrix { n, data };
        for i in 0..n {
            if (m.get(i, i) - 1.0).abs() > ENTRY_TOL {
                return Err(RiskError::invalid(format!(
                    "correlation matrix diagonal must be 1, got {} at ({i}, {i})",
                    m.get(i, i)
                )));
            }
            for j in 0..i {
                let (a, b) = (m.get(i, j), m.get(j, i));
                if !(a.is_finite() && (-1.0..=1.0).contains(&a)) {
                    return Err(RiskError::invalid(format!("correlation {a} at ({i}, {j}) outside [-1, 1]")));
                }
                if (a - b).abs() > ENTRY_TOL {
                    return Err(RiskError::invalid(format!(
                        "correlation matrix not symmetric at ({i}, {j}): {a} vs {b}"
                    )));
                }
            }
        }
        Ok(m)
    }

    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        CorrelationMatrix { n, data }
    }

    /// Every off-diagonal entry equal to `rho`. Only PSD for
    /// `rho >= -1/(n-1)`; that is checked by [`Self::cholesky`], not here.
    pub fn uniform(n: usize, rho: f64) -> Result<Self> {
        if !(rho.is_finite() && (-1.0..=1.0).contains(&rho)) {
            return Err(RiskError::invalid(format!("correlation must lie in [-1, 1], got {rho}")));
        }
        let mut data = vec![rho; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Ok(CorrelationMatrix { n, data })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Lower-triangular `L` with `L·Lᵀ = self`.
    ///
    /// Semi-definite matrices factor with zero columns where a pivot vanishes;
    /// a negative pivot, or a vanished pivot whose column does not vanish,
    /// means the matrix is indefinite.
    pub fn cholesky(&self) -> Result<CholeskyFactor> {
        let n = self.n;
        let mut l = vec![0.0_f64; n * n];
        for j in 0..n {
            let pivot = self.get(j, j) - (0..j).map(|k| l[j * n + k].powi(2)).sum::<f64>();
            if pivot < -PIVOT_TOL {
                return Err(RiskError::invalid(format!(
                    "correlation matrix is not positive semi-definite (pivot {pivot:.3e} at column {j})"
                )));
            }
            let diag = if pivot > PIVOT_TOL { pivot.sqrt() } else { 0.0 };
            l[j * n + j] = diag;
            for i in (j + 1)..n {
                let residual = self.get(i, j) - (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum::<f64>();
                if diag == 0.0 {
                    if residual.abs() > PIVOT_TOL.sqrt() {
                        return Err(RiskError::invalid(format!(
                            "correlation matrix is not positive semi-definite (rows {j}, {i})"
                        )));
                    }
                } else {
                    l[i * n + j] = residual / diag;
                }
            }
        }
        Ok(CholeskyFactor { n, lower: l })
    }
}

/// Lower Cholesky factor of a [`CorrelationMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    n: usize,
    lower: Vec<f64>,
}

impl CholeskyFactor {
    pub fn dim(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.lower[i * self.n + j]
    }

    /// `out = L·z`. Both slices must have length `dim()`.
    pub fn apply(&self, z: &[f64], out: &mut [f64]) {
        let n = self.n;
        for (i, o) in out.iter_mut().enumerate().take(n) {
            *o = self.lower[i * n..i * n + i + 1].iter().zip(z).map(|(a, b)| a * b).sum();
        }
    }

    /// Draw one vector of correlated standard normals into `out`, using
    /// `scratch` for the independent draws.
    pub fn sample_into<R: Rng + ?Sized>(&self, rng: &mut R, scratch: &mut [f64], out: &mut [f64]) {
        for z in scratch.iter_mut() {
            *z = StandardNormal.sample(rng);
        }
        self.apply(scratch, out);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn reconstruct(f: &CholeskyFactor, i: usize, j: usize) -> f64 {
        (0..f.dim()).map(|k| f.get(i, k) * f.get(j, k)).sum()
    }

    #[test]
    fn identity_factors_to_identity() {
        let f = CorrelationMatrix::identity(4).cholesky().unwrap();
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(f.get(i, j), if i == j { 1.0 } else { 0.0 });
            }
        }
    }

    #[test]
    fn uniform_factor_reconstructs_matrix() {
        let m = CorrelationMatrix::uniform(5, 0.3).unwrap();
        let f = m.cholesky().unwrap();
        for i in 0..5 {
            for j in 0..5 {
                assert!(
                    (reconstruct(&f, i, j) - m.get(i, j)).abs() < 1e-12,
                    "L·Lᵀ differs from the matrix at ({i}, {j})"
                );
                if j > i {
                    assert_eq!(f.get(i, j), 0.0, "factor must be lower-triangular");
                }
            }
        }
    }

    #[test]
    fn perfect_correlation_is_semi_definite() {
        let m = CorrelationMatrix::uniform(3, 1.0).unwrap();
        let f = m.cholesky().unwrap();
        let mut out = [0.0; 3];
        f.apply(&[0.7, -2.0, 5.0], &mut out);
        assert!(out.iter().all(|&x| (x - 0.7).abs() < 1e-12), "ρ = 1 copies the first draw: {out:?}");
    }

    #[test]
    fn anti_correlated_pair_is_semi_definite() {
        let f = CorrelationMatrix::uniform(2, -1.0).unwrap().cholesky().unwrap();
        let mut out = [0.0; 2];
        f.apply(&[1.5, 3.0], &mut out);
        assert!((out[0] - 1.5).abs() < 1e-12 && (out[1] + 1.5).abs() < 1e-12);
    }

    #[test]
    fn indefinite_matrix_rejected() {
        // Uniform ρ is PSD only for ρ >= -1/(n-1) = -0.5 when n = 3.
        let m = CorrelationMatrix::uniform(3, -0.9).unwrap();
        assert!(matches!(m.cholesky(), Err(RiskError::InvalidConfiguration(_))));
    }

    #[test]
    fn malformed_matrices_rejected() {
        assert!(CorrelationMatrix::new(vec![vec![1.0, 0.2], vec![0.2]]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![1.0, 0.2], vec![0.3, 1.0]]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![0.9, 0.2], vec![0.2, 1.0]]).is_err());
        assert!(CorrelationMatrix::new(vec![vec![1.0, 1.2], vec![1.2, 1.0]]).is_err());
        assert!(CorrelationMatrix::uniform(3, 1.5).is_err());
        assert!(CorrelationMatrix::new(vec![vec![1.0, 0.4], vec![0.4, 1.0]]).is_ok());
        assert_eq!(CorrelationMatrix::new(Vec::new()).unwrap().dim(), 0);
    }

    /// Sample correlation of 20k correlated draws lands near the target.
    #[test]
    fn sampled_correlation_matches_target() {
        let f = CorrelationMatrix::uniform(2, 0.6).unwrap().cholesky().unwrap();
        let mut rng = rng();
        let (mut scratch, mut out) = ([0.0; 2], [0.0; 2]);
        let n = 20_000;
        let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
        for _ in 0..n {
            f.sample_into(&mut rng, &mut scratch, &mut out);
            sxy += out[0] * out[1];
            sxx += out[0] * out[0];
            syy += out[1] * out[1];
        }
        let r = sxy / (sxx * syy).sqrt();
        assert!((r - 0.6).abs() < 0.03, "sample correlation {r:.4} far from 0.6");
    }
}
