//! Dense symmetric eigen-decomposition for covariance repair.
//!
//! The state dimension is fixed at 4, so a cyclic Jacobi sweep is both
//! simple and exact enough: it converges quadratically and never needs
//! more than a handful of sweeps at this size.

use ndarray::Array2;

const MAX_SWEEPS: usize = 24;
const OFF_DIAG_TOL: f64 = 1e-14;

/// Returns the largest absolute asymmetry `|a_ij - a_ji|` of a square matrix.
pub fn max_asymmetry(a: &Array2<f64>) -> f64 {
    let n = a.nrows();
    let mut worst = 0.0_f64;
    for i in 0..n {
        for j in (i + 1)..n {
            worst = worst.max((a[[i, j]] - a[[j, i]]).abs());
        }
    }
    worst
}

/// Symmetrizes a square matrix in place: `A <- (A + A')/2`.
pub(crate) fn symmetrize(a: &mut Array2<f64>) {
    let n = a.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (a[[i, j]] + a[[j, i]]);
            a[[i, j]] = avg;
            a[[j, i]] = avg;
        }
    }
}

/// Eigenvalues and eigenvectors of a symmetric matrix via cyclic Jacobi.
///
/// Returns `(eigenvalues, eigenvectors)` where column `k` of the
/// eigenvector matrix corresponds to `eigenvalues[k]`. The input must be
/// symmetric; callers symmetrize first.
pub(crate) fn jacobi_eigen(a: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut d = a.clone();
    let mut v = Array2::eye(n);

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                off += d[[i, j]] * d[[i, j]];
            }
        }
        if off.sqrt() < OFF_DIAG_TOL {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if d[[p, q]].abs() < OFF_DIAG_TOL {
                    continue;
                }
                // Rotation angle zeroing d[p][q]
                let theta = (d[[q, q]] - d[[p, p]]) / (2.0 * d[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let dkp = d[[k, p]];
                    let dkq = d[[k, q]];
                    d[[k, p]] = c * dkp - s * dkq;
                    d[[k, q]] = s * dkp + c * dkq;
                }
                for k in 0..n {
                    let dpk = d[[p, k]];
                    let dqk = d[[q, k]];
                    d[[p, k]] = c * dpk - s * dqk;
                    d[[q, k]] = s * dpk + c * dqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| d[[i, i]]).collect();
    (eigenvalues, v)
}

/// Smallest eigenvalue of a symmetric matrix.
pub fn min_symmetric_eigenvalue(a: &Array2<f64>) -> f64 {
    let (eigenvalues, _) = jacobi_eigen(a);
    eigenvalues.into_iter().fold(f64::INFINITY, f64::min)
}

/// Projects a matrix onto the PSD cone: symmetrize, then clamp negative
/// eigenvalues to zero and reassemble `V diag(max(lambda, 0)) V'`.
pub(crate) fn clamp_psd(a: &mut Array2<f64>) {
    symmetrize(a);
    let (eigenvalues, v) = jacobi_eigen(a);
    if eigenvalues.iter().all(|&l| l >= 0.0) {
        return;
    }
    let n = a.nrows();
    let mut rebuilt = Array2::zeros((n, n));
    for k in 0..n {
        let l = eigenvalues[k].max(0.0);
        if l == 0.0 {
            continue;
        }
        for i in 0..n {
            for j in 0..n {
                rebuilt[[i, j]] += l * v[[i, k]] * v[[j, k]];
            }
        }
    }
    symmetrize(&mut rebuilt);
    *a = rebuilt;
}
