//! Latent state and its invariant repair.

use ndarray::{Array1, Array2};

use crate::linalg::{clamp_psd, symmetrize};
use crate::params::STATE_DIM;

/// Initial covariance diagonal as fractions of the state scale:
/// `(0.25 * max_q^2, 0.1, 0.01, 0.01)`.
const INIT_P_RATE: f64 = 0.1;
const INIT_P_TREND: f64 = 0.01;
const INIT_P_SEASONAL: f64 = 0.01;

/// Covariance reset applied after a restock event. Rate uncertainty is
/// restored so the filter keeps adapting at the post-restock pace.
const RESTOCK_P: [f64; STATE_DIM] = [0.1, 0.1, 0.01, 0.01];

/// Drift bound: quantity is clamped to `[0, 10 * quantity_max]`.
const QUANTITY_CLAMP_FACTOR: f64 = 10.0;

/// Posterior state estimate: mean vector `x = [q, r, t, s]` and
/// covariance `P` (4x4, symmetric PSD).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    x: Array1<f64>,
    p: Array2<f64>,
}

impl ModelState {
    /// Creates a state from an explicit mean and covariance.
    ///
    /// # Panics
    ///
    /// Panics if the shapes are not `(STATE_DIM,)` and
    /// `(STATE_DIM, STATE_DIM)`.
    pub fn new(x: Array1<f64>, p: Array2<f64>) -> Self {
        assert_eq!(x.len(), STATE_DIM);
        assert_eq!(p.shape(), [STATE_DIM, STATE_DIM]);
        Self { x, p }
    }

    /// Fresh state for an item with `quantity` on the shelf, the given
    /// daily consumption `rate`, and the standard initial uncertainty
    /// scaled by `quantity_max`.
    pub fn initial(quantity: f64, rate: f64, quantity_max: f64) -> Self {
        let mut x = Array1::zeros(STATE_DIM);
        x[0] = quantity;
        x[1] = rate.max(0.0);
        let mut p = Array2::zeros((STATE_DIM, STATE_DIM));
        p[[0, 0]] = 0.25 * quantity_max * quantity_max;
        p[[1, 1]] = INIT_P_RATE;
        p[[2, 2]] = INIT_P_TREND;
        p[[3, 3]] = INIT_P_SEASONAL;
        Self { x, p }
    }

    /// Returns the mean state vector.
    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    /// Returns the covariance matrix.
    pub fn p(&self) -> &Array2<f64> {
        &self.p
    }

    /// Estimated current quantity.
    pub fn quantity(&self) -> f64 {
        self.x[0]
    }

    /// Estimated consumption rate (units/day; positive reduces quantity).
    pub fn rate(&self) -> f64 {
        self.x[1]
    }

    /// Estimated consumption trend (acceleration).
    pub fn trend(&self) -> f64 {
        self.x[2]
    }

    /// Estimated seasonal offset.
    pub fn seasonal(&self) -> f64 {
        self.x[3]
    }

    /// Standard deviation of the observed quantity, `sqrt(H P H')`.
    pub fn quantity_sigma(&self) -> f64 {
        self.p[[0, 0]].max(0.0).sqrt()
    }

    /// Returns true if the mean and covariance are entirely finite.
    pub fn is_finite(&self) -> bool {
        self.x.iter().all(|v| v.is_finite()) && self.p.iter().all(|v| v.is_finite())
    }

    /// Resets the quantity after a restock, keeping the consumption
    /// dynamics and restoring moderate uncertainty.
    pub fn restocked(&self, new_quantity: f64) -> Self {
        let mut x = self.x.clone();
        x[0] = new_quantity;
        let mut p = Array2::zeros((STATE_DIM, STATE_DIM));
        for (i, &v) in RESTOCK_P.iter().enumerate() {
            p[[i, i]] = v;
        }
        Self { x, p }
    }

    /// Enforces the state-space invariants in place:
    ///
    /// 1. `P <- (P + P')/2`, negative eigenvalues clamped to 0;
    /// 2. `r, t >= 0` (projection);
    /// 3. `q` clamped to `[0, 10 * quantity_max]`.
    pub fn constrain(&mut self, quantity_max: f64) {
        symmetrize(&mut self.p);
        clamp_psd(&mut self.p);
        self.x[1] = self.x[1].max(0.0);
        self.x[2] = self.x[2].max(0.0);
        self.x[0] = self.x[0].clamp(0.0, QUANTITY_CLAMP_FACTOR * quantity_max);
    }

    pub(crate) fn x_mut(&mut self) -> &mut Array1<f64> {
        &mut self.x
    }

    pub(crate) fn p_mut(&mut self) -> &mut Array2<f64> {
        &mut self.p
    }
}
