//! Model parameters `(F, B, H, Q, R)`.

use ndarray::{Array1, Array2};

/// Dimension of the latent state `[q, r, t, s]`.
pub const STATE_DIM: usize = 4;

/// Width of the feature vector fed through `B`.
///
/// Must match `larder_features::FEATURE_DIM`; both are compile-time
/// constants of the core.
pub const FEATURE_DIM: usize = 8;

/// Default process-noise diagonal.
const DEFAULT_Q: [f64; STATE_DIM] = [0.01, 0.001, 0.0001, 0.001];

/// Default observation-noise variance.
const DEFAULT_R: f64 = 0.0025;

/// Decay factor applied to the trend (acceleration) per day. Keeps the
/// twice-integrated noise from dominating long-horizon uncertainty.
const TREND_DECAY: f64 = 0.5;

/// Decay factor applied to the seasonal offset per day.
const SEASONAL_DECAY: f64 = 0.5;

/// Parameters of the linear-Gaussian state-space model.
///
/// - `F` (4x4): state transition.
/// - `B` (4x8): feature-to-state influence, the only block adapted by the
///   online gradient step.
/// - `H` (1x4): observation map, fixed at `[1, 0, 0, 0]`.
/// - `Q` (4x4): process-noise covariance.
/// - `R` (scalar > 0): observation-noise variance.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParameters {
    f: Array2<f64>,
    b: Array2<f64>,
    q: Array2<f64>,
    r: f64,
}

impl ModelParameters {
    /// Builds parameters from explicit matrices.
    ///
    /// # Panics
    ///
    /// Panics if the matrix shapes do not match `(STATE_DIM, STATE_DIM)`,
    /// `(STATE_DIM, FEATURE_DIM)`, and `(STATE_DIM, STATE_DIM)`; shapes
    /// are structural invariants, not runtime conditions.
    pub fn new(f: Array2<f64>, b: Array2<f64>, q: Array2<f64>, r: f64) -> Self {
        assert_eq!(f.shape(), [STATE_DIM, STATE_DIM]);
        assert_eq!(b.shape(), [STATE_DIM, FEATURE_DIM]);
        assert_eq!(q.shape(), [STATE_DIM, STATE_DIM]);
        Self { f, b, q, r }
    }

    /// Default cold-start parameters: identity-like transition with the
    /// consumption coupling `q' = q - r + s`, a decaying trend feeding
    /// the rate, and a decaying seasonal offset.
    pub fn defaults() -> Self {
        let mut f = Array2::eye(STATE_DIM);
        f[[0, 1]] = -1.0; // positive rate reduces quantity
        f[[0, 3]] = 1.0; // seasonal offset modulates daily consumption
        f[[1, 2]] = 1.0; // trend accelerates the rate
        f[[2, 2]] = TREND_DECAY;
        f[[3, 3]] = SEASONAL_DECAY;

        let b = Array2::zeros((STATE_DIM, FEATURE_DIM));
        let mut q = Array2::zeros((STATE_DIM, STATE_DIM));
        for (i, &v) in DEFAULT_Q.iter().enumerate() {
            q[[i, i]] = v;
        }
        Self {
            f,
            b,
            q,
            r: DEFAULT_R,
        }
    }

    /// Returns the observation row vector `H = [1, 0, 0, 0]`.
    pub fn h() -> Array1<f64> {
        let mut h = Array1::zeros(STATE_DIM);
        h[0] = 1.0;
        h
    }

    /// Returns the state transition matrix.
    pub fn f(&self) -> &Array2<f64> {
        &self.f
    }

    /// Returns the feature influence matrix.
    pub fn b(&self) -> &Array2<f64> {
        &self.b
    }

    /// Returns the process-noise covariance.
    pub fn q(&self) -> &Array2<f64> {
        &self.q
    }

    /// Returns the observation-noise variance.
    pub fn r(&self) -> f64 {
        self.r
    }

    /// Returns true if every entry of every parameter block is finite.
    pub fn is_finite(&self) -> bool {
        self.f.iter().all(|v| v.is_finite())
            && self.b.iter().all(|v| v.is_finite())
            && self.q.iter().all(|v| v.is_finite())
            && self.r.is_finite()
    }

    /// One stochastic-gradient step on `B`, minimizing the squared
    /// innovation, followed by entry clipping to [-1, 1] and EWMA
    /// blending against the previous value.
    ///
    /// With `H = [1, 0, 0, 0]` only the quantity row of `B` moves:
    /// `B[0] <- B[0] + eta * 2 * innovation * features`.
    pub fn apply_gradient_step(
        &mut self,
        features: &[f64; FEATURE_DIM],
        innovation: f64,
        learning_rate: f64,
        ewma_alpha: f64,
    ) {
        for (j, &phi) in features.iter().enumerate() {
            let prev = self.b[[0, j]];
            let stepped = (prev + learning_rate * 2.0 * innovation * phi).clamp(-1.0, 1.0);
            self.b[[0, j]] = (1.0 - ewma_alpha) * prev + ewma_alpha * stepped;
        }
    }
}
