//! Kalman prediction, filtering, and trajectory simulation.

use ndarray::Array2;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::SsmError;
use crate::params::{ModelParameters, FEATURE_DIM, STATE_DIM};
use crate::state::ModelState;

/// Ridge added to a non-positive innovation variance.
const RIDGE: f64 = 1e-6;

/// Floor used when dividing by predicted quantities near zero.
const EPS: f64 = 1e-9;

/// Minimum per-day decrement enforced on simulated trajectories.
const MIN_DECREMENT: f64 = 0.01;

/// Result of one filter step: posterior state plus innovation
/// diagnostics.
#[derive(Debug, Clone)]
pub struct FilterStep {
    /// Posterior state after the measurement update and constraint
    /// projection.
    pub state: ModelState,
    /// One-step-ahead prediction `H * x'` before the update.
    pub prediction: f64,
    /// Innovation `y_obs - prediction`.
    pub innovation: f64,
    /// Innovation variance `S = H P' H' + R` (after ridge, if applied).
    pub innovation_variance: f64,
}

/// Simulated forward trajectory with uncertainty bands.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    quantities: Vec<f64>,
    sigmas: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Trajectory {
    /// Predicted mean quantity per day.
    pub fn quantities(&self) -> &[f64] {
        &self.quantities
    }

    /// Standard deviation `sqrt(H P_k H')` per day.
    pub fn sigmas(&self) -> &[f64] {
        &self.sigmas
    }

    /// Lower confidence band, clipped at 0.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper confidence band.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Number of simulated days.
    pub fn len(&self) -> usize {
        self.quantities.len()
    }

    /// Returns true if no days were simulated.
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }
}

/// Runout probe result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunoutEstimate {
    /// Days until the predicted quantity first crosses the threshold;
    /// `None` if no crossing occurs within the probed horizon.
    pub days_until: Option<u32>,
    /// Confidence in the estimate, in [0, 1].
    pub confidence: f64,
}

/// The linear-Gaussian consumption model. Pure: owns parameters only,
/// state is passed in and returned.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSpaceModel {
    params: ModelParameters,
}

impl StateSpaceModel {
    /// Creates a model from parameters.
    pub fn new(params: ModelParameters) -> Self {
        Self { params }
    }

    /// Returns the model parameters.
    pub fn params(&self) -> &ModelParameters {
        &self.params
    }

    /// Returns the parameters mutably (online gradient step).
    pub fn params_mut(&mut self) -> &mut ModelParameters {
        &mut self.params
    }

    /// Time-update: `x' = F x + B phi`, `P' = F P F' + Q`.
    ///
    /// Returns the predicted state and the one-step-ahead observation
    /// prediction `y_hat = H x'`.
    pub fn predict(&self, state: &ModelState, features: &[f64; FEATURE_DIM]) -> (ModelState, f64) {
        let f = self.params.f();
        let mut x = f.dot(state.x());
        for i in 0..STATE_DIM {
            let mut drive = 0.0;
            for (j, &phi) in features.iter().enumerate() {
                drive += self.params.b()[[i, j]] * phi;
            }
            x[i] += drive;
        }
        let p = f.dot(state.p()).dot(&f.t()) + self.params.q();
        let y_hat = x[0];
        (ModelState::new(x, p), y_hat)
    }

    /// Measurement update on a predicted state.
    ///
    /// With `H = [1, 0, 0, 0]` the innovation variance
    /// `S = P'[0][0] + R` is scalar; a ridge of 1e-6 is added if it is
    /// not strictly positive. The posterior is then projected back onto
    /// the invariant set (symmetric PSD covariance, non-negative rate and
    /// trend, quantity within `[0, 10 * quantity_max]`).
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`SsmError::DegenerateInnovation`] | S not positive even after ridge |
    /// | [`SsmError::NonFiniteState`] | posterior picked up NaN/inf |
    pub fn update(
        &self,
        predicted: ModelState,
        y_obs: f64,
        quantity_max: f64,
    ) -> Result<FilterStep, SsmError> {
        let prediction = predicted.quantity();
        let mut s = predicted.p()[[0, 0]] + self.params.r();
        if s <= 0.0 {
            s += RIDGE;
        }
        if s <= 0.0 || !s.is_finite() {
            return Err(SsmError::DegenerateInnovation { s });
        }

        let innovation = y_obs - prediction;

        // K = P' H' / S is the first covariance column scaled.
        let mut state = predicted;
        let gain: Vec<f64> = (0..STATE_DIM).map(|i| state.p()[[i, 0]] / s).collect();

        {
            let x = state.x_mut();
            for (i, &k) in gain.iter().enumerate() {
                x[i] += k * innovation;
            }
        }
        {
            // P'' = (I - K H) P' = P' - K * row0(P')
            let row0: Vec<f64> = (0..STATE_DIM).map(|j| state.p()[[0, j]]).collect();
            let p = state.p_mut();
            for (i, &k) in gain.iter().enumerate() {
                for (j, &r0j) in row0.iter().enumerate() {
                    p[[i, j]] -= k * r0j;
                }
            }
        }

        state.constrain(quantity_max);
        if !state.is_finite() {
            return Err(SsmError::NonFiniteState);
        }

        Ok(FilterStep {
            state,
            prediction,
            innovation,
            innovation_variance: s,
        })
    }

    /// Propagates the state forward one day per feature vector with no
    /// measurement updates, emitting the mean quantity, its standard
    /// deviation, and the confidence band `q_hat +/- z * sigma` (lower
    /// band clipped at 0).
    ///
    /// Between restocks the model cannot add stock, so a propagated mean
    /// that would meet or exceed the previous day is pulled down to
    /// `prev - max(0.01, rate)`.
    ///
    /// # Errors
    ///
    /// Returns [`SsmError::InvalidConfidence`] if `confidence` is outside
    /// (0, 1), and [`SsmError::NonFiniteState`] if propagation diverges.
    pub fn simulate(
        &self,
        state: &ModelState,
        features_series: &[[f64; FEATURE_DIM]],
        confidence: f64,
    ) -> Result<Trajectory, SsmError> {
        let z = z_score(confidence)?;
        let n = features_series.len();
        let mut quantities = Vec::with_capacity(n);
        let mut sigmas = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);

        let mut current = state.clone();
        let mut prev_q = state.quantity();
        for features in features_series {
            let (mut predicted, _) = self.predict(&current, features);
            if predicted.quantity() >= prev_q {
                let decrement = predicted.rate().max(MIN_DECREMENT);
                predicted.x_mut()[0] = prev_q - decrement;
            }
            if !predicted.is_finite() {
                return Err(SsmError::NonFiniteState);
            }
            let q = predicted.quantity();
            let sigma = predicted.quantity_sigma();
            quantities.push(q);
            sigmas.push(sigma);
            lower.push((q - z * sigma).max(0.0));
            upper.push(q + z * sigma);
            prev_q = q;
            current = predicted;
        }

        Ok(Trajectory {
            quantities,
            sigmas,
            lower,
            upper,
        })
    }

    /// Probes the trajectory for the first day the mean quantity falls to
    /// `threshold` or below.
    ///
    /// At the crossing step `k` the confidence is `1 / (1 + sigma_k)`,
    /// clipped to [0, 1]: inverse in the absolute quantity uncertainty,
    /// so it stays meaningful when the threshold (and with it the
    /// crossing quantity) is at or near zero. If no crossing occurs
    /// within the feature series, the confidence is
    /// `1 - min(q_final / threshold, 1) / 2`.
    pub fn runout_probe(
        &self,
        state: &ModelState,
        features_series: &[[f64; FEATURE_DIM]],
        threshold: f64,
    ) -> Result<RunoutEstimate, SsmError> {
        let trajectory = self.simulate(state, features_series, 0.95)?;
        for (k, &sigma) in trajectory.sigmas().iter().enumerate() {
            if trajectory.quantities()[k] <= threshold {
                let confidence = (1.0 / (1.0 + sigma)).clamp(0.0, 1.0);
                return Ok(RunoutEstimate {
                    days_until: Some(k as u32 + 1),
                    confidence,
                });
            }
        }
        let confidence = match trajectory.quantities().last() {
            Some(&q_final) => 1.0 - (q_final / threshold.max(EPS)).min(1.0) / 2.0,
            None => 0.0,
        };
        Ok(RunoutEstimate {
            days_until: None,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// Builds an initial state for an item.
    ///
    /// With at least two recent `(day, quantity)` observations the
    /// initial rate is the least-squares slope with the sign flipped to
    /// positive; otherwise the category default applies; otherwise 0.
    pub fn initialize(
        &self,
        current_quantity: f64,
        recent_obs: &[(f64, f64)],
        category_rate: Option<f64>,
        quantity_max: f64,
    ) -> ModelState {
        let rate = slope_rate(recent_obs)
            .or(category_rate)
            .unwrap_or(0.0)
            .max(0.0);
        ModelState::initial(current_quantity, rate, quantity_max)
    }
}

/// Least-squares consumption rate from `(day, quantity)` pairs, sign
/// flipped so that consumption is positive. `None` if fewer than two
/// distinct days are available.
fn slope_rate(recent_obs: &[(f64, f64)]) -> Option<f64> {
    if recent_obs.len() < 2 {
        return None;
    }
    let n = recent_obs.len() as f64;
    let mean_t = recent_obs.iter().map(|&(t, _)| t).sum::<f64>() / n;
    let mean_q = recent_obs.iter().map(|&(_, q)| q).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var = 0.0;
    for &(t, q) in recent_obs {
        cov += (t - mean_t) * (q - mean_q);
        var += (t - mean_t) * (t - mean_t);
    }
    if var < 1e-12 {
        return None;
    }
    Some((-cov / var).max(0.0))
}

/// Two-sided normal quantile for a confidence level in (0, 1).
fn z_score(confidence: f64) -> Result<f64, SsmError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(SsmError::InvalidConfidence { level: confidence });
    }
    let normal = Normal::new(0.0, 1.0).expect("unit normal is always valid");
    Ok(normal.inverse_cdf((1.0 + confidence) / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{max_asymmetry, min_symmetric_eigenvalue};
    use approx::assert_abs_diff_eq;

    fn model() -> StateSpaceModel {
        StateSpaceModel::new(ModelParameters::defaults())
    }

    fn no_features() -> [f64; FEATURE_DIM] {
        [0.0; FEATURE_DIM]
    }

    #[test]
    fn z_score_95() {
        assert_abs_diff_eq!(z_score(0.95).unwrap(), 1.959964, epsilon = 1e-5);
    }

    #[test]
    fn z_score_rejects_out_of_range() {
        assert!(z_score(0.0).is_err());
        assert!(z_score(1.0).is_err());
        assert!(z_score(1.5).is_err());
    }

    #[test]
    fn predict_applies_consumption_coupling() {
        let model = model();
        let state = ModelState::initial(4.0, 0.25, 4.0);
        let (predicted, y_hat) = model.predict(&state, &no_features());
        // q' = q - r with zero trend and seasonal.
        assert_abs_diff_eq!(y_hat, 3.75, epsilon = 1e-12);
        assert_abs_diff_eq!(predicted.quantity(), 3.75, epsilon = 1e-12);
        assert_abs_diff_eq!(predicted.rate(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn predict_inflates_covariance() {
        let model = model();
        let state = ModelState::initial(4.0, 0.25, 4.0);
        let (predicted, _) = model.predict(&state, &no_features());
        // F P F' + Q must dominate the prior quantity variance.
        assert!(predicted.p()[[0, 0]] > state.p()[[0, 0]]);
    }

    #[test]
    fn update_moves_state_toward_observation() {
        let model = model();
        let state = ModelState::initial(4.0, 0.25, 4.0);
        let (predicted, y_hat) = model.predict(&state, &no_features());
        let step = model.update(predicted, 3.0, 4.0).unwrap();
        assert!(step.innovation < 0.0);
        assert!(step.state.quantity() < y_hat);
        assert!(step.state.quantity() > 3.0 - 1e-9);
    }

    #[test]
    fn update_shrinks_quantity_variance() {
        let model = model();
        let state = ModelState::initial(4.0, 0.25, 4.0);
        let (predicted, _) = model.predict(&state, &no_features());
        let prior_var = predicted.p()[[0, 0]];
        let step = model.update(predicted, 3.7, 4.0).unwrap();
        assert!(step.state.p()[[0, 0]] < prior_var);
    }

    #[test]
    fn update_preserves_covariance_invariants() {
        let model = model();
        let mut state = ModelState::initial(4.0, 0.3, 4.0);
        for day in 0..50 {
            let (predicted, _) = model.predict(&state, &no_features());
            let y = (4.0 - 0.3 * day as f64).max(0.0);
            let step = model.update(predicted, y, 4.0).unwrap();
            state = step.state;
            assert!(max_asymmetry(state.p()) <= 1e-9, "day {day}");
            assert!(min_symmetric_eigenvalue(state.p()) >= -1e-9, "day {day}");
            assert!(state.rate() >= 0.0);
            assert!(state.trend() >= 0.0);
            assert!((0.0..=40.0).contains(&state.quantity()));
        }
    }

    #[test]
    fn filter_learns_consumption_rate() {
        // Feed a perfectly linear decline and check the rate converges.
        let model = model();
        let mut state = model.initialize(4.0, &[], None, 4.0);
        for day in 1..=14 {
            let y = 4.0 - 0.25 * day as f64;
            let (predicted, _) = model.predict(&state, &no_features());
            state = model.update(predicted, y, 4.0).unwrap().state;
        }
        assert_abs_diff_eq!(state.rate(), 0.25, epsilon = 0.05);
    }

    #[test]
    fn simulate_is_non_increasing() {
        let model = model();
        let state = ModelState::initial(4.0, 0.25, 4.0);
        let features = vec![no_features(); 14];
        let trajectory = model.simulate(&state, &features, 0.95).unwrap();
        assert_eq!(trajectory.len(), 14);
        for pair in trajectory.quantities().windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
    }

    #[test]
    fn simulate_enforces_minimum_decrement() {
        // Zero rate still consumes at least the floor per day.
        let model = model();
        let state = ModelState::initial(4.0, 0.0, 4.0);
        let features = vec![no_features(); 5];
        let trajectory = model.simulate(&state, &features, 0.95).unwrap();
        for pair in trajectory.quantities().windows(2) {
            assert!(pair[0] - pair[1] >= MIN_DECREMENT - 1e-12);
        }
    }

    #[test]
    fn simulate_bands_bracket_mean_and_clip_at_zero() {
        let model = model();
        let state = ModelState::initial(1.0, 0.4, 4.0);
        let features = vec![no_features(); 10];
        let trajectory = model.simulate(&state, &features, 0.95).unwrap();
        for k in 0..trajectory.len() {
            assert!(trajectory.lower()[k] >= 0.0);
            assert!(trajectory.lower()[k] <= trajectory.quantities()[k].max(0.0) + 1e-12);
            assert!(trajectory.upper()[k] >= trajectory.quantities()[k]);
        }
    }

    #[test]
    fn simulate_uncertainty_grows_with_horizon() {
        let model = model();
        let state = ModelState::initial(4.0, 0.1, 4.0);
        let features = vec![no_features(); 20];
        let trajectory = model.simulate(&state, &features, 0.95).unwrap();
        assert!(trajectory.sigmas()[19] > trajectory.sigmas()[0]);
    }

    #[test]
    fn simulate_empty_series() {
        let model = model();
        let state = ModelState::initial(4.0, 0.1, 4.0);
        let trajectory = model.simulate(&state, &[], 0.95).unwrap();
        assert!(trajectory.is_empty());
    }

    #[test]
    fn runout_probe_linear_decline() {
        // q = 4.0, r = 0.25/day, threshold 0.5: crossing at day 14.
        let model = model();
        let state = ModelState::new(
            ndarray::Array1::from_vec(vec![4.0, 0.25, 0.0, 0.0]),
            ndarray::Array2::from_diag(&ndarray::Array1::from_vec(vec![0.01, 0.001, 0.0001, 0.001])),
        );
        let features = vec![no_features(); 60];
        let estimate = model.runout_probe(&state, &features, 0.5).unwrap();
        assert_eq!(estimate.days_until, Some(14));
        assert!(estimate.confidence >= 0.5, "confidence {}", estimate.confidence);
    }

    #[test]
    fn runout_probe_no_crossing() {
        let model = model();
        let state = ModelState::new(
            ndarray::Array1::from_vec(vec![4.0, 0.0, 0.0, 0.0]),
            ndarray::Array2::from_diag(&ndarray::Array1::from_vec(vec![0.01, 0.001, 0.0001, 0.001])),
        );
        // Only the minimum decrement applies; 5 days cannot reach 0.5.
        let features = vec![no_features(); 5];
        let estimate = model.runout_probe(&state, &features, 0.5).unwrap();
        assert_eq!(estimate.days_until, None);
        // q_final ~ 3.95 >> threshold, so confidence collapses to 1/2.
        assert_abs_diff_eq!(estimate.confidence, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn runout_probe_threshold_zero() {
        let model = model();
        let state = ModelState::new(
            ndarray::Array1::from_vec(vec![1.0, 0.5, 0.0, 0.0]),
            ndarray::Array2::from_diag(&ndarray::Array1::from_vec(vec![0.01, 0.001, 0.0001, 0.001])),
        );
        let features = vec![no_features(); 10];
        let estimate = model.runout_probe(&state, &features, 0.0).unwrap();
        assert_eq!(estimate.days_until, Some(2));
    }

    #[test]
    fn initialize_estimates_slope() {
        let model = model();
        let recent: Vec<(f64, f64)> = (0..5).map(|d| (d as f64, 4.0 - 0.25 * d as f64)).collect();
        let state = model.initialize(4.0, &recent, None, 4.0);
        assert_abs_diff_eq!(state.rate(), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn initialize_increasing_history_projects_to_zero() {
        let model = model();
        let recent = vec![(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)];
        let state = model.initialize(3.0, &recent, None, 4.0);
        assert_abs_diff_eq!(state.rate(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn initialize_falls_back_to_category_rate() {
        let model = model();
        let state = model.initialize(2.0, &[(0.0, 2.0)], Some(0.3), 4.0);
        assert_abs_diff_eq!(state.rate(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn initialize_defaults_to_zero_rate() {
        let model = model();
        let state = model.initialize(2.0, &[], None, 4.0);
        assert_abs_diff_eq!(state.rate(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn initialize_same_day_observations_fall_through() {
        let model = model();
        let recent = vec![(1.0, 3.0), (1.0, 2.5)];
        let state = model.initialize(2.5, &recent, Some(0.2), 4.0);
        assert_abs_diff_eq!(state.rate(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn model_is_send_and_sync() {
        fn assert_impl<T: Send + Sync>() {}
        assert_impl::<StateSpaceModel>();
        assert_impl::<Trajectory>();
        assert_impl::<RunoutEstimate>();
    }
}
