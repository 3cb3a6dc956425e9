//! # larder-ssm
//!
//! Linear-Gaussian state-space model for per-item consumption
//! forecasting, filtered with a Kalman recursion.
//!
//! The latent state is the 4-vector `[q, r, t, s]`:
//!
//! | Symbol | Accessor | Meaning |
//! |--------|----------|---------|
//! | q | [`ModelState::quantity()`] | estimated current quantity |
//! | r | [`ModelState::rate()`] | consumption rate (units/day, positive r reduces q) |
//! | t | [`ModelState::trend()`] | acceleration of the consumption rate |
//! | s | [`ModelState::seasonal()`] | decaying seasonal offset |
//!
//! The observation map is fixed at `H = [1, 0, 0, 0]`: only the quantity
//! is observed, so the innovation variance is scalar and the Kalman gain
//! is a single covariance column divided by it.
//!
//! ## Workflow
//!
//! ```ignore
//! let model = StateSpaceModel::new(ModelParameters::defaults());
//! let state = model.initialize(4.0, &recent, None, 4.0);
//! let (predicted, y_hat) = model.predict(&state, &features);
//! let step = model.update(predicted, y_obs, quantity_max)?;
//! let trajectory = model.simulate(&state, &feature_series, 0.95)?;
//! let runout = model.runout_probe(&state, &feature_series, 0.5);
//! ```
//!
//! All computation is 64-bit floating point. Covariance repair
//! (symmetrization and eigenvalue clamping) runs after every update.

mod error;
mod linalg;
mod model;
mod params;
mod state;

pub use error::SsmError;
pub use linalg::{max_asymmetry, min_symmetric_eigenvalue};
pub use model::{FilterStep, RunoutEstimate, StateSpaceModel, Trajectory};
pub use params::{ModelParameters, FEATURE_DIM, STATE_DIM};
pub use state::ModelState;
