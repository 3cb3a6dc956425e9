//! # larder-forecast
//!
//! The public facade of the forecasting core.
//!
//! A [`ForecastService`] wraps the online trainer and the stores and
//! exposes the operations hosts embed directly: `ingest`, `forecast`,
//! `batch_forecast`, `low_stock`, and `record_actual_runout`. Every
//! operation is synchronous from the caller's perspective; internal
//! fan-out runs on a bounded worker pool with cooperative cancellation.

mod config;
mod error;
mod service;

pub use config::ForecastConfig;
pub use error::ForecastError;
pub use service::ForecastService;
