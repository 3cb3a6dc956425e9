//! # larder-features
//!
//! Fixed-width feature extraction for the consumption models.
//!
//! A [`FeatureBuilder`] turns `(timestamp, descriptor)` into a
//! [`FEATURE_DIM`]-wide vector of values in [0, 1]. It is a pure
//! function of its inputs; the timezone used to resolve civil dates is
//! fixed at construction.

mod builder;

pub use builder::{FeatureBuilder, FEATURE_DIM, FEATURE_NAMES};
