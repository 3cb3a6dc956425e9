//! # larder-models
//!
//! Shared domain records for the larder forecasting core: inventory
//! observations, item descriptors, forecast records, and rolling
//! training statistics.
//!
//! These types carry no behaviour beyond validation and incremental
//! bookkeeping; the model mathematics lives in `larder-ssm` and the
//! orchestration in `larder-trainer` / `larder-forecast`.

mod error;
mod forecast;
mod ids;
mod item;
mod observation;
mod stats;

pub use error::ModelsError;
pub use forecast::Forecast;
pub use ids::{CategoryKey, ItemId};
pub use item::ItemDescriptor;
pub use observation::{Observation, ObservationSource};
pub use stats::TrainingStats;
