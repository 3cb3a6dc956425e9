//! Inventory observation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelsError;
use crate::ids::ItemId;

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationSource {
    /// Smart-fridge or shelf sensor reading.
    Sensor,
    /// Parsed from a purchase receipt.
    Receipt,
    /// Entered by the user.
    Manual,
    /// Produced by the system itself (e.g. synthetic pretraining).
    System,
}

impl ObservationSource {
    /// Stable wire tag used in checkpoints and audit records.
    pub fn tag(self) -> u8 {
        match self {
            Self::Sensor => 0,
            Self::Receipt => 1,
            Self::Manual => 2,
            Self::System => 3,
        }
    }

    /// Inverse of [`ObservationSource::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Sensor),
            1 => Some(Self::Receipt),
            2 => Some(Self::Manual),
            3 => Some(Self::System),
            _ => None,
        }
    }
}

/// An immutable timestamped quantity reading for one item.
///
/// Observations are append-only; per item they are ordered by timestamp,
/// and when two records share a timestamp the later append wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    item_id: ItemId,
    timestamp: DateTime<Utc>,
    quantity: f64,
    source: ObservationSource,
}

impl Observation {
    /// Creates a validated observation.
    ///
    /// # Errors
    ///
    /// Returns [`ModelsError::InvalidQuantity`] if `quantity` is negative,
    /// NaN, or infinite.
    pub fn new(
        item_id: ItemId,
        timestamp: DateTime<Utc>,
        quantity: f64,
        source: ObservationSource,
    ) -> Result<Self, ModelsError> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(ModelsError::InvalidQuantity { quantity });
        }
        Ok(Self {
            item_id,
            timestamp,
            quantity,
            source,
        })
    }

    /// Returns the item this observation belongs to.
    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// Returns the observation timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the observed quantity (always finite and non-negative).
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Returns the observation source.
    pub fn source(&self) -> ObservationSource {
        self.source
    }
}
