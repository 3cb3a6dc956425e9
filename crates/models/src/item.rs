//! Read-only item metadata consumed by the feature builder.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ModelsError;
use crate::ids::CategoryKey;

/// Read-only inputs needed to build features and bound the model state.
///
/// Supplied by the inventory subsystem; the forecasting core never
/// mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    category: CategoryKey,
    perishable: bool,
    household_size: u32,
    expiry_date: Option<NaiveDate>,
    quantity_min: f64,
    quantity_max: f64,
    quantity_current: Option<f64>,
}

impl ItemDescriptor {
    /// Creates a validated descriptor.
    ///
    /// # Errors
    ///
    /// | Variant | Trigger |
    /// |---------|---------|
    /// | [`ModelsError::EmptyHousehold`] | `household_size` is 0 |
    /// | [`ModelsError::InvalidBounds`] | bounds non-finite, negative, or `min > max` |
    pub fn new(
        category: CategoryKey,
        perishable: bool,
        household_size: u32,
        quantity_min: f64,
        quantity_max: f64,
    ) -> Result<Self, ModelsError> {
        if household_size == 0 {
            return Err(ModelsError::EmptyHousehold);
        }
        if !quantity_min.is_finite()
            || !quantity_max.is_finite()
            || quantity_min < 0.0
            || quantity_max <= 0.0
            || quantity_min > quantity_max
        {
            return Err(ModelsError::InvalidBounds {
                min: quantity_min,
                max: quantity_max,
            });
        }
        Ok(Self {
            category,
            perishable,
            household_size,
            expiry_date: None,
            quantity_min,
            quantity_max,
            quantity_current: None,
        })
    }

    /// Sets the expiry date (perishables).
    pub fn with_expiry_date(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }

    /// Sets the current shelf quantity as known to the inventory subsystem.
    ///
    /// Used to reconcile model state with the inventory record before
    /// forecasting.
    pub fn with_current_quantity(mut self, quantity: f64) -> Self {
        self.quantity_current = Some(quantity);
        self
    }

    /// Returns the item category.
    pub fn category(&self) -> &CategoryKey {
        &self.category
    }

    /// Returns whether the item is perishable.
    pub fn perishable(&self) -> bool {
        self.perishable
    }

    /// Returns the household size (always >= 1).
    pub fn household_size(&self) -> u32 {
        self.household_size
    }

    /// Returns the expiry date, if known.
    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    /// Returns the low-stock threshold.
    pub fn quantity_min(&self) -> f64 {
        self.quantity_min
    }

    /// Returns the full-stock quantity.
    pub fn quantity_max(&self) -> f64 {
        self.quantity_max
    }

    /// Returns the inventory subsystem's current quantity, if supplied.
    pub fn quantity_current(&self) -> Option<f64> {
        self.quantity_current
    }
}
