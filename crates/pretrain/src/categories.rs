//! Built-in category templates.

use larder_models::{CategoryKey, ItemDescriptor, ModelsError};

/// Synthetic consumption profile for one category.
#[derive(Debug, Clone)]
pub struct CategoryTemplate {
    /// Category key (checkpoint filename stem).
    pub key: CategoryKey,
    /// Quantity restored by the weekly Saturday restock.
    pub base_weekly_qty: f64,
    /// Mean daily consumption in units/day.
    pub base_daily: f64,
    /// Whether items of this category perish.
    pub perishable: bool,
    /// Typical shelf life in days; drives the mid-week restock rule.
    pub shelf_life_days: u32,
    /// Low-stock threshold.
    pub quantity_min: f64,
    /// Household size used for feature extraction.
    pub household_size: u32,
}

impl CategoryTemplate {
    /// Descriptor used when extracting features for this category's
    /// synthetic stream.
    pub fn descriptor(&self) -> Result<ItemDescriptor, ModelsError> {
        ItemDescriptor::new(
            self.key.clone(),
            self.perishable,
            self.household_size,
            self.quantity_min,
            self.base_weekly_qty,
        )
    }
}

/// The fixed set of categories shipped with the core.
pub fn builtin_categories() -> Vec<CategoryTemplate> {
    vec![
        CategoryTemplate {
            key: CategoryKey::from("Dairy"),
            base_weekly_qty: 2.0,
            base_daily: 0.28,
            perishable: true,
            shelf_life_days: 7,
            quantity_min: 0.5,
            household_size: 4,
        },
        CategoryTemplate {
            key: CategoryKey::from("Produce"),
            base_weekly_qty: 3.0,
            base_daily: 0.45,
            perishable: true,
            shelf_life_days: 5,
            quantity_min: 0.5,
            household_size: 4,
        },
        CategoryTemplate {
            key: CategoryKey::from("Protein"),
            base_weekly_qty: 4.0,
            base_daily: 0.5,
            perishable: true,
            shelf_life_days: 4,
            quantity_min: 1.0,
            household_size: 4,
        },
        CategoryTemplate {
            key: CategoryKey::from("Beverages"),
            base_weekly_qty: 64.0,
            base_daily: 8.0,
            perishable: true,
            shelf_life_days: 14,
            quantity_min: 16.0,
            household_size: 4,
        },
        CategoryTemplate {
            key: CategoryKey::from("Grains"),
            base_weekly_qty: 5.0,
            base_daily: 0.15,
            perishable: false,
            shelf_life_days: 365,
            quantity_min: 1.0,
            household_size: 4,
        },
    ]
}
