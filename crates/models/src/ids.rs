//! Identifier newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque inventory item identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Creates an item id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Category key used for warm-start lookup (`pretrained/{category}.ckpt`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryKey(String);

impl CategoryKey {
    /// Creates a category key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_roundtrip() {
        let id = ItemId::new("milk-1l");
        assert_eq!(id.as_str(), "milk-1l");
        assert_eq!(id.to_string(), "milk-1l");
        assert_eq!(ItemId::from("milk-1l"), id);
    }

    #[test]
    fn category_key_roundtrip() {
        let key = CategoryKey::new("Dairy");
        assert_eq!(key.as_str(), "Dairy");
        assert_eq!(key.to_string(), "Dairy");
    }

    #[test]
    fn ids_are_hashable_and_ordered() {
        fn assert_impl<T: std::hash::Hash + Ord>() {}
        assert_impl::<ItemId>();
        assert_impl::<CategoryKey>();
    }
}
