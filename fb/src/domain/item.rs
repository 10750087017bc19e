//! Warehouse inventory entries

use serde::Deserialize;

/// One stack of a warehouse item
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InventoryItem {
    /// Item identifier
    #[serde(rename = "item")]
    pub id: u32,

    /// Units held
    pub quantity: u32,

    /// Whether the shop accepts this item
    #[serde(default)]
    pub sellable: bool,

    /// Shop price per unit, when known
    #[serde(default)]
    pub unit_price: Option<u32>,
}
