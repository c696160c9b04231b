//! Cart Model

use serde::{Deserialize, Serialize};

/// Cart line item
///
/// Built from a matched inventory record. `quantity <= stock` holds at the
/// time of matching only; stock is checked again when the order is created.
/// Embedded verbatim in the order document as the purchase snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Resolved inventory item id
    pub medication_id: String,
    #[serde(default)]
    pub medication_ref: String,
    pub name: String,
    pub quantity: u32,
    pub price_per_unit: u32,
    /// Stock observed when the item was added to the cart
    #[serde(default)]
    pub stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_ingredient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

impl CartItem {
    /// quantity × pricePerUnit
    pub fn line_total(&self) -> u64 {
        u64::from(self.quantity) * u64::from(self.price_per_unit)
    }
}

/// Σ quantity × pricePerUnit over the cart
pub fn cart_total(items: &[CartItem]) -> u64 {
    items.iter().map(CartItem::line_total).sum()
}
