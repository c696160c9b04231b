//! Prescription-Inventory Matcher
//!
//! Resolves each prescribed medication to a concrete inventory record of the
//! chosen pharmacy:
//!
//! 1. by reference: trailing segment of `medicationRef` against the
//!    inventory item id (or the item's own reference)
//! 2. by name: normalized name equality (see [`normalize_name`])
//!
//! First match wins. Unmatched medications stay in the result, unpriced and
//! not addable to the cart.

mod normalize;

pub use normalize::{normalize_name, reference_key};

use shared::models::{CartItem, InventoryItem, PrescribedMedication};

/// How a candidate was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Reference,
    Name,
    Unmatched,
}

/// A prescribed medication paired with its inventory record, if any
#[derive(Debug, Clone, PartialEq)]
pub struct CartCandidate {
    pub prescribed: PrescribedMedication,
    pub matched: Option<InventoryItem>,
    pub match_kind: MatchKind,
}

impl CartCandidate {
    /// 0 when unmatched
    pub fn price_per_unit(&self) -> u32 {
        self.matched.as_ref().map_or(0, |item| item.price_per_unit)
    }

    /// `None` when unmatched (unknown, not zero)
    pub fn stock(&self) -> Option<u32> {
        self.matched.as_ref().map(|item| item.stock)
    }

    /// Matched and currently in stock
    pub fn is_addable(&self) -> bool {
        self.stock().is_some_and(|stock| stock > 0) && self.prescribed.quantity > 0
    }

    /// Cart line for this candidate, quantity capped at current stock
    ///
    /// `None` when the candidate is not addable.
    pub fn to_cart_item(&self) -> Option<CartItem> {
        let item = self.matched.as_ref()?;
        let quantity = self.prescribed.quantity.min(item.stock);
        if quantity == 0 {
            return None;
        }
        Some(CartItem {
            medication_id: item.id.clone(),
            medication_ref: item.medication_ref.clone(),
            name: item.name.clone(),
            quantity,
            price_per_unit: item.price_per_unit,
            stock: item.stock,
            active_ingredient: item.active_ingredient.clone(),
            presentation: item.presentation.clone(),
            manufacturer: item.manufacturer.clone(),
        })
    }
}

/// Match every prescribed medication against `inventory`
///
/// Output preserves prescription order, one candidate per medication.
pub fn merge(prescribed: &[PrescribedMedication], inventory: &[InventoryItem]) -> Vec<CartCandidate> {
    let names: Vec<String> = inventory
        .iter()
        .map(|item| normalize_name(&item.name))
        .collect();

    prescribed
        .iter()
        .map(|med| {
            let (matched, match_kind) = match find_by_reference(med, inventory) {
                Some(item) => (Some(item.clone()), MatchKind::Reference),
                None => match find_by_name(med, inventory, &names) {
                    Some(item) => (Some(item.clone()), MatchKind::Name),
                    None => (None, MatchKind::Unmatched),
                },
            };
            if matched.is_none() {
                tracing::debug!(medication = %med.name, reference = %med.medication_ref, "No inventory match");
            }
            CartCandidate {
                prescribed: med.clone(),
                matched,
                match_kind,
            }
        })
        .collect()
}

/// Cart lines for every addable candidate
pub fn addable_items(candidates: &[CartCandidate]) -> Vec<CartItem> {
    candidates.iter().filter_map(CartCandidate::to_cart_item).collect()
}

fn find_by_reference<'a>(
    med: &PrescribedMedication,
    inventory: &'a [InventoryItem],
) -> Option<&'a InventoryItem> {
    let key = reference_key(&med.medication_ref)?;
    inventory
        .iter()
        .find(|item| item.id == key || reference_key(&item.medication_ref) == Some(key))
}

fn find_by_name<'a>(
    med: &PrescribedMedication,
    inventory: &'a [InventoryItem],
    names: &[String],
) -> Option<&'a InventoryItem> {
    let wanted = normalize_name(&med.name);
    if wanted.is_empty() {
        return None;
    }
    inventory
        .iter()
        .zip(names)
        .find(|(_, name)| **name == wanted)
        .map(|(item, _)| item)
}
