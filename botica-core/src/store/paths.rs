//! Logical document paths

pub fn pharmacy(pharmacy_id: &str) -> String {
    format!("pharmacies/{pharmacy_id}")
}

pub fn inventory(pharmacy_id: &str) -> String {
    format!("pharmacies/{pharmacy_id}/inventory")
}

pub fn inventory_item(pharmacy_id: &str, item_id: &str) -> String {
    format!("pharmacies/{pharmacy_id}/inventory/{item_id}")
}

pub fn medication(medication_id: &str) -> String {
    format!("medications/{medication_id}")
}

pub fn orders(user_id: &str) -> String {
    format!("users/{user_id}/orders")
}

pub fn order(user_id: &str, order_id: &str) -> String {
    format!("users/{user_id}/orders/{order_id}")
}

pub fn prescription(user_id: &str, prescription_id: &str) -> String {
    format!("users/{user_id}/prescriptions/{prescription_id}")
}

pub fn prescription_items(user_id: &str, prescription_id: &str) -> String {
    format!("users/{user_id}/prescriptions/{prescription_id}/items")
}

pub fn prescription_item(user_id: &str, prescription_id: &str, item_id: &str) -> String {
    format!("users/{user_id}/prescriptions/{prescription_id}/items/{item_id}")
}

/// Last non-empty segment of a path or reference (`"/medications/X/"` → `"X"`)
pub fn last_segment(path: &str) -> &str {
    path.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

/// A usable path segment: non-blank and free of separators
pub fn is_valid_id(id: &str) -> bool {
    !id.trim().is_empty() && !id.contains('/')
}
