//! Key normalization for prescription ↔ inventory matching

use crate::store::paths;

/// Characters removed from names before comparison
const PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '"', '\'', '-', '_', '/', '*', '+',
];

/// Reference key: trailing segment of a medication reference
///
/// `"/medications/abc"`, `"inventory/abc/"` and `"abc"` all yield `"abc"`.
/// Returns `None` for blank references.
pub fn reference_key(reference: &str) -> Option<&str> {
    let key = paths::last_segment(reference).trim();
    (!key.is_empty()).then_some(key)
}

/// Name key: lowercase, punctuation stripped, whitespace collapsed and
/// `"<n> mg"` folded into `"<n>mg"`
///
/// ```
/// use botica_core::matcher::normalize_name;
///
/// assert_eq!(normalize_name("Amoxicillin 500mg"), "amoxicillin 500mg");
/// assert_eq!(normalize_name("  amoxicillin  500 MG."), "amoxicillin 500mg");
/// ```
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if PUNCTUATION.contains(&c) { ' ' } else { c })
        .collect();

    let mut tokens: Vec<String> = Vec::new();
    for token in cleaned.split_whitespace() {
        if token == "mg"
            && let Some(prev) = tokens.last_mut()
            && is_number(prev)
        {
            prev.push_str("mg");
            continue;
        }
        tokens.push(token.to_string());
    }
    tokens.join(" ")
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_key() {
        assert_eq!(reference_key("/inventory/X"), Some("X"));
        assert_eq!(reference_key("medications/ibu-400/"), Some("ibu-400"));
        assert_eq!(reference_key("plain"), Some("plain"));
        assert_eq!(reference_key(""), None);
        assert_eq!(reference_key("  "), None);
        assert_eq!(reference_key("/"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Amoxicillin 500mg"), "amoxicillin 500mg");
        assert_eq!(normalize_name("amoxicillin  500 mg"), "amoxicillin 500mg");
        assert_eq!(normalize_name("Paracetamol, 1000 mg (tabletas)"), "paracetamol 1000mg tabletas");
        assert_eq!(normalize_name("Loratadina\t10\nmg"), "loratadina 10mg");
        assert_eq!(normalize_name("Vitamina B-12"), "vitamina b 12");
    }

    #[test]
    fn test_mg_only_merges_after_number() {
        assert_eq!(normalize_name("mg 5"), "mg 5");
        assert_eq!(normalize_name("dosis alta mg"), "dosis alta mg");
        assert_eq!(normalize_name("2.5 mg"), "2 5mg");
    }

    #[test]
    fn test_blank_name() {
        assert_eq!(normalize_name(""), "");
        assert_eq!(normalize_name(" .,; "), "");
    }
}
