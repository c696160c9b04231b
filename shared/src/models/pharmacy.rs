//! Pharmacy Model

use serde::{Deserialize, Serialize};

/// Static pharmacy metadata (`pharmacies/{pharmacyId}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Pharmacy {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion", default)]
    pub address: String,
    #[serde(rename = "telefono", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Pharmacy {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}
