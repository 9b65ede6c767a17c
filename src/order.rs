//! Normalized order model.
//!
//! Serialization uses the backend's wire names (`cliente`, `itens`, `preco`,
//! ...) so a normalized order can be fed back through
//! [`crate::normalize::normalize`] without changing.

use serde::Serialize;

/// Placeholder for a missing customer name.
pub const DEFAULT_CUSTOMER_NAME: &str = "Cliente";
/// Placeholder for missing phone, address and payment fields.
pub const PLACEHOLDER: &str = "-";
/// Placeholder for a missing item name.
pub const DEFAULT_ITEM_NAME: &str = "Item";
/// Status given to orders the backend sent without one ("in progress").
pub const DEFAULT_STATUS: &str = "Em Separação";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "telefone")]
    pub phone: String,
    #[serde(rename = "endereco")]
    pub address: String,
    #[serde(rename = "pagamento")]
    pub payment_method: String,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            name: DEFAULT_CUSTOMER_NAME.to_string(),
            phone: PLACEHOLDER.to_string(),
            address: PLACEHOLDER.to_string(),
            payment_method: PLACEHOLDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "quantidade")]
    pub quantity: f64,
    #[serde(rename = "preco")]
    pub unit_price: f64,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: String,
    #[serde(rename = "cliente")]
    pub customer: Customer,
    #[serde(rename = "itens")]
    pub items: Vec<OrderItem>,
    #[serde(rename = "forma", skip_serializing_if = "Option::is_none")]
    pub delivery_method: Option<String>,
    #[serde(rename = "endereco", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub total: f64,
    pub status: String,
    #[serde(rename = "observacao")]
    pub note: String,
    pub created_at: String,
}

impl Order {
    /// Sum of `quantity * unit_price` over the items, ignoring `total`.
    pub fn items_total(&self) -> f64 {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
