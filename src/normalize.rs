//! Order normalization.
//!
//! Turns a loosely-shaped backend record into a fully-populated [`Order`].
//! `normalize` is total: any JSON value (including `null`, arrays and
//! scalars) produces an order with every field set.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::order::{
    Customer, Order, OrderItem, DEFAULT_CUSTOMER_NAME, DEFAULT_ITEM_NAME, DEFAULT_STATUS,
    PLACEHOLDER,
};

// ---------------------------------------------------------------------------
// Field coercion
// ---------------------------------------------------------------------------

/// Render a scalar as text. Strings are trimmed and must be non-empty;
/// numbers and booleans use their JSON text; everything else is missing.
fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric value of a JSON number or numeric string. Non-finite results are
/// treated as missing.
fn number_of(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn str_any(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| v.get(*key).and_then(text_of))
}

fn num_any(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| v.get(*key).and_then(number_of))
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable id for records the backend sent without one.
///
/// Hashes the raw customer block, item list and creation timestamp, so
/// fetching the same record twice yields the same id. The digest is rendered
/// as a version-3 (MD5) UUID to match the shape of backend ids.
pub fn fingerprint(raw: &Value) -> String {
    let basis = json!({
        "cliente": raw.get("cliente"),
        "itens": raw.get("itens"),
        "created_at": raw.get("created_at").or_else(|| raw.get("criadoEm")),
    });
    let digest = md5::compute(basis.to_string().as_bytes());
    uuid::Builder::from_md5_bytes(digest.0)
        .into_uuid()
        .to_string()
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

fn normalize_customer(raw: Option<&Value>) -> Customer {
    let Some(raw) = raw else {
        return Customer::default();
    };
    Customer {
        name: str_any(raw, &["nome"]).unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string()),
        phone: str_any(raw, &["telefone"]).unwrap_or_else(|| PLACEHOLDER.to_string()),
        address: str_any(raw, &["endereco"]).unwrap_or_else(|| PLACEHOLDER.to_string()),
        payment_method: str_any(raw, &["pagamento"]).unwrap_or_else(|| PLACEHOLDER.to_string()),
    }
}

fn normalize_item(raw: &Value) -> OrderItem {
    OrderItem {
        name: str_any(raw, &["nome"]).unwrap_or_else(|| DEFAULT_ITEM_NAME.to_string()),
        quantity: num_any(raw, &["quantidade"]).unwrap_or(0.0).max(0.0),
        unit_price: num_any(raw, &["preco"]).unwrap_or(0.0).max(0.0),
    }
}

/// Normalize one raw order record.
pub fn normalize(raw: &Value) -> Order {
    let customer = normalize_customer(raw.get("cliente"));

    let items: Vec<OrderItem> = raw
        .get("itens")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_item).collect())
        .unwrap_or_default();

    // A backend total wins even when it disagrees with the items.
    let total =
        num_any(raw, &["total"]).unwrap_or_else(|| items.iter().map(OrderItem::line_total).sum());

    // The customer's "-" placeholder is not a real address to fall back to.
    let address = str_any(raw, &["endereco"]).or_else(|| {
        raw.get("cliente")
            .and_then(|c| str_any(c, &["endereco"]))
            .filter(|a| a != PLACEHOLDER)
    });

    Order {
        id: str_any(raw, &["id"]).unwrap_or_else(|| fingerprint(raw)),
        customer,
        items,
        delivery_method: str_any(raw, &["forma", "formaEntrega"]),
        address,
        total,
        status: str_any(raw, &["status"]).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        note: str_any(raw, &["observacao", "obs"]).unwrap_or_default(),
        created_at: str_any(raw, &["created_at", "criadoEm"])
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
}

/// Normalize the `orders` array of a collection response. A missing or
/// non-array `orders` field is an empty collection.
pub fn normalize_collection(body: &Value) -> Vec<Order> {
    body.get("orders")
        .and_then(Value::as_array)
        .map(|orders| orders.iter().map(normalize).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_fully_defaulted(order: &Order) {
        assert!(!order.id.is_empty());
        assert_eq!(order.customer, Customer::default());
        assert!(order.items.is_empty());
        assert_eq!(order.delivery_method, None);
        assert_eq!(order.address, None);
        assert_eq!(order.total, 0.0);
        assert_eq!(order.status, DEFAULT_STATUS);
        assert_eq!(order.note, "");
        assert!(chrono::DateTime::parse_from_rfc3339(&order.created_at).is_ok());
    }

    #[test]
    fn malformed_inputs_produce_defaulted_orders() {
        for raw in [
            Value::Null,
            json!({}),
            json!([]),
            json!([1, 2, 3]),
            json!("order"),
            json!(42),
            json!({ "cliente": null, "itens": null, "total": null }),
            json!({ "cliente": "Ana", "itens": "none" }),
        ] {
            assert_fully_defaulted(&normalize(&raw));
        }
    }

    #[test]
    fn wrong_item_shapes_default_per_item() {
        let order = normalize(&json!({
            "itens": [null, 7, "x", { "nome": 12, "quantidade": "abc", "preco": {} }]
        }));
        assert_eq!(order.items.len(), 4);
        assert_eq!(order.items[0].name, DEFAULT_ITEM_NAME);
        assert_eq!(order.items[1].quantity, 0.0);
        assert_eq!(order.items[3].name, "12");
        assert_eq!(order.items[3].quantity, 0.0);
        assert_eq!(order.items[3].unit_price, 0.0);
        assert_eq!(order.total, 0.0);
    }

    #[test]
    fn invalid_total_falls_back_to_item_sum() {
        let order = normalize(&json!({
            "itens": [{ "quantidade": 2, "preco": 5 }],
            "total": "bad"
        }));
        assert_eq!(order.total, 10.0);
    }

    #[test]
    fn numeric_total_is_kept_even_when_items_disagree() {
        let order = normalize(&json!({
            "itens": [{ "quantidade": 2, "preco": 5 }],
            "total": 999
        }));
        assert_eq!(order.total, 999.0);
        assert_eq!(order.items_total(), 10.0);
    }

    #[test]
    fn numeric_strings_are_parsed() {
        let order = normalize(&json!({
            "itens": [{ "nome": "Leite", "quantidade": "3", "preco": " 4.5 " }],
            "total": "13.50"
        }));
        assert_eq!(order.items[0].quantity, 3.0);
        assert_eq!(order.items[0].unit_price, 4.5);
        assert_eq!(order.total, 13.5);
    }

    #[test]
    fn negative_quantities_and_prices_clamp_to_zero() {
        let order = normalize(&json!({
            "itens": [{ "quantidade": -2, "preco": 5 }, { "quantidade": 1, "preco": -3 }]
        }));
        assert_eq!(order.items[0].quantity, 0.0);
        assert_eq!(order.items[1].unit_price, 0.0);
        assert_eq!(order.total, 0.0);
    }

    #[test]
    fn alternate_keys_are_honoured() {
        let order = normalize(&json!({
            "id": 17,
            "formaEntrega": "Entrega",
            "obs": "sem cebola",
            "criadoEm": "2026-03-01T09:30:00Z",
            "cliente": { "nome": "Bia", "endereco": "Rua B, 10" }
        }));
        assert_eq!(order.id, "17");
        assert_eq!(order.delivery_method.as_deref(), Some("Entrega"));
        assert_eq!(order.note, "sem cebola");
        assert_eq!(order.created_at, "2026-03-01T09:30:00Z");
        assert_eq!(order.address.as_deref(), Some("Rua B, 10"));
    }

    #[test]
    fn primary_keys_win_over_alternates() {
        let order = normalize(&json!({
            "forma": "Retirada",
            "formaEntrega": "Entrega",
            "observacao": "troco para 50",
            "obs": "ignored",
            "endereco": "Rua C",
            "cliente": { "endereco": "Rua D" }
        }));
        assert_eq!(order.delivery_method.as_deref(), Some("Retirada"));
        assert_eq!(order.note, "troco para 50");
        assert_eq!(order.address.as_deref(), Some("Rua C"));
        assert_eq!(order.customer.address, "Rua D");
    }

    #[test]
    fn backend_timestamp_is_authoritative() {
        let raw = json!({ "created_at": "2025-12-24T18:00:00.000Z" });
        assert_eq!(normalize(&raw).created_at, "2025-12-24T18:00:00.000Z");
    }

    #[test]
    fn missing_id_is_stable_across_passes() {
        let raw = json!({
            "cliente": { "nome": "Caio" },
            "itens": [{ "nome": "Arroz", "quantidade": 1, "preco": 22.9 }]
        });
        let first = normalize(&raw);
        let second = normalize(&raw);
        assert_eq!(first.id, second.id);
        assert!(uuid::Uuid::parse_str(&first.id).is_ok());
    }

    #[test]
    fn different_content_gets_different_fingerprint() {
        let a = fingerprint(&json!({ "cliente": { "nome": "Caio" } }));
        let b = fingerprint(&json!({ "cliente": { "nome": "Duda" } }));
        assert_ne!(a, b);
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            json!({
                "id": "1",
                "cliente": { "nome": "Ana" },
                "itens": [{ "nome": "Pão", "quantidade": 2, "preco": 3 }]
            }),
            json!({ "itens": [{ "quantidade": "2", "preco": 5 }], "total": "bad" }),
            json!({ "cliente": { "endereco": "Rua E" }, "formaEntrega": "Entrega" }),
            Value::Null,
            json!({ "itens": [null, { "nome": "" }] }),
        ];
        for raw in inputs {
            let once = normalize(&raw);
            let twice = normalize(&serde_json::to_value(&once).unwrap());
            assert_eq!(once, twice, "raw input: {raw}");
        }
    }

    #[test]
    fn collection_without_orders_array_is_empty() {
        assert!(normalize_collection(&json!({})).is_empty());
        assert!(normalize_collection(&json!({ "orders": {} })).is_empty());
        assert!(normalize_collection(&Value::Null).is_empty());
    }

    #[test]
    fn collection_keeps_backend_order() {
        let orders = normalize_collection(&json!({
            "orders": [{ "id": "b" }, { "id": "a" }, { "id": "c" }]
        }));
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn reference_payload_normalizes_as_expected() {
        let orders = normalize_collection(&json!({
            "orders": [{
                "id": "1",
                "cliente": { "nome": "Ana" },
                "itens": [{ "nome": "Pão", "quantidade": 2, "preco": 3 }]
            }]
        }));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total, 6.0);
        assert_eq!(orders[0].status, "Em Separação");
        assert_eq!(orders[0].customer.phone, "-");
    }
}
