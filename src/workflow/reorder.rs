//! Category/section reorder batches.
//!
//! The whole body is validated before the store is touched; the store then
//! applies the batch in one transaction.

use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::{EntityStore, OrderUpdate, OrderedKind};

impl OrderedKind {
    /// Key of the batch array in the request body.
    pub fn body_key(&self) -> &'static str {
        match self {
            OrderedKind::Category => "categories",
            OrderedKind::Section => "sections",
        }
    }
}

fn parse_order(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn decode_batch(kind: OrderedKind, body: &Value) -> Result<Vec<OrderUpdate>, ApiError> {
    let key = kind.body_key();
    let items = body
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid request: {key} must be an array")))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let id = item
                .get("id")
                .or_else(|| item.get("_id"))
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s.trim()).ok())
                .ok_or_else(|| ApiError::bad_request(format!("Invalid id at position {i}")))?;
            let order = item
                .get("order")
                .and_then(parse_order)
                .ok_or_else(|| ApiError::bad_request(format!("Invalid order at position {i}")))?;
            Ok(OrderUpdate { id, order })
        })
        .collect()
}

pub async fn apply(
    store: &dyn EntityStore,
    kind: OrderedKind,
    body: &Value,
) -> Result<usize, ApiError> {
    let updates = decode_batch(kind, body)?;
    store.reorder(kind, &updates).await?;
    tracing::info!("Reordered {} {}", updates.len(), kind.body_key());
    Ok(updates.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_numbers_and_numeric_strings() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let body = json!({ "sections": [
            { "id": a.to_string(), "order": 2 },
            { "_id": b.to_string(), "order": " 7 " },
        ]});
        let batch = decode_batch(OrderedKind::Section, &body).unwrap();
        assert_eq!(
            batch,
            vec![OrderUpdate { id: a, order: 2 }, OrderUpdate { id: b, order: 7 }]
        );
    }

    #[test]
    fn test_rejects_bad_items_anywhere_in_batch() {
        let good = json!({ "id": Uuid::new_v4().to_string(), "order": 1 });
        let body = json!({ "categories": [good, { "id": "nope", "order": 1 }] });
        assert!(matches!(
            decode_batch(OrderedKind::Category, &body),
            Err(ApiError::BadRequest(m)) if m == "Invalid id at position 1"
        ));

        let body = json!({ "categories": [{ "id": Uuid::new_v4().to_string(), "order": "first" }] });
        assert!(decode_batch(OrderedKind::Category, &body).is_err());

        let body = json!({ "categories": [{ "id": Uuid::new_v4().to_string(), "order": 1.5 }] });
        assert!(decode_batch(OrderedKind::Category, &body).is_err());
    }

    #[test]
    fn test_requires_array_under_kind_key() {
        let body = json!({ "sections": [] });
        assert!(decode_batch(OrderedKind::Category, &body).is_err());
        assert!(decode_batch(OrderedKind::Section, &body).unwrap().is_empty());
    }
}
