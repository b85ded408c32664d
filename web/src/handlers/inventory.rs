//! Inventory read endpoint.

use crate::{error::AppError, state::AppState};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

/// Raw query string. Fields stay textual so a bad value maps to our own 400.
#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    product_id: Option<String>,
    warehouse_id: Option<String>,
}

/// `GET /inventory` response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryResponse {
    /// Product identifier
    pub product_id: i32,
    /// Warehouse identifier
    pub warehouse_id: i32,
    /// Current stock level
    pub stock: i32,
}

fn parse_id(value: Option<&str>, name: &str) -> Result<i32, AppError> {
    value
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| AppError::bad_request(format!("Invalid {name}")))
}

/// Current stock for one (product, warehouse) pair.
///
/// # Endpoint
///
/// ```text
/// GET /inventory?product_id=1&warehouse_id=2
/// ```
///
/// # Errors
///
/// - 400 if either identifier is missing or not an integer
/// - 404 if the pair is unknown
/// - 500 if the fetch path fails
pub async fn get_inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> Result<Json<InventoryResponse>, AppError> {
    let product_id = parse_id(query.product_id.as_deref(), "product_id")?;
    let warehouse_id = parse_id(query.warehouse_id.as_deref(), "warehouse_id")?;

    let stock = state.engine.fetch(product_id, warehouse_id).await?;

    Ok(Json(InventoryResponse {
        product_id,
        warehouse_id,
        stock,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(Some("42"), "product_id").unwrap_or_default(), 42);
        assert_eq!(parse_id(Some("-3"), "product_id").unwrap_or_default(), -3);

        for bad in [None, Some(""), Some("abc"), Some("1.5"), Some("99999999999")] {
            let err = parse_id(bad, "warehouse_id").err();
            assert!(matches!(err, Some(e) if e.status() == StatusCode::BAD_REQUEST
                && e.to_string() == "[BAD_REQUEST] Invalid warehouse_id"));
        }
    }
}
