use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A stored item
///
/// Schema fields are flattened next to the server-owned ones, so an item
/// serializes as `{"id": ..., "name": ..., "price": ..., "createdAt": ..., "updatedAt": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(id: String, fields: Map<String, JsonValue>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            fields,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Response type for the store self-test endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DbTestResponse {
    pub status: String,
    pub database: String,
    pub message: String,
    pub test_value: String,
}

/// Response type for the database health endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct DbHealthResponse {
    pub status: String,
    pub database: String,
    pub version: String,
}
