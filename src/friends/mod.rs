mod service;

pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Populated friend row as returned to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FriendEntry {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub last_check_in: Option<DateTime<Utc>>,
}

/// Populated inbound pending request. `id` is the sender's identifier,
/// the canonical key for accept and reject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}
