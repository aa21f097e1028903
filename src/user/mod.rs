mod repository;

pub use repository::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub name: String,
    #[serde(skip)]
    pub password: String,
    pub last_check_in: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Password-stripped projection of a [`User`] returned to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub username: String,
    pub friends: Vec<Uuid>,
    pub last_check_in: Option<DateTime<Utc>>,
}

impl PublicUser {
    /// Build the client view of a user and their friend identifiers.
    pub fn new(user: User, friends: Vec<Uuid>) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            username: user.username,
            friends,
            last_check_in: user.last_check_in,
        }
    }
}

/// Row returned by user search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
}

/// Row returned by the admin overview: per-user relation counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub name: String,
    pub friends: i64,
    pub friend_requests: i64,
    pub last_check_in: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
