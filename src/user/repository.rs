//! Handle database requests for the user directory.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::user::{User, UserOverview, UserSummary};

const SEARCH_LIMIT: i64 = 10;

const USER_COLUMNS: &str =
    "id, email, username, name, password, last_check_in, created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: Pool<Postgres>,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a new user. Email and username are stored lowercased so
    /// uniqueness is case-insensitive.
    pub async fn insert(
        &self,
        email: &str,
        username: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<User> {
        let email = email.to_lowercase();
        let username = username.to_lowercase();

        // Taken identifiers answer 400 with a distinct message; the unique
        // indexes remain the backstop for concurrent registrations.
        let taken: Option<(String,)> = sqlx::query_as(
            r#"SELECT email FROM users WHERE email = $1 OR username = $2 LIMIT 1"#,
        )
        .bind(&email)
        .bind(&username)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((existing_email,)) = taken {
            if existing_email == email {
                return Err(ServerError::Invalid(
                    "Email already registered".into(),
                ));
            }
            return Err(ServerError::Invalid("Username already taken".into()));
        }

        let user = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (email, username, name, password)
                VALUES ($1, $2, $3, $4)
                RETURNING {USER_COLUMNS}"#,
        ))
        .bind(&email)
        .bind(&username)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by identifier.
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE id = $1"#,
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::NotFound("User not found".into()))
    }

    /// Find a user by username, case-insensitively.
    pub async fn find_by_username(&self, username: &str) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE username = $1"#,
        ))
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::NotFound("User not found".into()))
    }

    /// Case-insensitive lookup by email or username, for login.
    pub async fn find_by_credential(&self, credential: &str) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"SELECT {USER_COLUMNS} FROM users WHERE email = $1 OR username = $1"#,
        ))
        .bind(credential.to_lowercase())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::NotFound("User not found".into()))
    }

    /// Set `last_check_in` to the current time and return the updated user.
    pub async fn check_in(&self, user_id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users SET last_check_in = NOW(), updated_at = NOW()
                WHERE id = $1
                RETURNING {USER_COLUMNS}"#,
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ServerError::NotFound("User not found".into()))
    }

    /// Identifiers of a user's friends.
    pub async fn friend_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"SELECT friend_id FROM friendships WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Case-insensitive substring search over name and username, excluding
    /// the requester and their current friends. Result order is
    /// store-defined; callers must not depend on it.
    pub async fn search(
        &self,
        query: &str,
        excluding: Uuid,
    ) -> Result<Vec<UserSummary>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");

        let users = sqlx::query_as::<_, UserSummary>(
            r#"SELECT id, name, username, email FROM users
                WHERE id <> $1
                AND id NOT IN (SELECT friend_id FROM friendships WHERE user_id = $1)
                AND (name ILIKE $2 ESCAPE '\' OR username ILIKE $2 ESCAPE '\')
                LIMIT $3"#,
        )
        .bind(excluding)
        .bind(&pattern)
        .bind(SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Per-user relation counts for the admin overview.
    pub async fn overview(&self) -> Result<Vec<UserOverview>> {
        let users = sqlx::query_as::<_, UserOverview>(
            r#"SELECT u.id, u.email, u.username, u.name,
                (SELECT COUNT(*) FROM friendships f WHERE f.user_id = u.id) AS friends,
                (SELECT COUNT(*) FROM friend_requests r WHERE r.recipient_id = u.id) AS friend_requests,
                u.last_check_in, u.created_at, u.updated_at
                FROM users u
                ORDER BY u.created_at"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
