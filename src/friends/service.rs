//! Friend relationship state machine.
//!
//! Each ordered pair of users is in one of four states: no relation, a
//! pending request in either direction, or friends. Pending requests live in
//! `friend_requests`; a friendship is two `friendships` rows written and
//! removed inside a single transaction, so the relation can never be observed
//! asymmetric. Every transition is a conditional write: racing calls cannot
//! claim the same pending request twice.

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::friends::{FriendEntry, PendingRequest};
use crate::user::{User, UserRepository};

#[derive(Clone)]
pub struct FriendService {
    pool: Pool<Postgres>,
}

impl FriendService {
    /// Create a new [`FriendService`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Send a friend request from `requester` to the user behind
    /// `target_username`.
    pub async fn send_request(
        &self,
        requester: &User,
        target_username: &str,
    ) -> Result<()> {
        let target = UserRepository::new(self.pool.clone())
            .find_by_username(target_username)
            .await?;

        if target.id == requester.id {
            return Err(ServerError::Invalid(
                "Cannot add yourself as a friend".into(),
            ));
        }

        if self.are_friends(requester.id, target.id).await? {
            return Err(ServerError::Conflict("Already friends".into()));
        }

        if self.has_pending_from(requester.id, target.id).await? {
            return Err(ServerError::Conflict(
                "This user has already sent you a friend request. \
                 Check your friend requests to accept it."
                    .into(),
            ));
        }

        let result = sqlx::query(
            r#"INSERT INTO friend_requests (recipient_id, sender_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING"#,
        )
        .bind(target.id)
        .bind(requester.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::Conflict(
                "Friend request already sent".into(),
            ));
        }

        Ok(())
    }

    /// Accept the pending request sent by `sender_id` to `accepter`.
    ///
    /// The delete of the pending row is the atomic claim: of two racing
    /// accepts only one sees it. Both friendship rows are written in the
    /// same transaction.
    pub async fn accept_request(
        &self,
        accepter: &User,
        sender_id: Uuid,
    ) -> Result<FriendEntry> {
        let mut tx = self.pool.begin().await?;

        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"DELETE FROM friend_requests
                WHERE recipient_id = $1 AND sender_id = $2
                RETURNING sender_id"#,
        )
        .bind(accepter.id)
        .bind(sender_id)
        .fetch_optional(&mut *tx)
        .await?;

        if claimed.is_none() {
            return Err(ServerError::NotFound(
                "No friend request found from this user".into(),
            ));
        }

        // Two opposite sends can race past each other's pre-checks and
        // leave both directions pending. Clear the reverse row too, so no
        // pending request survives between friends.
        sqlx::query(
            r#"DELETE FROM friend_requests
                WHERE recipient_id = $1 AND sender_id = $2"#,
        )
        .bind(sender_id)
        .bind(accepter.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO friendships (user_id, friend_id)
                VALUES ($1, $2), ($2, $1)
                ON CONFLICT DO NOTHING"#,
        )
        .bind(accepter.id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;

        let friend = sqlx::query_as::<_, FriendEntry>(
            r#"SELECT id, name, username, email, last_check_in
                FROM users WHERE id = $1"#,
        )
        .bind(sender_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(friend)
    }

    /// Drop the pending request sent by `sender_id` without creating a
    /// friendship. A second call for the same pair fails `NotFound`.
    pub async fn reject_request(
        &self,
        accepter_id: Uuid,
        sender_id: Uuid,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"DELETE FROM friend_requests
                WHERE recipient_id = $1 AND sender_id = $2"#,
        )
        .bind(accepter_id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound(
                "No friend request found from this user".into(),
            ));
        }

        Ok(())
    }

    /// Remove an existing friendship, both directions at once.
    pub async fn remove_friend(
        &self,
        user_id: Uuid,
        friend_id: Uuid,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"DELETE FROM friendships
                WHERE (user_id = $1 AND friend_id = $2)
                OR (user_id = $2 AND friend_id = $1)"#,
        )
        .bind(user_id)
        .bind(friend_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound(
                "You are not friends with this user".into(),
            ));
        }

        tx.commit().await?;

        Ok(())
    }

    /// Whether `a` and `b` are currently friends.
    pub async fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (
                SELECT 1 FROM friendships WHERE user_id = $1 AND friend_id = $2
            )"#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Whether `user_id` holds a pending request sent by `sender_id`.
    pub async fn has_pending_from(
        &self,
        user_id: Uuid,
        sender_id: Uuid,
    ) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"SELECT EXISTS (
                SELECT 1 FROM friend_requests
                WHERE recipient_id = $1 AND sender_id = $2
            )"#,
        )
        .bind(user_id)
        .bind(sender_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Populated friend list and inbound pending requests for a user.
    pub async fn list(
        &self,
        user_id: Uuid,
    ) -> Result<(Vec<FriendEntry>, Vec<PendingRequest>)> {
        let friends = sqlx::query_as::<_, FriendEntry>(
            r#"SELECT u.id, u.name, u.username, u.email, u.last_check_in
                FROM friendships f
                JOIN users u ON u.id = f.friend_id
                WHERE f.user_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let requests = sqlx::query_as::<_, PendingRequest>(
            r#"SELECT u.id, u.name, u.username, u.email, r.created_at
                FROM friend_requests r
                JOIN users u ON u.id = r.sender_id
                WHERE r.recipient_id = $1
                ORDER BY r.created_at"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok((friends, requests))
    }
}
