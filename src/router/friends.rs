//! Friend relationships API: list, request, accept, reject and remove.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::friends::{FriendEntry, PendingRequest};
use crate::router::Valid;
use crate::user::User;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub friends: Vec<FriendEntry>,
    pub friend_requests: Vec<PendingRequest>,
}

/// `GET`: friend list and inbound pending requests, populated.
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<ListResponse>> {
    let (friends, friend_requests) = state.friends().list(user.id).await?;

    Ok(Json(ListResponse {
        friends,
        friend_requests,
    }))
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendBody {
    #[validate(length(min = 1, message = "Username is required."))]
    pub username: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

/// `POST`: send a friend request to a user by username.
pub async fn send(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<SendBody>,
) -> Result<Json<Message>> {
    state.friends().send_request(&user, &body.username).await?;

    Ok(Json(Message {
        message: "Friend request sent successfully".into(),
    }))
}

/// Requests are matched by the sender's identifier, not their username:
/// handles are display data, identifiers are the canonical key.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TargetBody {
    pub user_id: Uuid,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AcceptResponse {
    pub message: String,
    pub friend: FriendEntry,
}

/// `PUT`: accept the pending request sent by `userId`.
pub async fn accept(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<TargetBody>,
) -> Result<Json<AcceptResponse>> {
    let friend = state.friends().accept_request(&user, body.user_id).await?;

    Ok(Json(AcceptResponse {
        message: "Friend request accepted".into(),
        friend,
    }))
}

/// `DELETE`: reject the pending request sent by `userId`, or, when no such
/// request exists, remove `userId` from the friend list. 404 when neither
/// relation exists.
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<TargetBody>,
) -> Result<Json<Message>> {
    let service = state.friends();

    match service.reject_request(user.id, body.user_id).await {
        Ok(()) => Ok(Json(Message {
            message: "Friend request rejected".into(),
        })),
        Err(ServerError::NotFound(_)) => {
            service.remove_friend(user.id, body.user_id).await?;
            Ok(Json(Message {
                message: "Friend removed successfully".into(),
            }))
        },
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use axum::Router;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use sqlx::{Pool, Postgres};

    async fn send_request(
        app: &Router,
        token: &str,
        username: &str,
    ) -> axum::http::Response<axum::body::Body> {
        make_request(
            app.clone(),
            Method::POST,
            "/user/friends",
            Some(token),
            json!({ "username": username }).to_string(),
        )
        .await
    }

    async fn list_relationships(app: &Router, token: &str) -> ListResponse {
        let response = make_request(
            app.clone(),
            Method::GET,
            "/user/friends",
            Some(token),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn message_of(
        response: axum::http::Response<axum::body::Body>,
    ) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        body["message"].as_str().unwrap_or_default().to_owned()
    }

    #[sqlx::test]
    async fn test_send_request_appears_once(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::OK);

        let relationships = list_relationships(&app, &bob.token).await;
        assert!(relationships.friends.is_empty());
        assert_eq!(relationships.friend_requests.len(), 1);
        assert_eq!(relationships.friend_requests[0].id, alice.user.id);
        assert_eq!(relationships.friend_requests[0].username, "alice");

        // a second identical request conflicts.
        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(message_of(response).await, "Friend request already sent");
    }

    #[sqlx::test]
    async fn test_send_request_to_self(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;

        let response = send_request(&app, &alice.token, "alice").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            message_of(response).await,
            "Cannot add yourself as a friend"
        );
    }

    #[sqlx::test]
    async fn test_send_request_unknown_target(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;

        let response = send_request(&app, &alice.token, "nobody").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_send_request_when_reverse_pending(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::OK);

        // bob should accept alice's request instead of opening his own.
        let response = send_request(&app, &bob.token, "alice").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(message_of(response).await.contains("already sent you"));
    }

    #[sqlx::test]
    async fn test_accept_creates_symmetric_friendship(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(
            app.clone(),
            Method::PUT,
            "/user/friends",
            Some(&bob.token),
            json!({ "userId": alice.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: AcceptResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.friend.id, alice.user.id);

        // both sides list each other, the pending request is gone.
        let bobs = list_relationships(&app, &bob.token).await;
        assert!(bobs.friend_requests.is_empty());
        assert_eq!(bobs.friends.len(), 1);
        assert_eq!(bobs.friends[0].id, alice.user.id);

        let alices = list_relationships(&app, &alice.token).await;
        assert_eq!(alices.friends.len(), 1);
        assert_eq!(alices.friends[0].id, bob.user.id);

        // a new request between friends conflicts.
        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(message_of(response).await, "Already friends");
    }

    #[sqlx::test]
    async fn test_accept_without_pending_request(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        let response = make_request(
            app,
            Method::PUT,
            "/user/friends",
            Some(&bob.token),
            json!({ "userId": alice.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    async fn test_reject_twice_fails_second_time(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(
            app.clone(),
            Method::DELETE,
            "/user/friends",
            Some(&bob.token),
            json!({ "userId": alice.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(message_of(response).await, "Friend request rejected");

        // rejection is not idempotent: the entry is gone.
        let response = make_request(
            app.clone(),
            Method::DELETE,
            "/user/friends",
            Some(&bob.token),
            json!({ "userId": alice.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // and no friendship was created.
        let relationships = list_relationships(&app, &bob.token).await;
        assert!(relationships.friends.is_empty());
        assert!(relationships.friend_requests.is_empty());
    }

    #[sqlx::test]
    async fn test_remove_friend(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        // not friends yet.
        let response = make_request(
            app.clone(),
            Method::DELETE,
            "/user/friends",
            Some(&alice.token),
            json!({ "userId": bob.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = make_request(
            app.clone(),
            Method::PUT,
            "/user/friends",
            Some(&bob.token),
            json!({ "userId": alice.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = make_request(
            app.clone(),
            Method::DELETE,
            "/user/friends",
            Some(&alice.token),
            json!({ "userId": bob.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(message_of(response).await, "Friend removed successfully");

        // neither list contains the other afterwards.
        let alices = list_relationships(&app, &alice.token).await;
        assert!(alices.friends.is_empty());
        let bobs = list_relationships(&app, &bob.token).await;
        assert!(bobs.friends.is_empty());
    }

    #[sqlx::test]
    async fn test_racing_accepts_claim_once(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json!({ "userId": alice.user.id }).to_string();
        let (first, second) = tokio::join!(
            make_request(
                app.clone(),
                Method::PUT,
                "/user/friends",
                Some(&bob.token),
                body.clone(),
            ),
            make_request(
                app.clone(),
                Method::PUT,
                "/user/friends",
                Some(&bob.token),
                body,
            ),
        );

        // the pending row can only be claimed once.
        let mut statuses = [first.status(), second.status()];
        statuses.sort_unstable();
        assert_eq!(statuses, [StatusCode::OK, StatusCode::NOT_FOUND]);

        // exactly one symmetric friendship, two rows.
        let (rows,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM friendships")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(rows, 2);
    }

    #[sqlx::test]
    async fn test_accept_clears_reverse_request(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;
        let bob = router::tests::register(&app, "bob", "bob@x.com", "password2").await;

        let response = send_request(&app, &alice.token, "bob").await;
        assert_eq!(response.status(), StatusCode::OK);

        // two opposite sends racing past the pre-checks leave both
        // directions pending.
        sqlx::query(
            "INSERT INTO friend_requests (recipient_id, sender_id) VALUES ($1, $2)",
        )
        .bind(alice.user.id)
        .bind(bob.user.id)
        .execute(&pool)
        .await
        .unwrap();

        let response = make_request(
            app.clone(),
            Method::PUT,
            "/user/friends",
            Some(&bob.token),
            json!({ "userId": alice.user.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // no pending request survives between friends, either direction.
        let (pending,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM friend_requests")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(pending, 0);

        let alices = list_relationships(&app, &alice.token).await;
        assert_eq!(alices.friends.len(), 1);
        assert!(alices.friend_requests.is_empty());
    }

    #[sqlx::test]
    async fn test_accept_with_malformed_body(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let alice =
            router::tests::register(&app, "alice", "alice@x.com", "password1").await;

        for method in [Method::PUT, Method::DELETE] {
            let response = make_request(
                app.clone(),
                method,
                "/user/friends",
                Some(&alice.token),
                "{}".into(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[sqlx::test]
    async fn test_friends_requires_token(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let app = app(state);

        let response = make_request(
            app,
            Method::GET,
            "/user/friends",
            None,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
