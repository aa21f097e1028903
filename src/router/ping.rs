//! Ask a friend to check in, by email.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::mail::Template::SafetyPing;
use crate::router::Valid;
use crate::user::User;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub friend_id: Uuid,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
}

/// Handler to send a safety ping to a friend.
///
/// Only the friendship gates the ping. Mail delivery is best-effort: a
/// transport failure is reported back but never turns into an error status.
pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let friend = state
        .users()
        .find_by_id(body.friend_id)
        .await
        .map_err(|_| ServerError::NotFound("Friend not found".into()))?;

    if !state.friends().are_friends(user.id, friend.id).await? {
        return Err(ServerError::Forbidden(
            "Not authorized to ping this user".into(),
        ));
    }

    let message = match state
        .mail
        .publish_event(
            SafetyPing,
            &friend.email,
            &friend.name,
            Some(&user.name),
            &state.config.url,
        )
        .await
    {
        Ok(()) => "Ping sent successfully",
        Err(err) => {
            tracing::warn!(friend_id = %friend.id, error = %err, "ping mail not sent");
            "Ping accepted but email delivery failed"
        },
    };

    Ok(Json(Response {
        message: message.into(),
    }))
}
