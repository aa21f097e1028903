use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::mail::Template::Welcome;
use crate::router::Valid;
use crate::user::PublicUser;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 8,
        max = 255,
        message = "Password must contain at least 8 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name is required."))]
    pub name: String,
    #[validate(
        length(min = 2, max = 30),
        custom(
            function = "crate::router::validate_username",
            message = "Username must be alphanumeric."
        )
    )]
    pub username: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user: PublicUser,
    pub token: String,
}

/// Handler to create a user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Response>)> {
    let password_hash = state.crypto.hash_password(&body.password)?;
    let user = state
        .users()
        .insert(&body.email, &body.username, &body.name, &password_hash)
        .await?;

    let token = state.token.create(user.id)?;

    if let Err(err) = state
        .mail
        .publish_event(Welcome, &user.email, &user.name, None, &state.config.url)
        .await
    {
        tracing::warn!(user_id = %user.id, error = %err, "welcome mail not sent");
    }

    Ok((
        StatusCode::CREATED,
        Json(Response {
            user: PublicUser::new(user, Vec::new()),
            token,
        }),
    ))
}
