use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::user::PublicUser;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[validate(length(min = 1, message = "Missing email/username."))]
    pub email_or_username: String,
    #[validate(length(min = 1, message = "Missing password."))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user: PublicUser,
    pub token: String,
}

/// Handler to log a user in with email or username.
///
/// Unknown account and wrong password both resolve to the same 401 so the
/// response does not leak which accounts exist.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let user = state
        .users()
        .find_by_credential(&body.email_or_username)
        .await
        .map_err(|_| ServerError::Credentials)?;

    if !state.crypto.verify_password(&body.password, &user.password)? {
        return Err(ServerError::Credentials);
    }

    let token = state.token.create(user.id)?;
    let friends = state.users().friend_ids(user.id).await?;

    Ok(Json(Response {
        user: PublicUser::new(user, friends),
        token,
    }))
}
