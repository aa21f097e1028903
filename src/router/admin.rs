//! Instance-wide user overview for operators.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::{User, UserOverview};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub users: Vec<UserOverview>,
}

/// Handler to list every account with its relation counts.
///
/// Restricted to usernames listed under `admins` in the configuration.
pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Response>> {
    if !state.config.admins.contains(&user.username) {
        return Err(ServerError::Forbidden("Not authorized".into()));
    }

    let users = state.users().overview().await?;

    Ok(Json(Response { users }))
}
