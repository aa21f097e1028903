//! Find users to befriend.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::user::{User, UserSummary};

#[derive(Debug, Deserialize)]
pub struct Params {
    q: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub users: Vec<UserSummary>,
}

/// Handler to search users by name or username.
///
/// The caller and their existing friends never show up in the results.
pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(params): Query<Params>,
) -> Result<Json<Response>> {
    let query = params.q.as_deref().unwrap_or_default().trim().to_owned();
    if query.is_empty() {
        return Err(ServerError::Invalid("Search query is required".into()));
    }

    let users = state.users().search(&query, user.id).await?;

    Ok(Json(Response { users }))
}
