//! Token validation: resolve the bearer token back to its account.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::Result;
use crate::user::{PublicUser, User};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user: PublicUser,
}

pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Response>> {
    let friends = state.users().friend_ids(user.id).await?;

    Ok(Json(Response {
        user: PublicUser::new(user, friends),
    }))
}
