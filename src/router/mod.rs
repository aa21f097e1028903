//! HTTP surface of the API.

pub mod admin;
pub mod check_in;
pub mod friends;
pub mod login;
pub mod ping;
pub mod register;
pub mod search;
pub mod status;
pub mod validate;

use std::str::FromStr;

use axum::Json;
use axum::extract::{FromRequest, Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::ServerError;
use crate::AppState;

const BEARER: &str = "Bearer ";

/// Custom middleware for authentication.
///
/// Resolves the bearer token to exactly one user and attaches it to the
/// request; everything else (missing header, malformed or expired token,
/// vanished user) is a 401.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;
    let token = token.strip_prefix(BEARER).unwrap_or(token);

    let claims = state.token.decode(token)?;
    let user_id =
        Uuid::from_str(&claims.sub).map_err(|_| ServerError::Unauthorized)?;

    // A vanished account is a 401; a store failure stays a 500.
    let user = match state.users().find_by_id(user_id).await {
        Ok(user) => user,
        Err(ServerError::NotFound(_)) => return Err(ServerError::Unauthorized),
        Err(err) => return Err(err),
    };

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Json extractor running `validator` rules before the handler.
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Public handles must be alphanumeric, `-` or `_`.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username"))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::Router;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use sqlx::{Pool, Postgres};
    use std::sync::Arc;

    use crate::database::Database;
    use crate::{AppState, config, crypto, mail, make_request, token};

    pub const TEST_SECRET: &str = "not-a-production-secret";

    /// Application state for handler tests: real pool, disabled mail
    /// transport, fixed signing secret.
    pub fn state(pool: Pool<Postgres>) -> AppState {
        let mut config = config::Configuration::default();
        config.name = "vigil".into();
        config.url = "https://vigil.test/".into();
        config.admins = vec!["admin".into()];

        AppState {
            config: Arc::new(config),
            db: Database { postgres: pool },
            crypto: Arc::new(
                crypto::Crypto::new(Some(config::Argon2 {
                    memory_cost: 1024,
                    iterations: 1,
                    parallelism: 1,
                    hash_length: 32,
                }))
                .expect("cannot build argon2"),
            ),
            token: token::TokenManager::new("https://vigil.test/", TEST_SECRET),
            mail: mail::MailManager::default(),
        }
    }

    /// Register a user through the API and hand back the created account
    /// with its bearer token.
    pub async fn register(
        app: &Router,
        username: &str,
        email: &str,
        password: &str,
    ) -> super::register::Response {
        let response = make_request(
            app.clone(),
            Method::POST,
            "/auth/register",
            None,
            json!({
                "email": email,
                "password": password,
                "name": username,
                "username": username,
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }
}
