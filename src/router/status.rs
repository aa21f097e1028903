//! Public instance metadata.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::config::Configuration;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub name: String,
    pub url: String,
    pub version: String,
}

/// Handler exposing instance name, url and version. No secrets, no auth.
pub async fn handler(
    State(config): State<Arc<Configuration>>,
) -> Json<Response> {
    Json(Response {
        name: config.name.clone(),
        url: config.url.clone(),
        version: config.version().to_owned(),
    })
}
