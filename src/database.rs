//! PostgreSQL pool, migrated on creation.

use axum::extract::FromRef;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::AppState;
use crate::config;
use crate::error::Result;

const DEFAULT_CREDENTIALS: &str = "postgres";
const DEFAULT_DATABASE_NAME: &str = "vigil";
const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Connect to PostgreSQL from the `postgres` configuration section and
    /// apply pending migrations. The pool is the only store handle the
    /// application owns; repositories clone it.
    pub async fn new(config: &config::Postgres) -> Result<Self> {
        let username =
            config.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let password =
            config.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let database =
            config.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);

        let addr = format!(
            "postgres://{username}:{password}@{}/{database}",
            config.address,
        );
        let postgres = PgPoolOptions::new()
            .max_connections(config.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(&addr)
            .await?;

        sqlx::migrate!().run(&postgres).await?;

        tracing::info!(address = %config.address, %database, "postgres connected");

        Ok(Self { postgres })
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(app_state: &AppState) -> Database {
        app_state.db.clone()
    }
}
