use axum::routing::get;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};

use vigil::{app, initialize_state, telemetry};

const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_subscriber();

    let state = initialize_state().await?;

    let recorder = telemetry::setup_metrics_recorder()?;
    let app = app(state)
        .route("/metrics", get(move || async move { recorder.render() }));

    let port = std::env::var("PORT").unwrap_or_else(|_| DEFAULT_PORT.into());
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(%port, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM so in-flight requests can finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("cannot install Ctrl+C handler");
    };

    let terminate = async {
        signal(SignalKind::terminate())
            .expect("cannot install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
