//! Optional status server: liveness and capture counts.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{error, info};

use crate::store::stats::DatabaseStats;
use crate::store::Store;

pub fn router(store: Store) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/stats", get(stats))
        .with_state(store)
}

async fn index() -> &'static str {
    "groupvault is running"
}

async fn stats(State(store): State<Store>) -> Result<Json<DatabaseStats>, (StatusCode, String)> {
    store.database_stats().await.map(Json).map_err(|e| {
        error!("Failed to read stats: {:#}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

pub async fn serve(addr: SocketAddr, store: Store) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("Status server listening on http://{}", addr);

    axum::serve(listener, router(store))
        .await
        .context("Server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelId;

    #[tokio::test]
    async fn test_index_text() {
        assert_eq!(index().await, "groupvault is running");
    }

    #[tokio::test]
    async fn test_stats_reports_counts() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_channel(ChannelId(-1), Some("A")).await.unwrap();

        let Json(body) = stats(State(store)).await.unwrap();
        assert_eq!(body.channels, 1);
        assert_eq!(body.topics, 1);
        assert_eq!(body.messages, 0);

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["channels"], 1);
    }
}
