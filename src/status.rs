//! HTTP status surface — service health and the stored-listing dump.
//!
//! Boundary interface only: two read-only endpoints plus a JSON 404
//! fallback. Nothing here participates in pipeline decisions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use tracing::warn;

use crate::store::MessageStore;

/// State shared across status handlers.
#[derive(Clone)]
pub struct StatusState {
    pub store: Arc<dyn MessageStore>,
    /// Mirrors the transport's polling health.
    pub connected: Arc<AtomicBool>,
    pub started_at: Instant,
}

/// Build the status router.
pub fn status_routes(
    store: Arc<dyn MessageStore>,
    connected: Arc<AtomicBool>,
) -> Router {
    let state = StatusState {
        store,
        connected,
        started_at: Instant::now(),
    };

    Router::new()
        .route("/health", get(health))
        .route("/messages", get(list_messages))
        .fallback(not_found)
        .with_state(state)
}

async fn health(State(state): State<StatusState>) -> impl IntoResponse {
    let message_count = match state.store.count().await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Message count unavailable for health report");
            0
        }
    };

    Json(serde_json::json!({
        "status": "ok",
        "connected": state.connected.load(Ordering::Relaxed),
        "messageCount": message_count,
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn list_messages(State(state): State<StatusState>) -> impl IntoResponse {
    match state.store.list_all().await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;

    /// Serve the router on an ephemeral port and return its base URL.
    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    async fn test_state() -> (Arc<LibSqlStore>, Arc<AtomicBool>, String) {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let connected = Arc::new(AtomicBool::new(true));
        let base = spawn_server(status_routes(store.clone(), connected.clone())).await;
        (store, connected, base)
    }

    #[tokio::test]
    async fn health_reports_count_and_connection() {
        let (store, connected, base) = test_state().await;
        store
            .append("@jobs", "Нужен курьер по Минску, з/п от 1000 BYN", "")
            .await
            .unwrap();

        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["connected"], true);
        assert_eq!(body["messageCount"], 1);
        assert!(body["uptimeSeconds"].is_u64());
        assert!(body["timestamp"].is_string());

        connected.store(false, Ordering::Relaxed);
        let body: serde_json::Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["connected"], false);
    }

    #[tokio::test]
    async fn messages_returns_the_full_list_newest_first() {
        let (store, _connected, base) = test_state().await;
        store.append("@a", "первое объявление", "").await.unwrap();
        store
            .append("@b", "второе объявление", "+375291234567")
            .await
            .unwrap();

        let body: serde_json::Value = reqwest::get(format!("{base}/messages"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["message"], "второе объявление");
        assert_eq!(list[0]["phone"], "+375291234567");
        assert_eq!(list[1]["channel"], "@a");
    }

    #[tokio::test]
    async fn unknown_path_is_json_404() {
        let (_store, _connected, base) = test_state().await;
        let resp = reqwest::get(format!("{base}/nope")).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "not found");
    }
}
