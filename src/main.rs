use std::sync::Arc;

use futures::StreamExt;

use vacancy_relay::channels::{Listener, Publisher, TelegramChannel};
use vacancy_relay::classifier::OpenAiClassifier;
use vacancy_relay::config::Config;
use vacancy_relay::error::{ChannelError, Error};
use vacancy_relay::pipeline::Pipeline;
use vacancy_relay::status::status_routes;
use vacancy_relay::store::{LibSqlStore, MessageStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Configuration is all-or-nothing: an incomplete environment must not
    // reach listener registration.
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  See .env.example for the required variables.");
        std::process::exit(1);
    });

    eprintln!("📡 Vacancy Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Account: {} (api_id {})", config.telegram.phone, config.telegram.api_id);
    eprintln!("   Model: {}", config.classifier.model);
    eprintln!(
        "   Listening: {}",
        config.telegram.source_channels.join(", ")
    );
    eprintln!("   Publishing to: {}", config.telegram.target_chat);
    eprintln!("   Status: http://0.0.0.0:{}/health", config.status_port);

    // ── Database ─────────────────────────────────────────────────────
    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn MessageStore> =
        Arc::new(LibSqlStore::new_local(db_path).await.unwrap_or_else(|e| {
            eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
            std::process::exit(1);
        }));
    eprintln!("   Database: {}\n", config.db_path);

    // ── Transport + classifier ───────────────────────────────────────
    let telegram = Arc::new(TelegramChannel::new(&config.telegram));
    let classifier = Arc::new(OpenAiClassifier::new(&config.classifier));

    if let Err(e) = telegram.health_check().await {
        tracing::warn!(error = %e, "Telegram health check failed; continuing anyway");
    }

    // ── Status surface ───────────────────────────────────────────────
    let app = status_routes(Arc::clone(&store), telegram.connected_flag());
    let status_port = config.status_port;
    tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", status_port))
            .await
            .expect("Failed to bind status port");
        tracing::info!(port = status_port, "Status server started");
        axum::serve(listener, app).await.ok();
    });

    // ── Pipeline ─────────────────────────────────────────────────────
    let publisher: Arc<dyn Publisher> = Arc::clone(&telegram);
    let pipeline = Arc::new(Pipeline::new(
        classifier,
        Arc::clone(&store),
        publisher,
        config.telegram.target_chat.clone(),
        config.classifier.timeout,
        config.classifier.max_concurrent,
    ));

    let mut messages = telegram.start().await?;

    // One independent task per message: a slow classification call for one
    // message never blocks the others. Arrival order within a channel is
    // preserved at spawn time; completion order may interleave.
    while let Some(msg) = messages.next().await {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(msg).await {
                tracing::error!(error = %e, "Pipeline run failed");
            }
        });
    }

    // The poller only ends its stream when another process has taken over
    // the session token.
    Err(Error::Channel(ChannelError::SessionConflict {
        name: "telegram".into(),
    })
    .into())
}
