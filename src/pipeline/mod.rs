//! Pipeline coordinator — one run per inbound message.
//!
//! Every message flows classify → extract → filter → persist → publish,
//! strictly sequential within a run. Runs are independent tasks; a failure
//! in one never stops the listener or other in-flight runs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::channels::{PublishOptions, Publisher, RawInboundMessage};
use crate::classifier::{Classifier, NOT_A_VACANCY};
use crate::error::{ClassifierError, PipelineError};
use crate::extract;
use crate::filter;
use crate::store::MessageStore;

/// Call-to-action appended to every published listing.
const PUBLISH_CTA: &str = "\n\n<i>Откликайтесь по контактам из объявления.</i>";

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The acceptance filter declined the record. Expected and frequent —
    /// not a failure.
    Rejected,
    /// Stored and delivered to the destination chat.
    Published { id: i64 },
}

/// Wires classifier, store, and publisher together.
///
/// Constructed once at startup with explicit resources and held for the
/// process lifetime; holds no per-message state.
pub struct Pipeline {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn Publisher>,
    target_chat: String,
    /// Bounds simultaneous in-flight classification calls.
    classify_limit: Arc<Semaphore>,
    classify_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        store: Arc<dyn MessageStore>,
        publisher: Arc<dyn Publisher>,
        target_chat: String,
        classify_timeout: Duration,
        classify_max_concurrent: usize,
    ) -> Self {
        Self {
            classifier,
            store,
            publisher,
            target_chat,
            classify_limit: Arc::new(Semaphore::new(classify_max_concurrent.max(1))),
            classify_timeout,
        }
    }

    /// Process one inbound message to completion.
    ///
    /// Classification failures degrade to the sentinel and the run
    /// continues. Persistence and publish failures abort the run with an
    /// error; an already-stored row is never rolled back on publish
    /// failure — stored-but-not-published is a visible, accepted state.
    pub async fn run(&self, msg: RawInboundMessage) -> Result<RunOutcome, PipelineError> {
        let raw_reply = match self.classify(&msg.text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    channel = %msg.channel_id,
                    error = %e,
                    "Classification failed; treating reply as not a vacancy"
                );
                NOT_A_VACANCY.to_string()
            }
        };

        let record = extract::extract(&raw_reply);

        if !filter::accepts(&record) {
            debug!(channel = %msg.channel_id, "Record rejected by acceptance filter");
            return Ok(RunOutcome::Rejected);
        }

        let id = self
            .store
            .append(&msg.channel_id, &record.message, &record.phone)
            .await?;
        info!(id, channel = %msg.channel_id, "Listing stored");

        let body = format!("{}{PUBLISH_CTA}", record.message);
        let options = PublishOptions {
            disable_link_preview: true,
            inline_buttons: Vec::new(),
        };
        self.publisher
            .publish(&self.target_chat, &body, &options)
            .await?;
        info!(id, target = %self.target_chat, "Listing published");

        Ok(RunOutcome::Published { id })
    }

    async fn classify(&self, text: &str) -> Result<String, ClassifierError> {
        let _permit = self.classify_limit.acquire().await.map_err(|_| {
            ClassifierError::RequestFailed {
                provider: "classifier".into(),
                reason: "concurrency limiter closed".into(),
            }
        })?;

        match tokio::time::timeout(self.classify_timeout, self.classifier.classify(text)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout {
                timeout: self.classify_timeout,
            }),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────
