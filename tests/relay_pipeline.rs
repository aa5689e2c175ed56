//! End-to-end pipeline scenarios with a scripted classifier.
//!
//! Exercises the whole run — classify, extract, filter, persist, publish —
//! against the real in-memory store, with the language model and the chat
//! transport replaced by test doubles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vacancy_relay::channels::{PublishOptions, Publisher, RawInboundMessage};
use vacancy_relay::classifier::{Classifier, NOT_A_VACANCY};
use vacancy_relay::error::{ChannelError, ClassifierError};
use vacancy_relay::pipeline::{Pipeline, RunOutcome};
use vacancy_relay::store::{LibSqlStore, MessageStore};

/// Replies with a fixed string regardless of input.
struct ScriptedClassifier {
    reply: String,
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> Result<String, ClassifierError> {
        Ok(self.reply.clone())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        channel_ref: &str,
        html_body: &str,
        _options: &PublishOptions,
    ) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_ref.to_string(), html_body.to_string()));
        Ok(())
    }
}

async fn pipeline_for(
    reply: &str,
) -> (Pipeline, Arc<LibSqlStore>, Arc<RecordingPublisher>) {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let publisher = Arc::new(RecordingPublisher::default());
    let pipeline = Pipeline::new(
        Arc::new(ScriptedClassifier {
            reply: reply.to_string(),
        }),
        store.clone(),
        publisher.clone(),
        "@minsk_jobs_feed".into(),
        Duration::from_secs(5),
        4,
    );
    (pipeline, store, publisher)
}

fn from_channel(text: &str) -> RawInboundMessage {
    RawInboundMessage {
        channel_id: "@pratsa_vakansii".into(),
        text: text.into(),
    }
}

#[tokio::test]
async fn job_posting_is_stored_and_republished() {
    let listing = "💼 <b>Курьер</b>\\nДоставка документов по Минску, график 5/2, з/п 1000 BYN";
    let reply = format!(r#"{{"phone": "+375291234567", "message": "{listing}"}}"#);
    let (pipeline, store, publisher) = pipeline_for(&reply).await;

    let outcome = pipeline
        .run(from_channel(
            "Ищем курьера, зарплата 1000 BYN, звонить +375291234567",
        ))
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Published { .. }));

    let stored = store.list_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].phone, "+375291234567");
    assert_eq!(stored[0].channel, "@pratsa_vakansii");
    assert!(stored[0].message.contains("<b>Курьер</b>"));

    let sent = publisher.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "@minsk_jobs_feed");
    // Published body is the stored message plus the call-to-action suffix.
    assert!(sent[0].1.starts_with(&stored[0].message));
    assert!(sent[0].1.len() > stored[0].message.len());
}

#[tokio::test]
async fn small_talk_is_dropped_without_side_effects() {
    let (pipeline, store, publisher) = pipeline_for(NOT_A_VACANCY).await;

    let outcome = pipeline.run(from_channel("Привет, как дела?")).await.unwrap();
    assert_eq!(outcome, RunOutcome::Rejected);
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(publisher.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn prose_wrapped_reply_is_recovered() {
    let reply = concat!(
        "Конечно! Вот структурированная вакансия:\n",
        r#"{"phone": "@ivan_hr", "message": "Требуется бухгалтер на полный день, офис в центре Минска, оклад 2000 BYN"}"#,
        "\nЕсли нужно что-то ещё — обращайтесь."
    );
    let (pipeline, store, _publisher) = pipeline_for(reply).await;

    let outcome = pipeline.run(from_channel("вакансия бухгалтера")).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Published { .. }));

    let stored = store.list_all().await.unwrap();
    assert_eq!(stored[0].phone, "@ivan_hr");
    assert!(stored[0].message.starts_with("Требуется бухгалтер"));
    // Trailing commentary must not leak into the stored listing.
    assert!(!stored[0].message.contains("обращайтесь"));
}

#[tokio::test]
async fn runs_are_independent_across_messages() {
    let listing = "Нужен сварщик на постоянную работу, опыт от 2 лет, з/п от 2500 BYN";
    let reply = format!(r#"{{"phone": "", "message": "{listing}"}}"#);
    let (pipeline, store, _publisher) = pipeline_for(&reply).await;
    let pipeline = Arc::new(pipeline);

    let mut handles = Vec::new();
    for i in 0..5 {
        let p = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            p.run(from_channel(&format!("вакансия {i}"))).await
        }));
    }
    for h in handles {
        assert!(h.await.unwrap().is_ok());
    }

    assert_eq!(store.count().await.unwrap(), 5);

    // Ids are unique and monotonic even with interleaved completions.
    let ids: Vec<i64> = store.list_all().await.unwrap().iter().map(|m| m.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 5);
}
