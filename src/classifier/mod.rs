//! Language-model classification of inbound channel posts.
//!
//! One request per message, no batching, no streaming, no retries. The
//! model is asked to either answer with the fixed not-a-vacancy sentinel
//! or with a single-line JSON object `{"phone": "...", "message": "..."}`.
//! The reply is free text as far as this module is concerned — repairing
//! it into a structured record is `extract`'s job.

pub mod openai;

pub use openai::OpenAiClassifier;

use async_trait::async_trait;

use crate::error::ClassifierError;

/// Exact reply the model gives for anything that is not a job posting.
pub const NOT_A_VACANCY: &str = "Не вакансия";

/// Fixed instruction sent with every classification request.
///
/// The channels are Russian/Belarusian job boards, so the instruction is
/// written in the language the posts arrive in.
pub(crate) const INSTRUCTION: &str = "Ты определяешь, является ли сообщение вакансией. \
Если это не вакансия, ответь ровно: \"Не вакансия\". \
Если это вакансия, верни одну строку JSON вида {\"phone\": \"{{PHONE}}\", \"message\": \"{{MESSAGE}}\"}, \
где {{PHONE}} — телефон или ссылка на телеграм из текста (пустая строка, если контакта нет), \
а {{MESSAGE}} — текст вакансии, красиво отформатированный для отображения в HTML \
(можно использовать HTML-теги), с переводами строк, экранированными как \\n.";

/// Sends message text to a language model and returns its raw reply.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<String, ClassifierError>;
}
