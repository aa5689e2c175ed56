//! Chat transport boundary — message intake and listing delivery.

pub mod telegram;

pub use telegram::TelegramChannel;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// A message as received from the chat transport.
///
/// Immutable; dropped once its pipeline run finishes.
#[derive(Debug, Clone)]
pub struct RawInboundMessage {
    /// Originating channel reference (e.g. `@pratsa_vakansii`).
    pub channel_id: String,
    /// Message text. The transport drops empty updates, so this is never
    /// empty by the time a run sees it.
    pub text: String,
}

/// Stream of inbound messages produced by a [`Listener`].
pub type MessageStream = Pin<Box<dyn Stream<Item = RawInboundMessage> + Send>>;

/// Message intake side of a chat transport.
#[async_trait]
pub trait Listener: Send + Sync {
    fn name(&self) -> &str;

    /// Begin receiving messages from the subscribed channels.
    ///
    /// The returned stream ends only when the transport hits a fatal
    /// condition (another process took over the session).
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;
}

/// Delivery options for a published listing.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    pub disable_link_preview: bool,
    pub inline_buttons: Vec<InlineButton>,
}

/// A URL button attached under a published listing.
#[derive(Debug, Clone)]
pub struct InlineButton {
    pub text: String,
    pub url: String,
}

/// Delivery side of a chat transport.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver an HTML-formatted listing to the destination chat.
    async fn publish(
        &self,
        channel_ref: &str,
        html_body: &str,
        options: &PublishOptions,
    ) -> Result<(), ChannelError>;
}
