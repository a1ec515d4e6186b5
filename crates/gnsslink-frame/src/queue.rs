//! Hand-off of framed telegrams to the consumer.
//!
//! The framing side only ever pushes; it never waits for the consumer. Any
//! unbounded channel works as a sink.

use std::sync::Arc;

use tracing::debug;

use crate::telegram::Telegram;

/// Destination for complete telegrams.
///
/// `push` must not block. Telegrams pushed after the consumer went away are
/// dropped.
pub trait TelegramSink: Send + Sync + 'static {
    fn push(&self, telegram: Telegram);
}

impl TelegramSink for std::sync::mpsc::Sender<Telegram> {
    fn push(&self, telegram: Telegram) {
        if let Err(err) = self.send(telegram) {
            debug!(format = %err.0.format, "telegram consumer gone, dropping");
        }
    }
}

#[cfg(feature = "async")]
impl TelegramSink for tokio::sync::mpsc::UnboundedSender<Telegram> {
    fn push(&self, telegram: Telegram) {
        if let Err(err) = self.send(telegram) {
            debug!(format = %err.0.format, "telegram consumer gone, dropping");
        }
    }
}

impl<S: TelegramSink + ?Sized> TelegramSink for Arc<S> {
    fn push(&self, telegram: Telegram) {
        (**self).push(telegram);
    }
}
