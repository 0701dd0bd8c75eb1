use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::debug;

use common::{Error, Notifier, Result};

/// Delivers alert text to Telegram chats. Destinations are chat ids.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn from_bot(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Parse a destination string into a Telegram chat id.
pub fn parse_chat_id(destination: &str) -> Result<ChatId> {
    destination
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| Error::Notification(format!("invalid chat id '{destination}'")))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, destination: &str, message: &str) -> Result<()> {
        let chat_id = parse_chat_id(destination)?;
        self.bot
            .send_message(chat_id, message)
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;
        debug!(chat_id = chat_id.0, "Telegram alert sent");
        Ok(())
    }
}
