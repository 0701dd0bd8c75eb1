pub mod commands;
pub mod notifier;

pub use commands::{format_status, start_bot, BotDeps, Command};
pub use notifier::TelegramNotifier;
