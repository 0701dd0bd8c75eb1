use std::collections::BTreeMap;
use std::sync::Arc;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use common::{EngineCommand, EngineState, Snapshot, SnapshotStore};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub command_tx: mpsc::Sender<EngineCommand>,
    pub engine_state: Arc<RwLock<EngineState>>,
    /// Chats allowed to operate the bot.
    pub allowed_chat_ids: Arc<Vec<i64>>,
    pub snapshots: SnapshotStore,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Bonker commands:")]
pub enum Command {
    #[command(description = "Start monitoring")]
    Start,
    #[command(description = "Stop monitoring and forget alert history")]
    Stop,
    #[command(description = "Keep monitoring but mute alerts")]
    Pause,
    #[command(description = "Unmute alerts")]
    Resume,
    #[command(description = "Show engine state and latest statuses")]
    Status,
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(bot: Bot, deps: BotDeps) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Stop].endpoint(handle_stop))
        .branch(case![Command::Pause].endpoint(handle_pause))
        .branch(case![Command::Resume].endpoint(handle_resume))
        .branch(case![Command::Status].endpoint(handle_status));

    Update::filter_message()
        .filter_map(|msg: Message| Some(msg.chat.id))
        .filter_async(auth_filter)
        .branch(command_handler)
}

/// Silently drop messages from chats not in the allowed list.
async fn auth_filter(chat_id: ChatId, deps: Arc<BotDeps>) -> bool {
    let allowed = deps.allowed_chat_ids.contains(&chat_id.0);
    if !allowed {
        warn!(chat_id = chat_id.0, "Unauthorized Telegram access attempt");
    }
    allowed
}

async fn handle_start(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    if state != EngineState::Stopped {
        bot.send_message(msg.chat.id, format!("Engine is already {state}."))
            .await?;
    } else {
        let _ = deps.command_tx.send(EngineCommand::Start).await;
        bot.send_message(msg.chat.id, "Monitoring started.").await?;
    }
    Ok(())
}

async fn handle_stop(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    if state == EngineState::Stopped {
        bot.send_message(msg.chat.id, "Engine is already stopped.").await?;
    } else {
        let _ = deps.command_tx.send(EngineCommand::Stop).await;
        bot.send_message(msg.chat.id, "Monitoring stopped.").await?;
    }
    Ok(())
}

async fn handle_pause(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    if state != EngineState::Running {
        bot.send_message(msg.chat.id, format!("Cannot pause: engine is {state}."))
            .await?;
    } else {
        let _ = deps.command_tx.send(EngineCommand::Pause).await;
        bot.send_message(msg.chat.id, "Alerts muted. Monitoring continues.")
            .await?;
    }
    Ok(())
}

async fn handle_resume(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    if state != EngineState::Paused {
        bot.send_message(msg.chat.id, "Engine is not paused.").await?;
    } else {
        let _ = deps.command_tx.send(EngineCommand::Resume).await;
        bot.send_message(msg.chat.id, "Alerts resumed.").await?;
    }
    Ok(())
}

async fn handle_status(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = *deps.engine_state.read().await;
    let text = {
        let snapshots = deps.snapshots.read().await;
        format_status(state, &snapshots)
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Operator-facing summary: engine state, then each symbol's alignment and
/// pairing statuses.
pub fn format_status(state: EngineState, snapshots: &BTreeMap<String, Snapshot>) -> String {
    let mut text = format!("Bonker Status\nEngine: {state}");
    if snapshots.is_empty() {
        text.push_str("\nNo evaluations yet.");
        return text;
    }
    for (symbol, snap) in snapshots {
        text.push_str(&format!(
            "\n\n{symbol} @ {}\nSwing: {}",
            snap.evaluated_at.format("%H:%M:%S UTC"),
            snap.alignment
        ));
        for p in &snap.pairings {
            let direction = p.report.trend.map_or("-", |r| r.direction());
            text.push_str(&format!(
                "\n{} {} ({}/{}): {}",
                p.name, direction, p.setup, p.filter, p.report.status
            ));
            if let Some(early) = &p.report.early {
                text.push_str(&format!("\n  ↳ {early}"));
            }
        }
    }
    text
}
