use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, EngineCommand, MarketDataProvider, Notifier};
use engine::{BinanceClient, Engine, EngineSettings};
use structure::{PairingFileConfig, PairingSet};
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(
        symbols = ?cfg.symbols,
        interval = ?cfg.poll_interval.get(),
        lookback = cfg.lookback.get(),
        "Bonker starting"
    );

    // ── Pairings ──────────────────────────────────────────────────────────────
    let pairing_file = match &cfg.pairings_path {
        Some(path) => PairingFileConfig::load(path)
            .with_context(|| format!("failed to load pairings from {path}"))?,
        None => {
            info!("PAIRINGS_PATH not set, using built-in pairings");
            PairingFileConfig::default()
        }
    };
    let pairings = PairingSet::new(pairing_file, cfg.lookback);

    // ── Collaborators ─────────────────────────────────────────────────────────
    let provider: Arc<dyn MarketDataProvider> = Arc::new(
        BinanceClient::new(cfg.fetch_timeout).context("failed to build market data client")?,
    );

    let bot = cfg.telegram_token.as_deref().map(teloxide::Bot::new);
    let notifier: Option<Arc<dyn Notifier>> = match &bot {
        Some(bot) if cfg.notifications_enabled => {
            if cfg.telegram_chat_ids.is_empty() {
                warn!("TELEGRAM_CHAT_IDS is empty, alerts have nowhere to go");
            }
            Some(Arc::new(TelegramNotifier::from_bot(bot.clone())))
        }
        _ => {
            info!("Notifications disabled");
            None
        }
    };

    // ── Engine ────────────────────────────────────────────────────────────────
    let (engine, handle) = Engine::new(
        EngineSettings::from_config(&cfg),
        pairings,
        provider,
        notifier,
    );
    tokio::spawn(engine.run());
    if cfg.autostart {
        handle.send(EngineCommand::Start).await;
    }

    // ── Telegram C2 ───────────────────────────────────────────────────────────
    match bot {
        Some(bot) => {
            let deps = BotDeps {
                command_tx: handle.command_sender(),
                engine_state: handle.state_handle(),
                allowed_chat_ids: Arc::new(cfg.telegram_chat_ids.clone()),
                snapshots: handle.snapshots(),
            };
            tokio::spawn(start_bot(bot, deps));
        }
        None => warn!("TELEGRAM_TOKEN not set, operator bot disabled"),
    }

    // ── Dashboard API ─────────────────────────────────────────────────────────
    match cfg.dashboard_token.clone() {
        Some(dashboard_token) => {
            let state = api::AppState {
                engine_state: handle.state_handle(),
                dashboard_token,
                snapshots: handle.snapshots(),
                snapshot_tx: handle.snapshot_sender(),
            };
            let port = cfg.dashboard_port;
            tokio::spawn(async move {
                if let Err(e) = api::serve(state, port).await {
                    error!(error = %e, "Dashboard API stopped");
                }
            });
        }
        None => info!("DASHBOARD_TOKEN not set, dashboard API disabled"),
    }

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received. Exiting.");
    handle.send(EngineCommand::Stop).await;
    Ok(())
}
