use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use common::{
    Config, EngineCommand, EngineState, Error, MarketDataProvider, Notifier, PollInterval,
    Snapshot, SnapshotStore, Timeframe,
};
use structure::PairingSet;

use crate::alerts::Alert;
use crate::monitor::{CycleOutcome, SymbolMonitor};

/// Scheduling and delivery knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub symbols: Vec<String>,
    pub poll_interval: PollInterval,
    /// History requested for the native M5 base.
    pub intraday_window: chrono::Duration,
    /// History requested for the native D1 base.
    pub daily_window: chrono::Duration,
    /// Notification destinations (chat ids for Telegram).
    pub destinations: Vec<String>,
    pub notify_timeout: Duration,
}

impl EngineSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            symbols: cfg.symbols.clone(),
            poll_interval: cfg.poll_interval,
            intraday_window: chrono::Duration::days(cfg.intraday_window_days),
            daily_window: chrono::Duration::days(cfg.daily_window_days),
            destinations: cfg.telegram_chat_ids.iter().map(|id| id.to_string()).collect(),
            notify_timeout: cfg.notify_timeout,
        }
    }

    /// Delay before retrying after a failed cycle.
    pub fn error_backoff(&self) -> Duration {
        self.poll_interval.get() * 2
    }

    pub fn window(&self, source: Timeframe) -> chrono::Duration {
        if source.is_intraday() {
            self.intraday_window
        } else {
            self.daily_window
        }
    }
}

/// Cloneable handle passed to other crates (Telegram, API).
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    state: Arc<RwLock<EngineState>>,
    snapshot_tx: broadcast::Sender<Snapshot>,
    snapshots: SnapshotStore,
}

impl EngineHandle {
    pub async fn send(&self, cmd: EngineCommand) {
        let _ = self.command_tx.send(cmd).await;
    }

    pub fn command_sender(&self) -> mpsc::Sender<EngineCommand> {
        self.command_tx.clone()
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    pub fn state_handle(&self) -> Arc<RwLock<EngineState>> {
        self.state.clone()
    }

    /// Subscribe to every snapshot the engine publishes.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot_sender(&self) -> broadcast::Sender<Snapshot> {
        self.snapshot_tx.clone()
    }

    /// Latest snapshot per symbol.
    pub fn snapshots(&self) -> SnapshotStore {
        self.snapshots.clone()
    }
}

/// The polling engine: owns the per-symbol monitors and runs one evaluation
/// cycle per tick while started.
pub struct Engine {
    settings: EngineSettings,
    pairings: PairingSet,
    provider: Arc<dyn MarketDataProvider>,
    notifier: Option<Arc<dyn Notifier>>,
    state: Arc<RwLock<EngineState>>,
    snapshot_tx: broadcast::Sender<Snapshot>,
    snapshots: SnapshotStore,
    command_rx: mpsc::Receiver<EngineCommand>,
    monitors: Vec<SymbolMonitor>,
    next_tick: Instant,
}

impl Engine {
    /// `notifier = None` disables delivery; statuses are still debounced and logged.
    pub fn new(
        settings: EngineSettings,
        pairings: PairingSet,
        provider: Arc<dyn MarketDataProvider>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> (Self, EngineHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (snapshot_tx, _) = broadcast::channel(64);
        let state = Arc::new(RwLock::new(EngineState::Stopped));
        let snapshots = SnapshotStore::default();

        let handle = EngineHandle {
            command_tx,
            state: state.clone(),
            snapshot_tx: snapshot_tx.clone(),
            snapshots: snapshots.clone(),
        };

        let engine = Engine {
            settings,
            pairings,
            provider,
            notifier,
            state,
            snapshot_tx,
            snapshots,
            command_rx,
            monitors: Vec::new(),
            next_tick: Instant::now(),
        };

        (engine, handle)
    }

    /// Run until every `EngineHandle` is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(symbols = ?self.settings.symbols, "Engine initialized in Stopped state. Waiting for Start command.");

        loop {
            let ticking = *self.state.read().await != EngineState::Stopped;
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        warn!("Engine command channel closed, shutting down");
                        break;
                    }
                },
                _ = tokio::time::sleep_until(self.next_tick), if ticking => {
                    let delay = self.run_cycle().await;
                    self.next_tick = Instant::now() + delay;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: EngineCommand) {
        let current = *self.state.read().await;
        match cmd {
            EngineCommand::Start => {
                if current != EngineState::Stopped {
                    info!("Engine already running");
                    return;
                }
                info!(symbols = ?self.settings.symbols, interval = ?self.settings.poll_interval.get(), "Starting monitoring session");
                self.monitors = self
                    .settings
                    .symbols
                    .iter()
                    .map(|s| SymbolMonitor::new(s.clone()))
                    .collect();
                self.next_tick = Instant::now();
                *self.state.write().await = EngineState::Running;
            }
            EngineCommand::Stop => {
                if current == EngineState::Stopped {
                    return;
                }
                info!("Engine stopping, alert state discarded");
                self.monitors.clear();
                *self.state.write().await = EngineState::Stopped;
            }
            EngineCommand::Pause => {
                if current == EngineState::Running {
                    info!("Engine paused, cycles continue, notifications muted");
                    *self.state.write().await = EngineState::Paused;
                }
            }
            EngineCommand::Resume => {
                if current == EngineState::Paused {
                    info!("Engine resumed");
                    *self.state.write().await = EngineState::Running;
                }
            }
        }
    }

    /// One pass over every symbol. Returns the delay until the next pass.
    async fn run_cycle(&mut self) -> Duration {
        let started = Instant::now();
        let settings = &self.settings;
        let mut outcomes: Vec<CycleOutcome> = Vec::with_capacity(self.monitors.len());
        let mut failed = false;

        for monitor in &mut self.monitors {
            let result = match monitor
                .fetch(self.provider.as_ref(), &self.pairings, |tf| settings.window(tf))
                .await
            {
                Ok(bases) => monitor.evaluate(bases, &self.pairings, Utc::now()),
                Err(e) => Err(e),
            };
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e @ Error::DataUnavailable(_)) => {
                    failed = true;
                    warn!(symbol = %monitor.symbol(), error = %e, "Market data unavailable, skipping cycle");
                }
                Err(e) => {
                    failed = true;
                    warn!(symbol = %monitor.symbol(), error = %e, "Evaluation failed");
                }
            }
        }

        let deliver = *self.state.read().await == EngineState::Running;
        for outcome in outcomes {
            if deliver {
                for alert in &outcome.alerts {
                    self.dispatch(alert);
                }
            } else if !outcome.alerts.is_empty() {
                debug!(symbol = %outcome.snapshot.symbol, muted = outcome.alerts.len(), "Paused, alerts not delivered");
            }
            self.publish(outcome.snapshot).await;
        }

        debug!(elapsed = ?started.elapsed(), failed, "Cycle finished");
        if failed {
            self.settings.error_backoff()
        } else {
            self.settings.poll_interval.get()
        }
    }

    async fn publish(&self, snapshot: Snapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.symbol.clone(), snapshot.clone());
        // No receivers is fine.
        let _ = self.snapshot_tx.send(snapshot);
    }

    /// Fire-and-forget delivery to every destination.
    fn dispatch(&self, alert: &Alert) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        for destination in &self.settings.destinations {
            let notifier = notifier.clone();
            let destination = destination.clone();
            let message = alert.message.clone();
            let timeout = self.settings.notify_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, notifier.notify(&destination, &message)).await {
                    Ok(Ok(())) => debug!(destination = %destination, "Notification delivered"),
                    Ok(Err(e)) => {
                        warn!(destination = %destination, error = %e, "Notification delivery failed")
                    }
                    Err(_) => warn!(destination = %destination, ?timeout, "Notification timed out"),
                }
            });
        }
    }
}
