pub mod alerts;
pub mod binance;
pub mod lifecycle;
pub mod monitor;

pub use alerts::{Alert, AlertDecision, AlertSignature, AlertState};
pub use binance::BinanceClient;
pub use lifecycle::{Engine, EngineHandle, EngineSettings};
pub use monitor::{CycleOutcome, SymbolMonitor};
