use std::collections::HashMap;

use common::{Alignment, PairingView, SignalStatus, StatusTag};

/// Channel key plus the encoded state last seen on that channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSignature {
    pub channel: String,
    pub encoded: String,
}

impl AlertSignature {
    /// Encodes tag, count and detail, so a detail-only change is a change.
    pub fn for_status(channel: impl Into<String>, status: &SignalStatus) -> Self {
        let count = status.count().map(|n| n.to_string()).unwrap_or_default();
        Self {
            channel: channel.into(),
            encoded: format!("{}|{count}|{}", status.tag(), status.detail()),
        }
    }

    pub fn for_alignment(channel: impl Into<String>, alignment: Alignment) -> Self {
        Self {
            channel: channel.into(),
            encoded: format!("ALIGNMENT|{alignment}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    Emit,
    Suppress,
}

/// Last emitted signature per channel. Lives for one engine session.
#[derive(Debug, Default)]
pub struct AlertState {
    last: HashMap<String, AlertSignature>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `signature` if it differs from the channel's last one.
    /// The caller dispatches after this returns, so a failed delivery never
    /// causes a re-emit on the next unchanged cycle.
    pub fn observe(&mut self, signature: AlertSignature) -> AlertDecision {
        match self.last.get(&signature.channel) {
            Some(prev) if prev.encoded == signature.encoded => AlertDecision::Suppress,
            _ => {
                self.last.insert(signature.channel.clone(), signature);
                AlertDecision::Emit
            }
        }
    }

    /// Drop a channel so its next signature emits regardless of history.
    pub fn forget(&mut self, channel: &str) {
        self.last.remove(channel);
    }

    pub fn last(&self, channel: &str) -> Option<&AlertSignature> {
        self.last.get(channel)
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

/// A notification that passed the debouncer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub channel: String,
    pub message: String,
}

pub fn pairing_channel(symbol: &str, pairing: &str) -> String {
    format!("{symbol}/{pairing}")
}

pub fn trigger_channel(symbol: &str, pairing: &str) -> String {
    format!("{symbol}/{pairing}/trigger")
}

pub fn alignment_channel(symbol: &str) -> String {
    format!("{symbol}/alignment")
}

fn status_icon(tag: StatusTag) -> &'static str {
    match tag {
        StatusTag::NoData => "📭",
        StatusTag::WaitingVr => "⚠️",
        StatusTag::WaitingCf => "⏳",
        StatusTag::ConfirmedOrigin => "🎯",
        StatusTag::ConfirmedReentry => "🚀",
        StatusTag::HighRiskConfirmed => "⚡",
    }
}

pub fn format_pairing(symbol: &str, view: &PairingView) -> String {
    let status = &view.report.status;
    let direction = view.report.trend.map_or("-", |r| r.direction());
    format!(
        "{} {symbol} {} {direction} ({} → {}): {}",
        status_icon(status.tag()),
        view.name,
        view.setup,
        view.filter,
        status.detail()
    )
}

pub fn format_trigger(symbol: &str, view: &PairingView) -> String {
    let direction = view.report.trend.map_or("-", |r| r.direction());
    let trigger = view
        .trigger
        .map_or_else(|| "trigger".to_string(), |tf| tf.to_string());
    format!(
        "⚡ {symbol} {} HIGH-RISK {direction}: {trigger} turned before {} confirmed",
        view.name, view.filter
    )
}

pub fn format_alignment(symbol: &str, alignment: Alignment) -> String {
    let icon = match alignment {
        Alignment::FullAlignment(_) => "🏆",
        Alignment::AwaitingBreakout(_) => "🧭",
        Alignment::Mixed => "➖",
    };
    format!("{icon} {symbol} swing: {alignment}")
}
