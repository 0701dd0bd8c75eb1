use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use common::{Error, Result, Timeframe};

use crate::sequence::AnchorPolicy;

/// Top-level pairings config file (TOML).
///
/// Example `config/pairings.toml`:
/// ```toml
/// [[pairing]]
/// name = "scalp"
/// setup = "1h"
/// filter = "15m"
/// trigger = "5m"
/// anchor = "first"
///
/// [alignment]
/// trend = ["1d", "4h", "1h"]
/// entry = "30m"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PairingFileConfig {
    #[serde(rename = "pairing")]
    pub pairings: Vec<PairingConfig>,
    #[serde(default)]
    pub alignment: AlignmentConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PairingConfig {
    /// Name used in logs, alert keys and the dashboard.
    pub name: String,
    /// Trend-defining frame.
    pub setup: Timeframe,
    /// Subordinate frame that retraces and confirms.
    pub filter: Timeframe,
    /// Fastest frame for early, high-risk confirmation.
    #[serde(default)]
    pub trigger: Option<Timeframe>,
    #[serde(default)]
    pub anchor: AnchorPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlignmentConfig {
    /// Trend frames, coarsest first.
    pub trend: Vec<Timeframe>,
    pub entry: Timeframe,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            trend: vec![Timeframe::D1, Timeframe::H4, Timeframe::H1],
            entry: Timeframe::M30,
        }
    }
}

impl Default for PairingFileConfig {
    /// The four dashboard sequences: daily deploy, rich setup, scalp, hyper scalp.
    fn default() -> Self {
        let pairing = |name: &str, setup, filter, trigger| PairingConfig {
            name: name.to_string(),
            setup,
            filter,
            trigger,
            anchor: AnchorPolicy::default(),
        };
        Self {
            pairings: vec![
                pairing("daily-deploy", Timeframe::D1, Timeframe::H4, Some(Timeframe::H1)),
                pairing("rich-setup", Timeframe::H4, Timeframe::M30, None),
                pairing("scalp", Timeframe::H1, Timeframe::M15, Some(Timeframe::M5)),
                pairing("hyper-scalp", Timeframe::M30, Timeframe::M5, None),
            ],
            alignment: AlignmentConfig::default(),
        }
    }
}

impl PairingFileConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("pairings config at '{path}': {e}")))
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Every pairing needs a unique name and strictly finer frames going
    /// setup → filter → trigger.
    pub fn validate(&self) -> Result<()> {
        if self.pairings.is_empty() {
            return Err(Error::Config("at least one [[pairing]] is required".into()));
        }
        let mut names = HashSet::new();
        for p in &self.pairings {
            if !names.insert(p.name.as_str()) {
                return Err(Error::Config(format!("duplicate pairing name '{}'", p.name)));
            }
            if p.filter >= p.setup {
                return Err(Error::Config(format!(
                    "pairing '{}': filter {} must be finer than setup {}",
                    p.name, p.filter, p.setup
                )));
            }
            if let Some(trigger) = p.trigger {
                if trigger >= p.filter {
                    return Err(Error::Config(format!(
                        "pairing '{}': trigger {} must be finer than filter {}",
                        p.name, trigger, p.filter
                    )));
                }
            }
        }
        if self.alignment.trend.is_empty() {
            return Err(Error::Config("alignment.trend must list at least one frame".into()));
        }
        Ok(())
    }

    /// Every timeframe any pairing or the alignment check reads.
    pub fn timeframes(&self) -> BTreeSet<Timeframe> {
        self.pairings
            .iter()
            .flat_map(|p| [Some(p.setup), Some(p.filter), p.trigger])
            .flatten()
            .chain(self.alignment.trend.iter().copied())
            .chain(std::iter::once(self.alignment.entry))
            .collect()
    }
}
