use common::{ClassifiedBar, Regime};

/// A maximal run of consecutive bars sharing one regime.
/// `start..end` indexes the slice the blocks were computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegimeBlock {
    pub regime: Regime,
    pub start: usize,
    pub end: usize,
}

impl RegimeBlock {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Partition `bars` into regime blocks. A new block opens whenever the
/// regime differs from the previous bar's.
pub fn regime_blocks(bars: &[ClassifiedBar]) -> Vec<RegimeBlock> {
    let mut blocks: Vec<RegimeBlock> = Vec::new();
    for (i, bar) in bars.iter().enumerate() {
        match blocks.last_mut() {
            Some(block) if block.regime == bar.regime => block.end = i + 1,
            _ => blocks.push(RegimeBlock {
                regime: bar.regime,
                start: i,
                end: i + 1,
            }),
        }
    }
    blocks
}
