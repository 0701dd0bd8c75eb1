pub mod alignment;
pub mod blocks;
pub mod classifier;
pub mod config;
pub mod origin;
pub mod pairing;
pub mod resample;
pub mod sequence;

pub use alignment::alignment;
pub use blocks::{regime_blocks, RegimeBlock};
pub use classifier::StructureClassifier;
pub use config::{AlignmentConfig, PairingConfig, PairingFileConfig};
pub use origin::trend_origin;
pub use pairing::{classify_frames, PairingSet};
pub use resample::{bucket_start, resample};
pub use sequence::{AnchorPolicy, SequenceAnalyzer};
