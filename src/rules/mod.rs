//! User-facing settings: the round-up rule and the allocation presets.
//!
//! Both are validated on construction (and on deserialization), so the
//! engines can take them as given.

pub mod preset;
pub mod roundup;

pub use preset::{Allocation, PortfolioPreset, PresetKind};
pub use roundup::RoundupRule;
