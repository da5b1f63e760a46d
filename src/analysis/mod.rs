pub mod orphans;

pub use orphans::{resolve_orphans, ExclusionRules, Resolution};
