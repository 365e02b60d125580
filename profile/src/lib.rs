//! Synthesis of proxy engine profiles from aggregated outbounds.

pub mod baseline;
pub mod config;
pub mod document;
pub mod metrics_defs;
pub mod synthesizer;

pub use config::{SelectorError, SelectorKind, SelectorSpec, Service, validate_selectors};
pub use document::Profile;
pub use synthesizer::{DIRECT_TAG, synthesize, synthesize_snapshot};
