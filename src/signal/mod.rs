//! Signal types
//!
//! Directional signals arrive from an external classifier; this module only
//! models them and the position side they map to.

mod types;

pub use types::{Side, Signal, SignalKind, SignalMeta};
