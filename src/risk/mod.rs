//! Risk management module
//!
//! Position sizing, entry admission and loss controls

mod governor;
mod sizing;
mod types;

pub use governor::{OpenSlot, RiskGovernor, RiskSnapshot, RiskState};
pub use sizing::{
    create_sizer, FixedFractionSizer, PositionSizer, RiskBasedSizer, SizeDecision, SizingRejection,
    SizingRequest,
};
pub use types::Rejection;
