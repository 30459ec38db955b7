//! Domain types: positions, identifiers, token metadata.

pub mod ids;
pub mod position;

pub use ids::PositionId;
pub use position::{Position, PositionStatus, PositionType, TokenInfo};
