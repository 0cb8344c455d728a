//! # halving-events
//!
//! Structured events emitted by a successive halving search.
//!
//! ## Design Principles
//!
//! - Events are immutable records of what the scheduler observed or decided
//! - Every event belongs to exactly one search and carries a monotonic
//!   sequence number within it
//! - Delivery is best effort: a failing sink is logged, never fatal
//!
//! ## Event Types
//!
//! - Search lifecycle (`search.started`, `search.finished`)
//! - Evaluations (`evaluation.recorded`, `evaluation.failed`)
//! - Promotions (`candidate.promoted`)

mod envelope;
mod error;
mod sink;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use sink::*;
pub use types::*;
