//! # halving-id
//!
//! Typed identifiers for candidates, jobs and search runs.
//!
//! All IDs use a prefixed format: `{prefix}_{ulid}`, for example
//! `cand_01HV4Z2WQXKJNM8GPQY6VBKC3D`. The prefix keeps a job ID from ever
//! being mistaken for a candidate ID in logs and events, and the ULID keeps
//! IDs sortable by creation time.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for the `define_id!` macro and for raw ULID access.
pub use ulid::Ulid;
