//! Rung bookkeeping for asynchronous successive halving.
//!
//! This library holds the synchronous core of the search scheduler:
//!
//! - **Resource ladder**: which rungs are active and the budget of each.
//! - **Rung table**: every `(loss, candidate)` recorded per rung and which
//!   entries were already promoted.
//! - **Promotion policy**: a pure read of the table that proposes the next
//!   promotion, committed by the table's owner.
//! - **Fingerprints**: content hashes used to spot duplicate candidates.
//!
//! # Invariants
//!
//! - Decisions are deterministic given the same sequence of records
//! - A rung never promotes more than `floor(entries / reduction_factor)`
//! - An entry is promoted at most once

mod error;
mod fingerprint;
mod ladder;
mod policy;
mod table;

pub use error::{LadderError, RungError};
pub use fingerprint::{Fingerprint, SeenFingerprints};
pub use ladder::*;
pub use policy::PromotionPolicy;
pub use table::{Promotion, RungEntry, RungSummary, RungTable};
