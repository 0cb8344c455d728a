//! The rung table: every evaluation recorded per rung, plus which entries
//! have already been promoted onward.
//!
//! # Invariants
//!
//! - Entries are only ever appended; positions are stable
//! - For every rung `r`: `promoted(r) <= floor(entries(r) / reduction_factor)`
//! - An entry is promoted at most once
//! - The top rung never promotes
//!
//! The table has a single owner (the scheduler loop). Readers such as
//! [`PromotionPolicy`](crate::PromotionPolicy) take `&RungTable` and return
//! proposals; only [`RungTable::commit`] moves state forward.

use std::collections::BTreeMap;

use crate::{ResourceLadder, Rung, RungError};

/// One evaluation recorded at a rung.
#[derive(Debug, Clone, PartialEq)]
pub struct RungEntry<C> {
    /// Loss reported by the evaluator. Lower is better.
    pub loss: f64,

    /// The evaluated candidate.
    pub candidate: C,

    /// Insertion position within the rung, starting at zero.
    pub position: usize,
}

/// A proposal to promote one entry of `from` to the rung above it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Promotion {
    /// Rung the entry was recorded at.
    pub from: Rung,

    /// Position of the entry within `from`.
    pub position: usize,

    /// Loss of the entry, for logging.
    pub loss: f64,
}

impl Promotion {
    /// The rung the candidate will be evaluated at next.
    pub fn to(&self) -> Rung {
        self.from.next()
    }
}

/// Entry and promotion counts of one rung.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RungSummary {
    pub rung: Rung,
    pub entries: usize,
    pub promoted: usize,
}

#[derive(Debug, Clone)]
struct RungSlot<C> {
    entries: Vec<RungEntry<C>>,
    promoted: Vec<bool>,
    promoted_count: usize,
}

impl<C> Default for RungSlot<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            promoted: Vec::new(),
            promoted_count: 0,
        }
    }
}

/// Per-rung evaluation results for one search.
#[derive(Debug, Clone)]
pub struct RungTable<C> {
    ladder: ResourceLadder,
    slots: BTreeMap<Rung, RungSlot<C>>,
}

impl<C> RungTable<C> {
    /// Create a table with an empty slot for every active rung.
    pub fn new(ladder: ResourceLadder) -> Self {
        let slots = ladder.rungs().map(|r| (r, RungSlot::default())).collect();
        Self { ladder, slots }
    }

    /// The ladder this table was built for.
    pub fn ladder(&self) -> &ResourceLadder {
        &self.ladder
    }

    /// Record a finished evaluation. Returns the entry's position.
    pub fn record(&mut self, rung: Rung, loss: f64, candidate: C) -> Result<usize, RungError> {
        let slot = self.slots.get_mut(&rung).ok_or(RungError::UnknownRung(rung))?;
        let position = slot.entries.len();
        slot.entries.push(RungEntry {
            loss,
            candidate,
            position,
        });
        slot.promoted.push(false);
        Ok(position)
    }

    /// All entries of a rung in insertion order. Empty for inactive rungs.
    pub fn entries(&self, rung: Rung) -> &[RungEntry<C>] {
        self.slots
            .get(&rung)
            .map(|slot| slot.entries.as_slice())
            .unwrap_or(&[])
    }

    /// Number of entries recorded at a rung.
    pub fn len(&self, rung: Rung) -> usize {
        self.entries(rung).len()
    }

    /// Returns true if no rung has any entry.
    pub fn is_empty(&self) -> bool {
        self.slots.values().all(|slot| slot.entries.is_empty())
    }

    /// Number of entries recorded across all rungs.
    pub fn total_entries(&self) -> usize {
        self.slots.values().map(|slot| slot.entries.len()).sum()
    }

    /// Number of entries of a rung already promoted.
    pub fn promoted_count(&self, rung: Rung) -> usize {
        self.slots.get(&rung).map_or(0, |slot| slot.promoted_count)
    }

    /// Returns true if the entry at `position` of `rung` was promoted.
    pub fn is_promoted(&self, rung: Rung, position: usize) -> bool {
        self.slots
            .get(&rung)
            .and_then(|slot| slot.promoted.get(position).copied())
            .unwrap_or(false)
    }

    /// How many entries of a rung may be promoted in total right now:
    /// `floor(entries / reduction_factor)`.
    pub fn promotion_quota(&self, rung: Rung) -> usize {
        let factor = usize::try_from(self.ladder.reduction_factor()).unwrap_or(usize::MAX);
        self.len(rung) / factor
    }

    /// Entries of a rung not yet promoted, in insertion order.
    pub fn unpromoted(&self, rung: Rung) -> impl Iterator<Item = &RungEntry<C>> {
        let slot = self.slots.get(&rung);
        slot.into_iter().flat_map(|slot| {
            slot.entries
                .iter()
                .filter(move |entry| !slot.promoted[entry.position])
        })
    }

    /// The highest rung with at least one entry.
    pub fn highest_reached(&self) -> Option<Rung> {
        self.slots
            .iter()
            .rev()
            .find(|(_, slot)| !slot.entries.is_empty())
            .map(|(rung, _)| *rung)
    }

    /// Entry and promotion counts for every active rung, highest first.
    pub fn summary(&self) -> Vec<RungSummary> {
        self.slots
            .iter()
            .rev()
            .map(|(rung, slot)| RungSummary {
                rung: *rung,
                entries: slot.entries.len(),
                promoted: slot.promoted_count,
            })
            .collect()
    }

    /// Consume the table, keeping only the candidates of one rung in
    /// insertion order.
    pub fn into_candidates_at(mut self, rung: Rung) -> Vec<C> {
        self.slots
            .remove(&rung)
            .map(|slot| slot.entries.into_iter().map(|e| e.candidate).collect())
            .unwrap_or_default()
    }
}

impl<C: Clone> RungTable<C> {
    /// Apply a promotion proposal.
    ///
    /// Marks the entry as promoted and returns its candidate together with
    /// the rung it should be evaluated at next. Proposals that would break a
    /// table invariant are refused and leave the table unchanged.
    pub fn commit(&mut self, promotion: Promotion) -> Result<(C, Rung), RungError> {
        let Promotion { from, position, .. } = promotion;

        if self.ladder.is_top(from) {
            return Err(RungError::TopRung(from));
        }
        let allowed = self.promotion_quota(from);

        let slot = self.slots.get_mut(&from).ok_or(RungError::UnknownRung(from))?;
        let Some(already) = slot.promoted.get(position).copied() else {
            return Err(RungError::UnknownEntry {
                rung: from,
                position,
            });
        };
        if already {
            return Err(RungError::AlreadyPromoted {
                rung: from,
                position,
            });
        }
        if slot.promoted_count >= allowed {
            return Err(RungError::OverPromotion {
                rung: from,
                allowed,
            });
        }

        slot.promoted[position] = true;
        slot.promoted_count += 1;
        Ok((slot.entries[position].candidate.clone(), from.next()))
    }
}
