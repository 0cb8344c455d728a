//! Promotion decisions.
//!
//! The policy scans rungs from the highest rung that can still promote
//! (`max_rung - 1`) down to the lowest active rung. The first rung whose
//! promotion quota `floor(entries / reduction_factor)` exceeds its promoted
//! count yields its best un-promoted entry. The top rung never promotes.

use crate::{Promotion, Rung, RungEntry, RungTable};

/// Decides which entry, if any, the next job should promote.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromotionPolicy;

impl PromotionPolicy {
    /// Create the policy.
    pub fn new() -> Self {
        Self
    }

    /// Propose the next promotion, or `None` when every rung is within its
    /// quota and the next job should evaluate a fresh candidate.
    ///
    /// The proposal is not applied; pass it to [`RungTable::commit`].
    pub fn propose<C>(&self, table: &RungTable<C>) -> Option<Promotion> {
        let ladder = table.ladder();

        ladder
            .rungs()
            .rev()
            .filter(|rung| !ladder.is_top(*rung))
            .find_map(|rung| self.propose_from(table, rung))
    }

    /// Propose a promotion out of one rung.
    pub fn propose_from<C>(&self, table: &RungTable<C>, rung: Rung) -> Option<Promotion> {
        if table.ladder().is_top(rung) || table.promotion_quota(rung) <= table.promoted_count(rung)
        {
            return None;
        }

        best_entry(table.unpromoted(rung)).map(|entry| Promotion {
            from: rung,
            position: entry.position,
            loss: entry.loss,
        })
    }
}

/// Lowest-loss entry; ties go to the earliest inserted entry.
///
/// Losses are compared with `f64::total_cmp`, so a (positive) NaN ranks
/// after every number and is picked last.
fn best_entry<'a, C: 'a>(
    entries: impl Iterator<Item = &'a RungEntry<C>>,
) -> Option<&'a RungEntry<C>> {
    entries.min_by(|a, b| {
        a.loss
            .total_cmp(&b.loss)
            .then_with(|| a.position.cmp(&b.position))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResourceLadder;

    fn table() -> RungTable<u32> {
        RungTable::new(ResourceLadder::new(3, 100, 900, 0).unwrap())
    }

    #[test]
    fn test_nothing_to_promote_when_under_quota() {
        let mut table = table();
        table.record(Rung::new(0), 0.1, 1).unwrap();
        table.record(Rung::new(0), 0.2, 2).unwrap();

        assert_eq!(PromotionPolicy::new().propose(&table), None);
    }

    #[test]
    fn test_promotes_lowest_loss() {
        let mut table = table();
        table.record(Rung::new(0), 0.3, 1).unwrap();
        table.record(Rung::new(0), 0.1, 2).unwrap();
        table.record(Rung::new(0), 0.2, 3).unwrap();

        let promotion = PromotionPolicy::new().propose(&table).unwrap();
        assert_eq!(promotion.from, Rung::new(0));
        assert_eq!(promotion.to(), Rung::new(1));
        assert_eq!(promotion.position, 1);
        assert_eq!(promotion.loss, 0.1);
    }

    #[test]
    fn test_ties_go_to_first_inserted() {
        let mut table = table();
        table.record(Rung::new(0), 0.5, 10).unwrap();
        table.record(Rung::new(0), 0.2, 20).unwrap();
        table.record(Rung::new(0), 0.2, 30).unwrap();

        let promotion = PromotionPolicy::new().propose(&table).unwrap();
        assert_eq!(promotion.position, 1);
    }

    #[test]
    fn test_nan_loss_is_promoted_last() {
        let mut table = table();
        table.record(Rung::new(0), f64::NAN, 1).unwrap();
        table.record(Rung::new(0), 0.9, 2).unwrap();
        table.record(Rung::new(0), f64::INFINITY, 3).unwrap();

        let promotion = PromotionPolicy::new().propose(&table).unwrap();
        assert_eq!(promotion.position, 1);
    }

    #[test]
    fn test_higher_rungs_first() {
        let mut table = table();
        for (i, loss) in [0.1, 0.2, 0.3].into_iter().enumerate() {
            table.record(Rung::new(0), loss, i as u32).unwrap();
            table.record(Rung::new(1), loss, 100 + i as u32).unwrap();
        }

        let promotion = PromotionPolicy::new().propose(&table).unwrap();
        assert_eq!(promotion.from, Rung::new(1));

        table.commit(promotion).unwrap();
        let promotion = PromotionPolicy::new().propose(&table).unwrap();
        assert_eq!(promotion.from, Rung::new(0));
    }

    #[test]
    fn test_top_rung_never_promotes() {
        let mut table = table();
        for i in 0..9 {
            table.record(Rung::new(2), 0.1, i).unwrap();
        }
        assert_eq!(PromotionPolicy::new().propose(&table), None);
        assert_eq!(PromotionPolicy::new().propose_from(&table, Rung::new(2)), None);
    }
}
