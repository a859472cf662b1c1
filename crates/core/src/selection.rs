//! Claim ordering for the selection algorithm.
//!
//! Pending jobs are split into priority tiers processed High, Medium, Low.
//! Within a tier the earliest deadline goes first, with the job id as the
//! final tie-break so the order is total and deterministic. A lower tier is
//! only consulted while the limit is still unmet.
//!
//! Store implementations that cannot express this ordering in their query
//! language (the in-process store) call [`select_for_claim`] while holding
//! their claim lock. The Postgres store encodes the same ordering as
//! `ORDER BY priority_id, deadline, id` and uses [`sort_claimed`] to put the
//! `RETURNING` rows back in claim order.

use std::cmp::Ordering;

use crate::status::Priority;
use crate::types::{DbId, Timestamp};

/// The fields of a pending job that decide its claim order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimKey {
    pub id: DbId,
    pub priority: Priority,
    pub deadline: Timestamp,
}

impl ClaimKey {
    pub fn new(id: DbId, priority: Priority, deadline: Timestamp) -> Self {
        Self {
            id,
            priority,
            deadline,
        }
    }

    /// Earliest deadline first, then lowest id.
    fn edf_cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ClaimKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClaimKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.edf_cmp(other))
    }
}

/// Pick at most `limit` job ids from `candidates` in claim order.
///
/// `candidates` must contain only Pending jobs; the caller is responsible
/// for filtering. Returns an empty vector when `limit` is zero.
pub fn select_for_claim(candidates: &[ClaimKey], limit: usize) -> Vec<DbId> {
    let mut selected = Vec::with_capacity(limit.min(candidates.len()));
    if limit == 0 {
        return selected;
    }

    for tier in Priority::ALL {
        let mut batch: Vec<&ClaimKey> = candidates
            .iter()
            .filter(|c| c.priority == *tier)
            .collect();
        if batch.is_empty() {
            continue;
        }
        batch.sort_by(|a, b| a.edf_cmp(b));

        let remaining = limit - selected.len();
        selected.extend(batch.into_iter().take(remaining).map(|c| c.id));

        if selected.len() >= limit {
            break;
        }
    }

    selected
}

/// Sort claimed rows into claim order using `key` to extract each row's
/// [`ClaimKey`].
pub fn sort_claimed<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> ClaimKey,
{
    rows.sort_by_key(key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
    }

    fn key(id: DbId, priority: Priority, offset_secs: i64) -> ClaimKey {
        ClaimKey::new(id, priority, t0() + Duration::seconds(offset_secs))
    }

    #[test]
    fn zero_limit_selects_nothing() {
        let candidates = [key(1, Priority::High, 10)];
        assert!(select_for_claim(&candidates, 0).is_empty());
    }

    #[test]
    fn no_candidates_selects_nothing() {
        assert!(select_for_claim(&[], 5).is_empty());
    }

    #[test]
    fn priority_dominates_deadline() {
        let candidates = [
            key(1, Priority::Low, 1),
            key(2, Priority::High, 100_000),
        ];
        assert_eq!(select_for_claim(&candidates, 1), vec![2]);
    }

    #[test]
    fn earliest_deadline_first_within_tier() {
        let candidates = [
            key(1, Priority::Medium, 500),
            key(2, Priority::Medium, 50),
        ];
        assert_eq!(select_for_claim(&candidates, 1), vec![2]);
    }

    #[test]
    fn equal_deadlines_break_ties_by_id() {
        let candidates = [
            key(9, Priority::High, 10),
            key(3, Priority::High, 10),
            key(5, Priority::High, 10),
        ];
        assert_eq!(select_for_claim(&candidates, 3), vec![3, 5, 9]);
    }

    #[test]
    fn fills_from_lower_tiers_only_while_limit_unmet() {
        let candidates = [
            key(1, Priority::Low, 1),
            key(2, Priority::Medium, 30),
            key(3, Priority::High, 20),
            key(4, Priority::Medium, 10),
            key(5, Priority::Low, 0),
        ];
        assert_eq!(select_for_claim(&candidates, 3), vec![3, 4, 2]);
        assert_eq!(select_for_claim(&candidates, 10), vec![3, 4, 2, 5, 1]);
    }

    #[test]
    fn limit_larger_than_candidates_returns_all() {
        let candidates = [key(1, Priority::High, 1), key(2, Priority::Low, 2)];
        assert_eq!(select_for_claim(&candidates, 100).len(), 2);
    }

    #[test]
    fn first_poll_with_capacity_two_takes_the_two_earliest() {
        let candidates = [
            key(1, Priority::High, 10),
            key(2, Priority::High, 5),
            key(3, Priority::High, 1),
        ];
        assert_eq!(select_for_claim(&candidates, 2), vec![3, 2]);
    }

    #[test]
    fn ordering_matches_tiered_selection() {
        let mut candidates = vec![
            key(4, Priority::Low, 3),
            key(1, Priority::Medium, 9),
            key(7, Priority::High, 9),
            key(2, Priority::High, 9),
            key(3, Priority::Medium, 1),
        ];
        let selected = select_for_claim(&candidates, candidates.len());
        sort_claimed(&mut candidates, |c| *c);
        let sorted: Vec<DbId> = candidates.iter().map(|c| c.id).collect();
        assert_eq!(selected, sorted);
        assert_eq!(sorted, vec![2, 7, 3, 1, 4]);
    }
}
