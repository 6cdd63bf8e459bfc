use super::types::{BalanceDiff, BalanceSnapshot};
use crate::utils::money::Money;
use std::sync::Arc;

/// Minimal delta from `old` to `new`, or `None` when nothing changed.
///
/// The larger side is walked first; the smaller side is then checked only for
/// ids the larger side lacks, so snapshots of equal size but different assets
/// report both the additions and the removals. The result does not depend on
/// which side happens to be larger.
pub fn diff(old: &BalanceSnapshot, new: &BalanceSnapshot) -> Option<BalanceDiff> {
    let mut changes = BalanceDiff::new();
    let from_old = old.len() > new.len();
    let (larger, smaller) = if from_old { (old, new) } else { (new, old) };

    for (id, money) in larger {
        match smaller.get(id) {
            None => {
                changes.insert(id.clone(), appeared_or_removed(money, from_old));
            }
            Some(other) if other != money => {
                let latest = if from_old { other } else { money };
                changes.insert(id.clone(), latest.clone());
            }
            Some(_) => {}
        }
    }

    for (id, money) in smaller {
        if !larger.contains_key(id) {
            changes.insert(id.clone(), appeared_or_removed(money, !from_old));
        }
    }

    if changes.is_empty() { None } else { Some(changes) }
}

// `money` only exists on one side: keep it if that side is `new`, zero it if `old`.
fn appeared_or_removed(money: &Money, is_old_side: bool) -> Money {
    if is_old_side { Money::zero(Arc::clone(money.get_asset())) } else { money.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::asset::Asset;

    fn snapshot(entries: &[(&str, u64)]) -> BalanceSnapshot {
        entries
            .iter()
            .map(|(id, coins)| (id.to_string(), Money::new(*coins, Arc::new(Asset::builder(*id).build()))))
            .collect()
    }

    fn coins(diff: &BalanceDiff) -> Vec<(&str, u64)> {
        diff.iter().map(|(id, money)| (id.as_str(), money.get_coins())).collect()
    }

    #[test]
    fn test_identical_snapshots_have_no_diff() {
        let a = snapshot(&[("WAVES", 100), ("T", 5)]);
        assert!(diff(&a, &a.clone()).is_none());
        assert!(diff(&BalanceSnapshot::new(), &BalanceSnapshot::new()).is_none());
    }

    #[test]
    fn test_changed_amount_reports_new_value() {
        let old = snapshot(&[("WAVES", 100), ("T", 5)]);
        let new = snapshot(&[("WAVES", 100), ("T", 7)]);
        assert_eq!(coins(&diff(&old, &new).unwrap()), vec![("T", 7)]);
        assert_eq!(coins(&diff(&new, &old).unwrap()), vec![("T", 5)]);
    }

    #[test]
    fn test_added_asset_reports_new_value() {
        let old = snapshot(&[("WAVES", 100)]);
        let new = snapshot(&[("WAVES", 100), ("T", 3)]);
        assert_eq!(coins(&diff(&old, &new).unwrap()), vec![("T", 3)]);
    }

    #[test]
    fn test_removed_asset_reports_zero() {
        let old = snapshot(&[("WAVES", 100), ("T", 3), ("U", 9)]);
        let new = snapshot(&[("WAVES", 90)]);
        assert_eq!(coins(&diff(&old, &new).unwrap()), vec![("T", 0), ("U", 0), ("WAVES", 90)]);
    }

    #[test]
    fn test_swapped_assets_of_equal_count_report_both() {
        let old = snapshot(&[("WAVES", 100), ("A", 1)]);
        let new = snapshot(&[("WAVES", 100), ("B", 2)]);
        assert_eq!(coins(&diff(&old, &new).unwrap()), vec![("A", 0), ("B", 2)]);
        assert_eq!(coins(&diff(&new, &old).unwrap()), vec![("A", 1), ("B", 0)]);
    }

    #[test]
    fn test_first_snapshot_reports_everything() {
        let new = snapshot(&[("WAVES", 500_000_000), ("T", 100)]);
        let changes = diff(&BalanceSnapshot::new(), &new).unwrap();
        assert_eq!(coins(&changes), vec![("T", 100), ("WAVES", 500_000_000)]);
    }

    #[test]
    fn test_no_change_detection_is_direction_independent() {
        let cases = [
            (snapshot(&[]), snapshot(&[])),
            (snapshot(&[("WAVES", 1)]), snapshot(&[("WAVES", 1)])),
            (snapshot(&[("WAVES", 1)]), snapshot(&[("WAVES", 2)])),
            (snapshot(&[("WAVES", 1)]), snapshot(&[("WAVES", 1), ("T", 0)])),
            (snapshot(&[("WAVES", 1), ("A", 1)]), snapshot(&[("WAVES", 1), ("B", 1)])),
            (snapshot(&[("A", 3), ("B", 4)]), snapshot(&[("B", 4), ("A", 3)])),
        ];
        for (a, b) in &cases {
            assert_eq!(diff(a, b).is_none(), diff(b, a).is_none());
        }
    }
}
