//! Exact-change feasibility.
//!
//! Change is always composed greedily, highest denomination first, so the
//! feasibility check walks racks in the same order the dispenser does.

use crate::Cents;

/// Snapshot of one coin rack as seen by the change engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RackView {
    pub value: Cents,
    pub count: u32,
    pub enabled: bool,
}

/// Coins to take from each rack (same order as the input) and what is left unpaid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePlan {
    pub coins: Vec<u32>,
    pub remainder: Cents,
}

impl ChangePlan {
    pub fn is_exact(&self) -> bool {
        self.remainder.is_zero()
    }
}

/// Greedy plan for paying `owed` from `racks`, which must be ordered high to low.
/// Disabled racks contribute nothing.
pub fn plan_change(owed: Cents, racks: &[RackView]) -> ChangePlan {
    let mut remainder = owed;
    let coins = racks
        .iter()
        .map(|rack| {
            if !rack.enabled || rack.count == 0 {
                return 0;
            }
            let take = rack.count.min(remainder.units_of(rack.value));
            remainder = remainder.saturating_sub(rack.value * take);
            take
        })
        .collect();
    ChangePlan { coins, remainder }
}

/// Whether change can be made exactly for every product the customer can
/// currently afford. Products priced above `credit` do not constrain the result.
pub fn exact_change_possible(
    credit: Cents,
    prices: impl IntoIterator<Item = Cents>,
    racks: &[RackView],
) -> bool {
    prices
        .into_iter()
        .filter_map(|price| credit.checked_sub(price))
        .all(|owed| plan_change(owed, racks).is_exact())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn racks(counts: &[(u32, u32)]) -> Vec<RackView> {
        counts
            .iter()
            .map(|&(value, count)| RackView {
                value: Cents::new(value),
                count,
                enabled: true,
            })
            .collect()
    }

    fn canadian(counts: [u32; 5]) -> Vec<RackView> {
        let values = [200, 100, 25, 10, 5];
        racks(&values.into_iter().zip(counts).collect::<Vec<_>>())
    }

    #[test]
    fn plan_uses_highest_denominations_first() {
        let plan = plan_change(Cents::new(150), &canadian([0, 1, 2, 0, 0]));
        assert_eq!(plan.coins, [0, 1, 2, 0, 0]);
        assert!(plan.is_exact());
    }

    #[test]
    fn plan_never_takes_more_than_rack_holds() {
        let plan = plan_change(Cents::new(150), &canadian([0, 0, 2, 0, 0]));
        assert_eq!(plan.coins, [0, 0, 2, 0, 0]);
        assert_eq!(plan.remainder, Cents::new(100));
    }

    #[test]
    fn plan_skips_coins_larger_than_owed() {
        let plan = plan_change(Cents::new(50), &canadian([3, 0, 2, 0, 0]));
        assert_eq!(plan.coins, [0, 0, 2, 0, 0]);
        assert!(plan.is_exact());
    }

    #[test]
    fn plan_skips_disabled_racks() {
        let mut views = canadian([0, 1, 2, 0, 0]);
        views[1].enabled = false;
        let plan = plan_change(Cents::new(100), &views);
        assert_eq!(plan.coins, [0, 0, 2, 0, 0]);
        assert_eq!(plan.remainder, Cents::new(50));
    }

    #[test]
    fn zero_owed_is_always_exact() {
        assert!(plan_change(Cents::ZERO, &[]).is_exact());
    }

    #[test]
    fn feasible_when_every_affordable_price_is_payable() {
        let views = canadian([0, 1, 2, 0, 0]);
        // 300 - 150 = 150 (100 + 25 + 25), 300 - 250 = 50 (25 + 25)
        let prices = [150, 250].map(Cents::new);
        assert!(exact_change_possible(Cents::new(300), prices, &views));
    }

    #[test]
    fn infeasible_when_one_affordable_price_is_not_payable() {
        let views = canadian([0, 0, 2, 0, 0]);
        let prices = [150, 250].map(Cents::new);
        assert!(!exact_change_possible(Cents::new(300), prices, &views));
    }

    #[test]
    fn unaffordable_prices_do_not_constrain() {
        let views = canadian([0, 0, 0, 0, 0]);
        let prices = [150, 250].map(Cents::new);
        assert!(exact_change_possible(Cents::new(100), prices, &views));
    }

    #[test]
    fn exact_credit_needs_no_change() {
        let views = canadian([0, 0, 0, 0, 0]);
        assert!(exact_change_possible(Cents::new(150), [Cents::new(150)], &views));
    }
}
