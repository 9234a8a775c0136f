pub mod cycles;
pub mod penalty;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

pub use cycles::{
    CycleAmount, CycleStatement, CycleWindow, FreeCreditCalculator, FreeCreditConfig, FreeCreditStatement,
    FreeCreditSummary,
};
pub use penalty::{PenaltyConfig, PenaltySimulation, PenaltySimulator};

/// dated amount applied against a late-fee bearing balance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub date: NaiveDate,
    /// cash, applied to the fee first and then to the base
    pub cash: Money,
    /// fee forgiven on that day, applied before the cash
    pub fee_waived: Money,
    /// base forgiven on that day, applied after the cash
    pub base_waived: Money,
}

impl Settlement {
    pub fn cash(date: NaiveDate, cash: Money) -> Self {
        Self {
            date,
            cash,
            fee_waived: Money::ZERO,
            base_waived: Money::ZERO,
        }
    }
}

/// result of replaying a late-fee walk, rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LateFeeWalk {
    pub pending_fee: Money,
    pub fee_generated: Money,
    pub fee_paid: Money,
    pub fee_waived: Money,
    pub base_paid: Money,
    pub base_waived: Money,
    pub base_remaining: Money,
    /// days on which the fee accrued
    pub days_accrued: u32,
    /// cash that found nothing left to settle
    pub unapplied: Money,
}

#[derive(Default)]
struct WalkState {
    base_remaining: Money,
    pending_fee: Money,
    fee_generated: Money,
    fee_paid: Money,
    fee_waived: Money,
    base_paid: Money,
    base_waived: Money,
    unapplied: Money,
}

impl WalkState {
    fn settle(&mut self, settlement: &Settlement) {
        let waived = settlement.fee_waived.min(self.pending_fee);
        self.pending_fee -= waived;
        self.fee_waived += waived;

        let mut cash = settlement.cash;
        let to_fee = cash.min(self.pending_fee);
        self.pending_fee -= to_fee;
        self.fee_paid += to_fee;
        cash -= to_fee;

        let to_base = cash.min(self.base_remaining);
        self.base_remaining -= to_base;
        self.base_paid += to_base;
        cash -= to_base;
        self.unapplied += cash;

        let base_waived = settlement.base_waived.min(self.base_remaining);
        self.base_remaining -= base_waived;
        self.base_waived += base_waived;
    }
}

/// replay a daily late fee on an unpaid base
///
/// the fee accrues from the day after `due` through `as_of`, each day at
/// `daily_rate` on the base still unpaid that day, then that day's
/// settlements land. settlements on or before `due` reduce the base with no
/// fee. the walk stops early once the base is cleared; later settlements
/// still pay down any fee left. settlements after `as_of` are ignored.
pub fn replay_late_fee(
    base: Money,
    due: NaiveDate,
    as_of: NaiveDate,
    daily_rate: Rate,
    settlements: &[Settlement],
) -> LateFeeWalk {
    let mut ordered: Vec<&Settlement> = settlements.iter().filter(|s| s.date <= as_of).collect();
    ordered.sort_by_key(|s| s.date);

    let mut state = WalkState {
        base_remaining: base.non_negative(),
        ..WalkState::default()
    };
    let mut days_accrued = 0;
    let mut next = 0;

    while next < ordered.len() && ordered[next].date <= due {
        state.settle(ordered[next]);
        next += 1;
    }

    if as_of > due {
        let mut day = due.succ_opt();
        while let Some(current) = day {
            if current > as_of || state.base_remaining.is_zero() {
                break;
            }

            let fee = state.base_remaining.apply_rate(daily_rate);
            state.pending_fee += fee;
            state.fee_generated += fee;
            days_accrued += 1;

            while next < ordered.len() && ordered[next].date == current {
                state.settle(ordered[next]);
                next += 1;
            }

            day = current.succ_opt();
        }
    }

    // base cleared early: remaining settlements only settle the fee
    for settlement in &ordered[next..] {
        state.settle(settlement);
    }

    LateFeeWalk {
        pending_fee: state.pending_fee.round_cents(),
        fee_generated: state.fee_generated.round_cents(),
        fee_paid: state.fee_paid.round_cents(),
        fee_waived: state.fee_waived.round_cents(),
        base_paid: state.base_paid.round_cents(),
        base_waived: state.base_waived.round_cents(),
        base_remaining: state.base_remaining.round_cents(),
        days_accrued,
        unapplied: state.unapplied.round_cents(),
    }
}
