//! free credit: interest charged per monthly cycle on the principal left
//! at the start of the cycle, with daily mora on each cycle's unpaid
//! interest once the cycle has closed.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::interest::{replay_late_fee, Settlement};
use crate::ledger::Receipt;
use crate::state::Credit;
use crate::types::CreditId;

/// free credit rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeCreditConfig {
    /// interest charged per cycle on the cycle's principal base
    pub cycle_interest_rate: Rate,
    /// mora charged per day on a closed cycle's unpaid interest
    pub daily_penalty_rate: Rate,
    /// past this cycle only full liquidation is accepted
    pub max_cycles: u8,
}

/// calendar span of one cycle, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleWindow {
    pub cycle: u8,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
}

impl CycleWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.starts_on <= date && date <= self.ends_on
    }

    /// closed cycles accrue mora on unpaid interest
    pub fn is_closed(&self, as_of: NaiveDate) -> bool {
        as_of > self.ends_on
    }
}

/// debt of one cycle as of a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStatement {
    pub window: CycleWindow,
    pub principal_base: Money,
    pub interest: Money,
    pub interest_paid: Money,
    pub interest_waived: Money,
    pub pending_interest: Money,
    pub penalty_generated: Money,
    pub penalty_paid: Money,
    pub penalty_waived: Money,
    pub pending_penalty: Money,
    pub days_late: u32,
}

impl CycleStatement {
    pub fn cycle(&self) -> u8 {
        self.window.cycle
    }

    pub fn total_due(&self) -> Money {
        self.pending_interest + self.pending_penalty
    }
}

/// full debt picture of a free credit as of a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeCreditStatement {
    pub credit_id: CreditId,
    pub as_of: NaiveDate,
    pub current_cycle: u8,
    pub max_cycles: u8,
    pub principal: Money,
    pub principal_balance: Money,
    /// cycles 1 through the current one
    pub cycles: Vec<CycleStatement>,
}

impl FreeCreditStatement {
    pub fn total_pending_interest(&self) -> Money {
        self.cycles.iter().map(|c| c.pending_interest).sum()
    }

    pub fn total_pending_penalty(&self) -> Money {
        self.cycles.iter().map(|c| c.pending_penalty).sum()
    }

    /// amount that liquidates the credit today
    pub fn total_due(&self) -> Money {
        self.principal_balance + self.total_pending_interest() + self.total_pending_penalty()
    }

    /// only full liquidation is accepted in the last cycle
    pub fn is_terminal_cycle(&self) -> bool {
        self.current_cycle >= self.max_cycles
    }

    pub fn cycle(&self, cycle: u8) -> Option<&CycleStatement> {
        self.cycles.iter().find(|c| c.cycle() == cycle)
    }

    /// a closed cycle still owes interest or mora
    pub fn has_overdue_cycle(&self) -> bool {
        self.cycles
            .iter()
            .any(|c| c.window.is_closed(self.as_of) && c.total_due().is_positive())
    }
}

/// amount owed for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleAmount {
    pub cycle: u8,
    pub amount: Money,
}

/// read-only view returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeCreditSummary {
    pub credit_id: CreditId,
    pub as_of: NaiveDate,
    pub current_cycle: u8,
    pub max_cycles: u8,
    pub terminal_cycle: bool,
    pub principal_balance: Money,
    pub pending_interest: Vec<CycleAmount>,
    pub pending_penalty: Vec<CycleAmount>,
    pub total_due: Money,
}

impl From<&FreeCreditStatement> for FreeCreditSummary {
    fn from(statement: &FreeCreditStatement) -> Self {
        let amounts = |pick: fn(&CycleStatement) -> Money| {
            statement
                .cycles
                .iter()
                .map(|c| CycleAmount {
                    cycle: c.cycle(),
                    amount: pick(c),
                })
                .collect()
        };

        Self {
            credit_id: statement.credit_id,
            as_of: statement.as_of,
            current_cycle: statement.current_cycle,
            max_cycles: statement.max_cycles,
            terminal_cycle: statement.is_terminal_cycle(),
            principal_balance: statement.principal_balance,
            pending_interest: amounts(|c| c.pending_interest),
            pending_penalty: amounts(|c| c.pending_penalty),
            total_due: statement.total_due(),
        }
    }
}

/// builds free credit statements from the receipt history
#[derive(Debug, Clone)]
pub struct FreeCreditCalculator {
    config: FreeCreditConfig,
}

impl FreeCreditCalculator {
    pub fn new(config: FreeCreditConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FreeCreditConfig {
        &self.config
    }

    /// cycle n closes n-1 months after the commitment date
    pub fn windows(&self, credit: &Credit) -> Result<Vec<CycleWindow>> {
        let mut windows = Vec::with_capacity(self.config.max_cycles as usize);
        let mut starts_on = credit.disbursed_on;

        for cycle in 1..=self.config.max_cycles {
            let ends_on = credit
                .commitment_date
                .checked_add_months(Months::new(u32::from(cycle) - 1))
                .ok_or_else(|| CreditError::CalculationError {
                    message: format!("cycle {cycle} end date out of range"),
                })?;
            windows.push(CycleWindow {
                cycle,
                starts_on,
                ends_on,
            });
            starts_on = ends_on.succ_opt().ok_or_else(|| CreditError::CalculationError {
                message: format!("cycle {} start date out of range", cycle + 1),
            })?;
        }

        Ok(windows)
    }

    /// first cycle not yet closed, capped at the last one
    pub fn current_cycle(&self, windows: &[CycleWindow], as_of: NaiveDate) -> u8 {
        windows
            .iter()
            .find(|w| w.ends_on >= as_of)
            .or_else(|| windows.last())
            .map(|w| w.cycle)
            .unwrap_or(1)
    }

    pub fn statement(
        &self,
        credit: &Credit,
        receipts: &[Receipt],
        as_of: NaiveDate,
    ) -> Result<FreeCreditStatement> {
        if !credit.is_free() {
            return Err(CreditError::NotFreeCredit { id: credit.id });
        }

        let windows = self.windows(credit)?;
        let current_cycle = self.current_cycle(&windows, as_of);
        let known: Vec<&Receipt> = receipts.iter().filter(|r| r.paid_on <= as_of).collect();

        let principal_reduced: Money = known.iter().map(|r| r.principal_reduction()).sum();
        let principal_balance = credit.principal.saturating_sub(principal_reduced);

        let mut cycles = Vec::with_capacity(current_cycle as usize);
        for window in windows.iter().filter(|w| w.cycle <= current_cycle) {
            let reduced_before: Money = known
                .iter()
                .filter(|r| r.cycle.unwrap_or(1) < window.cycle)
                .map(|r| r.principal_reduction())
                .sum();
            let principal_base = credit.principal.saturating_sub(reduced_before);
            let interest = principal_base
                .apply_rate(self.config.cycle_interest_rate)
                .round_cents();

            let settlements: Vec<Settlement> = known
                .iter()
                .filter_map(|r| {
                    r.allocation_for(window.cycle).map(|a| Settlement {
                        date: r.paid_on,
                        cash: a.interest_paid + a.penalty_paid,
                        fee_waived: a.penalty_waived,
                        base_waived: a.interest_waived,
                    })
                })
                .collect();

            let walk = replay_late_fee(
                interest,
                window.ends_on,
                as_of,
                self.config.daily_penalty_rate,
                &settlements,
            );

            cycles.push(CycleStatement {
                window: *window,
                principal_base,
                interest,
                interest_paid: walk.base_paid,
                interest_waived: walk.base_waived,
                pending_interest: walk.base_remaining,
                penalty_generated: walk.fee_generated,
                penalty_paid: walk.fee_paid,
                penalty_waived: walk.fee_waived,
                pending_penalty: walk.pending_fee,
                days_late: walk.days_accrued,
            });
        }

        Ok(FreeCreditStatement {
            credit_id: credit.id,
            as_of,
            current_cycle,
            max_cycles: self.config.max_cycles,
            principal: credit.principal,
            principal_balance,
            cycles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CycleAllocation, ReceiptBreakdown};
    use crate::types::{CreditModality, CreditStatus, PartyRef, PaymentKind, PaymentPeriod};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calculator() -> FreeCreditCalculator {
        FreeCreditCalculator::new(FreeCreditConfig {
            cycle_interest_rate: Rate::from_percentage(60),
            daily_penalty_rate: Rate::from_percent(dec!(2.5)),
            max_cycles: 3,
        })
    }

    fn free_credit(principal: i64, disbursed_on: NaiveDate, commitment: NaiveDate) -> Credit {
        Credit {
            id: Uuid::new_v4(),
            client: PartyRef::new(Uuid::new_v4(), "client"),
            collector: PartyRef::new(Uuid::new_v4(), "collector"),
            modality: CreditModality::Free,
            period: PaymentPeriod::Monthly,
            interest_rate: Rate::from_percentage(60),
            installment_count: 1,
            principal: Money::from_major(principal),
            outstanding_balance: Money::from_major(principal),
            interest_collected: Money::ZERO,
            penalty_collected: Money::ZERO,
            status: CreditStatus::Pending,
            requested_on: disbursed_on,
            disbursed_on,
            commitment_date: commitment,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn receipt(
        credit: &Credit,
        paid_on: NaiveDate,
        cycle: u8,
        principal: i64,
        allocations: Vec<CycleAllocation>,
    ) -> Receipt {
        Receipt {
            id: Uuid::new_v4(),
            credit_id: credit.id,
            installment_id: Uuid::new_v4(),
            payment_id: Uuid::new_v4(),
            installment_sequence: 1,
            kind: PaymentKind::Partial,
            client_name: "client".to_string(),
            collector_name: "collector".to_string(),
            breakdown: ReceiptBreakdown {
                scheduled_amount: credit.principal,
                discount: Money::ZERO,
                penalty_discount: Money::ZERO,
                interest_discount: Money::ZERO,
                penalty_before: Money::ZERO,
                penalty_collected: Money::ZERO,
                interest_collected: Money::ZERO,
                principal_collected: Money::from_major(principal),
                total_collected: Money::from_major(principal),
                installment_balance_before: Money::ZERO,
                installment_balance_after: Money::ZERO,
                credit_balance_before: Money::ZERO,
                credit_balance_after: Money::ZERO,
            },
            cycle: Some(cycle),
            cycle_allocations: allocations,
            payment_method_id: Uuid::new_v4(),
            paid_on,
            issued_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            actor_id: Uuid::new_v4(),
            note: None,
        }
    }

    #[test]
    fn test_windows_anchor_on_commitment_date() {
        let credit = free_credit(10_000, date(2024, 1, 2), date(2024, 1, 31));
        let windows = calculator().windows(&credit).unwrap();

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].starts_on, date(2024, 1, 2));
        assert_eq!(windows[0].ends_on, date(2024, 1, 31));
        // clamped to the end of february, then back to the 31st
        assert_eq!(windows[1].starts_on, date(2024, 2, 1));
        assert_eq!(windows[1].ends_on, date(2024, 2, 29));
        assert_eq!(windows[2].ends_on, date(2024, 3, 31));
    }

    #[test]
    fn test_current_cycle_capped() {
        let credit = free_credit(10_000, date(2024, 1, 2), date(2024, 1, 31));
        let calc = calculator();
        let windows = calc.windows(&credit).unwrap();

        assert_eq!(calc.current_cycle(&windows, date(2024, 1, 31)), 1);
        assert_eq!(calc.current_cycle(&windows, date(2024, 2, 1)), 2);
        assert_eq!(calc.current_cycle(&windows, date(2025, 1, 1)), 3);
    }

    #[test]
    fn test_liquidation_in_first_cycle() {
        let credit = free_credit(10_000, date(2024, 1, 2), date(2024, 1, 31));
        let statement = calculator()
            .statement(&credit, &[], date(2024, 1, 20))
            .unwrap();

        assert_eq!(statement.current_cycle, 1);
        assert_eq!(statement.total_pending_interest(), Money::from_major(6_000));
        assert_eq!(statement.total_pending_penalty(), Money::ZERO);
        assert_eq!(statement.total_due(), Money::from_major(16_000));
        assert!(!statement.has_overdue_cycle());
    }

    #[test]
    fn test_closed_cycle_accrues_mora() {
        let credit = free_credit(10_000, date(2024, 1, 2), date(2024, 1, 31));
        let statement = calculator()
            .statement(&credit, &[], date(2024, 2, 10))
            .unwrap();

        let first = statement.cycle(1).unwrap();
        assert_eq!(first.pending_penalty, Money::from_major(1_500));
        assert_eq!(first.days_late, 10);
        assert_eq!(statement.current_cycle, 2);
        assert_eq!(statement.total_pending_interest(), Money::from_major(12_000));
        assert!(statement.has_overdue_cycle());
    }

    #[test]
    fn test_principal_payment_shrinks_next_base() {
        let credit = free_credit(10_000, date(2024, 1, 2), date(2024, 1, 31));
        let mut allocation = CycleAllocation::new(1);
        allocation.interest_paid = Money::from_major(6_000);
        let paid = receipt(&credit, date(2024, 1, 25), 1, 4_000, vec![allocation]);

        let statement = calculator()
            .statement(&credit, &[paid], date(2024, 2, 5))
            .unwrap();

        let first = statement.cycle(1).unwrap();
        assert_eq!(first.pending_interest, Money::ZERO);
        assert_eq!(first.pending_penalty, Money::ZERO);

        let second = statement.cycle(2).unwrap();
        assert_eq!(second.principal_base, Money::from_major(6_000));
        assert_eq!(second.interest, Money::from_major(3_600));
        assert_eq!(statement.principal_balance, Money::from_major(6_000));
        assert_eq!(statement.total_due(), Money::from_major(9_600));
    }

    #[test]
    fn test_rejects_scheduled_credit() {
        let mut credit = free_credit(1_000, date(2024, 1, 2), date(2024, 1, 31));
        credit.modality = CreditModality::Fixed;

        let err = calculator().statement(&credit, &[], date(2024, 1, 10)).unwrap_err();
        assert_eq!(err.code(), "CREDITO_NO_ES_LIBRE");
    }
}
