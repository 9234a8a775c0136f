use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::interest::{replay_late_fee, Settlement};
use crate::ledger::Payment;
use crate::state::Installment;

/// penalty (mora) configuration for scheduled installments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// charged per day on the unpaid principal of an overdue installment
    pub daily_rate: Rate,
}

impl PenaltyConfig {
    pub fn new(daily_rate: Rate) -> Self {
        Self { daily_rate }
    }
}

/// penalty state of one installment as of a date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltySimulation {
    pub as_of: NaiveDate,
    pub pending_penalty: Money,
    pub penalty_generated: Money,
    pub penalty_paid: Money,
    pub penalty_waived: Money,
    pub principal_paid: Money,
    pub principal_waived: Money,
    pub remaining_principal: Money,
    pub days_overdue: u32,
}

impl PenaltySimulation {
    pub fn total_due(&self) -> Money {
        self.remaining_principal + self.pending_penalty
    }

    pub fn is_settled(&self) -> bool {
        self.total_due().is_zero()
    }
}

/// replays an installment's payment history to find its pending penalty
///
/// the result is a pure function of the installment, its payments and the
/// date, so recomputing it any number of times gives the same answer.
#[derive(Debug, Clone)]
pub struct PenaltySimulator {
    config: PenaltyConfig,
}

impl PenaltySimulator {
    pub fn new(config: PenaltyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PenaltyConfig {
        &self.config
    }

    pub fn simulate(
        &self,
        installment: &Installment,
        payments: &[Payment],
        as_of: NaiveDate,
    ) -> PenaltySimulation {
        // principal forgiven without a dated payment applies from day one
        let dated_waivers: Money = payments.iter().map(|p| p.principal_waived).sum();
        let undated = installment.discount.saturating_sub(dated_waivers);
        let base = installment.scheduled_amount.saturating_sub(undated);

        // free credit debt lives in the cycle calculator
        if installment.is_free_anchor() {
            return PenaltySimulation {
                as_of,
                pending_penalty: Money::ZERO,
                penalty_generated: Money::ZERO,
                penalty_paid: Money::ZERO,
                penalty_waived: Money::ZERO,
                principal_paid: installment.principal_paid,
                principal_waived: installment.discount,
                remaining_principal: installment.remaining_principal(),
                days_overdue: 0,
            };
        }

        let settlements: Vec<Settlement> = payments
            .iter()
            .map(|p| Settlement {
                date: p.paid_on,
                cash: p.amount,
                fee_waived: p.penalty_waived,
                base_waived: p.principal_waived,
            })
            .collect();

        let walk = replay_late_fee(
            base,
            installment.due_date,
            as_of,
            self.config.daily_rate,
            &settlements,
        );

        if !walk.unapplied.is_zero() {
            tracing::warn!(
                installment_id = %installment.id,
                unapplied = %walk.unapplied,
                "payment history exceeds installment debt"
            );
        }

        PenaltySimulation {
            as_of,
            pending_penalty: walk.pending_fee,
            penalty_generated: walk.fee_generated,
            penalty_paid: walk.fee_paid,
            penalty_waived: walk.fee_waived,
            principal_paid: walk.base_paid,
            principal_waived: walk.base_waived + undated,
            remaining_principal: walk.base_remaining,
            days_overdue: installment.days_overdue(as_of),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FREE_CREDIT_DUE_DATE;
    use crate::types::InstallmentStatus;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn simulator() -> PenaltySimulator {
        PenaltySimulator::new(PenaltyConfig::new(Rate::from_percent(dec!(2.5))))
    }

    fn installment(scheduled: i64, due: NaiveDate) -> Installment {
        Installment {
            id: Uuid::new_v4(),
            credit_id: Uuid::new_v4(),
            sequence: 1,
            due_date: due,
            scheduled_amount: Money::from_major(scheduled),
            discount: Money::ZERO,
            principal_paid: Money::ZERO,
            pending_penalty: Money::ZERO,
            status: InstallmentStatus::Pending,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn payment(inst: &Installment, amount: i64, paid_on: NaiveDate) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            installment_id: inst.id,
            credit_id: inst.credit_id,
            amount: Money::from_major(amount),
            paid_on,
            recorded_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            payment_method_id: Uuid::new_v4(),
            note: None,
            actor_id: Uuid::new_v4(),
            penalty_waived: Money::ZERO,
            principal_waived: Money::ZERO,
            cycle: None,
        }
    }

    #[test]
    fn test_paid_on_due_date_has_no_penalty() {
        let due = date(2024, 5, 10);
        let inst = installment(1_000, due);
        let paid = payment(&inst, 1_000, due);

        let sim = simulator().simulate(&inst, &[paid], due);
        assert_eq!(sim.pending_penalty, Money::ZERO);
        assert_eq!(sim.remaining_principal, Money::ZERO);
        assert!(sim.is_settled());
    }

    #[test]
    fn test_five_days_late_before_payment() {
        let due = date(2024, 5, 10);
        let inst = installment(1_000, due);
        let today = date(2024, 5, 15);

        let sim = simulator().simulate(&inst, &[], today);
        assert_eq!(sim.pending_penalty, Money::from_major(125));
        assert_eq!(sim.days_overdue, 5);
        assert_eq!(sim.total_due(), Money::from_major(1_125));

        let paid = payment(&inst, 600, today);
        let sim = simulator().simulate(&inst, &[paid], today);
        assert_eq!(sim.penalty_paid, Money::from_major(125));
        assert_eq!(sim.principal_paid, Money::from_major(475));
        assert_eq!(sim.remaining_principal, Money::from_major(525));
        assert_eq!(sim.pending_penalty, Money::ZERO);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let due = date(2024, 5, 10);
        let inst = installment(800, due);
        let payments = vec![
            payment(&inst, 100, date(2024, 5, 12)),
            payment(&inst, 50, date(2024, 5, 20)),
        ];
        let as_of = date(2024, 6, 1);

        let first = simulator().simulate(&inst, &payments, as_of);
        let second = simulator().simulate(&inst, &payments, as_of);
        assert_eq!(first, second);
    }

    #[test]
    fn test_dated_waivers_follow_payment_day() {
        let due = date(2024, 5, 10);
        let mut inst = installment(1_000, due);
        let mut paid = payment(&inst, 500, date(2024, 5, 14));
        paid.penalty_waived = Money::from_major(100);
        paid.principal_waived = Money::from_major(100);
        inst.discount = Money::from_major(100);

        let sim = simulator().simulate(&inst, &[paid], date(2024, 5, 14));
        assert_eq!(sim.penalty_waived, Money::from_major(100));
        assert_eq!(sim.penalty_paid, Money::ZERO);
        assert_eq!(sim.principal_paid, Money::from_major(500));
        assert_eq!(sim.principal_waived, Money::from_major(100));
        assert_eq!(sim.remaining_principal, Money::from_major(400));
    }

    #[test]
    fn test_free_anchor_never_accrues() {
        let inst = installment(10_000, FREE_CREDIT_DUE_DATE);
        let sim = simulator().simulate(&inst, &[], date(2030, 1, 1));

        assert_eq!(sim.pending_penalty, Money::ZERO);
        assert_eq!(sim.remaining_principal, Money::from_major(10_000));
    }
}
