use chrono::{DateTime, NaiveDate, Utc};

use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::interest::{FreeCreditCalculator, FreeCreditStatement};
use crate::ledger::Receipt;
use crate::payments::{
    DebtBreakdown, DebtComponent, DebtTarget, DiscountPolicy, PaymentAllocator, PaymentRequest,
};
use crate::state::{Credit, Installment};
use crate::types::{InstallmentStatus, PaymentKind};

use super::{InstallmentDebt, PaymentPlan};

/// plans payments against a free credit through its anchor installment
pub struct FreeCreditPlanner<'a> {
    calculator: &'a FreeCreditCalculator,
    allocator: &'a PaymentAllocator,
}

impl<'a> FreeCreditPlanner<'a> {
    pub fn new(calculator: &'a FreeCreditCalculator, allocator: &'a PaymentAllocator) -> Self {
        Self {
            calculator,
            allocator,
        }
    }

    pub fn statement(
        &self,
        credit: &Credit,
        receipts: &[Receipt],
        as_of: NaiveDate,
    ) -> Result<FreeCreditStatement> {
        self.calculator.statement(credit, receipts, as_of)
    }

    /// all mora oldest cycle first, then all interest, then principal
    pub fn debt_breakdown(statement: &FreeCreditStatement) -> DebtBreakdown {
        let mut debt = DebtBreakdown::new(DebtTarget::FreeCredit);
        for cycle in &statement.cycles {
            debt.push(
                DebtComponent::Penalty {
                    cycle: Some(cycle.cycle()),
                },
                cycle.pending_penalty,
            );
        }
        for cycle in &statement.cycles {
            debt.push(
                DebtComponent::Interest {
                    cycle: Some(cycle.cycle()),
                },
                cycle.pending_interest,
            );
        }
        debt.push(DebtComponent::Principal, statement.principal_balance);
        debt
    }

    pub fn debt(&self, anchor: &Installment, statement: &FreeCreditStatement) -> InstallmentDebt {
        let days_overdue = statement
            .cycles
            .iter()
            .filter(|c| c.total_due().is_positive())
            .map(|c| c.days_late)
            .max()
            .unwrap_or(0);

        InstallmentDebt {
            installment_id: anchor.id,
            credit_id: statement.credit_id,
            as_of: statement.as_of,
            pending_penalty: statement.total_pending_penalty(),
            pending_interest: statement.total_pending_interest(),
            remaining_principal: statement.principal_balance,
            total_due: statement.total_due(),
            days_overdue,
            cycle: Some(statement.current_cycle),
        }
    }

    pub fn plan(
        &self,
        credit: &Credit,
        anchor: &Installment,
        receipts: &[Receipt],
        request: &PaymentRequest,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PaymentPlan> {
        if !credit.is_free() {
            return Err(CreditError::NotFreeCredit { id: credit.id });
        }

        let statement = self.statement(credit, receipts, as_of)?;
        let debt = Self::debt_breakdown(&statement);
        if debt.is_empty() {
            return Err(CreditError::CreditClosed {
                id: credit.id,
                status: credit.status,
            });
        }

        let discount = DiscountPolicy.authorize(request.discount.as_ref(), request.actor.role, &debt)?;
        let allocation = self
            .allocator
            .allocate(&debt, request.amount, discount.as_ref())?;

        if !allocation.liquidation && statement.is_terminal_cycle() {
            return Err(CreditError::FreeCreditCycleCap {
                cycle: statement.current_cycle,
                max_cycles: statement.max_cycles,
            });
        }

        let principal_reduction = allocation.principal_paid() + allocation.principal_waived();
        let pending_penalty = statement.total_pending_penalty();

        let mut after = anchor.clone();
        after.principal_paid += allocation.principal_paid();
        after.discount += allocation.principal_waived();
        after.pending_penalty =
            pending_penalty.saturating_sub(allocation.penalty_paid() + allocation.penalty_waived());
        after.status = if allocation.liquidation {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::Partial
        };
        after.updated_at = now;

        let mut credit_after = credit.clone();
        credit_after.reduce_balance(principal_reduction);
        credit_after.interest_collected += allocation.interest_paid();
        credit_after.penalty_collected += allocation.penalty_paid();
        if allocation.liquidation {
            credit_after.outstanding_balance = Money::ZERO;
        }
        credit_after.updated_at = now;

        let kind = if allocation.liquidation {
            PaymentKind::Liquidation
        } else {
            PaymentKind::Partial
        };

        Ok(PaymentPlan {
            kind,
            penalty_before: pending_penalty,
            installment_before: anchor.clone(),
            installment_after: after,
            credit_balance_before: credit.outstanding_balance,
            credit_after,
            cycle: Some(statement.current_cycle),
            allocation,
        })
    }
}
