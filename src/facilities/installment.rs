use chrono::{DateTime, NaiveDate, Utc};

use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::interest::{PenaltySimulation, PenaltySimulator};
use crate::ledger::Payment;
use crate::payments::{DebtBreakdown, DiscountPolicy, PaymentAllocator, PaymentRequest};
use crate::state::{Credit, Installment};
use crate::types::{InstallmentStatus, PaymentKind};

use super::{InstallmentDebt, PaymentPlan};

/// plans payments against fixed and progressive installments
pub struct InstallmentPlanner<'a> {
    simulator: &'a PenaltySimulator,
    allocator: &'a PaymentAllocator,
}

impl<'a> InstallmentPlanner<'a> {
    pub fn new(simulator: &'a PenaltySimulator, allocator: &'a PaymentAllocator) -> Self {
        Self {
            simulator,
            allocator,
        }
    }

    pub fn debt(
        &self,
        installment: &Installment,
        payments: &[Payment],
        as_of: NaiveDate,
    ) -> InstallmentDebt {
        let sim = self.simulator.simulate(installment, payments, as_of);
        InstallmentDebt {
            installment_id: installment.id,
            credit_id: installment.credit_id,
            as_of,
            pending_penalty: sim.pending_penalty,
            pending_interest: Money::ZERO,
            remaining_principal: sim.remaining_principal,
            total_due: sim.total_due(),
            days_overdue: sim.days_overdue,
            cycle: None,
        }
    }

    pub fn plan(
        &self,
        credit: &Credit,
        installment: &Installment,
        payments: &[Payment],
        request: &PaymentRequest,
        as_of: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<PaymentPlan> {
        let sim: PenaltySimulation = self.simulator.simulate(installment, payments, as_of);
        if installment.status == InstallmentStatus::Paid || sim.is_settled() {
            return Err(CreditError::InstallmentAlreadyPaid { id: installment.id });
        }

        let debt = DebtBreakdown::installment(sim.pending_penalty, sim.remaining_principal);
        let discount = DiscountPolicy.authorize(request.discount.as_ref(), request.actor.role, &debt)?;
        let allocation = self
            .allocator
            .allocate(&debt, request.amount, discount.as_ref())?;

        let mut after = installment.clone();
        after.principal_paid = sim.principal_paid + allocation.principal_paid();
        after.discount = installment.discount + allocation.principal_waived();
        after.pending_penalty = sim
            .pending_penalty
            .saturating_sub(allocation.penalty_paid() + allocation.penalty_waived());
        after.status = after.status_after_payment();
        after.updated_at = now;

        let mut credit_after = credit.clone();
        credit_after.reduce_balance(allocation.principal_paid() + allocation.principal_waived());
        credit_after.penalty_collected += allocation.penalty_paid();
        credit_after.updated_at = now;

        let kind = if allocation.liquidation {
            PaymentKind::Full
        } else {
            PaymentKind::Partial
        };

        Ok(PaymentPlan {
            kind,
            penalty_before: sim.pending_penalty,
            installment_before: installment.clone(),
            installment_after: after,
            credit_balance_before: credit.outstanding_balance,
            credit_after,
            cycle: None,
            allocation,
        })
    }
}
