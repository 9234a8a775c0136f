use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::types::{
    CreditId, CreditModality, CreditStatus, InstallmentId, InstallmentStatus, PartyRef,
    PaymentPeriod,
};

/// due date carried by the anchor installment of a free credit
pub const FREE_CREDIT_DUE_DATE: NaiveDate = NaiveDate::MAX;

/// credit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: CreditId,
    pub client: PartyRef,
    pub collector: PartyRef,
    pub modality: CreditModality,
    pub period: PaymentPeriod,
    /// normalized to a decimal fraction
    pub interest_rate: Rate,
    pub installment_count: u32,

    // balances
    pub principal: Money,
    pub outstanding_balance: Money,
    pub interest_collected: Money,
    pub penalty_collected: Money,

    pub status: CreditStatus,

    // dates
    pub requested_on: NaiveDate,
    pub disbursed_on: NaiveDate,
    /// end of the first cycle for free credit, first due date otherwise
    pub commitment_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl Credit {
    pub fn is_free(&self) -> bool {
        self.modality.is_free()
    }

    /// refinanced and cancelled credits are a hard stop for payments
    pub fn ensure_accepts_payment(&self) -> Result<()> {
        match self.status {
            CreditStatus::Refinanced => Err(CreditError::CreditRefinanced { id: self.id }),
            CreditStatus::Cancelled => Err(CreditError::CreditCancelled { id: self.id }),
            CreditStatus::Paid => Err(CreditError::CreditClosed {
                id: self.id,
                status: self.status,
            }),
            _ => Ok(()),
        }
    }

    /// set status, returning the previous one when it changed
    pub fn update_status(
        &mut self,
        new_status: CreditStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<CreditStatus> {
        if self.status == new_status {
            return None;
        }
        let old = self.status;
        self.status = new_status;
        self.updated_at = timestamp;
        Some(old)
    }

    /// reduce the outstanding balance, never below zero
    pub fn reduce_balance(&mut self, amount: Money) {
        self.outstanding_balance = self.outstanding_balance.saturating_sub(amount);
    }
}

/// installment record; free credit keeps a single anchor row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub credit_id: CreditId,
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub scheduled_amount: Money,
    /// principal forgiven to date
    pub discount: Money,
    pub principal_paid: Money,
    /// last recomputed penalty (mora), a cache of the simulator output
    pub pending_penalty: Money,
    pub status: InstallmentStatus,
    pub updated_at: DateTime<Utc>,
}

impl Installment {
    pub fn is_free_anchor(&self) -> bool {
        self.due_date == FREE_CREDIT_DUE_DATE
    }

    /// scheduled amount not yet collected or forgiven
    pub fn remaining_principal(&self) -> Money {
        self.scheduled_amount
            .saturating_sub(self.principal_paid + self.discount)
    }

    /// principal paid + discount never exceeds the scheduled amount
    pub fn within_schedule(&self) -> bool {
        self.principal_paid + self.discount <= self.scheduled_amount
    }

    pub fn total_due(&self) -> Money {
        self.remaining_principal() + self.pending_penalty
    }

    pub fn is_settled(&self) -> bool {
        self.remaining_principal().is_zero() && self.pending_penalty.is_zero()
    }

    /// days past due as of the given date, zero on or before the due date
    pub fn days_overdue(&self, as_of: NaiveDate) -> u32 {
        if self.is_free_anchor() || as_of <= self.due_date {
            return 0;
        }
        (as_of - self.due_date).num_days() as u32
    }

    /// status right after a payment: paid when settled, partial otherwise
    pub fn status_after_payment(&self) -> InstallmentStatus {
        if self.is_settled() {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

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

    #[test]
    fn test_remaining_and_settlement() {
        let due = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mut inst = installment(1_000, due);
        inst.principal_paid = Money::from_major(400);
        inst.discount = Money::from_major(100);

        assert_eq!(inst.remaining_principal(), Money::from_major(500));
        assert!(inst.within_schedule());
        assert_eq!(inst.status_after_payment(), InstallmentStatus::Partial);

        inst.principal_paid = Money::from_major(900);
        assert!(inst.is_settled());
        assert_eq!(inst.status_after_payment(), InstallmentStatus::Paid);

        inst.pending_penalty = Money::from_major(5);
        assert!(!inst.is_settled());
    }

    #[test]
    fn test_days_overdue_uses_calendar_dates() {
        let due = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let inst = installment(1_000, due);

        assert_eq!(inst.days_overdue(due), 0);
        assert_eq!(inst.days_overdue(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()), 0);
        assert_eq!(inst.days_overdue(NaiveDate::from_ymd_opt(2024, 2, 6).unwrap()), 5);

        let anchor = installment(1_000, FREE_CREDIT_DUE_DATE);
        assert!(anchor.is_free_anchor());
        assert_eq!(anchor.days_overdue(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()), 0);
    }
}
