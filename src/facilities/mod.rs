pub mod free;
pub mod installment;
pub mod serialization;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::payments::Allocation;
use crate::state::{Credit, Installment};
use crate::types::{CreditId, InstallmentId, PaymentKind};

pub use free::FreeCreditPlanner;
pub use installment::InstallmentPlanner;
pub use serialization::{CreditView, InstallmentView};

/// what is owed on an installment today
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentDebt {
    pub installment_id: InstallmentId,
    pub credit_id: CreditId,
    pub as_of: NaiveDate,
    pub pending_penalty: Money,
    /// free credit only
    pub pending_interest: Money,
    pub remaining_principal: Money,
    pub total_due: Money,
    pub days_overdue: u32,
    /// current free credit cycle
    pub cycle: Option<u8>,
}

/// everything a payment will change, computed before anything is written
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPlan {
    pub kind: PaymentKind,
    pub allocation: Allocation,
    pub penalty_before: Money,
    pub installment_before: Installment,
    pub installment_after: Installment,
    pub credit_balance_before: Money,
    pub credit_after: Credit,
    pub cycle: Option<u8>,
}

impl PaymentPlan {
    pub fn installment_balance_before(&self) -> Money {
        self.allocation.debt_before()
    }

    pub fn installment_balance_after(&self) -> Money {
        self.allocation.debt_after()
    }

    pub fn credit_balance_after(&self) -> Money {
        self.credit_after.outstanding_balance
    }
}
