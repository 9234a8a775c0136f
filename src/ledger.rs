//! payment, receipt and cash ledger records. all three are write-once.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{
    ActorId, CashEntryId, CreditId, InstallmentId, PaymentId, PaymentKind, PaymentMethodId,
    ReceiptId,
};

/// cash received against an installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub installment_id: InstallmentId,
    pub credit_id: CreditId,
    pub amount: Money,
    pub paid_on: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub payment_method_id: PaymentMethodId,
    pub note: Option<String>,
    pub actor_id: ActorId,
    /// penalty forgiven in the same operation
    pub penalty_waived: Money,
    /// principal forgiven in the same operation
    pub principal_waived: Money,
    /// free credit cycle current at payment time
    pub cycle: Option<u8>,
}

/// amounts a payment applied to one free credit cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleAllocation {
    pub cycle: u8,
    pub interest_paid: Money,
    pub penalty_paid: Money,
    pub interest_waived: Money,
    pub penalty_waived: Money,
}

impl CycleAllocation {
    pub fn new(cycle: u8) -> Self {
        Self {
            cycle,
            interest_paid: Money::ZERO,
            penalty_paid: Money::ZERO,
            interest_waived: Money::ZERO,
            penalty_waived: Money::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.interest_paid.is_zero()
            && self.penalty_paid.is_zero()
            && self.interest_waived.is_zero()
            && self.penalty_waived.is_zero()
    }
}

/// money breakdown frozen on a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptBreakdown {
    pub scheduled_amount: Money,
    /// principal discount granted by this payment
    pub discount: Money,
    pub penalty_discount: Money,
    pub interest_discount: Money,
    pub penalty_before: Money,
    pub penalty_collected: Money,
    pub interest_collected: Money,
    pub principal_collected: Money,
    pub total_collected: Money,
    pub installment_balance_before: Money,
    pub installment_balance_after: Money,
    pub credit_balance_before: Money,
    pub credit_balance_after: Money,
}

/// immutable snapshot of one payment transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub credit_id: CreditId,
    pub installment_id: InstallmentId,
    pub payment_id: PaymentId,
    pub installment_sequence: u32,
    pub kind: PaymentKind,
    pub client_name: String,
    pub collector_name: String,
    pub breakdown: ReceiptBreakdown,
    pub cycle: Option<u8>,
    pub cycle_allocations: Vec<CycleAllocation>,
    pub payment_method_id: PaymentMethodId,
    pub paid_on: NaiveDate,
    pub issued_at: DateTime<Utc>,
    pub actor_id: ActorId,
    pub note: Option<String>,
}

impl Receipt {
    /// principal reduction recorded by this receipt, cash plus forgiven
    pub fn principal_reduction(&self) -> Money {
        self.breakdown.principal_collected + self.breakdown.discount
    }

    pub fn allocation_for(&self, cycle: u8) -> Option<&CycleAllocation> {
        self.cycle_allocations.iter().find(|a| a.cycle == cycle)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// income movement in the cash ledger, one per receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashLedgerEntry {
    pub id: CashEntryId,
    pub receipt_id: ReceiptId,
    pub credit_id: CreditId,
    pub installment_id: InstallmentId,
    pub amount: Money,
    pub occurred_on: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub payment_method_id: PaymentMethodId,
    pub actor_id: ActorId,
    pub concept: String,
}
