use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// unique identifier for a credit
pub type CreditId = Uuid;
/// unique identifier for an installment
pub type InstallmentId = Uuid;
pub type PaymentId = Uuid;
pub type ReceiptId = Uuid;
pub type CashEntryId = Uuid;
/// reference to an externally managed payment method (cash, transfer, wallet)
pub type PaymentMethodId = Uuid;
/// acting user, for ledger attribution
pub type ActorId = Uuid;

/// amortization model of a credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditModality {
    /// flat interest split into equal installments
    Fixed,
    /// french annuity: constant installment, growing principal share
    Progressive,
    /// open-ended credit with monthly interest cycles
    Free,
}

impl CreditModality {
    pub fn is_free(&self) -> bool {
        matches!(self, CreditModality::Free)
    }
}

/// repayment frequency for scheduled credits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPeriod {
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentPeriod {
    /// due date of the n-th period after the start date
    pub fn nth_due_date(&self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            PaymentPeriod::Weekly => start.checked_add_days(Days::new(7 * n as u64)),
            PaymentPeriod::Biweekly => start.checked_add_days(Days::new(14 * n as u64)),
            PaymentPeriod::Monthly => start.checked_add_months(Months::new(n)),
        }
    }
}

/// credit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    /// issued, nothing collected yet
    Pending,
    /// some collection recorded, debt remains
    Partial,
    /// at least one installment or cycle is past due
    Overdue,
    /// balance and all pending charges are zero
    Paid,
    /// replaced by a new credit
    Refinanced,
    /// voided
    Cancelled,
}

impl CreditStatus {
    /// statuses no operation of this engine may leave
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CreditStatus::Paid | CreditStatus::Refinanced | CreditStatus::Cancelled
        )
    }
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    Partial,
    Overdue,
    Paid,
}

impl InstallmentStatus {
    /// statuses the overdue sweep may flip
    pub fn is_open(&self) -> bool {
        matches!(self, InstallmentStatus::Pending | InstallmentStatus::Partial)
    }
}

/// caller privilege declared by the boundary layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// full discretion over discounts
    Admin,
    /// field collector, may only discount penalty
    Collector,
}

impl ActorRole {
    pub fn is_privileged(&self) -> bool {
        matches!(self, ActorRole::Admin)
    }
}

/// identity context of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: ActorId,
    pub role: ActorRole,
}

impl ActorContext {
    pub fn new(actor_id: ActorId, role: ActorRole) -> Self {
        Self { actor_id, role }
    }

    pub fn admin(actor_id: ActorId) -> Self {
        Self::new(actor_id, ActorRole::Admin)
    }

    pub fn collector(actor_id: ActorId) -> Self {
        Self::new(actor_id, ActorRole::Collector)
    }
}

/// reference to a person managed outside this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: Uuid,
    pub name: String,
}

impl PartyRef {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// what a discount percentage applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountScope {
    /// only penalty / mora
    Mora,
    /// whole debt: penalty, then interest, then principal
    Total,
}

/// kind of payment operation recorded on a receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// installment settled in full
    Full,
    /// partial amount applied
    Partial,
    /// free credit extinguished
    Liquidation,
}
