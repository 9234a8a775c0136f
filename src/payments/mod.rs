pub mod discount;
pub mod schedule;
pub mod waterfall;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::types::{ActorContext, DiscountScope, InstallmentId, PaymentMethodId};

pub use discount::DiscountPolicy;
pub use schedule::{ScheduleGenerator, ScheduledInstallment};
pub use waterfall::{Allocation, AllocationLine, PaymentAllocator};

/// payment request, shared by full and partial payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub installment_id: InstallmentId,
    /// none settles the whole debt
    pub amount: Option<Money>,
    pub payment_method_id: PaymentMethodId,
    pub discount: Option<DiscountRequest>,
    pub note: Option<String>,
    pub actor: ActorContext,
}

impl PaymentRequest {
    pub fn full(
        installment_id: InstallmentId,
        payment_method_id: PaymentMethodId,
        actor: ActorContext,
    ) -> Self {
        Self {
            installment_id,
            amount: None,
            payment_method_id,
            discount: None,
            note: None,
            actor,
        }
    }

    pub fn partial(
        installment_id: InstallmentId,
        amount: Money,
        payment_method_id: PaymentMethodId,
        actor: ActorContext,
    ) -> Self {
        Self {
            amount: Some(amount),
            ..Self::full(installment_id, payment_method_id, actor)
        }
    }

    pub fn with_discount(mut self, discount: DiscountRequest) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// shape checks, done before any lock is taken
    pub fn validate(&self) -> Result<()> {
        if let Some(amount) = self.amount {
            if !amount.is_positive() {
                return Err(CreditError::InvalidPaymentAmount { amount });
            }
        }
        if let Some(discount) = &self.discount {
            discount.validate()?;
        }
        Ok(())
    }
}

/// discount percentage and what it applies to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountRequest {
    /// 0 to 100
    pub percentage: Decimal,
    pub scope: DiscountScope,
}

impl DiscountRequest {
    pub fn mora(percentage: Decimal) -> Self {
        Self {
            percentage,
            scope: DiscountScope::Mora,
        }
    }

    pub fn total(percentage: Decimal) -> Self {
        Self {
            percentage,
            scope: DiscountScope::Total,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.percentage < Decimal::ZERO || self.percentage > Decimal::ONE_HUNDRED {
            return Err(CreditError::InvalidDiscount {
                percentage: self.percentage,
            });
        }
        Ok(())
    }

    pub fn is_zero(&self) -> bool {
        self.percentage.is_zero()
    }
}

/// kind of debt a bucket holds, in payment priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebtComponent {
    Penalty { cycle: Option<u8> },
    Interest { cycle: Option<u8> },
    Principal,
}

impl DebtComponent {
    pub fn priority(&self) -> u8 {
        match self {
            DebtComponent::Penalty { .. } => 1,
            DebtComponent::Interest { .. } => 2,
            DebtComponent::Principal => 3,
        }
    }

    pub fn cycle(&self) -> Option<u8> {
        match self {
            DebtComponent::Penalty { cycle } | DebtComponent::Interest { cycle } => *cycle,
            DebtComponent::Principal => None,
        }
    }
}

/// what a debt belongs to; picks the overpayment error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebtTarget {
    Installment,
    FreeCredit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DebtBucket {
    pub component: DebtComponent,
    pub amount: Money,
}

/// outstanding debt split into buckets, kept in payment order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtBreakdown {
    pub target: DebtTarget,
    buckets: Vec<DebtBucket>,
}

impl DebtBreakdown {
    pub fn new(target: DebtTarget) -> Self {
        Self {
            target,
            buckets: Vec::new(),
        }
    }

    /// scheduled installment: penalty, then principal
    pub fn installment(pending_penalty: Money, remaining_principal: Money) -> Self {
        let mut debt = Self::new(DebtTarget::Installment);
        debt.push(DebtComponent::Penalty { cycle: None }, pending_penalty);
        debt.push(DebtComponent::Principal, remaining_principal);
        debt
    }

    /// add a bucket; zero buckets are dropped and order is kept stable
    pub fn push(&mut self, component: DebtComponent, amount: Money) {
        if !amount.is_positive() {
            return;
        }
        let at = self
            .buckets
            .iter()
            .position(|b| b.component.priority() > component.priority())
            .unwrap_or(self.buckets.len());
        self.buckets.insert(at, DebtBucket { component, amount });
    }

    pub fn buckets(&self) -> &[DebtBucket] {
        &self.buckets
    }

    pub fn total(&self) -> Money {
        self.buckets.iter().map(|b| b.amount).sum()
    }

    pub fn penalty_total(&self) -> Money {
        self.sum_where(|c| matches!(c, DebtComponent::Penalty { .. }))
    }

    pub fn interest_total(&self) -> Money {
        self.sum_where(|c| matches!(c, DebtComponent::Interest { .. }))
    }

    pub fn principal_total(&self) -> Money {
        self.sum_where(|c| matches!(c, DebtComponent::Principal))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn sum_where(&self, pred: impl Fn(&DebtComponent) -> bool) -> Money {
        self.buckets
            .iter()
            .filter(|b| pred(&b.component))
            .map(|b| b.amount)
            .sum()
    }
}
