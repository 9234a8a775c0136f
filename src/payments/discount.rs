use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::types::{ActorRole, DiscountScope};

use super::{DebtBreakdown, DebtTarget, DiscountRequest};

/// who may discount what
///
/// collectors may only forgive penalty; a whole-debt discount needs a
/// privileged actor. on free credit a penalty discount with no penalty
/// pending is refused for every role.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscountPolicy;

impl DiscountPolicy {
    /// check the request against the actor and the live debt; zero
    /// percent discounts resolve to none
    pub fn authorize(
        &self,
        request: Option<&DiscountRequest>,
        role: ActorRole,
        debt: &DebtBreakdown,
    ) -> Result<Option<DiscountRequest>> {
        let request = match request {
            Some(r) if !r.is_zero() => *r,
            _ => return Ok(None),
        };
        request.validate()?;

        match request.scope {
            DiscountScope::Total if !role.is_privileged() => {
                Err(CreditError::DiscountNotAuthorized)
            }
            DiscountScope::Mora
                if debt.target == DebtTarget::FreeCredit && debt.penalty_total().is_zero() =>
            {
                Err(CreditError::DiscountWithoutPenalty)
            }
            _ => Ok(Some(request)),
        }
    }

    /// amount the discount forgives, rounded to cents
    pub fn discount_amount(&self, request: &DiscountRequest, debt: &DebtBreakdown) -> Money {
        let base = match request.scope {
            DiscountScope::Mora => debt.penalty_total(),
            DiscountScope::Total => debt.total(),
        };
        base.percentage(request.percentage).round_cents()
    }
}
