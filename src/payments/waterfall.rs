use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{CreditError, Result};
use crate::ledger::CycleAllocation;
use crate::types::DiscountScope;

use super::{DebtBreakdown, DebtComponent, DebtTarget, DiscountPolicy, DiscountRequest};

/// what one bucket received
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub component: DebtComponent,
    pub debt_before: Money,
    pub waived: Money,
    pub paid: Money,
}

impl AllocationLine {
    pub fn debt_after(&self) -> Money {
        self.debt_before.saturating_sub(self.waived + self.paid)
    }
}

/// outcome of running a payment through the waterfall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub target: DebtTarget,
    pub lines: Vec<AllocationLine>,
    /// cash taken from the payer
    pub collected: Money,
    pub discount: Option<DiscountRequest>,
    /// the whole debt was settled
    pub liquidation: bool,
}

impl Allocation {
    pub fn debt_before(&self) -> Money {
        self.lines.iter().map(|l| l.debt_before).sum()
    }

    pub fn debt_after(&self) -> Money {
        self.lines.iter().map(|l| l.debt_after()).sum()
    }

    pub fn discount_total(&self) -> Money {
        self.lines.iter().map(|l| l.waived).sum()
    }

    pub fn penalty_paid(&self) -> Money {
        self.sum(|c| matches!(c, DebtComponent::Penalty { .. }), |l| l.paid)
    }

    pub fn penalty_waived(&self) -> Money {
        self.sum(|c| matches!(c, DebtComponent::Penalty { .. }), |l| l.waived)
    }

    pub fn interest_paid(&self) -> Money {
        self.sum(|c| matches!(c, DebtComponent::Interest { .. }), |l| l.paid)
    }

    pub fn interest_waived(&self) -> Money {
        self.sum(|c| matches!(c, DebtComponent::Interest { .. }), |l| l.waived)
    }

    pub fn principal_paid(&self) -> Money {
        self.sum(|c| matches!(c, DebtComponent::Principal), |l| l.paid)
    }

    pub fn principal_waived(&self) -> Money {
        self.sum(|c| matches!(c, DebtComponent::Principal), |l| l.waived)
    }

    /// per-cycle split of interest and penalty, ascending by cycle
    pub fn cycle_allocations(&self) -> Vec<CycleAllocation> {
        let mut allocations: Vec<CycleAllocation> = Vec::new();
        for line in &self.lines {
            let Some(cycle) = line.component.cycle() else {
                continue;
            };
            let idx = match allocations.iter().position(|a| a.cycle == cycle) {
                Some(idx) => idx,
                None => {
                    allocations.push(CycleAllocation::new(cycle));
                    allocations.len() - 1
                }
            };
            let entry = &mut allocations[idx];
            match line.component {
                DebtComponent::Penalty { .. } => {
                    entry.penalty_paid += line.paid;
                    entry.penalty_waived += line.waived;
                }
                DebtComponent::Interest { .. } => {
                    entry.interest_paid += line.paid;
                    entry.interest_waived += line.waived;
                }
                DebtComponent::Principal => {}
            }
        }
        allocations.retain(|a| !a.is_empty());
        allocations.sort_by_key(|a| a.cycle);
        allocations
    }

    fn sum(
        &self,
        pred: impl Fn(&DebtComponent) -> bool,
        pick: impl Fn(&AllocationLine) -> Money,
    ) -> Money {
        self.lines
            .iter()
            .filter(|l| pred(&l.component))
            .map(pick)
            .sum()
    }
}

/// applies discounts, then cash, penalty first, then interest, then principal
#[derive(Debug, Clone)]
pub struct PaymentAllocator {
    tolerance: Money,
    policy: DiscountPolicy,
}

impl PaymentAllocator {
    pub fn new(tolerance: Money) -> Self {
        Self {
            tolerance,
            policy: DiscountPolicy,
        }
    }

    pub fn tolerance(&self) -> Money {
        self.tolerance
    }

    /// `amount` of none settles everything left after the discount. an
    /// amount within tolerance of that debt is a liquidation: only the
    /// debt is taken when it is above, and a shortfall is waived when it
    /// is below. anything beyond the tolerance is refused.
    pub fn allocate(
        &self,
        debt: &DebtBreakdown,
        amount: Option<Money>,
        discount: Option<&DiscountRequest>,
    ) -> Result<Allocation> {
        let mut lines: Vec<AllocationLine> = debt
            .buckets()
            .iter()
            .map(|b| AllocationLine {
                component: b.component,
                debt_before: b.amount,
                waived: Money::ZERO,
                paid: Money::ZERO,
            })
            .collect();

        if let Some(request) = discount {
            let mut left = self.policy.discount_amount(request, debt);
            for line in lines.iter_mut() {
                if left.is_zero() {
                    break;
                }
                let eligible = match request.scope {
                    DiscountScope::Mora => matches!(line.component, DebtComponent::Penalty { .. }),
                    DiscountScope::Total => true,
                };
                if !eligible {
                    continue;
                }
                let waived = left.min(line.debt_before);
                line.waived = waived;
                left -= waived;
            }
        }

        let due: Money = lines.iter().map(|l| l.debt_after()).sum();

        let (cash, liquidation) = match amount {
            None => (due, true),
            Some(amount) if amount > due + self.tolerance => {
                return Err(match debt.target {
                    DebtTarget::Installment => CreditError::InstallmentOverpayment { amount, debt: due },
                    DebtTarget::FreeCredit => CreditError::FreeCreditOverpayment { amount, debt: due },
                });
            }
            Some(amount) if amount.approx_eq(due, self.tolerance) => (amount.min(due), true),
            Some(amount) => (amount, false),
        };

        let mut left = cash;
        for line in lines.iter_mut() {
            let paid = left.min(line.debt_after());
            line.paid = paid;
            left -= paid;
        }

        // a short liquidation forgives the residual, latest bucket first
        let mut residual = due.saturating_sub(cash);
        if liquidation && residual.is_positive() {
            tracing::debug!(collected = %cash, %due, %residual, "waiving settlement residual");
            for line in lines.iter_mut().rev() {
                let waived = residual.min(line.debt_after());
                line.waived += waived;
                residual -= waived;
                if residual.is_zero() {
                    break;
                }
            }
        }

        Ok(Allocation {
            target: debt.target,
            lines,
            collected: cash,
            discount: discount.copied(),
            liquidation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn allocator() -> PaymentAllocator {
        PaymentAllocator::new(Money::CENT)
    }

    fn free_debt() -> DebtBreakdown {
        let mut debt = DebtBreakdown::new(DebtTarget::FreeCredit);
        debt.push(DebtComponent::Penalty { cycle: Some(1) }, Money::from_major(1_500));
        debt.push(DebtComponent::Interest { cycle: Some(1) }, Money::from_major(6_000));
        debt.push(DebtComponent::Interest { cycle: Some(2) }, Money::from_major(6_000));
        debt.push(DebtComponent::Principal, Money::from_major(10_000));
        debt
    }

    #[test]
    fn test_partial_goes_penalty_first() {
        let debt = DebtBreakdown::installment(Money::from_major(125), Money::from_major(1_000));
        let allocation = allocator()
            .allocate(&debt, Some(Money::from_major(600)), None)
            .unwrap();

        assert_eq!(allocation.penalty_paid(), Money::from_major(125));
        assert_eq!(allocation.principal_paid(), Money::from_major(475));
        assert_eq!(allocation.debt_after(), Money::from_major(525));
        assert!(!allocation.liquidation);
    }

    #[test]
    fn test_overpayment_rejected_by_target() {
        let debt = DebtBreakdown::installment(Money::ZERO, Money::from_major(1_000));
        let err = allocator()
            .allocate(&debt, Some(Money::from_str_exact("1000.02").unwrap()), None)
            .unwrap_err();
        assert_eq!(err.code(), "CUOTA_PAGO_EXCEDE_DEUDA");

        let err = allocator()
            .allocate(&free_debt(), Some(Money::from_major(30_000)), None)
            .unwrap_err();
        assert_eq!(err.code(), "LIBRE_PAGO_EXCEDE_DEUDA");
    }

    #[test]
    fn test_short_by_a_cent_waives_residual() {
        let debt = DebtBreakdown::installment(Money::from_major(125), Money::from_major(875));
        let tendered = Money::from_str_exact("999.99").unwrap();
        let allocation = allocator().allocate(&debt, Some(tendered), None).unwrap();

        assert!(allocation.liquidation);
        assert_eq!(allocation.collected, tendered);
        assert_eq!(allocation.penalty_paid(), Money::from_major(125));
        assert_eq!(allocation.principal_paid(), Money::from_str_exact("874.99").unwrap());
        assert_eq!(allocation.principal_waived(), Money::CENT);
        assert_eq!(allocation.debt_after(), Money::ZERO);
    }

    #[test]
    fn test_over_by_a_cent_takes_only_the_debt() {
        let debt = DebtBreakdown::installment(Money::ZERO, Money::from_major(1_000));
        let allocation = allocator()
            .allocate(&debt, Some(Money::from_str_exact("1000.01").unwrap()), None)
            .unwrap();

        assert!(allocation.liquidation);
        assert_eq!(allocation.collected, Money::from_major(1_000));
        assert_eq!(allocation.discount_total(), Money::ZERO);
        assert_eq!(allocation.debt_after(), Money::ZERO);
    }

    #[test]
    fn test_mora_discount_only_touches_penalty() {
        let request = DiscountRequest::mora(dec!(100));
        let allocation = allocator()
            .allocate(&free_debt(), Some(Money::from_major(1_000)), Some(&request))
            .unwrap();

        assert_eq!(allocation.penalty_waived(), Money::from_major(1_500));
        assert_eq!(allocation.penalty_paid(), Money::ZERO);
        assert_eq!(allocation.interest_paid(), Money::from_major(1_000));
        assert_eq!(allocation.principal_waived(), Money::ZERO);
    }

    #[test]
    fn test_total_discount_consumes_in_order() {
        let debt = DebtBreakdown::installment(Money::from_major(100), Money::from_major(900));
        let request = DiscountRequest::total(dec!(20));
        let allocation = allocator().allocate(&debt, None, Some(&request)).unwrap();

        // 200 forgiven: all 100 of penalty, then 100 of principal
        assert_eq!(allocation.penalty_waived(), Money::from_major(100));
        assert_eq!(allocation.principal_waived(), Money::from_major(100));
        assert_eq!(allocation.collected, Money::from_major(800));
        assert!(allocation.liquidation);
    }

    #[test]
    fn test_cycle_allocations_split() {
        let allocation = allocator()
            .allocate(&free_debt(), Some(Money::from_major(9_000)), None)
            .unwrap();
        let cycles = allocation.cycle_allocations();

        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].cycle, 1);
        assert_eq!(cycles[0].penalty_paid, Money::from_major(1_500));
        assert_eq!(cycles[0].interest_paid, Money::from_major(6_000));
        assert_eq!(cycles[1].interest_paid, Money::from_major(1_500));
        assert_eq!(allocation.principal_paid(), Money::ZERO);
    }
}
