use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::state::FREE_CREDIT_DUE_DATE;
use crate::types::{CreditModality, PaymentPeriod};

/// one row of a generated schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub principal_portion: Money,
    pub interest_portion: Money,
    pub ending_balance: Money,
}

/// builds installment schedules at issuance
#[derive(Debug, Clone)]
pub struct ScheduleGenerator {
    modality: CreditModality,
    period: PaymentPeriod,
}

impl ScheduleGenerator {
    pub fn new(modality: CreditModality, period: PaymentPeriod) -> Self {
        Self { modality, period }
    }

    /// `first_due` is the commitment date: first due date for scheduled
    /// credit, end of cycle one for free credit
    pub fn generate(
        &self,
        principal: Money,
        rate: Rate,
        count: u32,
        first_due: NaiveDate,
    ) -> Result<Vec<ScheduledInstallment>> {
        if !principal.is_positive() {
            return Err(CreditError::InvalidSchedule {
                message: format!("principal must be positive, got {principal}"),
            });
        }

        let rows = match self.modality {
            CreditModality::Free => vec![ScheduledInstallment {
                sequence: 1,
                due_date: FREE_CREDIT_DUE_DATE,
                amount: principal,
                principal_portion: principal,
                interest_portion: Money::ZERO,
                ending_balance: Money::ZERO,
            }],
            CreditModality::Fixed => {
                self.ensure_count(count)?;
                self.flat(principal, rate, count, first_due)?
            }
            CreditModality::Progressive => {
                self.ensure_count(count)?;
                self.annuity(principal, rate, count, first_due)?
            }
        };

        if let Some(row) = rows.iter().find(|r| !r.amount.is_positive()) {
            return Err(CreditError::InvalidSchedule {
                message: format!(
                    "installment {} would be {}; principal {principal} is too small for {count} installments",
                    row.sequence, row.amount
                ),
            });
        }
        Ok(rows)
    }

    fn ensure_count(&self, count: u32) -> Result<()> {
        if count == 0 {
            return Err(CreditError::InvalidSchedule {
                message: "at least one installment is required".to_string(),
            });
        }
        Ok(())
    }

    fn due_date(&self, first_due: NaiveDate, sequence: u32) -> Result<NaiveDate> {
        self.period
            .nth_due_date(first_due, sequence - 1)
            .ok_or_else(|| CreditError::InvalidSchedule {
                message: format!("due date for installment {sequence} out of range"),
            })
    }

    /// flat interest on the whole principal, split evenly
    fn flat(
        &self,
        principal: Money,
        rate: Rate,
        count: u32,
        first_due: NaiveDate,
    ) -> Result<Vec<ScheduledInstallment>> {
        let n = Decimal::from(count);
        let total_interest = principal.apply_rate(rate).round_cents();
        let amount = ((principal + total_interest) / n).round_cents();
        let principal_share = (principal / n).round_cents();
        let interest_share = amount - principal_share;

        let mut rows = Vec::with_capacity(count as usize);
        let mut balance = principal;
        let mut interest_left = total_interest;

        for sequence in 1..=count {
            let (principal_portion, interest_portion) = if sequence == count {
                // last row absorbs rounding
                (balance, interest_left)
            } else {
                (principal_share, interest_share)
            };
            balance = balance.saturating_sub(principal_portion);
            interest_left = interest_left.saturating_sub(interest_portion);

            rows.push(ScheduledInstallment {
                sequence,
                due_date: self.due_date(first_due, sequence)?,
                amount: principal_portion + interest_portion,
                principal_portion,
                interest_portion,
                ending_balance: balance,
            });
        }

        Ok(rows)
    }

    /// level payment on a declining balance; the credit rate is spread
    /// evenly over the periods
    fn annuity(
        &self,
        principal: Money,
        rate: Rate,
        count: u32,
        first_due: NaiveDate,
    ) -> Result<Vec<ScheduledInstallment>> {
        let period_rate = rate.as_decimal() / Decimal::from(count);
        let payment = level_payment(principal, period_rate, count)?;

        let mut rows = Vec::with_capacity(count as usize);
        let mut balance = principal;

        for sequence in 1..=count {
            let interest_portion = Money::from_decimal(balance.as_decimal() * period_rate).round_cents();
            let principal_portion = if sequence == count {
                balance
            } else {
                (payment - interest_portion).min(balance)
            };
            balance = balance.saturating_sub(principal_portion);

            rows.push(ScheduledInstallment {
                sequence,
                due_date: self.due_date(first_due, sequence)?,
                amount: principal_portion + interest_portion,
                principal_portion,
                interest_portion,
                ending_balance: balance,
            });
        }

        Ok(rows)
    }
}

/// payment = p * r / (1 - (1 + r)^-n), rounded to cents
fn level_payment(principal: Money, period_rate: Decimal, count: u32) -> Result<Money> {
    let n = Decimal::from(count);
    if period_rate.is_zero() {
        return Ok((principal / n).round_cents());
    }

    let mut growth = Decimal::ONE;
    let factor = Decimal::ONE + period_rate;
    for _ in 0..count {
        growth = growth
            .checked_mul(factor)
            .ok_or_else(|| CreditError::CalculationError {
                message: "annuity factor overflow".to_string(),
            })?;
    }

    let denominator = Decimal::ONE - Decimal::ONE / growth;
    if denominator.is_zero() {
        return Err(CreditError::CalculationError {
            message: "annuity denominator is zero".to_string(),
        });
    }

    Ok(Money::from_decimal(principal.as_decimal() * period_rate / denominator).round_cents())
}
