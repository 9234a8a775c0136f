//! credit status derived from installment and cycle state

use chrono::NaiveDate;

use crate::interest::FreeCreditStatement;
use crate::state::{Credit, Installment};
use crate::types::{CreditStatus, InstallmentStatus};

/// status the credit should carry given its installments
///
/// refinanced and cancelled are set outside this crate and never change
/// here. free credit needs its statement as of `today`.
pub fn derive_credit_status(
    credit: &Credit,
    installments: &[Installment],
    statement: Option<&FreeCreditStatement>,
    today: NaiveDate,
) -> CreditStatus {
    if matches!(credit.status, CreditStatus::Refinanced | CreditStatus::Cancelled) {
        return credit.status;
    }

    match statement {
        Some(statement) if credit.is_free() => free_status(credit, statement),
        _ => scheduled_status(installments, today),
    }
}

fn scheduled_status(installments: &[Installment], today: NaiveDate) -> CreditStatus {
    if !installments.is_empty() && installments.iter().all(|i| i.status == InstallmentStatus::Paid)
    {
        return CreditStatus::Paid;
    }

    let overdue = installments.iter().any(|i| {
        i.status == InstallmentStatus::Overdue
            || (i.status.is_open() && !i.is_free_anchor() && i.due_date < today)
    });
    if overdue {
        return CreditStatus::Overdue;
    }

    let collected = installments.iter().any(|i| {
        matches!(i.status, InstallmentStatus::Paid | InstallmentStatus::Partial)
            || i.principal_paid.is_positive()
    });
    if collected {
        CreditStatus::Partial
    } else {
        CreditStatus::Pending
    }
}

fn free_status(credit: &Credit, statement: &FreeCreditStatement) -> CreditStatus {
    if statement.total_due().is_zero() {
        return CreditStatus::Paid;
    }
    if statement.has_overdue_cycle() {
        return CreditStatus::Overdue;
    }
    let collected = credit.interest_collected.is_positive()
        || credit.penalty_collected.is_positive()
        || statement.principal_balance < statement.principal;
    if collected {
        CreditStatus::Partial
    } else {
        CreditStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::interest::{FreeCreditCalculator, FreeCreditConfig};
    use crate::types::{CreditModality, PartyRef, PaymentPeriod};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn credit(modality: CreditModality) -> Credit {
        Credit {
            id: Uuid::new_v4(),
            client: PartyRef::new(Uuid::new_v4(), "client"),
            collector: PartyRef::new(Uuid::new_v4(), "collector"),
            modality,
            period: PaymentPeriod::Monthly,
            interest_rate: Rate::from_percentage(60),
            installment_count: 2,
            principal: Money::from_major(10_000),
            outstanding_balance: Money::from_major(10_000),
            interest_collected: Money::ZERO,
            penalty_collected: Money::ZERO,
            status: CreditStatus::Pending,
            requested_on: date(2024, 1, 2),
            disbursed_on: date(2024, 1, 2),
            commitment_date: date(2024, 1, 31),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    fn installment(sequence: u32, due: NaiveDate, status: InstallmentStatus) -> Installment {
        Installment {
            id: Uuid::new_v4(),
            credit_id: Uuid::new_v4(),
            sequence,
            due_date: due,
            scheduled_amount: Money::from_major(500),
            discount: Money::ZERO,
            principal_paid: Money::ZERO,
            pending_penalty: Money::ZERO,
            status,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_scheduled_status_ladder() {
        let credit = credit(CreditModality::Fixed);
        let today = date(2024, 2, 10);
        let paid = installment(1, date(2024, 1, 31), InstallmentStatus::Paid);
        let pending = installment(2, date(2024, 2, 29), InstallmentStatus::Pending);
        let late = installment(2, date(2024, 2, 5), InstallmentStatus::Pending);

        assert_eq!(
            derive_credit_status(&credit, &[pending.clone()], None, today),
            CreditStatus::Pending
        );
        assert_eq!(
            derive_credit_status(&credit, &[paid.clone(), pending], None, today),
            CreditStatus::Partial
        );
        assert_eq!(
            derive_credit_status(&credit, &[paid.clone(), late], None, today),
            CreditStatus::Overdue
        );
        assert_eq!(
            derive_credit_status(&credit, &[paid], None, today),
            CreditStatus::Paid
        );
    }

    #[test]
    fn test_refinanced_never_changes() {
        let mut credit = credit(CreditModality::Fixed);
        credit.status = CreditStatus::Refinanced;
        let paid = installment(1, date(2024, 1, 31), InstallmentStatus::Paid);

        assert_eq!(
            derive_credit_status(&credit, &[paid], None, date(2024, 2, 1)),
            CreditStatus::Refinanced
        );
    }

    #[test]
    fn test_free_credit_overdue_after_cycle_closes() {
        let credit = credit(CreditModality::Free);
        let calculator = FreeCreditCalculator::new(FreeCreditConfig {
            cycle_interest_rate: Rate::from_percentage(60),
            daily_penalty_rate: Rate::from_percent(dec!(2.5)),
            max_cycles: 3,
        });

        let open = calculator.statement(&credit, &[], date(2024, 1, 20)).unwrap();
        assert_eq!(
            derive_credit_status(&credit, &[], Some(&open), date(2024, 1, 20)),
            CreditStatus::Pending
        );

        let late = calculator.statement(&credit, &[], date(2024, 2, 3)).unwrap();
        assert_eq!(
            derive_credit_status(&credit, &[], Some(&late), date(2024, 2, 3)),
            CreditStatus::Overdue
        );
    }
}
