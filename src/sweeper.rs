//! daily pass over scheduled credits: flips past-due installments to
//! overdue and refreshes their cached penalty.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::engine::LoanEngine;
use crate::errors::Result;
use crate::events::Event;
use crate::store::{CreditStore, StoreTransaction};
use crate::types::{CreditId, InstallmentId, InstallmentStatus};

/// what one sweep changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub as_of: NaiveDate,
    pub installments_flagged: usize,
    pub penalties_refreshed: usize,
    pub credits_updated: usize,
}

impl<S: CreditStore> LoanEngine<S> {
    /// mark overdue installments as of today; safe to run more than once a day
    pub fn sweep_overdue(&self) -> Result<SweepReport> {
        let today = self.clock.today();
        let now = self.clock.now();
        let mut events = Vec::new();
        let mut report = SweepReport {
            as_of: today,
            installments_flagged: 0,
            penalties_refreshed: 0,
            credits_updated: 0,
        };

        let mut tx = self.store.begin()?;
        let mut by_credit: BTreeMap<CreditId, Vec<InstallmentId>> = BTreeMap::new();
        for installment in tx.overdue_candidates(today)? {
            by_credit
                .entry(installment.credit_id)
                .or_default()
                .push(installment.id);
        }

        for (credit_id, installment_ids) in by_credit {
            let mut credit = tx.lock_credit(credit_id)?;
            for id in installment_ids {
                let mut installment = tx.lock_installment(id)?;
                if installment.status.is_open() {
                    events.push(Event::InstallmentStatusChanged {
                        installment_id: id,
                        credit_id,
                        old_status: installment.status,
                        new_status: InstallmentStatus::Overdue,
                        timestamp: now,
                    });
                    events.push(Event::InstallmentOverdue {
                        installment_id: id,
                        credit_id,
                        due_date: installment.due_date,
                        days_overdue: installment.days_overdue(today),
                    });
                    installment.status = InstallmentStatus::Overdue;
                    installment.updated_at = now;
                    tx.update_installment(&installment)?;
                    report.installments_flagged += 1;
                }

                let cached = installment.pending_penalty;
                let pending =
                    self.refresh_penalty(&mut tx, &credit, installment, today, now, &mut events)?;
                if pending != cached {
                    report.penalties_refreshed += 1;
                }
            }

            if self
                .refresh_credit_status(&tx, &mut credit, today, now, &mut events)?
                .is_some()
            {
                tx.update_credit(&credit)?;
                report.credits_updated += 1;
            }
        }

        tx.commit()?;

        tracing::info!(
            as_of = %today,
            flagged = report.installments_flagged,
            refreshed = report.penalties_refreshed,
            credits = report.credits_updated,
            "overdue sweep finished"
        );
        self.publish(events);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::BusinessClock;
    use crate::config::EngineConfig;
    use crate::decimal::Money;
    use crate::engine::CreditApplication;
    use crate::store::MemoryStore;
    use crate::types::{CreditModality, CreditStatus, PartyRef, PaymentPeriod};
    use chrono::{Duration, TimeZone, Utc};
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine() -> LoanEngine<MemoryStore> {
        let config = EngineConfig::utc();
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let clock = BusinessClock::from_config(time, &config).unwrap();
        LoanEngine::new(MemoryStore::from_config(&config), clock, config).unwrap()
    }

    fn issue(engine: &LoanEngine<MemoryStore>, count: u32) -> crate::engine::IssuedCredit {
        engine
            .issue_credit(CreditApplication {
                client: PartyRef::new(Uuid::new_v4(), "Rosa Quispe"),
                collector: PartyRef::new(Uuid::new_v4(), "Luis Huaman"),
                modality: CreditModality::Fixed,
                period: PaymentPeriod::Weekly,
                principal: Money::from_major(1_000),
                interest_rate: dec!(0),
                installment_count: count,
                requested_on: date(2024, 3, 1),
                disbursed_on: date(2024, 3, 1),
                commitment_date: date(2024, 3, 8),
            })
            .unwrap()
    }

    #[test]
    fn test_sweep_flags_and_refreshes() {
        let engine = engine();
        let issued = issue(&engine, 2);
        engine
            .clock()
            .provider()
            .test_control()
            .unwrap()
            .advance(Duration::days(12));

        let report = engine.sweep_overdue().unwrap();
        assert_eq!(report.as_of, date(2024, 3, 13));
        assert_eq!(report.installments_flagged, 1);
        assert_eq!(report.penalties_refreshed, 1);
        assert_eq!(report.credits_updated, 1);

        let first = engine
            .store()
            .committed_installment(issued.installments[0].id)
            .unwrap();
        assert_eq!(first.status, InstallmentStatus::Overdue);
        // 500 late five days at 2.5%
        assert_eq!(first.pending_penalty, Money::from_minor(6_250, 2));

        let second = engine
            .store()
            .committed_installment(issued.installments[1].id)
            .unwrap();
        assert_eq!(second.status, InstallmentStatus::Pending);

        let credit = engine.store().committed_credit(issued.credit.id).unwrap();
        assert_eq!(credit.status, CreditStatus::Overdue);

        let events = engine.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::InstallmentOverdue { days_overdue: 5, .. })));
    }

    #[test]
    fn test_sweep_twice_same_day_changes_nothing() {
        let engine = engine();
        let issued = issue(&engine, 1);
        engine
            .clock()
            .provider()
            .test_control()
            .unwrap()
            .advance(Duration::days(10));

        engine.sweep_overdue().unwrap();
        let after_first = engine
            .store()
            .committed_installment(issued.installments[0].id)
            .unwrap();
        engine.take_events();

        let report = engine.sweep_overdue().unwrap();
        assert_eq!(report.installments_flagged, 0);
        assert_eq!(report.penalties_refreshed, 0);
        assert_eq!(report.credits_updated, 0);
        assert_eq!(
            engine
                .store()
                .committed_installment(issued.installments[0].id)
                .unwrap(),
            after_first
        );
        assert!(engine.take_events().is_empty());
        assert_eq!(engine.store().held_locks(), 0);
    }

    #[test]
    fn test_sweep_skips_paid_installments() {
        let engine = engine();
        let issued = issue(&engine, 1);
        engine
            .pay_full(crate::payments::PaymentRequest::full(
                issued.installments[0].id,
                Uuid::new_v4(),
                crate::types::ActorContext::collector(Uuid::new_v4()),
            ))
            .unwrap();
        engine
            .clock()
            .provider()
            .test_control()
            .unwrap()
            .advance(Duration::days(30));

        let report = engine.sweep_overdue().unwrap();
        assert_eq!(report.installments_flagged, 0);
    }
}
