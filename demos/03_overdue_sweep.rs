/// overdue sweep - daily job over a small portfolio with an event listener
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use microcredit_rs::{
    BusinessClock, CreditApplication, CreditModality, CreditStatusListener, EngineConfig, Event,
    LoanEngine, MemoryStore, Money, PartyRef, PaymentPeriod, SafeTimeProvider, TimeSource, Uuid,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

struct PrintListener;

impl CreditStatusListener for PrintListener {
    fn name(&self) -> &str {
        "print"
    }

    fn on_event(&self, event: &Event) {
        if let Event::InstallmentOverdue {
            installment_id,
            days_overdue,
            ..
        } = event
        {
            println!("  installment {installment_id} is {days_overdue} days late");
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::utc();
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let clock = BusinessClock::from_config(time, &config)?;
    let mut engine = LoanEngine::new(MemoryStore::from_config(&config), clock, config)?;
    engine.register_listener(Arc::new(PrintListener));

    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    for (name, count) in [("Rosa Quispe", 4), ("Ana Flores", 8)] {
        engine.issue_credit(CreditApplication {
            client: PartyRef::new(Uuid::new_v4(), name),
            collector: PartyRef::new(Uuid::new_v4(), "Luis Huaman"),
            modality: CreditModality::Progressive,
            period: PaymentPeriod::Weekly,
            principal: Money::from_major(2_000),
            interest_rate: dec!(15),
            installment_count: count,
            requested_on: start,
            disbursed_on: start,
            commitment_date: start + Duration::days(7),
        })?;
    }

    for day in [10, 1, 1] {
        controller.advance(Duration::days(day));
        let report = engine.sweep_overdue()?;
        println!(
            "{}: flagged {} refreshed {} credits {}",
            report.as_of,
            report.installments_flagged,
            report.penalties_refreshed,
            report.credits_updated
        );
    }

    Ok(())
}
