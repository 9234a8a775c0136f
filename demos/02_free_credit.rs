/// free credit - monthly cycles, late mora and liquidation
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use microcredit_rs::{
    ActorContext, BusinessClock, CreditApplication, CreditModality, EngineConfig, LoanEngine,
    MemoryStore, Money, PartyRef, PaymentPeriod, PaymentRequest, SafeTimeProvider, TimeSource,
    Uuid,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== free credit example ===\n");

    let config = EngineConfig::utc();
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let clock = BusinessClock::from_config(time, &config)?;
    let engine = LoanEngine::new(MemoryStore::from_config(&config), clock, config)?;

    let issued = engine.issue_credit(CreditApplication {
        client: PartyRef::new(Uuid::new_v4(), "Rosa Quispe"),
        collector: PartyRef::new(Uuid::new_v4(), "Luis Huaman"),
        modality: CreditModality::Free,
        period: PaymentPeriod::Monthly,
        principal: Money::from_major(10_000),
        interest_rate: dec!(60),
        installment_count: 0,
        requested_on: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        disbursed_on: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        commitment_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    })?;
    let anchor = issued.installments[0].id;
    let credit_id = issued.credit.id;

    // ten days after the first cycle closed
    controller.advance(Duration::days(39));
    let summary = engine.free_credit_summary(credit_id, None)?;
    println!("cycle {} of {}", summary.current_cycle, summary.max_cycles);
    for (interest, penalty) in summary.pending_interest.iter().zip(&summary.pending_penalty) {
        println!(
            "  cycle {}: interest {} mora {}",
            interest.cycle, interest.amount, penalty.amount
        );
    }
    println!("total due: {}", summary.total_due);

    // settle the late cycle, keep the principal running
    let collector = ActorContext::collector(Uuid::new_v4());
    let late = summary.pending_interest[0].amount + summary.pending_penalty[0].amount;
    engine.pay_partial(PaymentRequest::partial(anchor, late, Uuid::new_v4(), collector))?;

    let outcome = engine.pay_full(PaymentRequest::full(anchor, Uuid::new_v4(), collector))?;
    println!(
        "\nliquidation: {:?}, collected {}, credit {:?}",
        outcome.kind, outcome.receipt.breakdown.total_collected, outcome.credit_status
    );

    for receipt in engine.receipts_for_credit(credit_id)? {
        println!("receipt {} cycle {:?}", receipt.id, receipt.cycle);
    }

    Ok(())
}
