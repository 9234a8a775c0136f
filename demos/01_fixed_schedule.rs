/// fixed schedule - late partial payment with penalty and a mora discount
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use microcredit_rs::{
    ActorContext, BusinessClock, CreditApplication, CreditModality, DiscountRequest,
    EngineConfig, LoanEngine, MemoryStore, Money, PartyRef, PaymentPeriod, PaymentRequest,
    SafeTimeProvider, TimeSource, Uuid,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== fixed schedule example ===\n");

    let config = EngineConfig::utc();
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let clock = BusinessClock::from_config(time, &config)?;
    let engine = LoanEngine::new(MemoryStore::from_config(&config), clock, config)?;

    let issued = engine.issue_credit(CreditApplication {
        client: PartyRef::new(Uuid::new_v4(), "Rosa Quispe"),
        collector: PartyRef::new(Uuid::new_v4(), "Luis Huaman"),
        modality: CreditModality::Fixed,
        period: PaymentPeriod::Weekly,
        principal: Money::from_major(1_000),
        interest_rate: dec!(0),
        installment_count: 1,
        requested_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        disbursed_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        commitment_date: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
    })?;
    let installment_id = issued.installments[0].id;

    // five days past due
    controller.advance(Duration::days(12));
    let debt = engine.installment_debt(installment_id)?;
    println!(
        "as of {}: penalty {} principal {} ({} days late)",
        debt.as_of, debt.pending_penalty, debt.remaining_principal, debt.days_overdue
    );

    let collector = ActorContext::collector(Uuid::new_v4());
    let outcome = engine.pay_partial(PaymentRequest::partial(
        installment_id,
        Money::from_major(600),
        Uuid::new_v4(),
        collector,
    ))?;
    let breakdown = &outcome.receipt.breakdown;
    println!(
        "paid 600: penalty {} principal {} remaining {}",
        breakdown.penalty_collected,
        breakdown.principal_collected,
        breakdown.installment_balance_after
    );

    // two more days of mora, half of it forgiven
    controller.advance(Duration::days(2));
    let outcome = engine.pay_full(
        PaymentRequest::full(installment_id, Uuid::new_v4(), collector)
            .with_discount(DiscountRequest::mora(dec!(50))),
    )?;
    println!(
        "liquidated with {} collected, {} of mora forgiven",
        outcome.receipt.breakdown.total_collected, outcome.receipt.breakdown.penalty_discount
    );
    println!("credit status: {:?}", outcome.credit_status);

    Ok(())
}
