/// quick start - issue a credit and pay its first installment
use microcredit_rs::{
    ActorContext, BusinessClock, CreditApplication, CreditModality, EngineConfig, LoanEngine,
    MemoryStore, Money, PartyRef, PaymentPeriod, PaymentRequest, Uuid,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::standard();
    let clock = BusinessClock::system(&config)?;
    let engine = LoanEngine::new(MemoryStore::from_config(&config), clock, config)?;

    let today = engine.clock().today();
    let first_due = today + microcredit_rs::chrono::Duration::days(7);

    // 1,000 over four weekly installments at 20% flat
    let issued = engine.issue_credit(CreditApplication {
        client: PartyRef::new(Uuid::new_v4(), "Rosa Quispe"),
        collector: PartyRef::new(Uuid::new_v4(), "Luis Huaman"),
        modality: CreditModality::Fixed,
        period: PaymentPeriod::Weekly,
        principal: Money::from_major(1_000),
        interest_rate: dec!(20),
        installment_count: 4,
        requested_on: today,
        disbursed_on: today,
        commitment_date: first_due,
    })?;

    let collector = ActorContext::collector(issued.credit.collector.id);
    let outcome = engine.pay_full(PaymentRequest::full(
        issued.installments[0].id,
        Uuid::new_v4(),
        collector,
    ))?;

    println!("{}", outcome.receipt.to_json_pretty()?);
    println!("{}", engine.credit_view(issued.credit.id)?.to_json_pretty()?);

    Ok(())
}
