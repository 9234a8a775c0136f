pub mod clock;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod facilities;
pub mod interest;
pub mod ledger;
pub mod payments;
pub mod state;
pub mod status;
pub mod store;
pub mod sweeper;
pub mod types;

// re-export key types
pub use clock::BusinessClock;
pub use config::EngineConfig;
pub use decimal::{Money, Rate};
pub use engine::{CreditApplication, IssuedCredit, LoanEngine, PaymentOutcome};
pub use errors::{CreditError, ErrorKind, Result};
pub use events::{CreditStatusListener, Event, EventStore};
pub use facilities::{CreditView, InstallmentDebt};
pub use interest::{FreeCreditSummary, PenaltyConfig, PenaltySimulator};
pub use ledger::{CashLedgerEntry, Payment, Receipt};
pub use payments::{DiscountRequest, PaymentRequest};
pub use state::{Credit, Installment};
pub use store::{CreditStore, MemoryStore, StoreTransaction};
pub use sweeper::SweepReport;
pub use types::{
    ActorContext, ActorRole, CreditId, CreditModality, CreditStatus, DiscountScope,
    InstallmentId, InstallmentStatus, PartyRef, PaymentKind, PaymentPeriod,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
