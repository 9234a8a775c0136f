//! persistence seam. every engine operation runs inside one transaction:
//! rows are locked credit first, then installments, writes are staged and
//! become visible together on commit, and dropping an uncommitted
//! transaction discards them.

pub mod memory;

use chrono::NaiveDate;

use crate::errors::Result;
use crate::ledger::{CashLedgerEntry, Payment, Receipt};
use crate::state::{Credit, Installment};
use crate::types::{CreditId, InstallmentId};

pub use memory::{FailPoint, MemoryStore, MemoryTransaction};

/// a store that hands out transactions
pub trait CreditStore: Send + Sync {
    type Tx<'a>: StoreTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Tx<'_>>;
}

/// unit of work against the store
pub trait StoreTransaction {
    /// lock the credit row for the rest of the transaction
    fn lock_credit(&mut self, id: CreditId) -> Result<Credit>;

    /// lock an installment row; take the credit lock first
    fn lock_installment(&mut self, id: InstallmentId) -> Result<Installment>;

    fn credit(&self, id: CreditId) -> Result<Credit>;

    fn installment(&self, id: InstallmentId) -> Result<Installment>;

    /// ordered by sequence
    fn installments_for_credit(&self, credit_id: CreditId) -> Result<Vec<Installment>>;

    /// ordered by payment date, then record time
    fn payments_for_installment(&self, installment_id: InstallmentId) -> Result<Vec<Payment>>;

    /// ordered by payment date, then issue time
    fn receipts_for_credit(&self, credit_id: CreditId) -> Result<Vec<Receipt>>;

    fn cash_entries_for_credit(&self, credit_id: CreditId) -> Result<Vec<CashLedgerEntry>>;

    /// open or overdue installments of scheduled credits due before `today`
    fn overdue_candidates(&self, today: NaiveDate) -> Result<Vec<Installment>>;

    fn insert_credit(&mut self, credit: &Credit) -> Result<()>;

    fn insert_installment(&mut self, installment: &Installment) -> Result<()>;

    /// requires the credit lock
    fn update_credit(&mut self, credit: &Credit) -> Result<()>;

    /// requires the installment lock
    fn update_installment(&mut self, installment: &Installment) -> Result<()>;

    fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    fn insert_receipt(&mut self, receipt: &Receipt) -> Result<()>;

    fn insert_cash_entry(&mut self, entry: &CashLedgerEntry) -> Result<()>;

    /// removes the installment with its receipts and cash entries;
    /// requires the installment lock
    fn delete_installment(&mut self, id: InstallmentId) -> Result<()>;

    fn commit(self) -> Result<()>;
}
