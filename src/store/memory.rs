use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use parking_lot::{Condvar, Mutex, RwLock};

use crate::config::EngineConfig;
use crate::errors::{CreditError, Result};
use crate::ledger::{CashLedgerEntry, Payment, Receipt};
use crate::state::{Credit, Installment};
use crate::types::{CreditId, InstallmentId, InstallmentStatus};

use super::{CreditStore, StoreTransaction};

/// write that can be made to fail once, for rollback tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    UpdateInstallment,
    InsertPayment,
    InsertReceipt,
    InsertCashEntry,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Credit(CreditId),
    Installment(InstallmentId),
}

impl RowKey {
    fn describe(&self) -> String {
        match self {
            RowKey::Credit(id) => format!("credit {id}"),
            RowKey::Installment(id) => format!("installment {id}"),
        }
    }
}

#[derive(Default)]
struct Tables {
    credits: HashMap<CreditId, Credit>,
    installments: HashMap<InstallmentId, Installment>,
    payments: Vec<Payment>,
    receipts: Vec<Receipt>,
    cash_entries: Vec<CashLedgerEntry>,
}

/// exclusive row locks held until the owning transaction ends
#[derive(Default)]
struct LockTable {
    held: Mutex<HashSet<RowKey>>,
    released: Condvar,
}

impl LockTable {
    fn acquire(&self, key: RowKey, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        while held.contains(&key) {
            if self.released.wait_until(&mut held, deadline).timed_out() && held.contains(&key) {
                tracing::warn!(resource = %key.describe(), "lock wait timed out");
                return Err(CreditError::LockTimeout {
                    resource: key.describe(),
                });
            }
        }
        held.insert(key);
        Ok(())
    }

    fn release(&self, keys: &[RowKey]) {
        if keys.is_empty() {
            return;
        }
        let mut held = self.held.lock();
        for key in keys {
            held.remove(key);
        }
        self.released.notify_all();
    }

    fn len(&self) -> usize {
        self.held.lock().len()
    }
}

/// in-process store with row locks and all-or-nothing commits
pub struct MemoryStore {
    tables: RwLock<Tables>,
    locks: LockTable,
    lock_timeout: Duration,
    fail_point: Mutex<Option<FailPoint>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(5_000))
    }
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            locks: LockTable::default(),
            lock_timeout,
            fail_point: Mutex::new(None),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.lock_timeout())
    }

    /// the next write at this point fails with a storage error
    pub fn fail_once(&self, point: FailPoint) {
        *self.fail_point.lock() = Some(point);
    }

    // committed state, outside any transaction

    pub fn committed_credit(&self, id: CreditId) -> Option<Credit> {
        self.tables.read().credits.get(&id).cloned()
    }

    pub fn committed_installment(&self, id: InstallmentId) -> Option<Installment> {
        self.tables.read().installments.get(&id).cloned()
    }

    pub fn payment_count(&self) -> usize {
        self.tables.read().payments.len()
    }

    pub fn receipt_count(&self) -> usize {
        self.tables.read().receipts.len()
    }

    pub fn cash_entry_count(&self) -> usize {
        self.tables.read().cash_entries.len()
    }

    pub fn held_locks(&self) -> usize {
        self.locks.len()
    }

    fn trip(&self, point: FailPoint) -> Result<()> {
        let mut armed = self.fail_point.lock();
        if *armed == Some(point) {
            *armed = None;
            return Err(CreditError::Storage {
                message: format!("injected failure at {point:?}"),
            });
        }
        Ok(())
    }
}

impl CreditStore for MemoryStore {
    type Tx<'a> = MemoryTransaction<'a>;

    fn begin(&self) -> Result<MemoryTransaction<'_>> {
        Ok(MemoryTransaction {
            store: self,
            held: Vec::new(),
            staged: Staged::default(),
            committed: false,
        })
    }
}

#[derive(Default)]
struct Staged {
    credits: HashMap<CreditId, Credit>,
    installments: HashMap<InstallmentId, Installment>,
    deleted: HashSet<InstallmentId>,
    payments: Vec<Payment>,
    receipts: Vec<Receipt>,
    cash_entries: Vec<CashLedgerEntry>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.credits.is_empty()
            && self.installments.is_empty()
            && self.deleted.is_empty()
            && self.payments.is_empty()
            && self.receipts.is_empty()
            && self.cash_entries.is_empty()
    }
}

/// transaction over a [`MemoryStore`]; reads see its own staged writes
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    held: Vec<RowKey>,
    staged: Staged,
    committed: bool,
}

impl MemoryTransaction<'_> {
    fn lock(&mut self, key: RowKey) -> Result<()> {
        if self.held.contains(&key) {
            return Ok(());
        }
        self.store.locks.acquire(key, self.store.lock_timeout)?;
        self.held.push(key);
        Ok(())
    }

    fn ensure_locked(&self, key: RowKey) -> Result<()> {
        if self.held.contains(&key) {
            Ok(())
        } else {
            Err(CreditError::Storage {
                message: format!("{} is not locked by this transaction", key.describe()),
            })
        }
    }

    /// committed installments overlaid with staged changes
    fn merged_installments(&self, keep: impl Fn(&Installment) -> bool) -> Vec<Installment> {
        let tables = self.store.tables.read();
        let mut merged: HashMap<InstallmentId, Installment> = tables
            .installments
            .values()
            .filter(|i| keep(i))
            .map(|i| (i.id, i.clone()))
            .collect();
        drop(tables);

        for (id, staged) in &self.staged.installments {
            if keep(staged) {
                merged.insert(*id, staged.clone());
            } else {
                merged.remove(id);
            }
        }
        for id in &self.staged.deleted {
            merged.remove(id);
        }
        merged.into_values().collect()
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn lock_credit(&mut self, id: CreditId) -> Result<Credit> {
        self.lock(RowKey::Credit(id))?;
        self.credit(id)
    }

    fn lock_installment(&mut self, id: InstallmentId) -> Result<Installment> {
        self.lock(RowKey::Installment(id))?;
        self.installment(id)
    }

    fn credit(&self, id: CreditId) -> Result<Credit> {
        if let Some(credit) = self.staged.credits.get(&id) {
            return Ok(credit.clone());
        }
        self.store
            .tables
            .read()
            .credits
            .get(&id)
            .cloned()
            .ok_or(CreditError::CreditNotFound { id })
    }

    fn installment(&self, id: InstallmentId) -> Result<Installment> {
        if self.staged.deleted.contains(&id) {
            return Err(CreditError::InstallmentNotFound { id });
        }
        if let Some(installment) = self.staged.installments.get(&id) {
            return Ok(installment.clone());
        }
        self.store
            .tables
            .read()
            .installments
            .get(&id)
            .cloned()
            .ok_or(CreditError::InstallmentNotFound { id })
    }

    fn installments_for_credit(&self, credit_id: CreditId) -> Result<Vec<Installment>> {
        let mut installments = self.merged_installments(|i| i.credit_id == credit_id);
        installments.sort_by_key(|i| i.sequence);
        Ok(installments)
    }

    fn payments_for_installment(&self, installment_id: InstallmentId) -> Result<Vec<Payment>> {
        let tables = self.store.tables.read();
        let mut payments: Vec<Payment> = tables
            .payments
            .iter()
            .chain(self.staged.payments.iter())
            .filter(|p| p.installment_id == installment_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.paid_on, p.recorded_at));
        Ok(payments)
    }

    fn receipts_for_credit(&self, credit_id: CreditId) -> Result<Vec<Receipt>> {
        let tables = self.store.tables.read();
        let mut receipts: Vec<Receipt> = tables
            .receipts
            .iter()
            .chain(self.staged.receipts.iter())
            .filter(|r| r.credit_id == credit_id)
            .filter(|r| !self.staged.deleted.contains(&r.installment_id))
            .cloned()
            .collect();
        receipts.sort_by_key(|r| (r.paid_on, r.issued_at));
        Ok(receipts)
    }

    fn cash_entries_for_credit(&self, credit_id: CreditId) -> Result<Vec<CashLedgerEntry>> {
        let tables = self.store.tables.read();
        let mut entries: Vec<CashLedgerEntry> = tables
            .cash_entries
            .iter()
            .chain(self.staged.cash_entries.iter())
            .filter(|e| e.credit_id == credit_id)
            .filter(|e| !self.staged.deleted.contains(&e.installment_id))
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.occurred_on, e.recorded_at));
        Ok(entries)
    }

    fn overdue_candidates(&self, today: NaiveDate) -> Result<Vec<Installment>> {
        let mut candidates = self.merged_installments(|i| {
            !i.is_free_anchor() && i.due_date < today && i.status != InstallmentStatus::Paid
        });
        candidates.retain(|i| match self.credit(i.credit_id) {
            Ok(credit) => !credit.is_free() && !credit.status.is_terminal(),
            Err(_) => false,
        });
        candidates.sort_by_key(|i| (i.credit_id, i.sequence));
        Ok(candidates)
    }

    fn insert_credit(&mut self, credit: &Credit) -> Result<()> {
        if self.credit(credit.id).is_ok() {
            return Err(CreditError::Storage {
                message: format!("credit {} already exists", credit.id),
            });
        }
        self.lock(RowKey::Credit(credit.id))?;
        self.staged.credits.insert(credit.id, credit.clone());
        Ok(())
    }

    fn insert_installment(&mut self, installment: &Installment) -> Result<()> {
        self.credit(installment.credit_id)?;
        self.lock(RowKey::Installment(installment.id))?;
        self.staged
            .installments
            .insert(installment.id, installment.clone());
        Ok(())
    }

    fn update_credit(&mut self, credit: &Credit) -> Result<()> {
        self.ensure_locked(RowKey::Credit(credit.id))?;
        self.staged.credits.insert(credit.id, credit.clone());
        Ok(())
    }

    fn update_installment(&mut self, installment: &Installment) -> Result<()> {
        self.ensure_locked(RowKey::Installment(installment.id))?;
        self.store.trip(FailPoint::UpdateInstallment)?;
        self.staged
            .installments
            .insert(installment.id, installment.clone());
        Ok(())
    }

    fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.store.trip(FailPoint::InsertPayment)?;
        self.staged.payments.push(payment.clone());
        Ok(())
    }

    fn insert_receipt(&mut self, receipt: &Receipt) -> Result<()> {
        self.store.trip(FailPoint::InsertReceipt)?;
        self.staged.receipts.push(receipt.clone());
        Ok(())
    }

    fn insert_cash_entry(&mut self, entry: &CashLedgerEntry) -> Result<()> {
        self.store.trip(FailPoint::InsertCashEntry)?;
        self.staged.cash_entries.push(entry.clone());
        Ok(())
    }

    fn delete_installment(&mut self, id: InstallmentId) -> Result<()> {
        self.ensure_locked(RowKey::Installment(id))?;
        if !self.payments_for_installment(id)?.is_empty() {
            return Err(CreditError::InstallmentHasPayments { id });
        }
        self.staged.installments.remove(&id);
        self.staged.deleted.insert(id);
        Ok(())
    }

    fn commit(mut self) -> Result<()> {
        self.store.trip(FailPoint::Commit)?;

        let staged = std::mem::take(&mut self.staged);
        let mut tables = self.store.tables.write();
        tables.credits.extend(staged.credits);
        tables.installments.extend(staged.installments);
        for id in &staged.deleted {
            tables.installments.remove(id);
        }
        if !staged.deleted.is_empty() {
            tables.receipts.retain(|r| !staged.deleted.contains(&r.installment_id));
            tables
                .cash_entries
                .retain(|e| !staged.deleted.contains(&e.installment_id));
        }
        tables.payments.extend(staged.payments);
        tables.receipts.extend(staged.receipts);
        tables.cash_entries.extend(staged.cash_entries);
        drop(tables);

        self.committed = true;
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.staged.is_empty() {
            tracing::debug!(locks = self.held.len(), "transaction rolled back");
        }
        self.store.locks.release(&self.held);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::{Money, Rate};
    use crate::types::{CreditModality, CreditStatus, PartyRef, PaymentPeriod};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn credit() -> Credit {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Credit {
            id: Uuid::new_v4(),
            client: PartyRef::new(Uuid::new_v4(), "client"),
            collector: PartyRef::new(Uuid::new_v4(), "collector"),
            modality: CreditModality::Fixed,
            period: PaymentPeriod::Weekly,
            interest_rate: Rate::from_percentage(20),
            installment_count: 1,
            principal: Money::from_major(1_000),
            outstanding_balance: Money::from_major(1_000),
            interest_collected: Money::ZERO,
            penalty_collected: Money::ZERO,
            status: CreditStatus::Pending,
            requested_on: day,
            disbursed_on: day,
            commitment_date: day,
            updated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn installment(credit: &Credit) -> Installment {
        Installment {
            id: Uuid::new_v4(),
            credit_id: credit.id,
            sequence: 1,
            due_date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            scheduled_amount: Money::from_major(1_000),
            discount: Money::ZERO,
            principal_paid: Money::ZERO,
            pending_penalty: Money::ZERO,
            status: InstallmentStatus::Pending,
            updated_at: credit.updated_at,
        }
    }

    fn seeded(store: &MemoryStore) -> (Credit, Installment) {
        let credit = credit();
        let inst = installment(&credit);
        let mut tx = store.begin().unwrap();
        tx.insert_credit(&credit).unwrap();
        tx.insert_installment(&inst).unwrap();
        tx.commit().unwrap();
        (credit, inst)
    }

    #[test]
    fn test_staged_writes_invisible_until_commit() {
        let store = MemoryStore::default();
        let (credit, _) = seeded(&store);

        let mut tx = store.begin().unwrap();
        let mut locked = tx.lock_credit(credit.id).unwrap();
        locked.outstanding_balance = Money::from_major(400);
        tx.update_credit(&locked).unwrap();

        assert_eq!(tx.credit(credit.id).unwrap().outstanding_balance, Money::from_major(400));
        assert_eq!(
            store.committed_credit(credit.id).unwrap().outstanding_balance,
            Money::from_major(1_000)
        );

        tx.commit().unwrap();
        assert_eq!(
            store.committed_credit(credit.id).unwrap().outstanding_balance,
            Money::from_major(400)
        );
        assert_eq!(store.held_locks(), 0);
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = MemoryStore::default();
        let (credit, inst) = seeded(&store);

        {
            let mut tx = store.begin().unwrap();
            tx.lock_credit(credit.id).unwrap();
            let mut locked = tx.lock_installment(inst.id).unwrap();
            locked.principal_paid = Money::from_major(10);
            tx.update_installment(&locked).unwrap();
        }

        assert_eq!(store.committed_installment(inst.id).unwrap().principal_paid, Money::ZERO);
        assert_eq!(store.held_locks(), 0);
    }

    #[test]
    fn test_update_requires_lock() {
        let store = MemoryStore::default();
        let (credit, _) = seeded(&store);

        let mut tx = store.begin().unwrap();
        let err = tx.update_credit(&credit).unwrap_err();
        assert_eq!(err.code(), "ALMACEN_NO_DISPONIBLE");
    }

    #[test]
    fn test_fail_point_fires_once() {
        let store = MemoryStore::default();
        let (_, _) = seeded(&store);
        store.fail_once(FailPoint::Commit);

        let tx = store.begin().unwrap();
        assert!(tx.commit().is_err());
        let tx = store.begin().unwrap();
        assert!(tx.commit().is_ok());
    }

    #[test]
    fn test_lock_wait_times_out() {
        let store = MemoryStore::new(Duration::from_millis(50));
        let (credit, _) = seeded(&store);

        let mut first = store.begin().unwrap();
        first.lock_credit(credit.id).unwrap();

        let mut second = store.begin().unwrap();
        let err = second.lock_credit(credit.id).unwrap_err();
        assert_eq!(err.code(), "BLOQUEO_TIMEOUT");
    }

    #[test]
    fn test_lock_serializes_writers() {
        let store = MemoryStore::new(Duration::from_secs(5));
        let (credit, _) = seeded(&store);
        let store = &store;

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(move || {
                    let mut tx = store.begin().unwrap();
                    let mut locked = tx.lock_credit(credit.id).unwrap();
                    std::thread::sleep(Duration::from_millis(5));
                    locked.reduce_balance(Money::from_major(100));
                    tx.update_credit(&locked).unwrap();
                    tx.commit().unwrap();
                });
            }
        });

        assert_eq!(
            store.committed_credit(credit.id).unwrap().outstanding_balance,
            Money::from_major(600)
        );
    }

    #[test]
    fn test_delete_refuses_paid_installment() {
        let store = MemoryStore::default();
        let (credit, inst) = seeded(&store);

        let mut tx = store.begin().unwrap();
        tx.lock_credit(credit.id).unwrap();
        tx.lock_installment(inst.id).unwrap();
        tx.insert_payment(&Payment {
            id: Uuid::new_v4(),
            installment_id: inst.id,
            credit_id: credit.id,
            amount: Money::from_major(10),
            paid_on: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            recorded_at: Utc::now(),
            payment_method_id: Uuid::new_v4(),
            note: None,
            actor_id: Uuid::new_v4(),
            penalty_waived: Money::ZERO,
            principal_waived: Money::ZERO,
            cycle: None,
        })
        .unwrap();

        let err = tx.delete_installment(inst.id).unwrap_err();
        assert_eq!(err.code(), "CUOTA_CON_PAGOS");
    }
}
