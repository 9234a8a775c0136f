use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::BusinessClock;
use crate::config::EngineConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::events::{CreditStatusListener, Event, EventStore, ListenerRegistry};
use crate::facilities::{
    CreditView, FreeCreditPlanner, InstallmentDebt, InstallmentPlanner, PaymentPlan,
};
use crate::interest::{FreeCreditCalculator, FreeCreditSummary, PenaltySimulator};
use crate::ledger::{CashLedgerEntry, Payment, Receipt, ReceiptBreakdown};
use crate::payments::{PaymentAllocator, PaymentRequest, ScheduleGenerator};
use crate::state::{Credit, Installment};
use crate::status::derive_credit_status;
use crate::store::{CreditStore, StoreTransaction};
use crate::types::{
    ActorContext, CreditId, CreditModality, CreditStatus, InstallmentId, InstallmentStatus,
    PartyRef, PaymentKind, PaymentPeriod,
};

/// request to issue a new credit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditApplication {
    pub client: PartyRef,
    pub collector: PartyRef,
    pub modality: CreditModality,
    pub period: PaymentPeriod,
    pub principal: Money,
    /// as stored: values above 1 are percentages
    pub interest_rate: Decimal,
    /// ignored for free credit
    pub installment_count: u32,
    pub requested_on: NaiveDate,
    pub disbursed_on: NaiveDate,
    /// first due date, or end of the first cycle for free credit
    pub commitment_date: NaiveDate,
}

impl CreditApplication {
    pub fn validate(&self) -> Result<()> {
        if !self.principal.is_positive() {
            return Err(CreditError::InvalidPaymentAmount {
                amount: self.principal,
            });
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(CreditError::InvalidSchedule {
                message: format!("interest rate must not be negative: {}", self.interest_rate),
            });
        }
        if self.requested_on > self.disbursed_on || self.disbursed_on > self.commitment_date {
            return Err(CreditError::InvalidSchedule {
                message: "expected requested <= disbursed <= commitment date".to_string(),
            });
        }
        if !self.modality.is_free() && self.installment_count == 0 {
            return Err(CreditError::InvalidSchedule {
                message: "at least one installment is required".to_string(),
            });
        }
        Ok(())
    }
}

/// credit as written at issuance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedCredit {
    pub credit: Credit,
    pub installments: Vec<Installment>,
}

/// result of an accepted payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub receipt: Receipt,
    pub kind: PaymentKind,
    pub installment_status: InstallmentStatus,
    pub credit_status: CreditStatus,
}

/// orchestrates debt computation and payment application over a store
pub struct LoanEngine<S: CreditStore> {
    pub(crate) store: S,
    pub(crate) clock: BusinessClock,
    pub(crate) config: EngineConfig,
    pub(crate) simulator: PenaltySimulator,
    pub(crate) calculator: FreeCreditCalculator,
    pub(crate) allocator: PaymentAllocator,
    listeners: ListenerRegistry,
    events: Mutex<EventStore>,
}

impl<S: CreditStore> LoanEngine<S> {
    pub fn new(store: S, clock: BusinessClock, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            simulator: PenaltySimulator::new(config.penalty.clone()),
            calculator: FreeCreditCalculator::new(config.free_credit.clone()),
            allocator: PaymentAllocator::new(config.settlement.tolerance),
            config,
            listeners: ListenerRegistry::new(),
            events: Mutex::new(EventStore::new()),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &BusinessClock {
        &self.clock
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// listeners run after commit, in registration order
    pub fn register_listener(&mut self, listener: Arc<dyn CreditStatusListener>) {
        tracing::debug!(listener = listener.name(), "listener registered");
        self.listeners.register(listener);
    }

    /// committed events not yet taken
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().take_events()
    }

    pub(crate) fn publish(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        self.listeners.publish(&events);
        self.events.lock().extend(events);
    }

    pub fn issue_credit(&self, application: CreditApplication) -> Result<IssuedCredit> {
        application.validate()?;
        let now = self.clock.now();
        let rate = Rate::from_stored(application.interest_rate);

        let rows = ScheduleGenerator::new(application.modality, application.period).generate(
            application.principal,
            rate,
            application.installment_count,
            application.commitment_date,
        )?;

        let credit_id = Uuid::new_v4();
        let installments: Vec<Installment> = rows
            .iter()
            .map(|row| Installment {
                id: Uuid::new_v4(),
                credit_id,
                sequence: row.sequence,
                due_date: row.due_date,
                scheduled_amount: row.amount,
                discount: Money::ZERO,
                principal_paid: Money::ZERO,
                pending_penalty: Money::ZERO,
                status: InstallmentStatus::Pending,
                updated_at: now,
            })
            .collect();

        let outstanding_balance = if application.modality.is_free() {
            application.principal
        } else {
            installments.iter().map(|i| i.scheduled_amount).sum()
        };

        let credit = Credit {
            id: credit_id,
            client: application.client,
            collector: application.collector,
            modality: application.modality,
            period: application.period,
            interest_rate: rate,
            installment_count: installments.len() as u32,
            principal: application.principal,
            outstanding_balance,
            interest_collected: Money::ZERO,
            penalty_collected: Money::ZERO,
            status: CreditStatus::Pending,
            requested_on: application.requested_on,
            disbursed_on: application.disbursed_on,
            commitment_date: application.commitment_date,
            updated_at: now,
        };

        let mut tx = self.store.begin()?;
        tx.insert_credit(&credit)?;
        for installment in &installments {
            tx.insert_installment(installment)?;
        }
        tx.commit()?;

        tracing::info!(
            credit_id = %credit.id,
            modality = ?credit.modality,
            principal = %credit.principal,
            installments = credit.installment_count,
            "credit issued"
        );
        self.publish(vec![Event::CreditIssued {
            credit_id: credit.id,
            modality: credit.modality,
            principal: credit.principal,
            installments: credit.installment_count,
            timestamp: now,
        }]);

        Ok(IssuedCredit {
            credit,
            installments,
        })
    }

    /// settle the whole debt of the installment; on free credit, of the credit
    pub fn pay_full(&self, mut request: PaymentRequest) -> Result<PaymentOutcome> {
        request.amount = None;
        self.execute_payment(request)
    }

    pub fn pay_partial(&self, request: PaymentRequest) -> Result<PaymentOutcome> {
        if request.amount.is_none() {
            return Err(CreditError::MissingField { field: "amount" });
        }
        self.execute_payment(request)
    }

    fn execute_payment(&self, request: PaymentRequest) -> Result<PaymentOutcome> {
        let result = self.apply_payment(&request);
        if let Err(err) = &result {
            tracing::warn!(
                installment_id = %request.installment_id,
                actor_id = %request.actor.actor_id,
                code = err.code(),
                error = %err,
                "payment rejected"
            );
        }
        result
    }

    fn apply_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome> {
        request.validate()?;
        let today = self.clock.today();
        let now = self.clock.now();

        let mut tx = self.store.begin()?;
        let target = tx.installment(request.installment_id)?;
        let credit = tx.lock_credit(target.credit_id)?;
        let installment = tx.lock_installment(target.id)?;
        credit.ensure_accepts_payment()?;

        let plan = if credit.is_free() {
            let receipts = tx.receipts_for_credit(credit.id)?;
            FreeCreditPlanner::new(&self.calculator, &self.allocator).plan(
                &credit,
                &installment,
                &receipts,
                request,
                today,
                now,
            )?
        } else {
            let payments = tx.payments_for_installment(installment.id)?;
            InstallmentPlanner::new(&self.simulator, &self.allocator).plan(
                &credit,
                &installment,
                &payments,
                request,
                today,
                now,
            )?
        };

        let (payment, receipt, cash) = self.records(&credit, request, &plan, today, now);

        tx.update_installment(&plan.installment_after)?;
        tx.update_credit(&plan.credit_after)?;
        tx.insert_payment(&payment)?;
        tx.insert_receipt(&receipt)?;
        tx.insert_cash_entry(&cash)?;

        let mut events = vec![Event::PaymentApplied {
            credit_id: credit.id,
            installment_id: installment.id,
            receipt_id: receipt.id,
            kind: plan.kind,
            amount: plan.allocation.collected,
            applied_to_penalty: plan.allocation.penalty_paid(),
            applied_to_interest: plan.allocation.interest_paid(),
            applied_to_principal: plan.allocation.principal_paid(),
            discount_granted: plan.allocation.discount_total(),
            timestamp: now,
        }];
        if installment.status != plan.installment_after.status {
            events.push(Event::InstallmentStatusChanged {
                installment_id: installment.id,
                credit_id: credit.id,
                old_status: installment.status,
                new_status: plan.installment_after.status,
                timestamp: now,
            });
        }

        let mut credit_after = plan.credit_after.clone();
        let previous = self.refresh_credit_status(&tx, &mut credit_after, today, now, &mut events)?;
        if previous.is_some() {
            tx.update_credit(&credit_after)?;
        }
        if credit_after.status == CreditStatus::Paid && previous.is_some() {
            events.push(Event::CreditLiquidated {
                credit_id: credit.id,
                amount: plan.allocation.collected,
                timestamp: now,
            });
        }

        tx.commit()?;

        tracing::info!(
            credit_id = %credit.id,
            installment_id = %installment.id,
            receipt_id = %receipt.id,
            kind = ?plan.kind,
            amount = %plan.allocation.collected,
            penalty = %plan.allocation.penalty_paid(),
            interest = %plan.allocation.interest_paid(),
            principal = %plan.allocation.principal_paid(),
            discount = %plan.allocation.discount_total(),
            credit_status = ?credit_after.status,
            "payment applied"
        );
        self.publish(events);

        Ok(PaymentOutcome {
            kind: plan.kind,
            installment_status: plan.installment_after.status,
            credit_status: credit_after.status,
            payment,
            receipt,
        })
    }

    fn records(
        &self,
        credit: &Credit,
        request: &PaymentRequest,
        plan: &PaymentPlan,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> (Payment, Receipt, CashLedgerEntry) {
        let allocation = &plan.allocation;
        let installment = &plan.installment_before;

        let payment = Payment {
            id: Uuid::new_v4(),
            installment_id: installment.id,
            credit_id: credit.id,
            amount: allocation.collected,
            paid_on: today,
            recorded_at: now,
            payment_method_id: request.payment_method_id,
            note: request.note.clone(),
            actor_id: request.actor.actor_id,
            penalty_waived: allocation.penalty_waived(),
            principal_waived: allocation.principal_waived(),
            cycle: plan.cycle,
        };

        let receipt = Receipt {
            id: Uuid::new_v4(),
            credit_id: credit.id,
            installment_id: installment.id,
            payment_id: payment.id,
            installment_sequence: installment.sequence,
            kind: plan.kind,
            client_name: credit.client.name.clone(),
            collector_name: credit.collector.name.clone(),
            breakdown: ReceiptBreakdown {
                scheduled_amount: installment.scheduled_amount,
                discount: allocation.principal_waived(),
                penalty_discount: allocation.penalty_waived(),
                interest_discount: allocation.interest_waived(),
                penalty_before: plan.penalty_before,
                penalty_collected: allocation.penalty_paid(),
                interest_collected: allocation.interest_paid(),
                principal_collected: allocation.principal_paid(),
                total_collected: allocation.collected,
                installment_balance_before: plan.installment_balance_before(),
                installment_balance_after: plan.installment_balance_after(),
                credit_balance_before: plan.credit_balance_before,
                credit_balance_after: plan.credit_balance_after(),
            },
            cycle: plan.cycle,
            cycle_allocations: allocation.cycle_allocations(),
            payment_method_id: request.payment_method_id,
            paid_on: today,
            issued_at: now,
            actor_id: request.actor.actor_id,
            note: request.note.clone(),
        };

        let concept = match plan.kind {
            PaymentKind::Liquidation => format!("free credit liquidation {}", credit.id),
            _ => format!("installment {} of credit {}", installment.sequence, credit.id),
        };
        let cash = CashLedgerEntry {
            id: Uuid::new_v4(),
            receipt_id: receipt.id,
            credit_id: credit.id,
            installment_id: installment.id,
            amount: allocation.collected,
            occurred_on: today,
            recorded_at: now,
            payment_method_id: request.payment_method_id,
            actor_id: request.actor.actor_id,
            concept,
        };

        (payment, receipt, cash)
    }

    /// derive and set the credit status; returns the previous one if it changed
    pub(crate) fn refresh_credit_status<T: StoreTransaction>(
        &self,
        tx: &T,
        credit: &mut Credit,
        today: NaiveDate,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Result<Option<CreditStatus>> {
        let installments = tx.installments_for_credit(credit.id)?;
        let statement = if credit.is_free() {
            let receipts = tx.receipts_for_credit(credit.id)?;
            Some(self.calculator.statement(credit, &receipts, today)?)
        } else {
            None
        };

        let status = derive_credit_status(credit, &installments, statement.as_ref(), today);
        let previous = credit.update_status(status, now);
        if let Some(old_status) = previous {
            events.push(Event::CreditStatusChanged {
                credit_id: credit.id,
                old_status,
                new_status: status,
                timestamp: now,
            });
        }
        Ok(previous)
    }

    /// recompute and store the installment's pending penalty as of today
    pub fn recompute_penalty(&self, installment_id: InstallmentId) -> Result<Money> {
        let today = self.clock.today();
        let now = self.clock.now();
        let mut events = Vec::new();

        let mut tx = self.store.begin()?;
        let target = tx.installment(installment_id)?;
        let mut credit = tx.lock_credit(target.credit_id)?;
        let installment = tx.lock_installment(installment_id)?;

        let pending = self.refresh_penalty(&mut tx, &credit, installment, today, now, &mut events)?;
        if self
            .refresh_credit_status(&tx, &mut credit, today, now, &mut events)?
            .is_some()
        {
            tx.update_credit(&credit)?;
        }
        tx.commit()?;

        tracing::debug!(%installment_id, pending_penalty = %pending, as_of = %today, "penalty recomputed");
        self.publish(events);
        Ok(pending)
    }

    /// recompute every installment of the credit; returns total pending penalty
    pub fn recompute_penalty_for_credit(&self, credit_id: CreditId) -> Result<Money> {
        let today = self.clock.today();
        let now = self.clock.now();
        let mut events = Vec::new();

        let mut tx = self.store.begin()?;
        let mut credit = tx.lock_credit(credit_id)?;
        let mut total = Money::ZERO;
        for listed in tx.installments_for_credit(credit_id)? {
            let installment = tx.lock_installment(listed.id)?;
            total += self.refresh_penalty(&mut tx, &credit, installment, today, now, &mut events)?;
        }
        if self
            .refresh_credit_status(&tx, &mut credit, today, now, &mut events)?
            .is_some()
        {
            tx.update_credit(&credit)?;
        }
        tx.commit()?;

        tracing::debug!(%credit_id, pending_penalty = %total, as_of = %today, "credit penalties recomputed");
        self.publish(events);
        Ok(total)
    }

    pub(crate) fn refresh_penalty<T: StoreTransaction>(
        &self,
        tx: &mut T,
        credit: &Credit,
        mut installment: Installment,
        today: NaiveDate,
        now: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) -> Result<Money> {
        let pending = if credit.is_free() {
            let receipts = tx.receipts_for_credit(credit.id)?;
            self.calculator
                .statement(credit, &receipts, today)?
                .total_pending_penalty()
        } else {
            let payments = tx.payments_for_installment(installment.id)?;
            self.simulator
                .simulate(&installment, &payments, today)
                .pending_penalty
        };

        if pending != installment.pending_penalty {
            events.push(Event::PenaltyRecomputed {
                installment_id: installment.id,
                credit_id: credit.id,
                previous: installment.pending_penalty,
                pending_penalty: pending,
                as_of: today,
            });
            installment.pending_penalty = pending;
            installment.updated_at = now;
            tx.update_installment(&installment)?;
        }
        Ok(pending)
    }

    /// what the installment owes today; read only
    pub fn installment_debt(&self, installment_id: InstallmentId) -> Result<InstallmentDebt> {
        let today = self.clock.today();
        let tx = self.store.begin()?;
        let installment = tx.installment(installment_id)?;
        let credit = tx.credit(installment.credit_id)?;

        if credit.is_free() {
            let planner = FreeCreditPlanner::new(&self.calculator, &self.allocator);
            let receipts = tx.receipts_for_credit(credit.id)?;
            let statement = planner.statement(&credit, &receipts, today)?;
            Ok(planner.debt(&installment, &statement))
        } else {
            let payments = tx.payments_for_installment(installment.id)?;
            Ok(InstallmentPlanner::new(&self.simulator, &self.allocator).debt(
                &installment,
                &payments,
                today,
            ))
        }
    }

    /// cycle-by-cycle view of a free credit; read only
    pub fn free_credit_summary(
        &self,
        credit_id: CreditId,
        as_of: Option<NaiveDate>,
    ) -> Result<FreeCreditSummary> {
        let as_of = as_of.unwrap_or_else(|| self.clock.today());
        let tx = self.store.begin()?;
        let credit = tx.credit(credit_id)?;
        if !credit.is_free() {
            return Err(CreditError::NotFreeCredit { id: credit_id });
        }
        let receipts = tx.receipts_for_credit(credit_id)?;
        let statement = self.calculator.statement(&credit, &receipts, as_of)?;
        Ok(FreeCreditSummary::from(&statement))
    }

    pub fn credit_view(&self, credit_id: CreditId) -> Result<CreditView> {
        let tx = self.store.begin()?;
        let credit = tx.credit(credit_id)?;
        let installments = tx.installments_for_credit(credit_id)?;
        Ok(CreditView::new(&credit, &installments))
    }

    pub fn receipts_for_credit(&self, credit_id: CreditId) -> Result<Vec<Receipt>> {
        let tx = self.store.begin()?;
        tx.credit(credit_id)?;
        tx.receipts_for_credit(credit_id)
    }

    pub fn cash_entries_for_credit(&self, credit_id: CreditId) -> Result<Vec<CashLedgerEntry>> {
        let tx = self.store.begin()?;
        tx.credit(credit_id)?;
        tx.cash_entries_for_credit(credit_id)
    }

    /// remove an installment that has no payments from an open scheduled credit
    pub fn delete_installment(&self, installment_id: InstallmentId, actor: ActorContext) -> Result<()> {
        let today = self.clock.today();
        let now = self.clock.now();

        let mut tx = self.store.begin()?;
        let target = tx.installment(installment_id)?;
        let mut credit = tx.lock_credit(target.credit_id)?;
        let installment = tx.lock_installment(installment_id)?;
        credit.ensure_accepts_payment()?;
        if installment.is_free_anchor() {
            return Err(CreditError::FreeCreditAnchor { id: installment_id });
        }
        if !tx.payments_for_installment(installment_id)?.is_empty() {
            return Err(CreditError::InstallmentHasPayments { id: installment_id });
        }

        tx.delete_installment(installment_id)?;
        credit.installment_count = credit.installment_count.saturating_sub(1);
        credit.reduce_balance(installment.remaining_principal());
        credit.updated_at = now;

        let mut events = vec![Event::InstallmentDeleted {
            installment_id,
            credit_id: credit.id,
            timestamp: now,
        }];
        self.refresh_credit_status(&tx, &mut credit, today, now, &mut events)?;
        tx.update_credit(&credit)?;
        tx.commit()?;

        tracing::info!(
            %installment_id,
            credit_id = %credit.id,
            actor_id = %actor.actor_id,
            "installment deleted"
        );
        self.publish(events);
        Ok(())
    }
}
