use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::decimal::Money;
use crate::types::{
    CreditId, CreditModality, CreditStatus, InstallmentId, InstallmentStatus, PaymentKind,
    ReceiptId,
};

/// all events that can be emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    CreditIssued {
        credit_id: CreditId,
        modality: CreditModality,
        principal: Money,
        installments: u32,
        timestamp: DateTime<Utc>,
    },
    CreditStatusChanged {
        credit_id: CreditId,
        old_status: CreditStatus,
        new_status: CreditStatus,
        timestamp: DateTime<Utc>,
    },
    CreditLiquidated {
        credit_id: CreditId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentApplied {
        credit_id: CreditId,
        installment_id: InstallmentId,
        receipt_id: ReceiptId,
        kind: PaymentKind,
        amount: Money,
        applied_to_penalty: Money,
        applied_to_interest: Money,
        applied_to_principal: Money,
        discount_granted: Money,
        timestamp: DateTime<Utc>,
    },

    // installment events
    InstallmentStatusChanged {
        installment_id: InstallmentId,
        credit_id: CreditId,
        old_status: InstallmentStatus,
        new_status: InstallmentStatus,
        timestamp: DateTime<Utc>,
    },
    InstallmentOverdue {
        installment_id: InstallmentId,
        credit_id: CreditId,
        due_date: NaiveDate,
        days_overdue: u32,
    },
    PenaltyRecomputed {
        installment_id: InstallmentId,
        credit_id: CreditId,
        previous: Money,
        pending_penalty: Money,
        as_of: NaiveDate,
    },
    InstallmentDeleted {
        installment_id: InstallmentId,
        credit_id: CreditId,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// credit the event belongs to
    pub fn credit_id(&self) -> CreditId {
        match self {
            Event::CreditIssued { credit_id, .. }
            | Event::CreditStatusChanged { credit_id, .. }
            | Event::CreditLiquidated { credit_id, .. }
            | Event::PaymentApplied { credit_id, .. }
            | Event::InstallmentStatusChanged { credit_id, .. }
            | Event::InstallmentOverdue { credit_id, .. }
            | Event::PenaltyRecomputed { credit_id, .. }
            | Event::InstallmentDeleted { credit_id, .. } => *credit_id,
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// subscriber notified after a transaction commits
///
/// credit aggregation (portfolio totals, collector dashboards) lives outside
/// this crate and listens here instead of being called from inside it.
pub trait CreditStatusListener: Send + Sync {
    fn name(&self) -> &str;

    fn on_event(&self, event: &Event);
}

/// registered post-commit listeners
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn CreditStatusListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn register(&mut self, listener: Arc<dyn CreditStatusListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// deliver committed events in order to every listener
    pub fn publish(&self, events: &[Event]) {
        for listener in &self.listeners {
            for event in events {
                tracing::debug!(
                    listener = listener.name(),
                    credit_id = %event.credit_id(),
                    "delivering event"
                );
                listener.on_event(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use uuid::Uuid;

    struct Recorder {
        seen: Mutex<Vec<Event>>,
    }

    impl CreditStatusListener for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn on_event(&self, event: &Event) {
            self.seen.lock().push(event.clone());
        }
    }

    #[test]
    fn test_event_store_take() {
        let mut store = EventStore::new();
        let credit_id = Uuid::new_v4();
        store.emit(Event::CreditLiquidated {
            credit_id,
            amount: Money::from_major(16_000),
            timestamp: Utc::now(),
        });

        assert_eq!(store.len(), 1);
        let events = store.take_events();
        assert_eq!(events[0].credit_id(), credit_id);
        assert!(store.is_empty());
    }

    #[test]
    fn test_registry_publishes_to_listeners() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let mut registry = ListenerRegistry::new();
        registry.register(recorder.clone());

        let event = Event::CreditStatusChanged {
            credit_id: Uuid::new_v4(),
            old_status: CreditStatus::Pending,
            new_status: CreditStatus::Paid,
            timestamp: Utc::now(),
        };
        registry.publish(std::slice::from_ref(&event));

        assert_eq!(recorder.seen.lock().as_slice(), &[event]);
    }
}
