/// serialization support for credits
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::state::{Credit, Installment};
use crate::types::{
    CreditId, CreditModality, CreditStatus, InstallmentId, InstallmentStatus, PaymentPeriod,
};

/// serializable view of a credit and its installments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditView {
    pub id: CreditId,
    pub client_name: String,
    pub collector_name: String,
    pub modality: CreditModality,
    pub period: PaymentPeriod,
    pub status: CreditStatus,
    pub interest_rate: Rate,
    pub principal: Money,
    pub outstanding_balance: Money,
    pub interest_collected: Money,
    pub penalty_collected: Money,
    pub disbursed_on: NaiveDate,
    pub commitment_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
    pub installments: Vec<InstallmentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentView {
    pub id: InstallmentId,
    pub sequence: u32,
    /// none for the free credit anchor
    pub due_date: Option<NaiveDate>,
    pub scheduled_amount: Money,
    pub principal_paid: Money,
    pub discount: Money,
    pub pending_penalty: Money,
    pub remaining_principal: Money,
    pub status: InstallmentStatus,
}

impl From<&Installment> for InstallmentView {
    fn from(installment: &Installment) -> Self {
        Self {
            id: installment.id,
            sequence: installment.sequence,
            due_date: (!installment.is_free_anchor()).then_some(installment.due_date),
            scheduled_amount: installment.scheduled_amount,
            principal_paid: installment.principal_paid,
            discount: installment.discount,
            pending_penalty: installment.pending_penalty,
            remaining_principal: installment.remaining_principal(),
            status: installment.status,
        }
    }
}

impl CreditView {
    pub fn new(credit: &Credit, installments: &[Installment]) -> Self {
        Self {
            id: credit.id,
            client_name: credit.client.name.clone(),
            collector_name: credit.collector.name.clone(),
            modality: credit.modality,
            period: credit.period,
            status: credit.status,
            interest_rate: credit.interest_rate,
            principal: credit.principal,
            outstanding_balance: credit.outstanding_balance,
            interest_collected: credit.interest_collected,
            penalty_collected: credit.penalty_collected,
            disbursed_on: credit.disbursed_on,
            commitment_date: credit.commitment_date,
            updated_at: credit.updated_at,
            installments: installments.iter().map(InstallmentView::from).collect(),
        }
    }

    /// penalty cached on the installments at their last recompute
    pub fn pending_penalty(&self) -> Money {
        self.installments.iter().map(|i| i.pending_penalty).sum()
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
