use rust_decimal::Decimal;
use thiserror::Error;

use crate::decimal::Money;
use crate::types::{CreditId, CreditStatus, InstallmentId};

/// broad class of a failure, used by the boundary layer to pick a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// malformed input, rejected before any lock is taken
    Validation,
    NotFound,
    /// rejected after debt recomputation, before any mutation
    StateConflict,
    Authorization,
    /// store or lock failure
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum CreditError {
    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount { amount: Money },

    #[error("invalid discount percentage: {percentage}")]
    InvalidDiscount { percentage: Decimal },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("invalid schedule: {message}")]
    InvalidSchedule { message: String },

    #[error("credit not found: {id}")]
    CreditNotFound { id: CreditId },

    #[error("installment not found: {id}")]
    InstallmentNotFound { id: InstallmentId },

    #[error("credit {id} is refinanced and no longer accepts payments")]
    CreditRefinanced { id: CreditId },

    #[error("credit {id} is cancelled and no longer accepts payments")]
    CreditCancelled { id: CreditId },

    #[error("credit {id} is already {status:?}")]
    CreditClosed { id: CreditId, status: CreditStatus },

    #[error("installment {id} is already paid")]
    InstallmentAlreadyPaid { id: InstallmentId },

    #[error("installment {id} has recorded payments and cannot be deleted")]
    InstallmentHasPayments { id: InstallmentId },

    #[error("credit {id} is not a free credit")]
    NotFreeCredit { id: CreditId },

    #[error("installment {id} is the only row of a free credit and cannot be deleted")]
    FreeCreditAnchor { id: InstallmentId },

    #[error("payment of {amount} exceeds installment debt {debt}")]
    InstallmentOverpayment { amount: Money, debt: Money },

    #[error("payment of {amount} exceeds free credit debt {debt}")]
    FreeCreditOverpayment { amount: Money, debt: Money },

    #[error("free credit reached cycle {cycle} of {max_cycles}: only full liquidation is accepted")]
    FreeCreditCycleCap { cycle: u8, max_cycles: u8 },

    #[error("discount scope not authorized for this actor")]
    DiscountNotAuthorized,

    #[error("discount requested on free credit without pending mora")]
    DiscountWithoutPenalty,

    #[error("timed out waiting for lock on {resource}")]
    LockTimeout { resource: String },

    #[error("store error: {message}")]
    Storage { message: String },

    #[error("calculation error: {message}")]
    CalculationError { message: String },
}

impl CreditError {
    /// stable code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            CreditError::InvalidPaymentAmount { .. } => "MONTO_INVALIDO",
            CreditError::InvalidDiscount { .. } => "DESCUENTO_INVALIDO",
            CreditError::MissingField { .. } => "CAMPO_REQUERIDO",
            CreditError::InvalidConfiguration { .. } => "CONFIGURACION_INVALIDA",
            CreditError::InvalidSchedule { .. } => "CRONOGRAMA_INVALIDO",
            CreditError::CreditNotFound { .. } => "CREDITO_NO_ENCONTRADO",
            CreditError::InstallmentNotFound { .. } => "CUOTA_NO_ENCONTRADA",
            CreditError::CreditRefinanced { .. } => "CREDITO_REFINANCIADO_NO_PAGO",
            CreditError::CreditCancelled { .. } => "CREDITO_CANCELADO_NO_PAGO",
            CreditError::CreditClosed { .. } => "CREDITO_CERRADO",
            CreditError::InstallmentAlreadyPaid { .. } => "CUOTA_YA_PAGADA",
            CreditError::InstallmentHasPayments { .. } => "CUOTA_CON_PAGOS",
            CreditError::NotFreeCredit { .. } => "CREDITO_NO_ES_LIBRE",
            CreditError::FreeCreditAnchor { .. } => "LIBRE_CUOTA_UNICA",
            CreditError::InstallmentOverpayment { .. } => "CUOTA_PAGO_EXCEDE_DEUDA",
            CreditError::FreeCreditOverpayment { .. } => "LIBRE_PAGO_EXCEDE_DEUDA",
            CreditError::FreeCreditCycleCap { .. } => "LIBRE_TOPE_3_CICLOS",
            CreditError::DiscountNotAuthorized => "DESCUENTO_NO_AUTORIZADO",
            CreditError::DiscountWithoutPenalty => "LIBRE_DESCUENTO_SIN_MORA",
            CreditError::LockTimeout { .. } => "BLOQUEO_TIMEOUT",
            CreditError::Storage { .. } => "ALMACEN_NO_DISPONIBLE",
            CreditError::CalculationError { .. } => "CALCULO_INVALIDO",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CreditError::InvalidPaymentAmount { .. }
            | CreditError::InvalidDiscount { .. }
            | CreditError::MissingField { .. }
            | CreditError::InvalidConfiguration { .. }
            | CreditError::InvalidSchedule { .. } => ErrorKind::Validation,
            CreditError::CreditNotFound { .. } | CreditError::InstallmentNotFound { .. } => {
                ErrorKind::NotFound
            }
            CreditError::CreditRefinanced { .. }
            | CreditError::CreditCancelled { .. }
            | CreditError::CreditClosed { .. }
            | CreditError::InstallmentAlreadyPaid { .. }
            | CreditError::InstallmentHasPayments { .. }
            | CreditError::NotFreeCredit { .. }
            | CreditError::FreeCreditAnchor { .. }
            | CreditError::InstallmentOverpayment { .. }
            | CreditError::FreeCreditOverpayment { .. }
            | CreditError::FreeCreditCycleCap { .. } => ErrorKind::StateConflict,
            CreditError::DiscountNotAuthorized | CreditError::DiscountWithoutPenalty => {
                ErrorKind::Authorization
            }
            CreditError::LockTimeout { .. }
            | CreditError::Storage { .. }
            | CreditError::CalculationError { .. } => ErrorKind::Infrastructure,
        }
    }
}

pub type Result<T> = std::result::Result<T, CreditError>;
