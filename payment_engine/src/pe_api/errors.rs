use thiserror::Error;

use crate::{
    db_types::{PaymentId, PaymentStatus, SettlementReference, ValidationError},
    traits::LedgerError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentFlowError {
    #[error("Invalid payment. {0}")]
    Validation(#[from] ValidationError),
    #[error("Payment {0} does not exist")]
    NotFound(PaymentId),
    #[error("No payment is linked to settlement reference {0}")]
    UnknownReference(SettlementReference),
    #[error("The payment does not belong to this merchant")]
    Unauthorized,
    #[error("Invalid merchant credentials")]
    AuthenticationFailed,
    #[error("Merchant is over its rate budget. Payment {0} was recorded but not processed")]
    RateLimited(PaymentId),
    #[error("Payment {id} cannot move from {from} to {to}")]
    InvalidTransition { id: PaymentId, from: PaymentStatus, to: PaymentStatus },
    #[error("Payment {id} was recorded, but could not be processed. {reason}")]
    Incomplete { id: PaymentId, reason: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for PaymentFlowError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Validation(e) => Self::Validation(e),
            LedgerError::NotFound(id) => Self::NotFound(id),
            LedgerError::UnknownReference(r) => Self::UnknownReference(r),
            LedgerError::StorageError(s) => Self::Internal(s),
            e @ LedgerError::StatusChanged { .. } => Self::Internal(e.to_string()),
        }
    }
}
