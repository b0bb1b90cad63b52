use thiserror::Error;

use crate::traits::data_objects::{SettlementAccepted, SettlementRequest};

/// Reasons a charge could not be handed over to the settlement processor.
///
/// Where the processor supplied an explanation, it is retained so that it can be stored against the payment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("Could not reach the settlement processor. {0}")]
    Transport(String),
    #[error("The settlement processor did not respond in time")]
    Timeout,
    #[error("The settlement processor replied with status {0}")]
    UnexpectedStatus(u16),
    #[error("The settlement processor sent a malformed response. {0}")]
    MalformedResponse(String),
    #[error("The settlement processor declined the charge. {message}")]
    Declined { message: String },
    #[error("The settlement processor sent an invalid reference '{reference}'. {message}")]
    InvalidReference { reference: String, message: String },
}

impl SettlementError {
    /// The message supplied by the settlement processor, if it got far enough to send one.
    pub fn processor_message(&self) -> &str {
        match self {
            SettlementError::Declined { message } | SettlementError::InvalidReference { message, .. } => message,
            _ => "",
        }
    }
}

/// Forwards charges to the settlement processor.
#[allow(async_fn_in_trait)]
pub trait SettlementRelay: Clone {
    async fn relay_payment(&self, request: SettlementRequest) -> Result<SettlementAccepted, SettlementError>;
}
