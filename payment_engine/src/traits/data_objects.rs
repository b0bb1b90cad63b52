use chrono::{DateTime, Utc};
use pg_common::{time::iso_millis, Amount};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Card, Payment, SettlementReference},
    traits::SettlementError,
};

/// The charge sent to the settlement processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub amount: Amount,
    pub currency: String,
    #[serde(with = "iso_millis")]
    pub purchase_time: DateTime<Utc>,
    pub validation_method: String,
    pub card: Card,
    /// The merchant's display name
    pub merchant: String,
}

impl SettlementRequest {
    pub fn for_payment(payment: &Payment, merchant_name: &str) -> Self {
        Self {
            amount: payment.amount,
            currency: payment.currency.clone(),
            purchase_time: payment.purchase_time,
            validation_method: payment.validation_method.clone(),
            card: payment.card.clone(),
            merchant: merchant_name.to_string(),
        }
    }
}

/// The settlement processor's reply, exactly as it appears on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettlementResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl SettlementResponse {
    /// Interprets the reply. A charge is only accepted if the processor flags it as successful *and* supplies a valid
    /// reference.
    pub fn into_outcome(self) -> Result<SettlementAccepted, SettlementError> {
        if !self.success {
            return Err(SettlementError::Declined { message: self.message });
        }
        match self.id.parse::<SettlementReference>() {
            Ok(reference) => Ok(SettlementAccepted { reference, message: self.message }),
            Err(_) => Err(SettlementError::InvalidReference { reference: self.id, message: self.message }),
        }
    }
}

/// A charge the settlement processor has taken on. The final outcome arrives later via callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementAccepted {
    pub reference: SettlementReference,
    pub message: String,
}
