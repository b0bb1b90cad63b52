use chrono::{DateTime, Utc};
use pg_common::{time::iso_millis, Amount};
use serde::{Deserialize, Serialize};

use crate::db_types::{Card, MerchantId, NewPayment, PaymentId, PaymentStatus, SettlementReference};

/// A merchant's request to charge a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPaymentRequest {
    pub amount: Amount,
    pub currency: String,
    #[serde(with = "iso_millis")]
    pub purchase_time: DateTime<Utc>,
    pub validation_method: String,
    pub card: Card,
    pub metadata: String,
}

impl NewPaymentRequest {
    pub fn into_new_payment(self, merchant_id: MerchantId) -> NewPayment {
        NewPayment::new(
            merchant_id,
            self.amount,
            &self.currency,
            self.purchase_time,
            &self.validation_method,
            self.card,
            &self.metadata,
        )
    }
}

/// The outcome of a payment request, as far as the gateway knows at the time of the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub id: PaymentId,
    pub status: PaymentStatus,
    pub bank_message: String,
}

/// The settlement processor's report on a charge it accepted earlier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementCallback {
    /// The settlement reference the processor issued for the charge
    pub id: SettlementReference,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl SettlementCallback {
    pub fn outcome(&self) -> PaymentStatus {
        if self.success {
            PaymentStatus::Success
        } else {
            PaymentStatus::Fail
        }
    }
}
