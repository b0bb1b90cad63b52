use chrono::{DateTime, Utc};
use pg_common::{
    time::{iso_millis, iso_millis_option},
    Amount,
};
use serde::{Deserialize, Serialize};

use crate::db_types::{Card, MerchantId, Payment, PaymentId, PaymentStatus, SettlementReference};

/// The wire form of a payment record.
///
/// Timestamps are millisecond-precision ISO-8601 strings in UTC, and the status is its wire string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub merchant_id: MerchantId,
    pub amount: Amount,
    pub currency: String,
    #[serde(with = "iso_millis")]
    pub purchase_time: DateTime<Utc>,
    pub validation_method: String,
    pub card: Card,
    pub metadata: String,
    pub status: PaymentStatus,
    pub bank_payment_id: Option<SettlementReference>,
    #[serde(with = "iso_millis_option", default)]
    pub bank_request_time: Option<DateTime<Utc>>,
    #[serde(with = "iso_millis_option", default)]
    pub bank_response_time: Option<DateTime<Utc>>,
    pub bank_message: String,
}

impl From<Payment> for PaymentRecord {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            merchant_id: p.merchant_id,
            amount: p.amount,
            currency: p.currency,
            purchase_time: p.purchase_time,
            validation_method: p.validation_method,
            card: p.card,
            metadata: p.metadata,
            status: p.status,
            bank_payment_id: p.settlement_reference,
            bank_request_time: p.settlement_sent_at,
            bank_response_time: p.settlement_received_at,
            bank_message: p.settlement_message,
        }
    }
}

impl From<PaymentRecord> for Payment {
    fn from(r: PaymentRecord) -> Self {
        Self {
            id: r.id,
            merchant_id: r.merchant_id,
            amount: r.amount,
            currency: r.currency,
            purchase_time: r.purchase_time,
            validation_method: r.validation_method,
            card: r.card,
            metadata: r.metadata,
            status: r.status,
            settlement_reference: r.bank_payment_id,
            settlement_sent_at: r.bank_request_time,
            settlement_received_at: r.bank_response_time,
            settlement_message: r.bank_message,
        }
    }
}

/// When a settlement outcome was observed. Failures can happen on the way out (the relay failed) or on the way back
/// (the processor reported a failed charge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStamp {
    Sent(DateTime<Utc>),
    Received(DateTime<Utc>),
}
