use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{NewPayment, Payment, PaymentId, PaymentStatus, SettlementReference},
    pe_api::ledger_objects::SettlementStamp,
    traits::{LedgerError, LedgerManagement},
};

/// `LedgerApi` is the ledger surface used by the payment saga and the front door.
///
/// Status changes always re-submit the full record, and only land if the stored payment still has the status it had
/// when the caller read it. Otherwise they fail with [`LedgerError::StatusChanged`]. The API does not check whether a
/// status change is legal; that is the saga's job (see [`PaymentStatus::can_transition_to`]).
pub struct LedgerApi<L> {
    db: L,
}

impl<L> Debug for LedgerApi<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<L: Clone> Clone for LedgerApi<L> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<L> LedgerApi<L> {
    pub fn new(db: L) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &L {
        &self.db
    }
}

impl<L> LedgerApi<L>
where L: LedgerManagement
{
    pub async fn create_payment(&self, payment: NewPayment) -> Result<PaymentId, LedgerError> {
        let id = self.db.insert_payment(payment).await?;
        debug!("📒️ Payment {id} created");
        Ok(id)
    }

    pub async fn read_payment(&self, id: &PaymentId) -> Result<Payment, LedgerError> {
        self.db.fetch_payment(id).await
    }

    pub async fn read_payment_by_external_reference(
        &self,
        reference: &SettlementReference,
    ) -> Result<Payment, LedgerError> {
        self.db.fetch_payment_by_reference(reference).await
    }

    /// Marks a payment as accepted by the settlement processor.
    pub async fn update_to_pending(
        &self,
        mut payment: Payment,
        reference: SettlementReference,
        sent_at: DateTime<Utc>,
        message: &str,
    ) -> Result<Payment, LedgerError> {
        let expected = payment.status;
        payment.status = PaymentStatus::Pending;
        payment.settlement_reference = Some(reference);
        payment.settlement_sent_at = Some(sent_at);
        payment.settlement_message = message.to_string();
        self.save(payment, expected).await
    }

    pub async fn update_to_success(
        &self,
        mut payment: Payment,
        received_at: DateTime<Utc>,
        message: &str,
    ) -> Result<Payment, LedgerError> {
        let expected = payment.status;
        payment.status = PaymentStatus::Success;
        payment.settlement_received_at = Some(received_at);
        payment.settlement_message = message.to_string();
        self.save(payment, expected).await
    }

    pub async fn update_to_fail(
        &self,
        mut payment: Payment,
        stamp: SettlementStamp,
        message: &str,
    ) -> Result<Payment, LedgerError> {
        let expected = payment.status;
        payment.status = PaymentStatus::Fail;
        match stamp {
            SettlementStamp::Sent(ts) => payment.settlement_sent_at = Some(ts),
            SettlementStamp::Received(ts) => payment.settlement_received_at = Some(ts),
        }
        payment.settlement_message = message.to_string();
        self.save(payment, expected).await
    }

    async fn save(&self, payment: Payment, expected: PaymentStatus) -> Result<Payment, LedgerError> {
        self.db.update_payment_if_status(payment.clone(), expected).await?;
        debug!("📒️ Payment {} is now {}", payment.id, payment.status);
        Ok(payment)
    }
}
