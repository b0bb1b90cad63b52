use std::{collections::HashMap, fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;
use tokio::sync::RwLock;

use crate::{
    db_types::{NewPayment, Payment, PaymentId, PaymentStatus, SettlementReference, ValidationError},
    traits::{LedgerError, LedgerManagement},
};

#[derive(Default)]
struct LedgerTables {
    payments: HashMap<PaymentId, Payment>,
    references: HashMap<SettlementReference, PaymentId>,
}

impl LedgerTables {
    fn fresh_id(&self) -> PaymentId {
        loop {
            let id = PaymentId::new_random();
            if !self.payments.contains_key(&id) {
                return id;
            }
            warn!("📒️ Generated a payment id that is already in use. Trying again.");
        }
    }

    /// Validates `payment` and swaps it in for the stored record with the same id, keeping the reference index in step.
    fn replace(&mut self, payment: Payment) -> Result<(), LedgerError> {
        let id = payment.id;
        let current_reference = self.payments.get(&id).ok_or(LedgerError::NotFound(id))?.settlement_reference;
        payment.validate_at(Utc::now())?;
        match (current_reference, payment.settlement_reference) {
            (Some(old), new) if new != Some(old) => {
                debug!("📒️ Refusing to change the settlement reference of payment {id} from {old}");
                return Err(ValidationError::ReferenceImmutable(id).into());
            },
            (None, Some(new)) => {
                self.check_reference(&id, &new)?;
                self.references.insert(new, id);
            },
            _ => {},
        }
        trace!("📒️ Payment {id} updated. Status: {}", payment.status);
        self.payments.insert(id, payment);
        Ok(())
    }

    /// Checks that `reference` can be linked to payment `id`.
    fn check_reference(&self, id: &PaymentId, reference: &SettlementReference) -> Result<(), ValidationError> {
        match self.references.get(reference) {
            Some(owner) if owner != id => Err(ValidationError::ReferenceInUse(*reference)),
            _ => Ok(()),
        }
    }
}

/// An in-memory, process-local payment ledger.
///
/// Both indices live behind a single readers-writer lock, so they are always updated together. Clones share the same
/// underlying tables.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    tables: Arc<RwLock<LedgerTables>>,
}

impl Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryLedger")
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerManagement for MemoryLedger {
    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentId, LedgerError> {
        payment.validate_at(Utc::now())?;
        let mut tables = self.tables.write().await;
        let id = tables.fresh_id();
        if let Some(reference) = &payment.settlement_reference {
            tables.check_reference(&id, reference)?;
            tables.references.insert(*reference, id);
        }
        tables.payments.insert(id, payment.into_payment(id));
        trace!("📒️ Payment {id} stored");
        Ok(id)
    }

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Payment, LedgerError> {
        let tables = self.tables.read().await;
        tables.payments.get(id).cloned().ok_or(LedgerError::NotFound(*id))
    }

    async fn fetch_payment_by_reference(&self, reference: &SettlementReference) -> Result<Payment, LedgerError> {
        let tables = self.tables.read().await;
        let id = tables.references.get(reference).ok_or(LedgerError::UnknownReference(*reference))?;
        tables.payments.get(id).cloned().ok_or_else(|| {
            error!("📒️ Settlement reference {reference} points at payment {id}, which does not exist");
            LedgerError::NotFound(*id)
        })
    }

    async fn update_payment(&self, payment: Payment) -> Result<(), LedgerError> {
        let mut tables = self.tables.write().await;
        tables.replace(payment)
    }

    async fn update_payment_if_status(&self, payment: Payment, expected: PaymentStatus) -> Result<(), LedgerError> {
        let id = payment.id;
        let mut tables = self.tables.write().await;
        let actual = tables.payments.get(&id).ok_or(LedgerError::NotFound(id))?.status;
        if actual != expected {
            debug!("📒️ Payment {id} is {actual}, not {expected}. Update skipped.");
            return Err(LedgerError::StatusChanged { id, expected, actual });
        }
        tables.replace(payment)
    }

    async fn count_payments(&self) -> Result<usize, LedgerError> {
        Ok(self.tables.read().await.payments.len())
    }
}
