use thiserror::Error;

use crate::db_types::{NewPayment, Payment, PaymentId, PaymentStatus, SettlementReference, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Payment record is invalid. {0}")]
    Validation(#[from] ValidationError),
    #[error("Payment {0} does not exist")]
    NotFound(PaymentId),
    #[error("No payment is linked to settlement reference {0}")]
    UnknownReference(SettlementReference),
    #[error("Payment {id} was expected to be {expected}, but it is {actual}")]
    StatusChanged { id: PaymentId, expected: PaymentStatus, actual: PaymentStatus },
    #[error("Ledger storage error: {0}")]
    StorageError(String),
}

/// The `LedgerManagement` trait is the contract for payment ledger backends.
///
/// The ledger is the single source of truth for payment records. Every record is validated before it is written, so
/// a backend never holds a record that violates the payment invariants. The ledger does *not* police the payment
/// lifecycle: any status is accepted on update, and callers are expected to check
/// [`crate::db_types::PaymentStatus::can_transition_to`] before submitting a change.
///
/// Two indices are maintained: the primary [`PaymentId`] and the settlement processor's [`SettlementReference`].
/// Once set, a settlement reference never changes and always maps back to exactly one payment.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    /// Validates and stores a new payment, returning its freshly assigned id.
    ///
    /// If the payment carries a settlement reference, it is indexed as well. On any error the ledger is unchanged.
    async fn insert_payment(&self, payment: NewPayment) -> Result<PaymentId, LedgerError>;

    async fn fetch_payment(&self, id: &PaymentId) -> Result<Payment, LedgerError>;

    /// Resolves a settlement reference to its payment.
    ///
    /// Returns `UnknownReference` if the reference has never been recorded.
    async fn fetch_payment_by_reference(&self, reference: &SettlementReference) -> Result<Payment, LedgerError>;

    /// Replaces a stored payment with `payment` after re-validating the entire record.
    ///
    /// There are no partial updates. The settlement reference may be set once; changing or clearing it afterwards is
    /// a validation failure.
    async fn update_payment(&self, payment: Payment) -> Result<(), LedgerError>;

    /// As [`LedgerManagement::update_payment`], but only if the stored payment still has status `expected`.
    ///
    /// The status check and the write happen as one step. If another writer got there first, the ledger is unchanged
    /// and `StatusChanged` reports what the stored status is now.
    async fn update_payment_if_status(&self, payment: Payment, expected: PaymentStatus) -> Result<(), LedgerError>;

    /// The number of payments in the ledger.
    async fn count_payments(&self) -> Result<usize, LedgerError>;
}
