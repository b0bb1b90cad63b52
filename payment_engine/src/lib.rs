//! Payment Engine
//!
//! The payment engine holds the core of the card payment gateway. It is transport-agnostic: the HTTP front door lives
//! in the `payment_server` crate.
//!
//! The library is divided into these sections:
//! 1. The payment ledger ([`mod@db`]). The ledger is the single source of truth for payment records. Backends
//!    implement [`LedgerManagement`]; an in-memory backend, [`MemoryLedger`], is provided. The payment entity and its
//!    state machine live in [`mod@db_types`].
//! 2. Admission control ([`mod@admission`]), a per-merchant token bucket rate limiter.
//! 3. The public API ([`mod@pe_api`]). [`PaymentFlowApi`] runs the payment saga, from authentication through to
//!    reconciliation of the settlement processor's callback.
//!
//! External systems (the merchant service and the settlement processor) are reached through the traits in
//! [`mod@traits`].
pub mod admission;
mod db;
pub mod db_types;
pub mod pe_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use admission::{AdmissionController, AdmissionPolicy, TokenBucket};
pub use db::memory::MemoryLedger;
pub use pe_api::{
    errors::PaymentFlowError,
    ledger_api::LedgerApi,
    ledger_objects,
    payment_flow_api::{FlowOptions, PaymentFlowApi},
    payment_objects,
};
pub use traits::{LedgerError, LedgerManagement, MerchantLookup, MerchantLookupError, SettlementError, SettlementRelay};
