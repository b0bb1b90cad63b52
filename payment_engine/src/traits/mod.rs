//! # Collaborator contracts
//!
//! This module defines the behaviour the payment engine expects from the systems it depends on.
//!
//! * [`LedgerManagement`] is the contract for the payment ledger *backend*. The engine ships with an in-memory
//!   implementation, [`crate::MemoryLedger`], but any store that honours the contract can be used.
//! * [`MerchantLookup`] authenticates merchants and reports their admission budget.
//! * [`SettlementRelay`] forwards a charge to the settlement processor (the bank).
mod data_objects;
mod ledger_management;
mod merchant_lookup;
mod settlement_relay;

pub use data_objects::{SettlementAccepted, SettlementRequest, SettlementResponse};
pub use ledger_management::{LedgerError, LedgerManagement};
pub use merchant_lookup::{MerchantLookup, MerchantLookupError};
pub use settlement_relay::{SettlementError, SettlementRelay};
