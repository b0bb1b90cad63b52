//! Ledger backends.
//!
//! Only the in-memory backend exists today. Backends implement [`crate::traits::LedgerManagement`].
pub mod memory;
