//! # Payment engine public API
//!
//! * [`ledger_api`] is the ledger surface offered to the front door: create, read, and the three status updates.
//! * [`payment_flow_api`] runs the payment saga. It authenticates merchants, records payments, applies admission
//!   control, relays charges to the settlement processor and reconciles the processor's callbacks.
//!
//! The other submodules hold the request and response types for these APIs.
//!
//! # API usage
//!
//! An API instance is created by supplying backends that implement the traits in [`crate::traits`]:
//!
//! ```rust,ignore
//! let api = PaymentFlowApi::new(MemoryLedger::new(), merchant_client, bank_client, FlowOptions::default());
//! let merchant = api.authenticate("m1", &Secret::from("password")).await?;
//! let result = api.create_payment(&merchant, request).await?;
//! ```
pub mod errors;
pub mod ledger_api;
pub mod ledger_objects;
pub mod payment_flow_api;
pub mod payment_objects;
