//! # Payment gateway server
//! This crate hosts the HTTP front door of the card payment gateway. It is responsible for:
//! Authenticating merchants and accepting their payments.
//! Handing payments to the payment engine, which relays them to the settlement processor (the bank).
//! Receiving the settlement processor's callbacks and applying them to the ledger.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /payment`: Create a payment. Merchants authenticate with HTTP Basic credentials.
//! * `GET /payment/{id}`: Read back one of the merchant's own payments.
//! * `PUT /payment`: The settlement processor's callback. Protected by an IP whitelist and an HMAC signature.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod eviction_worker;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
