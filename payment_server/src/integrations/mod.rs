//! HTTP clients for the systems the gateway depends on.
//!
//! Each client implements one of the engine's collaborator traits, so that [`payment_engine::PaymentFlowApi`] can be
//! wired to the real services in production and to in-memory fakes in tests.
mod bank;
mod merchant_service;

pub use bank::BankClient;
pub use merchant_service::MerchantServiceClient;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Could not build HTTP client. {0}")]
pub struct ClientInitError(pub String);

fn base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
