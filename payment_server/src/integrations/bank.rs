use std::{sync::Arc, time::Duration};

use log::*;
use payment_engine::{
    traits::{SettlementAccepted, SettlementRequest, SettlementResponse},
    SettlementError,
    SettlementRelay,
};
use reqwest::{Client, StatusCode};

use super::{base_url, ClientInitError};

/// Relays charges to the settlement processor over HTTP.
///
/// The processor answers `201 Created` when it takes a charge on. `400 Bad Request` means the charge was refused, and
/// the body explains why. Anything else is treated as a transport failure.
#[derive(Clone)]
pub struct BankClient {
    base_url: String,
    client: Arc<Client>,
}

impl std::fmt::Debug for BankClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BankClient({})", self.base_url)
    }
}

impl BankClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ClientInitError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| ClientInitError(e.to_string()))?;
        Ok(Self { base_url: base_url(url), client: Arc::new(client) })
    }
}

impl SettlementRelay for BankClient {
    async fn relay_payment(&self, request: SettlementRequest) -> Result<SettlementAccepted, SettlementError> {
        let url = format!("{}/payment", self.base_url);
        trace!("🏦️ POST {url}");
        let response = self.client.post(url).json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                warn!("🏦️ Settlement processor timed out. {e}");
                SettlementError::Timeout
            } else {
                warn!("🏦️ Could not reach the settlement processor. {e}");
                SettlementError::Transport(e.to_string())
            }
        })?;
        let status = response.status();
        if status != StatusCode::CREATED && status != StatusCode::BAD_REQUEST {
            warn!("🏦️ Settlement processor replied with {status}");
            return Err(SettlementError::UnexpectedStatus(status.as_u16()));
        }
        let body = response.json::<SettlementResponse>().await.map_err(|e| {
            warn!("🏦️ Could not parse the settlement processor's reply. {e}");
            SettlementError::MalformedResponse(e.to_string())
        })?;
        if status == StatusCode::BAD_REQUEST {
            info!("🏦️ Settlement processor refused the charge. {}", body.message);
            return Err(SettlementError::Declined { message: body.message });
        }
        body.into_outcome()
    }
}
