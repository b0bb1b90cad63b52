use std::{sync::Arc, time::Duration};

use log::*;
use payment_engine::{
    db_types::{Merchant, MerchantId},
    MerchantLookup,
    MerchantLookupError,
};
use pg_common::Secret;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{base_url, ClientInitError};

#[derive(Serialize)]
struct FindMerchantRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct FindMerchantResponse {
    exists: bool,
    #[serde(default)]
    id: Option<MerchantId>,
}

#[derive(Debug, Deserialize)]
struct MerchantProfile {
    username: String,
    name: String,
    active: bool,
    max_rate_per_second: i32,
}

#[derive(Debug, Deserialize)]
struct MaxRateResponse {
    max_rate_per_second: i32,
}

/// Talks to the merchant service over HTTP.
#[derive(Clone)]
pub struct MerchantServiceClient {
    base_url: String,
    client: Arc<Client>,
}

impl std::fmt::Debug for MerchantServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MerchantServiceClient({})", self.base_url)
    }
}

impl MerchantServiceClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ClientInitError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| ClientInitError(e.to_string()))?;
        Ok(Self { base_url: base_url(url), client: Arc::new(client) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, id: &MerchantId, path: &str) -> Result<T, MerchantLookupError> {
        let url = self.url(path);
        trace!("🪪️ GET {url}");
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("🪪️ Merchant service does not know merchant {id}");
            return Err(MerchantLookupError::MerchantNotFound(*id));
        }
        parse_json(response).await
    }
}

impl MerchantLookup for MerchantServiceClient {
    async fn find_merchant(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Option<MerchantId>, MerchantLookupError> {
        let url = self.url("/merchants/find");
        trace!("🪪️ POST {url} for {username}");
        let body = FindMerchantRequest { username, password: password.reveal() };
        let response = self.client.post(url).json(&body).send().await.map_err(transport_error)?;
        let found = parse_json::<FindMerchantResponse>(response).await?;
        match (found.exists, found.id) {
            (true, Some(id)) => Ok(Some(id)),
            (true, None) => Err(MerchantLookupError::InvalidResponse("Merchant exists, but no id was supplied".into())),
            (false, _) => Ok(None),
        }
    }

    async fn fetch_merchant(&self, id: &MerchantId) -> Result<Merchant, MerchantLookupError> {
        let profile = self.get::<MerchantProfile>(id, &format!("/merchants/{id}")).await?;
        Ok(Merchant {
            id: *id,
            username: profile.username,
            name: profile.name,
            active: profile.active,
            max_rate_per_second: profile.max_rate_per_second,
        })
    }

    async fn fetch_max_rate(&self, id: &MerchantId) -> Result<i32, MerchantLookupError> {
        let rate = self.get::<MaxRateResponse>(id, &format!("/merchants/{id}/max_rate")).await?;
        Ok(rate.max_rate_per_second)
    }
}

fn transport_error(e: reqwest::Error) -> MerchantLookupError {
    if e.is_timeout() {
        warn!("🪪️ Merchant service timed out. {e}");
        MerchantLookupError::Timeout
    } else {
        warn!("🪪️ Merchant service is unreachable. {e}");
        MerchantLookupError::Unreachable(e.to_string())
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, MerchantLookupError> {
    let status = response.status();
    if !status.is_success() {
        warn!("🪪️ Merchant service replied with {status}");
        return Err(MerchantLookupError::InvalidResponse(format!("Unexpected status {status}")));
    }
    response.json::<T>().await.map_err(|e| {
        warn!("🪪️ Could not parse merchant service response. {e}");
        MerchantLookupError::InvalidResponse(e.to_string())
    })
}
