//! Merchant authentication.
//!
//! Merchants authenticate every request with HTTP Basic credentials. The [`MerchantCredentials`] extractor only
//! parses the `Authorization` header; checking the credentials against the merchant service is the job of
//! [`payment_engine::PaymentFlowApi::authenticate`].
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, FromRequest, HttpRequest};
use log::debug;
use payment_engine::{
    db_types::Merchant,
    LedgerManagement,
    MerchantLookup,
    PaymentFlowApi,
    SettlementRelay,
};
use pg_common::Secret;

use crate::{
    errors::{AuthError, ServerError},
    helpers::parse_basic_auth,
};

#[derive(Debug, Clone)]
pub struct MerchantCredentials {
    pub username: String,
    pub password: Secret<String>,
}

impl MerchantCredentials {
    /// Resolves the credentials to an active merchant.
    pub async fn authenticate<L, M, S>(&self, api: &PaymentFlowApi<L, M, S>) -> Result<Merchant, ServerError>
    where
        L: LedgerManagement,
        M: MerchantLookup,
        S: SettlementRelay,
    {
        let merchant = api.authenticate(&self.username, &self.password).await?;
        debug!("💻️ Authenticated merchant {} ({})", merchant.id, merchant.username);
        Ok(merchant)
    }
}

impl FromRequest for MerchantCredentials {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = req
            .headers()
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)
            .and_then(|v| {
                v.to_str().map_err(|_| AuthError::PoorlyFormattedCredentials("Header is not valid ASCII".into()))
            })
            .and_then(parse_basic_auth)
            .map(|(username, password)| MerchantCredentials { username, password: Secret::new(password) })
            .map_err(|e| {
                debug!("💻️ Rejecting request without usable credentials. {e}");
                ServerError::AuthenticationError(e)
            });
        ready(result)
    }
}
