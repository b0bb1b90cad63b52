use pg_common::Secret;
use thiserror::Error;

use crate::db_types::{Merchant, MerchantId};

#[derive(Debug, Clone, Error)]
pub enum MerchantLookupError {
    #[error("Merchant service is unreachable. {0}")]
    Unreachable(String),
    #[error("Merchant {0} does not exist")]
    MerchantNotFound(MerchantId),
    #[error("Merchant service returned an invalid response. {0}")]
    InvalidResponse(String),
    #[error("Merchant service did not respond in time")]
    Timeout,
}

/// Access to the merchant service, which owns merchant credentials and profiles.
#[allow(async_fn_in_trait)]
pub trait MerchantLookup: Clone {
    /// Checks a username and password pair. Returns the merchant's id if the credentials match a known merchant.
    async fn find_merchant(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Option<MerchantId>, MerchantLookupError>;

    async fn fetch_merchant(&self, id: &MerchantId) -> Result<Merchant, MerchantLookupError>;

    /// The maximum number of requests per second the merchant may make. Zero or negative values mean the merchant is
    /// not admitted at all.
    async fn fetch_max_rate(&self, id: &MerchantId) -> Result<i32, MerchantLookupError>;
}
