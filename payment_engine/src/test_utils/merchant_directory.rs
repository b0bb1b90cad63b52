use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use log::*;
use pg_common::Secret;
use tokio::sync::RwLock;

use crate::{
    db_types::{Merchant, MerchantId},
    traits::{MerchantLookup, MerchantLookupError},
};

#[derive(Default)]
struct DirectoryState {
    merchants: HashMap<MerchantId, (Merchant, String)>,
    unreachable: bool,
    delay: Option<Duration>,
    rate_lookups: usize,
}

/// An in-memory merchant service.
///
/// Merchants can be added and modified at will, and the service can be made slow or unreachable to exercise failure
/// handling.
#[derive(Clone, Default)]
pub struct MerchantDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl Debug for MerchantDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MerchantDirectory")
    }
}

impl MerchantDirectory {
    pub async fn add_merchant(&self, username: &str, password: &str, name: &str, max_rate: i32) -> MerchantId {
        let id = MerchantId::new_random();
        let merchant = Merchant {
            id,
            username: username.to_string(),
            name: name.to_string(),
            active: true,
            max_rate_per_second: max_rate,
        };
        self.state.write().await.merchants.insert(id, (merchant, password.to_string()));
        id
    }

    pub async fn set_active(&self, id: &MerchantId, active: bool) {
        if let Some((m, _)) = self.state.write().await.merchants.get_mut(id) {
            m.active = active;
        }
    }

    pub async fn set_max_rate(&self, id: &MerchantId, max_rate: i32) {
        if let Some((m, _)) = self.state.write().await.merchants.get_mut(id) {
            m.max_rate_per_second = max_rate;
        }
    }

    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    /// The number of times `fetch_max_rate` has been called.
    pub async fn rate_lookups(&self) -> usize {
        self.state.read().await.rate_lookups
    }

    async fn check_reachable(&self) -> Result<(), MerchantLookupError> {
        let (unreachable, delay) = {
            let state = self.state.read().await;
            (state.unreachable, state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if unreachable {
            debug!("🪪️ Test merchant directory is unreachable");
            return Err(MerchantLookupError::Unreachable("connection refused".into()));
        }
        Ok(())
    }
}

impl MerchantLookup for MerchantDirectory {
    async fn find_merchant(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> Result<Option<MerchantId>, MerchantLookupError> {
        self.check_reachable().await?;
        let state = self.state.read().await;
        let id = state
            .merchants
            .values()
            .find(|(m, pwd)| m.username == username && pwd == password.reveal())
            .map(|(m, _)| m.id);
        Ok(id)
    }

    async fn fetch_merchant(&self, id: &MerchantId) -> Result<Merchant, MerchantLookupError> {
        self.check_reachable().await?;
        let state = self.state.read().await;
        state.merchants.get(id).map(|(m, _)| m.clone()).ok_or(MerchantLookupError::MerchantNotFound(*id))
    }

    async fn fetch_max_rate(&self, id: &MerchantId) -> Result<i32, MerchantLookupError> {
        self.state.write().await.rate_lookups += 1;
        self.check_reachable().await?;
        let state = self.state.read().await;
        state.merchants.get(id).map(|(m, _)| m.max_rate_per_second).ok_or(MerchantLookupError::MerchantNotFound(*id))
    }
}
