//! # Admission control
//!
//! Every merchant gets a token bucket sized by the maximum request rate the merchant service reports for it. Buckets
//! are created lazily, the first time a merchant is seen, and cached until they are evicted for being idle.
//!
//! If the rate lookup fails, the [`AdmissionPolicy`] decides whether the request goes ahead. Nothing is cached in that
//! case, so the lookup is retried on the next request from the same merchant.
use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    sync::Arc,
    time::Duration,
};

use log::*;
use tokio::{
    sync::Mutex,
    time::{timeout, Instant},
};

use crate::{db_types::MerchantId, traits::MerchantLookup};

/// The number of requests a merchant can make in a single burst.
pub const DEFAULT_BURST: u32 = 10;
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

const NANOS_PER_SEC: u128 = 1_000_000_000;

//--------------------------------------    AdmissionPolicy    ---------------------------------------------------------
/// What to do when a merchant's rate budget cannot be determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Admit the request. A broken merchant service does not block payment traffic.
    #[default]
    FailOpen,
    /// Reject the request.
    FailClosed,
}

impl AdmissionPolicy {
    pub fn from_fail_open_flag(fail_open: bool) -> Self {
        if fail_open {
            Self::FailOpen
        } else {
            Self::FailClosed
        }
    }

    pub fn admits_on_failure(&self) -> bool {
        matches!(self, Self::FailOpen)
    }
}

impl Display for AdmissionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionPolicy::FailOpen => write!(f, "fail-open"),
            AdmissionPolicy::FailClosed => write!(f, "fail-closed"),
        }
    }
}

//--------------------------------------      TokenBucket      ---------------------------------------------------------
/// A token bucket that refills continuously at `rate` tokens per second, up to `burst` tokens.
///
/// Token counts are held in billionths of a token, so that refills are exact for whole-number rates.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    rate: u128,
    capacity: u128,
    level: u128,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(rate_per_second: u32, burst: u32, now: Instant) -> Self {
        let capacity = u128::from(burst) * NANOS_PER_SEC;
        Self { rate: u128::from(rate_per_second), capacity, level: capacity, last_refill: now }
    }

    /// A bucket that never holds a token.
    pub fn closed(now: Instant) -> Self {
        Self { rate: 0, capacity: 0, level: 0, last_refill: now }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.level >= NANOS_PER_SEC {
            self.level -= NANOS_PER_SEC;
            true
        } else {
            false
        }
    }

    /// The number of whole tokens currently available.
    pub fn available(&mut self, now: Instant) -> u32 {
        self.refill(now);
        u32::try_from(self.level / NANOS_PER_SEC).unwrap_or(u32::MAX)
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_nanos();
        self.level = self.level.saturating_add(elapsed.saturating_mul(self.rate)).min(self.capacity);
        self.last_refill = now;
    }
}

struct LimiterState {
    bucket: TokenBucket,
    last_seen: Instant,
}

//--------------------------------------  AdmissionController  ---------------------------------------------------------
/// Per-merchant rate limiting.
///
/// Clones share the same limiter table.
#[derive(Clone)]
pub struct AdmissionController<M> {
    lookup: M,
    policy: AdmissionPolicy,
    lookup_timeout: Duration,
    limiters: Arc<Mutex<HashMap<MerchantId, LimiterState>>>,
}

impl<M> Debug for AdmissionController<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdmissionController ({}, burst {DEFAULT_BURST})", self.policy)
    }
}

impl<M> AdmissionController<M> {
    pub fn new(lookup: M, policy: AdmissionPolicy, lookup_timeout: Duration) -> Self {
        Self { lookup, policy, lookup_timeout, limiters: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Removes the limiters of merchants that have not been seen for longer than `max_idle`.
    /// Returns the number of limiters removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut limiters = self.limiters.lock().await;
        let before = limiters.len();
        limiters.retain(|_, state| now.saturating_duration_since(state.last_seen) <= max_idle);
        before - limiters.len()
    }

    /// The number of merchants that currently have a cached limiter.
    pub async fn tracked_merchants(&self) -> usize {
        self.limiters.lock().await.len()
    }
}

impl<M> AdmissionController<M>
where M: MerchantLookup
{
    /// Decides whether `merchant_id` may make another request right now.
    ///
    /// This never fails. Problems looking up the merchant's rate budget are resolved by the admission policy.
    pub async fn allow(&self, merchant_id: &MerchantId) -> bool {
        {
            let mut limiters = self.limiters.lock().await;
            if let Some(state) = limiters.get_mut(merchant_id) {
                return admit(state, merchant_id);
            }
        }
        // The lookup happens outside the lock. If two requests race here, the first limiter inserted wins.
        let rate = match timeout(self.lookup_timeout, self.lookup.fetch_max_rate(merchant_id)).await {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => {
                warn!("🚦️ Could not fetch the rate budget for merchant {merchant_id}. {e}. Applying {}", self.policy);
                return self.policy.admits_on_failure();
            },
            Err(_) => {
                warn!("🚦️ Rate budget lookup for merchant {merchant_id} timed out. Applying {}", self.policy);
                return self.policy.admits_on_failure();
            },
        };
        let now = Instant::now();
        let bucket = match u32::try_from(rate) {
            Ok(rate) if rate > 0 => {
                debug!("🚦️ Merchant {merchant_id} admitted at {rate} requests/s, burst {DEFAULT_BURST}");
                TokenBucket::new(rate, DEFAULT_BURST, now)
            },
            _ => {
                info!("🚦️ Merchant {merchant_id} has a rate budget of {rate}. All requests will be rejected.");
                TokenBucket::closed(now)
            },
        };
        let mut limiters = self.limiters.lock().await;
        let state = limiters.entry(*merchant_id).or_insert(LimiterState { bucket, last_seen: now });
        admit(state, merchant_id)
    }
}

fn admit(state: &mut LimiterState, merchant_id: &MerchantId) -> bool {
    let now = Instant::now();
    state.last_seen = now;
    let allowed = state.bucket.try_acquire(now);
    if !allowed {
        debug!("🚦️ Merchant {merchant_id} is over its rate budget");
    }
    allowed
}
