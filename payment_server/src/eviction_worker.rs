use std::time::Duration;

use log::*;
use payment_engine::AdmissionController;
use tokio::task::JoinHandle;

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Starts the rate limiter eviction worker. Merchants whose limiter has been idle for longer than `max_idle` are
/// forgotten, and their rate budget is fetched afresh on their next request.
///
/// Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_eviction_worker<M>(admission: AdmissionController<M>, max_idle: Duration) -> JoinHandle<()>
where M: Send + Sync + 'static {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(sweep_interval(max_idle));
        info!("🕰️ Rate limiter eviction worker started. Idle limiters are dropped after {max_idle:?}");
        loop {
            timer.tick().await;
            let evicted = admission.evict_idle(max_idle).await;
            if evicted > 0 {
                info!("🕰️ {evicted} idle rate limiters evicted");
            }
            trace!("🕰️ {} rate limiters remain", admission.tracked_merchants().await);
        }
    })
}

fn sweep_interval(max_idle: Duration) -> Duration {
    max_idle.min(MAX_SWEEP_INTERVAL).max(Duration::from_millis(10))
}
