use std::{collections::VecDeque, fmt::Debug, sync::Arc, time::Duration};

use tokio::sync::Mutex;

use crate::{
    db_types::SettlementReference,
    traits::{SettlementAccepted, SettlementError, SettlementRelay, SettlementRequest},
};

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Result<SettlementAccepted, SettlementError>>,
    requests: Vec<SettlementRequest>,
    delay: Option<Duration>,
}

/// A settlement processor that replies with pre-arranged outcomes, in order.
///
/// Once the script runs out, every charge is accepted with a fresh reference.
#[derive(Clone, Default)]
pub struct ScriptedSettlement {
    script: Arc<Mutex<Script>>,
}

impl Debug for ScriptedSettlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScriptedSettlement")
    }
}

impl ScriptedSettlement {
    pub async fn accept_with(&self, reference: SettlementReference, message: &str) {
        let outcome = Ok(SettlementAccepted { reference, message: message.to_string() });
        self.script.lock().await.outcomes.push_back(outcome);
    }

    pub async fn fail_with(&self, error: SettlementError) {
        self.script.lock().await.outcomes.push_back(Err(error));
    }

    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.script.lock().await.delay = delay;
    }

    /// Every request the processor has received so far.
    pub async fn requests(&self) -> Vec<SettlementRequest> {
        self.script.lock().await.requests.clone()
    }
}

impl SettlementRelay for ScriptedSettlement {
    async fn relay_payment(&self, request: SettlementRequest) -> Result<SettlementAccepted, SettlementError> {
        let (outcome, delay) = {
            let mut script = self.script.lock().await;
            script.requests.push(request);
            (script.outcomes.pop_front(), script.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome.unwrap_or_else(|| {
            Ok(SettlementAccepted { reference: SettlementReference::new_random(), message: "processing".into() })
        })
    }
}
