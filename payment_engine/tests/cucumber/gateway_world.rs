use std::collections::HashMap;

use cucumber::World;
use log::*;
use payment_engine::{
    db_types::{Merchant, PaymentId, SettlementReference},
    payment_objects::PaymentResult,
    test_utils::{MerchantDirectory, ScriptedSettlement},
    FlowOptions,
    MemoryLedger,
    PaymentFlowApi,
    PaymentFlowError,
};
use pg_common::Secret;

pub type GatewayApi = PaymentFlowApi<MemoryLedger, MerchantDirectory, ScriptedSettlement>;

#[derive(Default, Debug, World)]
pub struct GatewayWorld {
    pub system: Option<GatewaySystem>,
    /// Passwords, keyed by merchant username
    pub passwords: HashMap<String, String>,
    /// Settlement references, keyed by the label used in the feature file
    pub references: HashMap<String, SettlementReference>,
    pub last_payment: Option<PaymentId>,
    pub last_result: Option<PaymentResult>,
    pub last_error: Option<PaymentFlowError>,
    pub acknowledged: Option<bool>,
}

#[derive(Debug)]
pub struct GatewaySystem {
    pub api: GatewayApi,
    pub merchants: MerchantDirectory,
    pub bank: ScriptedSettlement,
}

impl GatewaySystem {
    pub fn new() -> Self {
        let merchants = MerchantDirectory::default();
        let bank = ScriptedSettlement::default();
        let api = PaymentFlowApi::new(MemoryLedger::new(), merchants.clone(), bank.clone(), FlowOptions::default());
        debug!("🚀️ Payment gateway ready");
        Self { api, merchants, bank }
    }
}

impl GatewayWorld {
    pub fn system(&self) -> &GatewaySystem {
        self.system.as_ref().expect("Payment gateway not initialised")
    }

    pub fn api(&self) -> &GatewayApi {
        &self.system().api
    }

    pub fn reference(&mut self, label: &str) -> SettlementReference {
        *self.references.entry(label.to_string()).or_insert_with(SettlementReference::new_random)
    }

    pub async fn login(&self, username: &str) -> Merchant {
        let password = self.passwords.get(username).cloned().unwrap_or_default();
        self.api().authenticate(username, &Secret::new(password)).await.expect("Merchant could not log in")
    }

    pub fn record_error(&mut self, err: PaymentFlowError) {
        info!("🚀️ Request failed: {err}");
        if let PaymentFlowError::RateLimited(id) = &err {
            self.last_payment = Some(*id);
        }
        self.last_error = Some(err);
    }
}
