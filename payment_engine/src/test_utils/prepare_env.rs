use chrono::{DateTime, Datelike, Utc};
use log::*;
use pg_common::Amount;

use crate::{db_types::Card, pe_api::payment_objects::NewPaymentRequest};

pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

/// A card that stays valid for a few years from now.
pub fn valid_card() -> Card {
    Card::new("4242424242424242", "Ann Holder", 12, Utc::now().year() + 3, 123)
}

pub fn expired_card() -> Card {
    Card::new("4242424242424242", "Ann Holder", 1, Utc::now().year() - 1, 123)
}

pub fn payment_request(amount: Amount, currency: &str, purchase_time: DateTime<Utc>) -> NewPaymentRequest {
    NewPaymentRequest {
        amount,
        currency: currency.to_string(),
        purchase_time,
        validation_method: "push".to_string(),
        card: valid_card(),
        metadata: "order #1".to_string(),
    }
}
