use chrono::{Duration, Utc};
use cucumber::{then, when};
use payment_engine::{
    db_types::{PaymentId, PaymentStatus},
    payment_objects::SettlementCallback,
    test_utils::prepare_env::payment_request,
    LedgerManagement,
    PaymentFlowError,
};
use pg_common::Amount;

use crate::cucumber::GatewayWorld;

#[when(expr = "merchant {string} submits a payment of {word} {word}")]
async fn submit_payment(world: &mut GatewayWorld, username: String, amount: String, currency: String) {
    create_payment(world, &username, &amount, &currency).await;
}

#[when(expr = "merchant {string} submits {int} payments in quick succession")]
async fn submit_many(world: &mut GatewayWorld, username: String, count: usize) {
    for _ in 0..count {
        create_payment(world, &username, "1.00", "USD").await;
    }
}

async fn create_payment(world: &mut GatewayWorld, username: &str, amount: &str, currency: &str) {
    let merchant = world.login(username).await;
    let amount = amount.parse::<Amount>().expect("Invalid amount");
    let request = payment_request(amount, currency, Utc::now() - Duration::minutes(1));
    match world.api().create_payment(&merchant, request).await {
        Ok(result) => {
            world.last_payment = Some(result.id);
            world.last_result = Some(result);
            world.last_error = None;
        },
        Err(e) => world.record_error(e),
    }
}

#[when(expr = "the bank reports {word} for reference {word}")]
async fn bank_callback(world: &mut GatewayWorld, outcome: String, label: String) {
    let success = match outcome.as_str() {
        "success" => true,
        "failure" => false,
        s => panic!("Unknown outcome {s}"),
    };
    let id = world.reference(&label);
    let callback = SettlementCallback { id, success, message: format!("bank says {outcome}") };
    match world.api().process_settlement_callback(callback).await {
        Ok(_) => {
            world.acknowledged = Some(true);
            world.last_error = None;
        },
        Err(e) => {
            world.acknowledged = Some(false);
            world.record_error(e);
        },
    }
}

#[when(expr = "merchant {string} reads the last payment")]
async fn read_last_payment(world: &mut GatewayWorld, username: String) {
    let merchant = world.login(&username).await;
    let id = last_payment(world);
    match world.api().fetch_payment_for_merchant(&id, &merchant.id).await {
        Ok(_) => world.last_error = None,
        Err(e) => world.record_error(e),
    }
}

fn last_payment(world: &GatewayWorld) -> PaymentId {
    world.last_payment.expect("No payment has been submitted")
}

#[then(expr = "the last payment has status {word}")]
async fn check_status(world: &mut GatewayWorld, status: String) {
    let expected = status.parse::<PaymentStatus>().expect("Invalid status");
    let payment = world.api().ledger().read_payment(&last_payment(world)).await.expect("Payment not found");
    assert_eq!(payment.status, expected);
}

#[then(expr = "the last payment has settlement reference {word}")]
async fn check_reference(world: &mut GatewayWorld, label: String) {
    let expected = world.reference(&label);
    let payment = world.api().ledger().read_payment(&last_payment(world)).await.expect("Payment not found");
    assert_eq!(payment.settlement_reference, Some(expected));
}

#[then("the last payment has no settlement reference")]
async fn check_no_reference(world: &mut GatewayWorld) {
    let payment = world.api().ledger().read_payment(&last_payment(world)).await.expect("Payment not found");
    assert!(payment.settlement_reference.is_none());
}

#[then(expr = "the last payment has bank message {string}")]
async fn check_message(world: &mut GatewayWorld, message: String) {
    let payment = world.api().ledger().read_payment(&last_payment(world)).await.expect("Payment not found");
    assert_eq!(payment.settlement_message, message);
}

#[then(expr = "the request fails with {word}")]
async fn check_error(world: &mut GatewayWorld, kind: String) {
    let err = world.last_error.as_ref().expect("The request did not fail");
    let matched = match kind.as_str() {
        "RateLimited" => matches!(err, PaymentFlowError::RateLimited(_)),
        "Unauthorized" => matches!(err, PaymentFlowError::Unauthorized),
        "UnknownReference" => matches!(err, PaymentFlowError::UnknownReference(_)),
        "InvalidTransition" => matches!(err, PaymentFlowError::InvalidTransition { .. }),
        "Validation" => matches!(err, PaymentFlowError::Validation(_)),
        s => panic!("Unknown error kind {s}"),
    };
    assert!(matched, "Expected {kind}, got {err:?}");
}

#[then("the request succeeds")]
async fn check_success(world: &mut GatewayWorld) {
    assert!(world.last_error.is_none(), "Request failed: {:?}", world.last_error);
}

#[then(expr = "the callback is {word}")]
async fn check_ack(world: &mut GatewayWorld, ack: String) {
    let expected = match ack.as_str() {
        "acknowledged" => true,
        "rejected" => false,
        s => panic!("Unknown acknowledgement {s}"),
    };
    assert_eq!(world.acknowledged, Some(expected));
}

#[then(expr = "the ledger holds {int} payment(s)")]
async fn check_count(world: &mut GatewayWorld, count: usize) {
    let n = world.api().ledger().db().count_payments().await.expect("Error counting payments");
    assert_eq!(n, count);
}

#[then(expr = "the merchant is told the payment is {word}")]
async fn check_reply(world: &mut GatewayWorld, status: String) {
    let expected = status.parse::<PaymentStatus>().expect("Invalid status");
    let result = world.last_result.as_ref().expect("No payment result was received");
    assert_eq!(result.status, expected);
}
