use std::time::Duration;

use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Utc;
use payment_engine::{
    db_types::{PaymentId, PaymentStatus},
    test_utils::{prepare_env::payment_request, MerchantDirectory, ScriptedSettlement},
    FlowOptions,
    LedgerError,
    LedgerManagement,
    PaymentFlowApi,
    SettlementError,
};
use pg_common::Amount;

use super::{
    helpers::{basic_auth, call_with, json, payment_body, TestGateway},
    mocks::{MockBank, MockLedger},
};
use crate::{
    config::{ServerOptions, SettlementCallbackConfig},
    errors::INTERNAL_ERROR_MESSAGE,
};

fn new_payment(username: &str, password: &str, body: String) -> TestRequest {
    TestRequest::post()
        .uri("/payment")
        .insert_header(basic_auth(username, password))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body)
}

fn read_payment(username: &str, password: &str, id: &str) -> TestRequest {
    TestRequest::get().uri(&format!("/payment/{id}")).insert_header(basic_auth(username, password))
}

fn id_from(body: &str) -> PaymentId {
    json(body)["id"].as_str().expect("Body should carry an id").parse().expect("Valid payment id")
}

//----------------------------------------------   POST /payment  ----------------------------------------------------

#[actix_web::test]
async fn create_payment() {
    let (gateway, merchant_id) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let (status, body) = gateway.call(new_payment("acme", "hunter2", payment_body(25))).await;
    assert_eq!(status, StatusCode::OK);
    let reply = json(&body);
    assert_eq!(reply["status"], "PENDING");
    assert_eq!(reply["bank_message"], "processing");
    let payment = gateway.payment(&id_from(&body)).await;
    assert_eq!(payment.merchant_id, merchant_id);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(payment.settlement_reference.is_some());
    let requests = gateway.bank.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].merchant, "Acme Widgets");
}

#[actix_web::test]
async fn create_payment_without_credentials() {
    let gateway = TestGateway::new();
    let req = TestRequest::post()
        .uri("/payment")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payment_body(25));
    let (status, body) = gateway.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["error"], "Authentication Error. No credentials were supplied.");
}

#[actix_web::test]
async fn create_payment_with_wrong_password() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let (status, _) = gateway.call(new_payment("acme", "letmein", payment_body(25))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(gateway.ledger.count_payments().await.unwrap(), 0);
}

#[actix_web::test]
async fn inactive_merchants_cannot_pay() {
    let (gateway, id) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    gateway.merchants.set_active(&id, false).await;
    let (status, _) = gateway.call(new_payment("acme", "hunter2", payment_body(25))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn merchant_service_down() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    gateway.merchants.set_unreachable(true).await;
    let (status, body) = gateway.call(new_payment("acme", "hunter2", payment_body(25))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["error"], INTERNAL_ERROR_MESSAGE);
    assert!(!body.to_lowercase().contains("unreachable"));
}

#[actix_web::test]
async fn create_payment_with_garbage_body() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let (status, body) = gateway.call(new_payment("acme", "hunter2", "{\"amount\": \"lots\"}".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn negative_amounts_are_rejected() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let (status, body) = gateway.call(new_payment("acme", "hunter2", payment_body(-5))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().starts_with("Invalid payment."));
    assert_eq!(gateway.ledger.count_payments().await.unwrap(), 0);
    assert!(gateway.bank.requests().await.is_empty());
}

#[actix_web::test]
async fn declined_payment() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    gateway.bank.fail_with(SettlementError::Declined { message: "insufficient funds".into() }).await;
    let (status, body) = gateway.call(new_payment("acme", "hunter2", payment_body(25))).await;
    assert_eq!(status, StatusCode::OK);
    let reply = json(&body);
    assert_eq!(reply["status"], "FAIL");
    assert_eq!(reply["bank_message"], "insufficient funds");
    let payment = gateway.payment(&id_from(&body)).await;
    assert!(payment.settlement_reference.is_none());
    assert!(payment.settlement_sent_at.is_some());
}

#[actix_web::test]
async fn rate_limited_payment_is_recorded() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 0).await;
    let (status, body) = gateway.call(new_payment("acme", "hunter2", payment_body(25))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let payment = gateway.payment(&id_from(&body)).await;
    assert_eq!(payment.status, PaymentStatus::Created);
    assert!(gateway.bank.requests().await.is_empty());
}

#[actix_web::test]
async fn ledger_failure_is_an_internal_error() {
    let merchants = MerchantDirectory::default();
    merchants.add_merchant("acme", "hunter2", "Acme Widgets", 10).await;
    let mut ledger = MockLedger::new();
    ledger.expect_insert_payment().returning(|_| Err(LedgerError::StorageError("disk full".into())));
    let mut bank = MockBank::new();
    bank.expect_relay_payment().never();
    let api = PaymentFlowApi::new(ledger, merchants, bank, FlowOptions::default());
    let req = new_payment("acme", "hunter2", payment_body(25));
    let (status, body) =
        call_with(api, SettlementCallbackConfig::default(), ServerOptions::default(), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["error"], INTERNAL_ERROR_MESSAGE);
    assert!(!body.contains("disk full"));
}

#[actix_web::test]
async fn ledger_failure_after_recording_returns_the_id() {
    let merchants = MerchantDirectory::default();
    let merchant_id = merchants.add_merchant("acme", "hunter2", "Acme Widgets", 10).await;
    let id = PaymentId::new_random();
    let stored = payment_request(Amount::from(25), "EUR", Utc::now()).into_new_payment(merchant_id).into_payment(id);
    let mut ledger = MockLedger::new();
    ledger.expect_insert_payment().times(1).returning(move |_| Ok(id));
    ledger.expect_fetch_payment().returning(move |_| Ok(stored.clone()));
    ledger
        .expect_update_payment_if_status()
        .times(1)
        .returning(|_, _| Err(LedgerError::StorageError("disk full".into())));
    let api = PaymentFlowApi::new(ledger, merchants, ScriptedSettlement::default(), FlowOptions::default());
    let req = new_payment("acme", "hunter2", payment_body(25));
    let (status, body) =
        call_with(api, SettlementCallbackConfig::default(), ServerOptions::default(), req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["error"], INTERNAL_ERROR_MESSAGE);
    assert_eq!(id_from(&body), id);
}

//----------------------------------------------   GET /payment/{id}  ------------------------------------------------

#[actix_web::test]
async fn read_own_payment() {
    let (gateway, merchant_id) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let (_, body) = gateway.call(new_payment("acme", "hunter2", payment_body(25))).await;
    let id = id_from(&body);
    let (status, body) = gateway.call(read_payment("acme", "hunter2", &id.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    let record = json(&body);
    assert_eq!(record["id"], id.to_string());
    assert_eq!(record["merchant_id"], merchant_id.to_string());
    assert_eq!(record["status"], "PENDING");
    assert_eq!(record["currency"], "EUR");
    assert!(record["bank_payment_id"].is_string());
    assert!(record["bank_request_time"].is_string());
    assert!(record["bank_response_time"].is_null());
}

#[actix_web::test]
async fn read_someone_elses_payment() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    gateway.merchants.add_merchant("evil", "corp", "Evil Corp", 10).await;
    let (_, body) = gateway.call(new_payment("acme", "hunter2", payment_body(25))).await;
    let id = id_from(&body);
    let (status, body) = gateway.call(read_payment("evil", "corp", &id.to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.contains("EUR"));
}

#[actix_web::test]
async fn read_unknown_payment() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let (status, _) = gateway.call(read_payment("acme", "hunter2", &PaymentId::new_random().to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn read_with_invalid_id() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let (status, body) = gateway.call(read_payment("acme", "hunter2", "not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().starts_with("Could not read request path"));
}

#[actix_web::test]
async fn reads_count_against_the_rate_budget() {
    let (gateway, merchant_id) = TestGateway::with_merchant("acme", "hunter2", 0).await;
    let (status, _) = gateway.call(read_payment("acme", "hunter2", &PaymentId::new_random().to_string())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    gateway.merchants.set_max_rate(&merchant_id, 10).await;
    // The limiter is cached, so the merchant stays blocked until it is evicted
    let (status, _) = gateway.call(read_payment("acme", "hunter2", &PaymentId::new_random().to_string())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(gateway.api.admission().evict_idle(Duration::from_millis(1)).await, 1);
    let (status, _) = gateway.call(read_payment("acme", "hunter2", &PaymentId::new_random().to_string())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
