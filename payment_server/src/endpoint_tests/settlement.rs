use actix_web::{http::StatusCode, test::TestRequest};
use payment_engine::db_types::{PaymentId, PaymentStatus, SettlementReference};
use pg_common::Secret;
use serde_json::json as json_value;

use super::helpers::{basic_auth, json, payment_body, TestGateway};
use crate::{config::SettlementCallbackConfig, helpers::calculate_hmac, middleware::SETTLEMENT_HMAC_HEADER};

const ACKNOWLEDGED: &str = r#"{"acknowledge":true}"#;
const REJECTED: &str = r#"{"acknowledge":false}"#;

/// Creates a payment that the bank accepted with `reference`, so that it is waiting for a callback.
async fn pending_payment(gateway: &TestGateway, reference: SettlementReference) -> PaymentId {
    gateway.bank.accept_with(reference, "processing").await;
    let req = TestRequest::post()
        .uri("/payment")
        .insert_header(basic_auth("acme", "hunter2"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payment_body(25));
    let (status, body) = gateway.call(req).await;
    assert_eq!(status, StatusCode::OK);
    json(&body)["id"].as_str().unwrap().parse().unwrap()
}

fn callback_body(reference: &SettlementReference, success: bool, message: &str) -> String {
    json_value!({"id": reference.to_string(), "success": success, "message": message}).to_string()
}

fn callback(body: &str) -> TestRequest {
    TestRequest::put()
        .uri("/payment")
        .insert_header(("Content-Type", "application/json"))
        .peer_addr("127.0.0.1:40000".parse().unwrap())
        .set_payload(body.to_string())
}

fn hmac_config(secret: &str) -> SettlementCallbackConfig {
    SettlementCallbackConfig { whitelist: None, hmac_secret: Secret::from(secret), hmac_checks: true }
}

#[actix_web::test]
async fn successful_settlement() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    let (status, body) = gateway.call(callback(&callback_body(&reference, true, "approved"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACKNOWLEDGED);
    let payment = gateway.payment(&id).await;
    assert_eq!(payment.status, PaymentStatus::Success);
    assert_eq!(payment.settlement_message, "approved");
    assert!(payment.settlement_received_at.is_some());
}

#[actix_web::test]
async fn failed_settlement() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    let (status, body) = gateway.call(callback(&callback_body(&reference, false, "fraud suspected"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACKNOWLEDGED);
    let payment = gateway.payment(&id).await;
    assert_eq!(payment.status, PaymentStatus::Fail);
    assert_eq!(payment.settlement_reference, Some(reference));
}

#[actix_web::test]
async fn redelivered_callback_is_acknowledged_again() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    pending_payment(&gateway, reference).await;
    let body = callback_body(&reference, true, "approved");
    assert_eq!(gateway.call(callback(&body)).await.1, ACKNOWLEDGED);
    let (status, reply) = gateway.call(callback(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, ACKNOWLEDGED);
}

#[actix_web::test]
async fn conflicting_callback_is_rejected() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    gateway.call(callback(&callback_body(&reference, true, "approved"))).await;
    let (status, body) = gateway.call(callback(&callback_body(&reference, false, "changed my mind"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, REJECTED);
    assert_eq!(gateway.payment(&id).await.status, PaymentStatus::Success);
}

#[actix_web::test]
async fn unknown_reference() {
    let gateway = TestGateway::new();
    let reference = SettlementReference::new_random();
    let (status, body) = gateway.call(callback(&callback_body(&reference, true, "approved"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, REJECTED);
}

#[actix_web::test]
async fn malformed_callback() {
    let gateway = TestGateway::new();
    let (status, body) = gateway.call(callback(r#"{"id": "nope", "success": true}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, REJECTED);
}

//----------------------------------------------   Whitelist  ----------------------------------------------------

#[actix_web::test]
async fn whitelisted_peer() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    pending_payment(&gateway, reference).await;
    let config = SettlementCallbackConfig { whitelist: Some(vec!["127.0.0.1".parse().unwrap()]), ..Default::default() };
    let (status, body) =
        gateway.call_with_settlement(config, callback(&callback_body(&reference, true, "approved"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ACKNOWLEDGED);
}

#[actix_web::test]
async fn peer_not_on_whitelist() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    let config = SettlementCallbackConfig { whitelist: Some(vec!["10.0.0.1".parse().unwrap()]), ..Default::default() };
    let (status, _) =
        gateway.call_with_settlement(config, callback(&callback_body(&reference, true, "approved"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(gateway.payment(&id).await.status, PaymentStatus::Pending);
}

//----------------------------------------------   HMAC  ----------------------------------------------------

#[actix_web::test]
async fn signed_callback() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    let body = callback_body(&reference, true, "approved");
    let req = callback(&body).insert_header((SETTLEMENT_HMAC_HEADER, calculate_hmac("s3cret", body.as_bytes())));
    let (status, reply) = gateway.call_with_settlement(hmac_config("s3cret"), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, ACKNOWLEDGED);
    assert_eq!(gateway.payment(&id).await.status, PaymentStatus::Success);
}

#[actix_web::test]
async fn unsigned_callback() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    let body = callback_body(&reference, true, "approved");
    let (status, _) = gateway.call_with_settlement(hmac_config("s3cret"), callback(&body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(gateway.payment(&id).await.status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn forged_callback() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    let body = callback_body(&reference, true, "approved");
    let req = callback(&body).insert_header((SETTLEMENT_HMAC_HEADER, calculate_hmac("guessed", body.as_bytes())));
    let (status, _) = gateway.call_with_settlement(hmac_config("s3cret"), req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(gateway.payment(&id).await.status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn garbled_signature() {
    let (gateway, _) = TestGateway::with_merchant("acme", "hunter2", 10).await;
    let reference = SettlementReference::new_random();
    let id = pending_payment(&gateway, reference).await;
    let body = callback_body(&reference, true, "approved");
    let signature = calculate_hmac("s3cret", body.as_bytes());
    let truncated = &signature[..signature.len() - 8];
    for header in ["%%% not base64 %%%", truncated] {
        let req = callback(&body).insert_header((SETTLEMENT_HMAC_HEADER, header));
        let (status, _) = gateway.call_with_settlement(hmac_config("s3cret"), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
    assert_eq!(gateway.payment(&id).await.status, PaymentStatus::Pending);
}
