#![allow(unused)]
#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use hivcare::config::Config;
use serde_json::{json, Value};
use support::*;

async fn create_order(app: &TestApp, amount: &str) -> anyhow::Result<(String, String)> {
    let (status, body) = app
        .json(
            Method::POST,
            "/api/orders",
            Some(json!({
                "patientId": uuid::Uuid::new_v4(),
                "kind": "appointment",
                "referenceId": uuid::Uuid::new_v4(),
                "amount": amount,
                "description": "Consultation"
            })),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create order");
    let order_id = id_of(&body["order"]);
    let code = body["payment"]["transactionCode"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_default();
    Ok((order_id, code))
}

fn transfer(content: &str, amount: u64, transfer_type: &str) -> Value {
    json!({
        "id": 55012,
        "gateway": "Vietcombank",
        "transactionDate": "2024-06-10 14:30:00",
        "accountNumber": "0071000123456",
        "content": content,
        "transferType": transfer_type,
        "transferAmount": amount,
        "referenceCode": "FT24162123"
    })
}

#[tokio::test]
async fn matching_transfer_settles_order_idempotently() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (order_id, code) = create_order(&app, "150000").await?;
            assert!(code.starts_with("HC"));
            assert_eq!(code.len(), 10);

            let note = format!("NGUYEN VAN A thanh toan {}", code.to_lowercase());
            let (status, outcome) = app
                .json(Method::POST, "/api/webhooks/payments", Some(transfer(&note, 150000, "in")))
                .await?;
            assert_status(status, StatusCode::OK, "webhook");
            assert_eq!(outcome["status"], "paid");
            assert_eq!(outcome["transactionCode"], json!(code));

            let (_, order) = app
                .json(Method::GET, &format!("/api/orders/{order_id}"), None)
                .await?;
            assert_eq!(order["status"], "paid");
            assert_eq!(order["payments"][0]["status"], "paid");
            assert_eq!(order["payments"][0]["gatewayTransactionId"], "55012");

            let (status, outcome) = app
                .json(Method::POST, "/api/webhooks/payments", Some(transfer(&note, 150000, "in")))
                .await?;
            assert_status(status, StatusCode::OK, "duplicate webhook");
            assert_eq!(outcome["status"], "already_paid");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn wrong_amount_marks_payment_failed() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (order_id, code) = create_order(&app, "150000").await?;

            let (status, outcome) = app
                .json(Method::POST, "/api/webhooks/payments", Some(transfer(&code, 100000, "in")))
                .await?;
            assert_status(status, StatusCode::OK, "webhook");
            assert_eq!(outcome["status"], "amount_mismatch");

            let (status, payment) = app
                .json(Method::GET, &format!("/api/payments/{code}"), None)
                .await?;
            assert_status(status, StatusCode::OK, "payment by code");
            assert_eq!(payment["status"], "failed");
            assert_eq!(payment["failureReason"], "amount_mismatch");

            let (_, order) = app
                .json(Method::GET, &format!("/api/orders/{order_id}"), None)
                .await?;
            assert_eq!(order["status"], "pending");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn unmatched_and_outgoing_transfers_are_acknowledged() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, outcome) = app
                .json(
                    Method::POST,
                    "/api/webhooks/payments",
                    Some(transfer("HCNOTACODE1 wrong", 1000, "in")),
                )
                .await?;
            assert_status(status, StatusCode::OK, "no code");
            assert_eq!(outcome["status"], "unmatched");

            let (_, outcome) = app
                .json(
                    Method::POST,
                    "/api/webhooks/payments",
                    Some(transfer("HCABCD1234", 1000, "in")),
                )
                .await?;
            assert_eq!(outcome["status"], "unmatched");
            assert_eq!(outcome["transactionCode"], "HCABCD1234");

            let (_, outcome) = app
                .json(
                    Method::POST,
                    "/api/webhooks/payments",
                    Some(transfer("HCABCD1234", 1000, "out")),
                )
                .await?;
            assert_eq!(outcome["status"], "ignored");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn webhook_requires_configured_api_key() -> anyhow::Result<()> {
    let mut config = Config::in_memory();
    config.payment.webhook_api_key = Some("s3cret".to_string());

    with_test_app_with_config(config, |app| {
        Box::pin(async move {
            let body = to_json_body(&transfer("HCABCD1234", 1000, "in"))?;

            let (status, _, _) = app
                .request(Method::POST, "/api/webhooks/payments", Some(body.clone()))
                .await?;
            assert_status(status, StatusCode::UNAUTHORIZED, "missing key");

            let (status, _, _) = app
                .request_with_extra_headers(
                    Method::POST,
                    "/api/webhooks/payments",
                    Some(body.clone()),
                    &[("authorization", "Apikey wrong")],
                )
                .await?;
            assert_status(status, StatusCode::UNAUTHORIZED, "wrong key");

            let (status, _, _) = app
                .request_with_extra_headers(
                    Method::POST,
                    "/api/webhooks/payments",
                    Some(body),
                    &[("authorization", "Apikey s3cret")],
                )
                .await?;
            assert_status(status, StatusCode::OK, "valid key");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn order_amount_must_be_positive() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _) = app
                .json(
                    Method::POST,
                    "/api/orders",
                    Some(json!({
                        "patientId": uuid::Uuid::new_v4(),
                        "kind": "treatment",
                        "referenceId": uuid::Uuid::new_v4(),
                        "amount": "0"
                    })),
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "zero amount");
            Ok(())
        })
    })
    .await
}
