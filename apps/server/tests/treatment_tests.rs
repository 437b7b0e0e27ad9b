#![allow(unused)]
#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use chrono::{Duration, NaiveDate, Utc};
use serde_json::{json, Value};
use support::*;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_ago(n: i64) -> String {
    (today() - Duration::days(n)).to_string()
}

struct Catalogue {
    doctor_id: String,
    medicine_id: String,
    protocol_id: String,
}

/// One doctor and a first-line protocol with a single once-daily medicine at 10.00.
async fn seed(app: &TestApp) -> anyhow::Result<Catalogue> {
    let doctor_id = create_doctor(app, "Dr. Lan Pham", "lan.pham@clinic.test").await?;
    let medicine_id = create_medicine(app, "TDF/3TC/DTG", "10.00").await?;
    let protocol_id =
        create_protocol(app, "TLD first line", "first_line", &medicine_id, "once daily").await?;
    Ok(Catalogue {
        doctor_id,
        medicine_id,
        protocol_id,
    })
}

fn treatment_body(c: &Catalogue, patient_id: &str, start: &str) -> Value {
    json!({
        "patientId": patient_id,
        "doctorId": c.doctor_id,
        "protocolId": c.protocol_id,
        "startDate": start,
    })
}

fn patient() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[tokio::test]
async fn create_prices_protocol_over_treatment_span() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let mut body = treatment_body(&c, &patient(), "2024-01-01");
            body["endDate"] = json!("2024-01-30");

            let (status, created) = app.json(Method::POST, "/api/treatments", Some(body)).await?;
            assert_status(status, StatusCode::CREATED, "create treatment");
            assert_eq!(money(&created["treatment"]["totalCost"]), 300.0);
            assert_eq!(created["cost"]["lines"][0]["daysBasis"], "treatment_span");
            assert_eq!(created["cost"]["lines"][0]["days"], 30);

            let id = id_of(&created["treatment"]);
            let (status, details) = app
                .json(Method::GET, &format!("/api/treatments/{id}"), None)
                .await?;
            assert_status(status, StatusCode::OK, "get treatment");
            assert_eq!(details["protocol"]["name"], "TLD first line");
            assert_eq!(details["doctor"]["fullName"], "Dr. Lan Pham");
            assert_eq!(details["isOpen"], false);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn second_open_treatment_conflicts_unless_replacing() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let patient_id = patient();

            let (status, first) = app
                .json(
                    Method::POST,
                    "/api/treatments",
                    Some(treatment_body(&c, &patient_id, &days_ago(30))),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "first treatment");
            let first_id = id_of(&first["treatment"]);

            let (status, error) = app
                .json(
                    Method::POST,
                    "/api/treatments",
                    Some(treatment_body(&c, &patient_id, &days_ago(1))),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "second open treatment");
            assert_eq!(error["error"], "conflict");

            let mut replacing = treatment_body(&c, &patient_id, &days_ago(1));
            replacing["replaceActive"] = json!(true);
            let (status, second) = app
                .json(Method::POST, "/api/treatments", Some(replacing))
                .await?;
            assert_status(status, StatusCode::CREATED, "replacing treatment");
            assert_eq!(second["closedTreatmentIds"], json!([first_id]));

            let (_, closed) = app
                .json(Method::GET, &format!("/api/treatments/{first_id}"), None)
                .await?;
            assert_eq!(closed["status"], "completed");
            assert_eq!(closed["endDate"], json!(days_ago(2)));

            let (status, active) = app
                .json(
                    Method::GET,
                    &format!("/api/patients/{patient_id}/treatments/active"),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "active treatment");
            assert_eq!(active["id"], second["treatment"]["id"]);

            let (_, history) = app
                .json(
                    Method::GET,
                    &format!("/api/patients/{patient_id}/treatments"),
                    None,
                )
                .await?;
            assert_eq!(history.as_array().map(Vec::len), Some(2));
            assert_eq!(history[0]["id"], json!(first_id));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn regimen_shape_and_dates_are_checked() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;

            let (status, error) = app
                .json(
                    Method::POST,
                    "/api/treatments",
                    Some(json!({
                        "patientId": patient(),
                        "doctorId": c.doctor_id,
                        "startDate": "2024-03-01",
                        "customMedications": [{
                            "name": "Cotrimoxazole",
                            "dosage": "960 mg",
                            "frequency": "once daily",
                            "durationValue": 1,
                            "durationUnit": "month"
                        }]
                    })),
                )
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "custom without protocol");
            assert_eq!(error["error"], "business_rule_violation");

            let mut body = treatment_body(&c, &patient(), "2024-03-10");
            body["endDate"] = json!("2024-03-01");
            let (status, _) = app.json(Method::POST, "/api/treatments", Some(body)).await?;
            assert_status(status, StatusCode::BAD_REQUEST, "end before start");

            let mut body = treatment_body(&c, &patient(), "2024-03-10");
            body["protocolId"] = json!(uuid::Uuid::new_v4());
            let (status, _) = app.json(Method::POST, "/api/treatments", Some(body)).await?;
            assert_status(status, StatusCode::NOT_FOUND, "unknown protocol");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn inactive_doctor_cannot_be_assigned() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let (status, _) = app
                .json(
                    Method::POST,
                    &format!("/api/doctors/{}/deactivate", c.doctor_id),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "deactivate");

            let (status, _) = app
                .json(
                    Method::POST,
                    "/api/treatments",
                    Some(treatment_body(&c, &patient(), "2024-03-10")),
                )
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "inactive doctor");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn critical_safety_issues_block_unless_overridden() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let mut body = treatment_body(&c, &patient(), &days_ago(0));
            body["clinicalContext"] = json!({ "renal": { "creatinineClearance": 20.0 } });

            let (status, error) = app
                .json(Method::POST, "/api/treatments", Some(body.clone()))
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "unsafe treatment");
            assert_eq!(error["error"], "unsafe_treatment");
            assert_eq!(error["report"]["isSafe"], false);
            assert_eq!(error["report"]["issues"][0]["code"], "renal_avoid");

            body["overrideSafetyChecks"] = json!(true);
            let (status, created) = app.json(Method::POST, "/api/treatments", Some(body)).await?;
            assert_status(status, StatusCode::CREATED, "overridden");
            assert_eq!(created["validation"]["isSafe"], false);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn preview_cost_applies_custom_overrides() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let (status, cost) = app
                .json(
                    Method::POST,
                    "/api/treatments/preview-cost",
                    Some(json!({
                        "protocolId": c.protocol_id,
                        "startDate": "2024-05-01",
                        "customMedications": [
                            {
                                "medicineId": c.medicine_id,
                                "name": "TDF/3TC/DTG",
                                "dosage": "1 tablet",
                                "frequency": "twice daily",
                                "durationValue": 1,
                                "durationUnit": "week",
                                "price": "5"
                            },
                            {
                                "name": "Cotrimoxazole",
                                "dosage": "960 mg",
                                "frequency": "once daily",
                                "durationValue": 30,
                                "durationUnit": "day",
                                "price": "1"
                            }
                        ]
                    })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "preview cost");

            let lines = cost["lines"].as_array().cloned().unwrap_or_default();
            assert_eq!(lines.len(), 2, "protocol line replaced by its override");
            assert_eq!(lines[0]["overridesProtocolLine"], true);
            assert_eq!(money(&lines[0]["subtotal"]), 70.0);
            assert_eq!(money(&lines[1]["subtotal"]), 30.0);
            assert_eq!(money(&cost["total"]), 100.0);
            Ok(())
        })
    })
    .await
}

fn custom_line(frequency: &str, value: i32, unit: &str, price: &str) -> Value {
    json!({
        "name": "Cotrimoxazole",
        "dosage": "960 mg",
        "frequency": frequency,
        "durationValue": value,
        "durationUnit": unit,
        "price": price
    })
}

#[tokio::test]
async fn extreme_custom_lines_are_bounded_or_rejected() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let preview = |line: Value| {
                json!({
                    "protocolId": c.protocol_id,
                    "startDate": "2024-05-01",
                    "customMedications": [line]
                })
            };

            let (status, cost) = app
                .json(
                    Method::POST,
                    "/api/treatments/preview-cost",
                    Some(preview(custom_line(
                        "9999999999999999999999999 times daily",
                        3650,
                        "month",
                        "1000",
                    ))),
                )
                .await?;
            assert_status(status, StatusCode::OK, "huge frequency");
            assert_eq!(money(&cost["lines"][1]["dosesPerDay"]), 24.0);

            let (status, error) = app
                .json(
                    Method::POST,
                    "/api/treatments/preview-cost",
                    Some(preview(custom_line(
                        "9999999999999999999999999 times daily",
                        3650,
                        "month",
                        "79228162514264337593543950",
                    ))),
                )
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "cost overflow");
            assert_eq!(error["error"], "invalid_request");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn negative_custom_price_is_rejected() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let patient_id = patient();
            let mut body = treatment_body(&c, &patient_id, "2024-05-01");
            body["endDate"] = json!("2024-05-10");
            body["customMedications"] = json!([custom_line("once daily", 10, "day", "-1000")]);

            let (status, _) = app.json(Method::POST, "/api/treatments", Some(body)).await?;
            assert_status(status, StatusCode::BAD_REQUEST, "negative price");

            let (_, history) = app
                .json(Method::GET, &format!("/api/patients/{patient_id}/treatments"), None)
                .await?;
            assert_eq!(history.as_array().map(Vec::len), Some(0));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn reopening_an_ended_treatment_conflicts_with_open_one() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let patient_id = patient();

            // still active, but its end date has passed
            let mut expired = treatment_body(&c, &patient_id, &days_ago(30));
            expired["endDate"] = json!(days_ago(10));
            let (status, expired) = app
                .json(Method::POST, "/api/treatments", Some(expired))
                .await?;
            assert_status(status, StatusCode::CREATED, "expired treatment");
            let expired_id = id_of(&expired["treatment"]);

            let (status, _) = app
                .json(
                    Method::POST,
                    "/api/treatments",
                    Some(treatment_body(&c, &patient_id, &days_ago(5))),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "current treatment");

            let (status, error) = app
                .json(
                    Method::PATCH,
                    &format!("/api/treatments/{expired_id}"),
                    Some(json!({ "endDate": null })),
                )
                .await?;
            assert_status(status, StatusCode::CONFLICT, "reopen expired");
            assert_eq!(error["error"], "conflict");

            let (_, unchanged) = app
                .json(Method::GET, &format!("/api/treatments/{expired_id}"), None)
                .await?;
            assert_eq!(unchanged["endDate"], json!(days_ago(10)));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn end_update_and_recalculate() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            let (_, created) = app
                .json(
                    Method::POST,
                    "/api/treatments",
                    Some(treatment_body(&c, &patient(), &days_ago(10))),
                )
                .await?;
            let id = id_of(&created["treatment"]);
            // no end date: protocol duration of 28 days
            assert_eq!(money(&created["treatment"]["totalCost"]), 280.0);

            let (status, updated) = app
                .json(
                    Method::PATCH,
                    &format!("/api/treatments/{id}"),
                    Some(json!({ "endDate": today().to_string(), "notes": "tolerating well" })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "update");
            assert_eq!(money(&updated["treatment"]["totalCost"]), 110.0);
            assert_eq!(updated["treatment"]["notes"], "tolerating well");

            let (status, recalculated) = app
                .json(
                    Method::POST,
                    &format!("/api/treatments/{id}/recalculate-cost"),
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "recalculate");
            assert_eq!(money(&recalculated["previousTotal"]), 110.0);

            let (status, ended) = app
                .json(
                    Method::POST,
                    &format!("/api/treatments/{id}/end"),
                    Some(json!({ "reason": "stopped" })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "end");
            assert_eq!(ended["status"], "stopped");
            assert_eq!(ended["endDate"], json!(today().to_string()));

            let (status, _) = app
                .json(Method::POST, &format!("/api/treatments/{id}/end"), None)
                .await?;
            assert_status(status, StatusCode::CONFLICT, "end twice");

            let (status, _) = app
                .json(Method::DELETE, &format!("/api/treatments/{id}"), None)
                .await?;
            assert_status(status, StatusCode::NO_CONTENT, "delete");
            let (status, _) = app
                .json(Method::GET, &format!("/api/treatments/{id}"), None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "deleted");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn search_filters_and_paginates() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let c = seed(&app).await?;
            for start in [days_ago(20), days_ago(10)] {
                let (status, _) = app
                    .json(
                        Method::POST,
                        "/api/treatments",
                        Some(treatment_body(&c, &patient(), &start)),
                    )
                    .await?;
                assert_status(status, StatusCode::CREATED, "open treatment");
            }
            let mut ended = treatment_body(&c, &patient(), "2023-01-01");
            ended["endDate"] = json!("2023-02-01");
            app.json(Method::POST, "/api/treatments", Some(ended)).await?;

            let (status, page) = app
                .json(Method::GET, "/api/treatments?status=active&limit=1", None)
                .await?;
            assert_status(status, StatusCode::OK, "search");
            assert_eq!(page["total"], 2);
            assert_eq!(page["totalPages"], 2);
            assert_eq!(page["items"].as_array().map(Vec::len), Some(1));
            // newest first by default
            assert_eq!(page["items"][0]["startDate"], json!(days_ago(10)));

            let (_, page) = app
                .json(Method::GET, "/api/treatments?status=ended", None)
                .await?;
            assert_eq!(page["total"], 1);

            let (_, page) = app
                .json(Method::GET, "/api/treatments?sort=asc", None)
                .await?;
            assert_eq!(page["items"][0]["startDate"], "2023-01-01");

            let (_, stats) = app.json(Method::GET, "/api/reports/treatments", None).await?;
            assert_eq!(stats["total"], 3);
            assert_eq!(stats["open"], 2);
            assert_eq!(stats["byProtocol"][0]["protocolName"], "TLD first line");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn pep_started_late_is_reported_as_critical() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let medicine_id = create_medicine(&app, "TDF/3TC/DTG", "10.00").await?;
            let protocol_id =
                create_protocol(&app, "PEP 28 days", "pep", &medicine_id, "once daily").await?;
            let exposure = Utc::now() - Duration::hours(100);

            let (status, report) = app
                .json(
                    Method::POST,
                    "/api/treatments/validate",
                    Some(json!({
                        "protocolId": protocol_id,
                        "startDate": today().to_string(),
                        "clinicalContext": { "exposureAt": exposure.to_rfc3339() }
                    })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "validate regimen");
            assert_eq!(report["isSafe"], false);
            assert_eq!(report["issues"][0]["code"], "pep_window_missed");
            assert_eq!(report["summary"]["critical"], 1);
            Ok(())
        })
    })
    .await
}
