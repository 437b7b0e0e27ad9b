#![allow(unused)]
#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use support::*;

async fn seed_doctors(app: &TestApp, n: usize) -> anyhow::Result<Vec<String>> {
    let mut ids = Vec::new();
    for i in 0..n {
        ids.push(create_doctor(app, &format!("Doctor {i}"), &format!("doctor{i}@clinic.test")).await?);
    }
    Ok(ids)
}

fn rows(week: &Value) -> Vec<Value> {
    week["schedules"].as_array().cloned().unwrap_or_default()
}

#[tokio::test]
async fn generate_week_normalises_to_monday_and_fills_slots() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            seed_doctors(&app, 4).await?;

            // 2024-06-13 is a Thursday
            let (status, week) = app
                .json(
                    Method::POST,
                    "/api/schedules/generate",
                    Some(json!({ "weekStart": "2024-06-13", "seed": 7 })),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "generate week");
            assert_eq!(week["weekStart"], "2024-06-10");
            assert_eq!(week["weekEnd"], "2024-06-16");
            assert_eq!(week["unfilled"], json!([]));

            // Monday to Saturday, two shifts, two doctors each
            let schedules = rows(&week);
            assert_eq!(schedules.len(), 24);
            assert!(schedules.iter().all(|r| r["date"] != "2024-06-16"));

            let mut per_doctor: HashMap<String, usize> = HashMap::new();
            for row in &schedules {
                *per_doctor.entry(row["doctorId"].to_string()).or_default() += 1;
            }
            assert!(per_doctor.values().all(|n| *n <= 6));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn existing_week_conflicts_without_overwrite() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            seed_doctors(&app, 2).await?;
            let request = json!({ "weekStart": "2024-06-10", "doctorsPerShift": 1, "seed": 1 });

            let (status, _) = app
                .json(Method::POST, "/api/schedules/generate", Some(request.clone()))
                .await?;
            assert_status(status, StatusCode::CREATED, "first run");

            let (status, _) = app
                .json(Method::POST, "/api/schedules/generate", Some(request.clone()))
                .await?;
            assert_status(status, StatusCode::CONFLICT, "second run");

            let mut overwrite = request;
            overwrite["overwrite"] = json!(true);
            let (status, week) = app
                .json(Method::POST, "/api/schedules/generate", Some(overwrite))
                .await?;
            assert_status(status, StatusCode::CREATED, "overwrite");

            let (_, listed) = app
                .json(
                    Method::GET,
                    "/api/schedules?from=2024-06-10&to=2024-06-16",
                    None,
                )
                .await?;
            assert_eq!(listed.as_array().map(Vec::len), Some(rows(&week).len()));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn leave_is_respected_and_understaffing_reported() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let ids = seed_doctors(&app, 2).await?;

            let (status, leave) = app
                .json(
                    Method::POST,
                    "/api/schedules/leave",
                    Some(json!({ "doctorId": ids[0], "date": "2024-06-10", "shift": "morning" })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "mark off");
            assert_eq!(leave["isOff"], true);

            let (status, week) = app
                .json(
                    Method::POST,
                    "/api/schedules/generate",
                    Some(json!({ "weekStart": "2024-06-10", "doctorsPerShift": 2, "seed": 3 })),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "generate");

            let monday_morning: Vec<Value> = rows(&week)
                .into_iter()
                .filter(|r| r["date"] == "2024-06-10" && r["shift"] == "morning")
                .collect();
            assert_eq!(monday_morning.len(), 1);
            assert_eq!(monday_morning[0]["doctorId"], json!(ids[1]));

            let unfilled = week["unfilled"].as_array().cloned().unwrap_or_default();
            assert!(unfilled.iter().any(|s| s["date"] == "2024-06-10"
                && s["shift"] == "morning"
                && s["assigned"] == 1));

            // the leave marker survives the run
            let (_, listed) = app
                .json(
                    Method::GET,
                    &format!("/api/schedules?from=2024-06-10&to=2024-06-10&doctorId={}", ids[0]),
                    None,
                )
                .await?;
            let listed = listed.as_array().cloned().unwrap_or_default();
            assert!(listed.iter().any(|r| r["shift"] == "morning" && r["isOff"] == true));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn generate_without_doctors_is_rejected() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _) = app
                .json(
                    Method::POST,
                    "/api/schedules/generate",
                    Some(json!({ "weekStart": "2024-06-10" })),
                )
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "no doctors");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn workload_counts_scheduled_shifts() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            seed_doctors(&app, 2).await?;
            app.json(
                Method::POST,
                "/api/schedules/generate",
                Some(json!({ "weekStart": "2024-06-10", "doctorsPerShift": 1, "seed": 5 })),
            )
            .await?;

            let (status, workload) = app
                .json(
                    Method::GET,
                    "/api/reports/doctor-workload?from=2024-06-10&to=2024-06-16",
                    None,
                )
                .await?;
            assert_status(status, StatusCode::OK, "workload");
            let total: u64 = workload
                .as_array()
                .map(|rows| rows.iter().filter_map(|r| r["scheduledShifts"].as_u64()).sum())
                .unwrap_or(0);
            assert_eq!(total, 12);

            let (status, _) = app
                .json(Method::GET, "/api/reports/doctor-workload", None)
                .await?;
            assert_status(status, StatusCode::BAD_REQUEST, "range required");
            Ok(())
        })
    })
    .await
}
