//! Shared harness for integration tests: the full router over the in-memory store.

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use hivcare::{
    api::create_router,
    config::Config,
    state::{AppState, AppStateOptions, StorageKind},
};
use serde_json::{json, Value};
use std::{future::Future, pin::Pin};
use tower::ServiceExt;

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

#[derive(Clone)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let state = AppState::new_with_options(
            config,
            AppStateOptions {
                run_migrations: false,
                storage: StorageKind::InMemory,
            },
        )
        .await?;
        Ok(Self {
            router: create_router(state.clone()),
            state,
        })
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Vec<u8>)> {
        self.request_with_extra_headers(method, path, body, &[]).await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, bytes.to_vec()))
    }

    /// JSON in, JSON out. Empty bodies come back as `Value::Null`.
    pub async fn json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let body = body.map(|v| to_json_body(&v)).transpose()?;
        let (status, _headers, bytes) = self.request(method, path, body).await?;
        Ok((status, parse_json(&bytes)?))
    }
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> TestFuture,
{
    with_test_app_with_config(Config::in_memory(), f).await
}

pub async fn with_test_app_with_config<F>(config: Config, f: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> TestFuture,
{
    let app = TestApp::new(config).await?;
    f(app).await
}

pub fn to_json_body(value: &Value) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn parse_json(body: &[u8]) -> anyhow::Result<Value> {
    if body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(body)?)
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(
        actual, expected,
        "{context}: expected {expected}, got {actual}"
    );
}

/// Decimals serialize as strings; accept numbers too.
pub fn money(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(f64::NAN),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

pub fn id_of(value: &Value) -> String {
    value["id"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| panic!("no id in {value}"))
}

pub async fn create_doctor(app: &TestApp, name: &str, email: &str) -> anyhow::Result<String> {
    let (status, body) = app
        .json(
            Method::POST,
            "/api/doctors",
            Some(json!({
                "fullName": name,
                "email": email,
                "specialization": "Infectious diseases",
                "experienceYears": 5
            })),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create doctor");
    Ok(id_of(&body))
}

pub async fn create_medicine(app: &TestApp, name: &str, unit_price: &str) -> anyhow::Result<String> {
    let (status, body) = app
        .json(
            Method::POST,
            "/api/medicines",
            Some(json!({ "name": name, "unit": "tablet", "unitPrice": unit_price })),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create medicine");
    Ok(id_of(&body))
}

/// Protocol with one medicine taken at `frequency` and no per-line duration.
pub async fn create_protocol(
    app: &TestApp,
    name: &str,
    category: &str,
    medicine_id: &str,
    frequency: &str,
) -> anyhow::Result<String> {
    let (status, body) = app
        .json(
            Method::POST,
            "/api/protocols",
            Some(json!({
                "name": name,
                "category": category,
                "durationDays": 28,
                "medicines": [{
                    "medicineId": medicine_id,
                    "dosage": "1 tablet",
                    "frequency": frequency
                }]
            })),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create protocol");
    Ok(id_of(&body))
}
