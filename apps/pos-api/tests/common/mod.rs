//! HTTP harness for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use pos_api::password::hash_password;
use pos_api::{build_router, AppConfig, AppState};

pub const ADMIN: &str = "ADMIN";
pub const ADMIN_PASSWORD: &str = "admin-pass";

pub struct Harness {
    pub app: Router,
    pub state: Arc<AppState>,
    pub dir: TempDir,
}

pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
}

impl Reply {
    pub fn result(&self) -> &Value {
        &self.body["result"]
    }
}

/// Fresh in-memory server with one administrator.
pub async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::connect(AppConfig::for_tests(dir.path())).await.unwrap();

    let mut session = state.db.begin().await.unwrap();
    let hash = hash_password(ADMIN_PASSWORD).unwrap();
    session.users().create(ADMIN, "", &hash, true, None).await.unwrap();
    session.commit().await.unwrap();

    let state = Arc::new(state);
    Harness {
        app: build_router(state.clone()),
        state,
        dir,
    }
}

impl Harness {
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self.app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply { status, body }
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Reply {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> Reply {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn login(&self, name: &str, password: &str) -> String {
        let reply = self
            .call(
                Method::POST,
                "/login",
                None,
                Some(json!({ "name": name, "password": password })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.result()["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN, ADMIN_PASSWORD).await
    }

    /// Medicine with TAB first and BOX = 10 TAB second.
    pub async fn medicine(&self, token: &str, barcode: &str, qty: f64) -> i64 {
        let reply = self
            .post(
                "/medicine",
                token,
                json!({
                    "barcode": barcode,
                    "name": format!("med {barcode}"),
                    "qty": qty,
                    "firstUnit": "TAB",
                    "firstPrice": 1000,
                    "secondUnit": "BOX",
                    "secondUnitToFirstUnitRatio": 10,
                    "secondPrice": 9500
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.result()["id"].as_i64().unwrap()
    }

    pub async fn on_hand(&self, token: &str, barcode: &str) -> f64 {
        let reply = self.get(&format!("/medicine/{barcode}"), token).await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        reply.result()[0]["qty"].as_f64().unwrap()
    }

    pub async fn customer(&self, token: &str, name: &str) -> i64 {
        let reply = self.post("/customer", token, json!({ "name": name })).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.result()["id"].as_i64().unwrap()
    }

    pub async fn supplier(&self, token: &str, name: &str) -> i64 {
        let reply = self
            .post(
                "/supplier",
                token,
                json!({
                    "name": name,
                    "address": "Jl. Merdeka 1",
                    "companyPhoneNumber": "021",
                    "terms": "COD"
                }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.result()["id"].as_i64().unwrap()
    }
}

/// Sales invoice body; lines are `(barcode, unit, qty)`.
pub fn invoice(number: i64, customer: i64, lines: &[(&str, &str, f64)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(barcode, unit, qty)| {
            json!({ "barcode": barcode, "unit": unit, "qty": qty, "price": 1000, "subtotal": 1000.0 * qty })
        })
        .collect();
    json!({
        "number": number,
        "customerId": customer,
        "subtotal": 0,
        "totalPrice": 0,
        "paidAmount": 0,
        "paymentMethodName": "cash",
        "invoiceDate": "2024-03-01",
        "medicineLists": items
    })
}

/// Purchase invoice body; lines are `(barcode, unit, qty)`.
pub fn purchase(number: i64, supplier: i64, lines: &[(&str, &str, f64)]) -> Value {
    let items: Vec<Value> = lines
        .iter()
        .map(|(barcode, unit, qty)| json!({ "barcode": barcode, "unit": unit, "qty": qty }))
        .collect();
    json!({
        "number": number,
        "supplierId": supplier,
        "subtotal": 0,
        "totalPrice": 0,
        "invoiceDate": "2024-03-01",
        "purchaseMedicineList": items
    })
}
