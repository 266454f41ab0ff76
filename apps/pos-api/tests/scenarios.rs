//! End-to-end scenarios through the full router.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{harness, invoice, purchase, ADMIN, ADMIN_PASSWORD};

// =============================================================================
// Stock movements
// =============================================================================

#[tokio::test]
async fn test_sale_decrements_in_base_units() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 100.0).await;
    let customer = h.customer(&token, "Budi").await;

    let reply = h
        .post(
            "/invoice",
            &token,
            invoice(1, customer, &[("A1", "TAB", 30.0), ("A1", "BOX", 2.0)]),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.result()["number"], 1);
    assert_eq!(
        reply.result()["pdfUrl"],
        "http://localhost:19230/static/export/pdf/invoice/invoice-1-2024-03-01.pdf"
    );

    assert_eq!(h.on_hand(&token, "A1").await, 50.0);
}

#[tokio::test]
async fn test_oversell_is_rejected_and_logged() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 10.0).await;
    let customer = h.customer(&token, "Budi").await;

    let reply = h
        .post("/invoice", &token, invoice(1, customer, &[("A1", "BOX", 2.0)]))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", reply.body);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["message"], "InsufficientStock");
    assert!(reply.body["error"].as_str().unwrap().contains("A1"));

    let log = reply.body["log"].as_str().unwrap();
    let log_data = reply.body["logData"].as_str().unwrap();
    assert!(log_data.ends_with(log));
    let written = std::fs::read_to_string(h.dir.path().join(log_data)).unwrap();
    assert!(written.contains("POST /invoice"));

    assert_eq!(h.on_hand(&token, "A1").await, 10.0);
    let next = h.get("/invoice", &token).await;
    assert_eq!(next.result()["nextNumber"], 1);
}

#[tokio::test]
async fn test_purchase_converts_second_unit() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 0.0).await;
    let supplier = h.supplier(&token, "PT Sehat").await;

    let reply = h
        .post("/invoice/purchase", &token, purchase(1, supplier, &[("A1", "BOX", 5.0)]))
        .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    assert_eq!(h.on_hand(&token, "A1").await, 50.0);

    let id = h.get("/medicine/A1", &token).await.result()[0]["id"].clone();
    let history = h
        .post(
            "/medicine/history",
            &token,
            json!({ "id": id, "startDate": "2024-01-01", "endDate": "2024-12-31" }),
        )
        .await;
    assert_eq!(history.status, StatusCode::OK, "{}", history.body);
    assert!(!history.result().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_number_conflicts() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 100.0).await;
    let customer = h.customer(&token, "Budi").await;

    let first = h
        .post("/invoice", &token, invoice(7, customer, &[("A1", "TAB", 1.0)]))
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{}", first.body);

    let second = h
        .post("/invoice", &token, invoice(7, customer, &[("A1", "TAB", 1.0)]))
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST, "{}", second.body);
    assert_eq!(second.body["message"], "Conflict");

    assert_eq!(h.on_hand(&token, "A1").await, 99.0);
    let next = h.get("/invoice", &token).await;
    assert_eq!(next.result()["nextNumber"], 8);
}

#[tokio::test]
async fn test_modify_swaps_lines_atomically() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A", 100.0).await;
    h.medicine(&token, "B", 100.0).await;
    let customer = h.customer(&token, "Budi").await;

    let created = h
        .post("/invoice", &token, invoice(1, customer, &[("A", "TAB", 10.0)]))
        .await;
    let id = created.result()["id"].clone();

    let reply = h
        .call(
            Method::PATCH,
            "/invoice",
            Some(&token),
            Some(json!({
                "id": id,
                "newData": invoice(1, customer, &[("A", "TAB", 12.0), ("B", "TAB", 5.0)])
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.result()["medicineLists"].as_array().unwrap().len(), 2);
    assert!(reply.body["logData"].as_str().unwrap().starts_with("log/modify/invoice/"));

    assert_eq!(h.on_hand(&token, "A").await, 88.0);
    assert_eq!(h.on_hand(&token, "B").await, 95.0);

    // A failing modify leaves the previous version in force.
    let rejected = h
        .call(
            Method::PATCH,
            "/invoice",
            Some(&token),
            Some(json!({
                "id": id,
                "newData": invoice(1, customer, &[("A", "TAB", 1.0), ("B", "TAB", 500.0)])
            })),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST, "{}", rejected.body);
    assert_eq!(h.on_hand(&token, "A").await, 88.0);
    assert_eq!(h.on_hand(&token, "B").await, 95.0);
}

#[tokio::test]
async fn test_delete_restores_stock() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 100.0).await;
    let customer = h.customer(&token, "Budi").await;

    let created = h
        .post("/invoice", &token, invoice(1, customer, &[("A1", "TAB", 40.0)]))
        .await;
    let id = created.result()["id"].clone();

    let reply = h
        .call(Method::DELETE, "/invoice", Some(&token), Some(json!({ "id": id })))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(reply.result()["number"], 1);
    assert_eq!(h.on_hand(&token, "A1").await, 100.0);

    let detail = h.post("/invoice/detail", &token, json!({ "id": id })).await;
    assert_eq!(detail.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail.body["message"], "NotFound");
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_second_login_revokes_first_token() {
    let h = harness().await;
    let first = h.admin_token().await;

    let current = h.get("/user/current", &first).await;
    assert_eq!(current.status, StatusCode::OK, "{}", current.body);
    assert_eq!(current.result()["name"], ADMIN);

    let second = h.login("admin", ADMIN_PASSWORD).await;
    assert_ne!(first, second);

    let stale = h.get("/user/current", &first).await;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    assert_eq!(stale.body["message"], "Unauthorized");

    let fresh = h.get("/user/current", &second).await;
    assert_eq!(fresh.status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_and_bad_credentials() {
    let h = harness().await;

    let anonymous = h.call(Method::GET, "/customer/all", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let forged = h.get("/customer/all", "not-a-token").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let login = h
        .call(
            Method::POST,
            "/login",
            None,
            Some(json!({ "name": ADMIN, "password": "wrong-pass" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert!(login.body["log"].is_string());
}

#[tokio::test]
async fn test_cashier_cannot_delete_documents() {
    let h = harness().await;
    let admin = h.admin_token().await;
    h.medicine(&admin, "A1", 100.0).await;
    let customer = h.customer(&admin, "Budi").await;

    let enrolled = h
        .post(
            "/user",
            &admin,
            json!({
                "adminPassword": ADMIN_PASSWORD,
                "name": "KASIR",
                "password": "cashier-pass"
            }),
        )
        .await;
    assert_eq!(enrolled.status, StatusCode::CREATED, "{}", enrolled.body);
    let cashier = h.login("KASIR", "cashier-pass").await;

    let created = h
        .post("/invoice", &cashier, invoice(1, customer, &[("A1", "TAB", 5.0)]))
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.result()["userName"], "KASIR");

    let id = created.result()["id"].clone();
    let reply = h
        .call(Method::DELETE, "/invoice", Some(&cashier), Some(json!({ "id": id })))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN, "{}", reply.body);
    assert_eq!(h.on_hand(&admin, "A1").await, 95.0);
}

// =============================================================================
// Artifacts and plumbing
// =============================================================================

#[tokio::test]
async fn test_blocked_export_answers_multi_status() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 100.0).await;
    let customer = h.customer(&token, "Budi").await;
    std::fs::write(h.dir.path().join("export"), b"not a directory").unwrap();

    let reply = h
        .post("/invoice", &token, invoice(1, customer, &[("A1", "TAB", 3.0)]))
        .await;
    assert_eq!(reply.status, StatusCode::MULTI_STATUS, "{}", reply.body);
    assert_eq!(reply.body["success"], true);
    assert!(reply.body["error"].is_string());
    assert!(reply.result()["pdfUrl"].is_null());
    assert_eq!(h.on_hand(&token, "A1").await, 97.0);
}

#[tokio::test]
async fn test_rendered_pdf_is_served() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 100.0).await;
    let customer = h.customer(&token, "Budi").await;
    h.post("/invoice", &token, invoice(1, customer, &[("A1", "TAB", 1.0)]))
        .await;

    let reply = h
        .call(
            Method::GET,
            "/static/export/pdf/invoice/invoice-1-2024-03-01.pdf",
            None,
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_till_receipt_prints_once() {
    let h = harness().await;
    let token = h.admin_token().await;
    h.medicine(&token, "A1", 100.0).await;
    let customer = h.customer(&token, "Budi").await;
    let created = h
        .post("/invoice", &token, invoice(5, customer, &[("A1", "TAB", 1.0)]))
        .await;
    let id = created.result()["id"].clone();

    let reply = h
        .post("/invoice/print-receipt", &token, json!({ "id": id }))
        .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    assert_eq!(
        reply.result()["receiptPdfUrl"],
        "http://localhost:19230/static/export/pdf/receipt/receipt-5-2024-03-01.pdf"
    );
    let served = h
        .call(
            Method::GET,
            "/static/export/pdf/receipt/receipt-5-2024-03-01.pdf",
            None,
            None,
        )
        .await;
    assert_eq!(served.status, StatusCode::OK);

    let again = h
        .post("/invoice/print-receipt", &token, json!({ "id": id }))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST, "{}", again.body);
    assert_eq!(again.body["message"], "Conflict");

    // Purchase invoices have no receipt.
    let other = h
        .post("/invoice/purchase/print-receipt", &token, json!({ "id": id }))
        .await;
    assert_eq!(other.status, StatusCode::BAD_REQUEST);
    assert_eq!(other.body["message"], "NotFound");
}

#[tokio::test]
async fn test_options_health_and_unknown_route() {
    let h = harness().await;

    let options = h.call(Method::OPTIONS, "/invoice", None, None).await;
    assert_eq!(options.status, StatusCode::OK);

    let health = h.call(Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK, "{}", health.body);
    assert_eq!(health.result()["status"], "SERVING");

    let token = h.admin_token().await;
    let missing = h.get("/no-such-route", &token).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body["message"], "NotFound");
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let h = harness().await;
    let token = h.admin_token().await;

    let reply = h.post("/invoice", &token, json!({ "number": "seven" })).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", reply.body);
    assert_eq!(reply.body["message"], "BadPayload");
}
