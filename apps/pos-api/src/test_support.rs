//! Fixtures for unit tests: an in-memory state, one administrator and a
//! few catalogue rows.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use crate::gate::Caller;
use crate::password::hash_password;
use crate::{AppConfig, AppState};
use pharma_core::{Id, InvoiceDraft, MedicineInput, NamedInput, PurchaseInvoiceDraft, SupplierInput};

pub const ADMIN_PASSWORD: &str = "admin-pass";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub admin: Caller,
    /// Keeps the static tree alive.
    pub dir: TempDir,
}

pub async fn state() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::connect(AppConfig::for_tests(dir.path())).await.unwrap();

    let mut session = state.db.begin().await.unwrap();
    let hash = hash_password(ADMIN_PASSWORD).unwrap();
    let id = session.users().create("ADMIN", "", &hash, true, None).await.unwrap();
    session.commit().await.unwrap();

    TestApp {
        state: Arc::new(state),
        admin: Caller {
            id,
            name: "ADMIN".into(),
            admin: true,
        },
        dir,
    }
}

/// A non-admin user.
pub async fn cashier(app: &TestApp) -> Caller {
    let mut session = app.state.db.begin().await.unwrap();
    let hash = hash_password("cashier-pass").unwrap();
    let id = session
        .users()
        .create("KASIR", "", &hash, false, Some(app.admin.id))
        .await
        .unwrap();
    session.commit().await.unwrap();
    Caller {
        id,
        name: "KASIR".into(),
        admin: false,
    }
}

fn medicine_input(barcode: &str, qty: f64) -> MedicineInput {
    serde_json::from_value(json!({
        "barcode": barcode,
        "name": format!("med {barcode}"),
        "qty": qty,
        "firstUnit": "TAB",
        "firstPrice": 1000,
        "secondUnit": "BOX",
        "secondUnitToFirstUnitRatio": 10,
        "secondPrice": 9500
    }))
    .unwrap()
}

/// Medicine with TAB first and BOX = 10 TAB second.
pub async fn medicine(app: &TestApp, barcode: &str, qty: f64) -> Id {
    let mut session = app.state.db.begin().await.unwrap();
    let id = session
        .medicines()
        .create(&medicine_input(barcode, qty), app.admin.id)
        .await
        .unwrap();
    session.commit().await.unwrap();
    id
}

/// Rewrites a medicine's second slot; an empty `unit` clears it.
pub async fn rerate(app: &TestApp, medicine: Id, barcode: &str, unit: &str, ratio: f64) {
    let mut input = medicine_input(barcode, 0.0);
    input.second_unit = unit.to_string();
    input.second_unit_to_first_unit_ratio = ratio;

    let mut session = app.state.db.begin().await.unwrap();
    session.medicines().modify(medicine, &input, app.admin.id).await.unwrap();
    session.commit().await.unwrap();
}

/// Soft-deletes a medicine.
pub async fn retire(app: &TestApp, medicine: Id) {
    let mut session = app.state.db.begin().await.unwrap();
    session.medicines().soft_delete(medicine, app.admin.id).await.unwrap();
    session.commit().await.unwrap();
}

pub async fn customer(app: &TestApp) -> Id {
    let mut session = app.state.db.begin().await.unwrap();
    let id = session
        .customers()
        .create(&NamedInput { name: "Budi".into() }, app.admin.id)
        .await
        .unwrap();
    session.commit().await.unwrap();
    id
}

pub async fn supplier(app: &TestApp) -> Id {
    let input = SupplierInput {
        name: "PT Sehat".into(),
        address: "Jl. Merdeka 1".into(),
        company_phone_number: "021".into(),
        contact_person_name: String::new(),
        contact_person_number: String::new(),
        terms: "COD".into(),
        vendor_is_taxable: false,
    };
    let mut session = app.state.db.begin().await.unwrap();
    let id = session.suppliers().create(&input, app.admin.id).await.unwrap();
    session.commit().await.unwrap();
    id
}

/// Sales invoice dated 2024-03-01; lines are `(barcode, unit, qty)`.
pub fn invoice(number: i64, customer: Id, lines: &[(&str, &str, f64)]) -> InvoiceDraft {
    let items: Vec<_> = lines
        .iter()
        .map(|(barcode, unit, qty)| {
            json!({ "barcode": barcode, "unit": unit, "qty": qty, "price": 1000,
                    "subtotal": 1000.0 * qty })
        })
        .collect();
    serde_json::from_value(json!({
        "number": number,
        "customerId": customer,
        "subtotal": 0,
        "totalPrice": 0,
        "paidAmount": 0,
        "paymentMethodName": "cash",
        "invoiceDate": "2024-03-01",
        "medicineLists": items
    }))
    .unwrap()
}

/// Purchase invoice dated 2024-03-01; lines are `(barcode, unit, qty)`.
pub fn purchase(number: i64, supplier: Id, lines: &[(&str, &str, f64)]) -> PurchaseInvoiceDraft {
    let items: Vec<_> = lines
        .iter()
        .map(|(barcode, unit, qty)| json!({ "barcode": barcode, "unit": unit, "qty": qty }))
        .collect();
    serde_json::from_value(json!({
        "number": number,
        "supplierId": supplier,
        "subtotal": 0,
        "totalPrice": 0,
        "invoiceDate": "2024-03-01",
        "purchaseMedicineList": items
    }))
    .unwrap()
}

pub async fn on_hand(app: &TestApp, medicine: Id) -> f64 {
    let mut session = app.state.db.read().await.unwrap();
    session.medicines().get_by_id(medicine).await.unwrap().unwrap().qty
}

pub async fn history_balance(app: &TestApp, medicine: Id) -> f64 {
    let mut session = app.state.db.read().await.unwrap();
    session.medicines().history_balance(medicine).await.unwrap()
}
