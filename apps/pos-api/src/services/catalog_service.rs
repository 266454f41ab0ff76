//! # Catalogue Service
//!
//! CRUD for the lookup entities behind one generic service.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Catalog<E: CatalogEntity>                                              │
//! │                                                                         │
//! │  create  ──► validate ──► BEGIN ──► E::create ──► read back ──► COMMIT  │
//! │  find    ──► "all" | numeric id | E::search                             │
//! │  modify  ──► previous ──► E::modify ──► COMMIT ──► audit(modify)        │
//! │  delete  ──► previous ──► E::delete ──► COMMIT ──► audit(delete)        │
//! │                                                                         │
//! │  customer · doctor · patient · supplier · medicine     soft delete      │
//! │  unit · payment-method                                 hard delete      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The company profile is a single row and has its own [`CompanyService`].

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;

use crate::audit::AuditKind;
use crate::error::{ApiError, ApiResult};
use crate::gate::Caller;
use crate::AppState;
use pharma_core::validation::Validate;
use pharma_core::{
    CompanyProfile, CompanyProfileInput, Customer, DateRange, Doctor, Id, LookupInput, Lookup,
    Medicine, MedicineHistory, MedicineInput, NamedInput, Patient, PatientInput, PaymentMethod,
    Supplier, SupplierInput, Unit,
};
use pharma_db::{
    CompanyRepository, DbError, DbResult, LookupRepository, MedicineRepository,
    NamedPartyRepository, PatientRepository, SupplierRepository,
};

// =============================================================================
// Entity protocol
// =============================================================================

/// Storage of one catalogue entity, as the generic service needs it.
#[async_trait]
pub trait CatalogEntity: Serialize + Send + Sync + Sized + 'static {
    type Input: Validate + DeserializeOwned + Send + Sync;

    /// Route segment and audit folder.
    const ENTITY: &'static str;
    /// Human name used in messages.
    const LABEL: &'static str;

    async fn get_by_id(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Self>>;

    /// Case-insensitive name search.
    async fn search(conn: &mut SqliteConnection, val: &str) -> DbResult<Vec<Self>>;

    async fn get_all(conn: &mut SqliteConnection) -> DbResult<Vec<Self>>;

    async fn create(conn: &mut SqliteConnection, input: &Self::Input, actor: Id) -> DbResult<Id>;

    async fn modify(
        conn: &mut SqliteConnection,
        id: Id,
        input: &Self::Input,
        actor: Id,
    ) -> DbResult<()>;

    async fn delete(conn: &mut SqliteConnection, id: Id, actor: Id) -> DbResult<()>;
}

macro_rules! named_party {
    ($ty:ty, $entity:literal, $label:literal) => {
        #[async_trait]
        impl CatalogEntity for $ty {
            type Input = NamedInput;
            const ENTITY: &'static str = $entity;
            const LABEL: &'static str = $label;

            async fn get_by_id(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Self>> {
                NamedPartyRepository::<$ty>::new(conn).get_by_id(id).await
            }

            async fn search(conn: &mut SqliteConnection, val: &str) -> DbResult<Vec<Self>> {
                NamedPartyRepository::<$ty>::new(conn).get_by_search_name(val).await
            }

            async fn get_all(conn: &mut SqliteConnection) -> DbResult<Vec<Self>> {
                NamedPartyRepository::<$ty>::new(conn).get_all().await
            }

            async fn create(conn: &mut SqliteConnection, input: &NamedInput, actor: Id) -> DbResult<Id> {
                NamedPartyRepository::<$ty>::new(conn).create(input, actor).await
            }

            async fn modify(
                conn: &mut SqliteConnection,
                id: Id,
                input: &NamedInput,
                actor: Id,
            ) -> DbResult<()> {
                NamedPartyRepository::<$ty>::new(conn).modify(id, input, actor).await
            }

            async fn delete(conn: &mut SqliteConnection, id: Id, actor: Id) -> DbResult<()> {
                NamedPartyRepository::<$ty>::new(conn).soft_delete(id, actor).await
            }
        }
    };
}

named_party!(Customer, "customer", "Customer");
named_party!(Doctor, "doctor", "Doctor");

// Unit and payment method rows carry no audit columns; `actor` is unused.
macro_rules! lookup_table {
    ($ty:ty, $entity:literal, $label:literal) => {
        #[async_trait]
        impl CatalogEntity for $ty {
            type Input = LookupInput;
            const ENTITY: &'static str = $entity;
            const LABEL: &'static str = $label;

            async fn get_by_id(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Self>> {
                LookupRepository::<$ty>::new(conn).get_by_id(id).await
            }

            async fn search(conn: &mut SqliteConnection, val: &str) -> DbResult<Vec<Self>> {
                LookupRepository::<$ty>::new(conn).get_by_search_name(val).await
            }

            async fn get_all(conn: &mut SqliteConnection) -> DbResult<Vec<Self>> {
                LookupRepository::<$ty>::new(conn).get_all().await
            }

            async fn create(conn: &mut SqliteConnection, input: &LookupInput, _actor: Id) -> DbResult<Id> {
                let row = LookupRepository::<$ty>::new(conn).create(&input.name).await?;
                Ok(row.id)
            }

            async fn modify(
                conn: &mut SqliteConnection,
                id: Id,
                input: &LookupInput,
                _actor: Id,
            ) -> DbResult<()> {
                LookupRepository::<$ty>::new(conn).modify(id, &input.name).await?;
                Ok(())
            }

            async fn delete(conn: &mut SqliteConnection, id: Id, _actor: Id) -> DbResult<()> {
                LookupRepository::<$ty>::new(conn).delete(id).await
            }
        }
    };
}

lookup_table!(Unit, "unit", "Unit");
lookup_table!(PaymentMethod, "payment-method", "Payment method");

#[async_trait]
impl CatalogEntity for Patient {
    type Input = PatientInput;
    const ENTITY: &'static str = "patient";
    const LABEL: &'static str = "Patient";

    async fn get_by_id(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Self>> {
        PatientRepository::new(conn).get_by_id(id).await
    }

    async fn search(conn: &mut SqliteConnection, val: &str) -> DbResult<Vec<Self>> {
        PatientRepository::new(conn).get_by_search_name(val).await
    }

    async fn get_all(conn: &mut SqliteConnection) -> DbResult<Vec<Self>> {
        PatientRepository::new(conn).get_all().await
    }

    async fn create(conn: &mut SqliteConnection, input: &PatientInput, actor: Id) -> DbResult<Id> {
        PatientRepository::new(conn).create(input, actor).await
    }

    async fn modify(conn: &mut SqliteConnection, id: Id, input: &PatientInput, actor: Id) -> DbResult<()> {
        PatientRepository::new(conn).modify(id, input, actor).await
    }

    async fn delete(conn: &mut SqliteConnection, id: Id, actor: Id) -> DbResult<()> {
        PatientRepository::new(conn).soft_delete(id, actor).await
    }
}

#[async_trait]
impl CatalogEntity for Supplier {
    type Input = SupplierInput;
    const ENTITY: &'static str = "supplier";
    const LABEL: &'static str = "Supplier";

    async fn get_by_id(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Self>> {
        SupplierRepository::new(conn).get_by_id(id).await
    }

    async fn search(conn: &mut SqliteConnection, val: &str) -> DbResult<Vec<Self>> {
        SupplierRepository::new(conn).get_by_search_name(val).await
    }

    async fn get_all(conn: &mut SqliteConnection) -> DbResult<Vec<Self>> {
        SupplierRepository::new(conn).get_all().await
    }

    async fn create(conn: &mut SqliteConnection, input: &SupplierInput, actor: Id) -> DbResult<Id> {
        SupplierRepository::new(conn).create(input, actor).await
    }

    async fn modify(conn: &mut SqliteConnection, id: Id, input: &SupplierInput, actor: Id) -> DbResult<()> {
        SupplierRepository::new(conn).modify(id, input, actor).await
    }

    async fn delete(conn: &mut SqliteConnection, id: Id, actor: Id) -> DbResult<()> {
        SupplierRepository::new(conn).soft_delete(id, actor).await
    }
}

#[async_trait]
impl CatalogEntity for Medicine {
    type Input = MedicineInput;
    const ENTITY: &'static str = "medicine";
    const LABEL: &'static str = "Medicine";

    async fn get_by_id(conn: &mut SqliteConnection, id: Id) -> DbResult<Option<Self>> {
        MedicineRepository::new(conn).get_by_id(id).await
    }

    /// An exact barcode wins over the name search.
    async fn search(conn: &mut SqliteConnection, val: &str) -> DbResult<Vec<Self>> {
        let mut medicines = MedicineRepository::new(conn);
        if let Some(medicine) = medicines.get_by_barcode(val.trim()).await? {
            return Ok(vec![medicine]);
        }
        medicines.get_by_search_name(val).await
    }

    async fn get_all(conn: &mut SqliteConnection) -> DbResult<Vec<Self>> {
        MedicineRepository::new(conn).get_all().await
    }

    async fn create(conn: &mut SqliteConnection, input: &MedicineInput, actor: Id) -> DbResult<Id> {
        MedicineRepository::new(conn).create(input, actor).await
    }

    async fn modify(conn: &mut SqliteConnection, id: Id, input: &MedicineInput, actor: Id) -> DbResult<()> {
        MedicineRepository::new(conn).modify(id, input, actor).await
    }

    async fn delete(conn: &mut SqliteConnection, id: Id, actor: Id) -> DbResult<()> {
        MedicineRepository::new(conn).soft_delete(id, actor).await
    }
}

// =============================================================================
// Service
// =============================================================================

/// Generic CRUD over one [`CatalogEntity`].
///
/// ## Usage
/// ```rust,ignore
/// let customers = Catalog::<Customer>::new(&state).find("budi").await?;
/// ```
pub struct Catalog<'a, E: CatalogEntity> {
    state: &'a AppState,
    _entity: PhantomData<E>,
}

impl<'a, E: CatalogEntity> Catalog<'a, E> {
    pub fn new(state: &'a AppState) -> Self {
        Catalog {
            state,
            _entity: PhantomData,
        }
    }

    async fn load(conn: &mut SqliteConnection, id: Id) -> ApiResult<E> {
        Ok(E::get_by_id(conn, id)
            .await?
            .ok_or_else(|| DbError::not_found(E::LABEL, id))?)
    }

    pub async fn create(&self, caller: &Caller, input: &E::Input) -> ApiResult<E> {
        input.validate()?;
        let mut session = self.state.db.begin().await?;
        let id = E::create(session.conn(), input, caller.id).await?;
        let created = Self::load(session.conn(), id).await?;
        session.commit().await?;

        info!(entity = E::ENTITY, id = id, user = %caller.name, "Created");
        Ok(created)
    }

    /// `all`, a numeric id or a name search.
    pub async fn find(&self, val: &str) -> ApiResult<Vec<E>> {
        let mut session = self.state.db.read().await?;
        if val.trim().eq_ignore_ascii_case("all") {
            return Ok(E::get_all(session.conn()).await?);
        }
        match Lookup::parse(val) {
            Lookup::Id(id) => Ok(vec![Self::load(session.conn(), id).await?]),
            Lookup::Name(name) => Ok(E::search(session.conn(), &name).await?),
        }
    }

    pub async fn detail(&self, id: Id) -> ApiResult<E> {
        let mut session = self.state.db.read().await?;
        Self::load(session.conn(), id).await
    }

    /// Overwrites the entity; returns it with the audit file name.
    pub async fn modify(
        &self,
        caller: &Caller,
        id: Id,
        input: &E::Input,
    ) -> ApiResult<(E, Option<String>)> {
        input.validate()?;
        let mut session = self.state.db.begin().await?;
        let previous = Self::load(session.conn(), id).await?;
        E::modify(session.conn(), id, input, caller.id).await?;
        let modified = Self::load(session.conn(), id).await?;
        session.commit().await?;

        let log = self
            .state
            .audit
            .record(AuditKind::Modify, E::ENTITY, &caller.name, id, &previous)
            .await;
        Ok((modified, log))
    }

    pub async fn delete(&self, caller: &Caller, id: Id) -> ApiResult<Option<String>> {
        let mut session = self.state.db.begin().await?;
        let previous = Self::load(session.conn(), id).await?;
        E::delete(session.conn(), id, caller.id).await?;
        session.commit().await?;

        info!(entity = E::ENTITY, id = id, user = %caller.name, "Deleted");
        Ok(self
            .state
            .audit
            .record(AuditKind::Delete, E::ENTITY, &caller.name, id, &previous)
            .await)
    }
}

impl Catalog<'_, Medicine> {
    /// Stock movements of one medicine within a date range.
    pub async fn history(&self, id: Id, range: &DateRange) -> ApiResult<Vec<MedicineHistory>> {
        range.validate()?;
        let mut session = self.state.db.read().await?;
        Self::load(session.conn(), id).await?;
        Ok(session.medicines().history(id, range).await?)
    }
}

// =============================================================================
// Company profile
// =============================================================================

/// Audit folder of the company profile.
pub const COMPANY_ENTITY: &str = "company-profile";
const COMPANY_ID: Id = 1;

pub struct CompanyService<'a> {
    state: &'a AppState,
}

impl<'a> CompanyService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        CompanyService { state }
    }

    async fn load(repo: &mut CompanyRepository<'_>) -> ApiResult<CompanyProfile> {
        repo.get()
            .await?
            .ok_or_else(|| ApiError::not_found("Company profile has not been set up"))
    }

    pub async fn get(&self) -> ApiResult<CompanyProfile> {
        let mut session = self.state.db.read().await?;
        Self::load(&mut session.company()).await
    }

    pub async fn create(&self, caller: &Caller, input: &CompanyProfileInput) -> ApiResult<CompanyProfile> {
        input.validate()?;
        let mut session = self.state.db.begin().await?;
        let mut repo = session.company();
        repo.create(input, caller.id).await?;
        let profile = Self::load(&mut repo).await?;
        session.commit().await?;

        info!(name = %profile.name, user = %caller.name, "Company profile created");
        Ok(profile)
    }

    pub async fn modify(
        &self,
        caller: &Caller,
        input: &CompanyProfileInput,
    ) -> ApiResult<(CompanyProfile, Option<String>)> {
        input.validate()?;
        let mut session = self.state.db.begin().await?;
        let mut repo = session.company();
        let previous = Self::load(&mut repo).await?;
        repo.modify(input, caller.id).await?;
        let profile = Self::load(&mut repo).await?;
        session.commit().await?;

        let log = self
            .state
            .audit
            .record(AuditKind::Modify, COMPANY_ENTITY, &caller.name, COMPANY_ID, &previous)
            .await;
        Ok((profile, log))
    }

    /// Removes the row so that a new profile can be created.
    pub async fn delete(&self, caller: &Caller) -> ApiResult<Option<String>> {
        let mut session = self.state.db.begin().await?;
        let mut repo = session.company();
        let previous = Self::load(&mut repo).await?;
        repo.delete().await?;
        session.commit().await?;

        Ok(self
            .state
            .audit
            .record(AuditKind::Delete, COMPANY_ENTITY, &caller.name, COMPANY_ID, &previous)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{medicine, state};
    use chrono::NaiveDate;

    fn named(name: &str) -> NamedInput {
        NamedInput { name: name.into() }
    }

    #[tokio::test]
    async fn test_case_insensitive_find() {
        let app = state().await;
        let customers = Catalog::<Customer>::new(&app.state);
        customers.create(&app.admin, &named("Budi Santoso")).await.unwrap();
        customers.create(&app.admin, &named("Ani")).await.unwrap();

        let found = customers.find("BUDI SANTOSO").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Budi Santoso");

        let found = customers.find("bdsnt").await.unwrap();
        assert_eq!(found[0].name, "Budi Santoso");

        assert_eq!(customers.find("all").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deleted_rows_are_invisible() {
        let app = state().await;
        let doctors = Catalog::<Doctor>::new(&app.state);
        let doctor = doctors.create(&app.admin, &named("dr. Rina")).await.unwrap();

        let log = doctors.delete(&app.admin, doctor.id).await.unwrap().unwrap();
        assert!(app.dir.path().join("log/delete/doctor").join(log).exists());

        assert_eq!(doctors.detail(doctor.id).await.unwrap_err().kind, ErrorKind::NotFound);
        assert!(doctors.find("rina").await.unwrap().is_empty());
        assert!(doctors.find("all").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_medicine_barcode_first() {
        let app = state().await;
        medicine(&app, "8991001", 5.0).await;
        let medicines = Catalog::<Medicine>::new(&app.state);

        let found = medicines.find("8991001").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].barcode, "8991001");

        let found = medicines.find("med").await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_medicine_history_opening_row() {
        let app = state().await;
        let id = medicine(&app, "BC1", 12.0).await;
        let today = chrono::Utc::now().date_naive();
        let range = DateRange {
            start_date: today.pred_opt().unwrap(),
            end_date: today.succ_opt().unwrap(),
        };

        let rows = Catalog::<Medicine>::new(&app.state).history(id, &range).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].qty, 12.0);

        let backwards = DateRange {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        let err = Catalog::<Medicine>::new(&app.state)
            .history(id, &backwards)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadPayload);
    }

    #[tokio::test]
    async fn test_units_are_upper_cased_and_hard_deleted() {
        let app = state().await;
        let units = Catalog::<Unit>::new(&app.state);
        let unit = units
            .create(&app.admin, &LookupInput { name: "strip".into() })
            .await
            .unwrap();
        assert_eq!(unit.name, "STRIP");

        let err = units
            .create(&app.admin, &LookupInput { name: "Strip".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        units.delete(&app.admin, unit.id).await.unwrap();
        assert_eq!(units.detail(unit.id).await.unwrap_err().kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_company_profile_lifecycle() {
        let app = state().await;
        let company = CompanyService::new(&app.state);
        assert_eq!(company.get().await.unwrap_err().kind, ErrorKind::NotFound);

        let mut input = CompanyProfileInput {
            name: "Apotek Sehat".into(),
            address: "Jl. Merdeka 1".into(),
            business_registration_number: String::new(),
            pharmacist: "apt. Rina".into(),
            pharmacist_license_number: "SIPA-1".into(),
        };
        company.create(&app.admin, &input).await.unwrap();
        assert_eq!(
            company.create(&app.admin, &input).await.unwrap_err().kind,
            ErrorKind::Conflict
        );

        input.address = "Jl. Sudirman 2".into();
        let (profile, log) = company.modify(&app.admin, &input).await.unwrap();
        assert_eq!(profile.address, "Jl. Sudirman 2");
        assert!(log.is_some());

        company.delete(&app.admin).await.unwrap();
        company.create(&app.admin, &input).await.unwrap();
    }
}
