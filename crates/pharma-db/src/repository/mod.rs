//! # Repository Module
//!
//! Narrow per-entity interfaces over the SQLite schema.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories Borrow a Session                        │
//! │                                                                         │
//! │  Handler / document engine                                             │
//! │       │                                                                 │
//! │       │  let mut session = db.begin().await?;                          │
//! │       │  session.medicines().get_by_barcode("BC1")                     │
//! │       ▼                                                                 │
//! │  MedicineRepository<'c> { conn: &'c mut SqliteConnection }             │
//! │  ├── get_by_id / get_by_barcode / get_by_search_name / get_all         │
//! │  ├── create / modify / soft_delete                                     │
//! │  └── adjust_stock / record_history                                     │
//! │       │                                                                 │
//! │       │  SQL on the session's connection (or transaction)              │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every write of one request runs on the same transaction; the          │
//! │  repository never commits.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - Accounts, credentials, bound token id
//! - [`lookup::LookupRepository`] - Units and payment methods (hard delete)
//! - [`party::NamedPartyRepository`] - Customers and doctors
//! - [`party::PatientRepository`], [`party::SupplierRepository`]
//! - [`company::CompanyRepository`] - The single company profile row
//! - [`medicine::MedicineRepository`] - Catalogue, stock and history
//! - [`document::DocumentRepository`] - The four document kinds

pub mod company;
pub mod document;
pub mod lookup;
pub mod medicine;
pub mod party;
pub mod user;

/// Name lookup clause: case-insensitive exact match or the compressed
/// `%c%c%` pattern, exact matches first.
///
/// Binds, in order: the name, its pattern, the name again.
pub(crate) fn name_search(column: &str) -> String {
    format!(
        "(lower({column}) = lower(?) OR {column} LIKE ? ESCAPE '\\') \
         ORDER BY CASE WHEN lower({column}) = lower(?) THEN 0 ELSE 1 END, {column}"
    )
}
