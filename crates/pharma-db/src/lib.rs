//! # pharma-db: Database Layer for the Pharmacy POS
//!
//! SQLite storage for users, catalogue, parties, stock and the four document
//! kinds. Built on sqlx with runtime-checked queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pharmacy POS Data Flow                             │
//! │                                                                         │
//! │  pos-api handler / document engine                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    pharma-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │ users, units, ...  │  │ (embedded) │  │   │
//! │  │   │               │    │ medicines + stock  │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ documents (trait)  │  │ 001_init   │  │   │
//! │  │   │ Session       │    │                    │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              SQLite Database (<DB_NAME>.db, WAL)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, configuration and sessions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharma_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("pos.db")).await?;
//!
//! let mut session = db.read().await?;
//! let medicine = session.medicines().get_by_barcode("BC1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, Session};

pub use repository::company::CompanyRepository;
pub use repository::document::{
    DocumentRepository, DocumentTable, Invoices, Productions, PurchaseInvoices, PurchaseOrders,
};
pub use repository::lookup::{LookupRepository, LookupTable};
pub use repository::medicine::{HistoryEntry, MedicineRepository, RecordedMove};
pub use repository::party::{NamedParty, NamedPartyRepository, PatientRepository, SupplierRepository};
pub use repository::user::{Credentials, UserRepository};
