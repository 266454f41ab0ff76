//! # pharma-core: Pure Business Logic for the Pharmacy POS
//!
//! This crate holds every rule of the pharmacy back-end that can be expressed
//! without touching a database, a socket or a file.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pharmacy POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 pos-api (axum, JSON envelope)                   │   │
//! │  │    gate ──► handlers ──► document engine ──► audit / PDF       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pharma-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  types   │ │  stock   │ │ document │ │ validation/search│  │   │
//! │  │   │ Medicine │ │ Profile  │ │ Invoice  │ │ dates, names,    │  │   │
//! │  │   │ Supplier │ │ Move     │ │ Purchase │ │ %c%c% patterns   │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 pharma-db (SQLite repositories)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Users, lookup tables, parties and medicines
//! - [`money`] - Integer money with decimal JSON representation
//! - [`stock`] - First-unit conversion and stock movements
//! - [`document`] - The four document kinds and their shared model
//! - [`validation`] - Field rules and the [`validation::Validate`] trait
//! - [`search`] - Name normalisation and whitespace-skipping search patterns
//! - [`error`] - Domain error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod money;
pub mod search;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use document::{
    DateRange, DocumentDraft, DocumentKind, DocumentModel, DraftLine, Letterhead, ListFilter, Lookup,
    PrintSheet,
};
pub use document::{
    Invoice, InvoiceDraft, InvoiceItem, InvoiceLine, OrderLine, Production, ProductionDraft,
    ProductionItem, ProductionLine, PurchaseInvoice, PurchaseInvoiceDraft, PurchaseItem,
    PurchaseLine, PurchaseOrder, PurchaseOrderDraft, PurchaseOrderItem,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use stock::{Direction, StockMove, StockProfile};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items accepted on a single document.
///
/// A sales counter never gets near this; it bounds the work one request can
/// queue inside a single write transaction.
pub const MAX_LINE_ITEMS: usize = 500;

/// Tolerance used when comparing real-valued stock quantities.
pub const QTY_EPSILON: f64 = 1e-9;
