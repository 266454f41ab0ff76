//! # Pharmacy POS API
//!
//! HTTP/JSON back-end of the pharmacy point of sale.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           POS API Server                                │
//! │                                                                         │
//! │  client ──► CORS / trace ──► error log ──► router                       │
//! │                                               │                         │
//! │               ┌───────────────┬───────────────┼────────────────┐        │
//! │               ▼               ▼               ▼                ▼        │
//! │         ┌──────────┐   ┌────────────┐  ┌─────────────┐  ┌──────────┐    │
//! │         │  auth    │   │  catalog   │  │  documents  │  │ /static  │    │
//! │         │ login    │   │ medicine   │  │ invoice     │  │ ServeDir │    │
//! │         │ users    │   │ parties    │  │ purchase    │  └──────────┘    │
//! │         └────┬─────┘   └─────┬──────┘  │ order, prod │                  │
//! │              │               │         └──────┬──────┘                  │
//! │              ▼               ▼                ▼                         │
//! │     ┌──────────────────────────────────────────────────────────────┐    │
//! │     │  gate (token + users row) · stock keeper · audit · PDF       │    │
//! │     └──────────────────────────────┬───────────────────────────────┘    │
//! │                                    ▼                                    │
//! │                          pharma-db (SQLite)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (see [`config::AppConfig`]):
//! - `PUBLIC_HOST`, `PORT` - listen port and public artifact URLs
//! - `DB_NAME` - SQLite file (`<DB_NAME>.db`) or `:memory:`
//! - `JWT_SECRET`, `JWT_EXP` - token signing and lifetime
//! - `STATIC_DIR` - logs and PDFs
//! - `COMPANY_*`, `PHARMACIST*` - letterhead strings

pub mod audit;
pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod password;
pub mod pdf;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports
pub use config::AppConfig;
pub use envelope::Envelope;
pub use error::{ApiError, ApiResult, ErrorKind};
pub use routes::build_router;

use pharma_db::{Database, DbResult};

use crate::audit::AuditLogger;
use crate::auth::TokenService;
use crate::pdf::PdfRenderer;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub tokens: TokenService,
    pub audit: AuditLogger,
    pub pdf: PdfRenderer,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        AppState {
            tokens: TokenService::new(&config.jwt_secret, config.jwt_exp),
            audit: AuditLogger::new(&config.static_dir),
            pdf: PdfRenderer::new(&config.static_dir, config.public_base()),
            db,
            config,
        }
    }

    /// Opens (and migrates) the configured database.
    pub async fn connect(config: AppConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()).await?;
        Ok(Self::new(db, config))
    }
}
