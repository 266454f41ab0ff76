//! POS API configuration module.
//!
//! Configuration is loaded from environment variables (and an optional
//! `.env` file) with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use pharma_core::Letterhead;
use pharma_db::DbConfig;
use serde::{Deserialize, Serialize};

/// POS API configuration. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheme and host used to build public artifact URLs
    pub public_host: String,

    /// HTTP listen port
    pub port: u16,

    /// Kept for operators; the embedded database ignores them
    pub db_user: String,
    #[serde(skip_serializing)]
    pub db_password: String,
    pub db_host: String,
    pub db_port: u16,

    /// Database name: `<name>.db`, a path, or `:memory:`
    pub db_name: String,

    /// Maximum pooled connections
    pub db_max_connections: u32,

    /// Token lifetime in seconds (default: 12 hours)
    pub jwt_exp: i64,

    /// HMAC secret for tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,

    /// Root of the served static tree (logs, PDFs, assets)
    pub static_dir: PathBuf,

    /// Branding printed on every document
    pub company: CompanyBranding,
}

/// Company strings used by the PDF renderer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyBranding {
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub whatsapp_number: String,
    pub slogan: String,
    pub logo_url: String,
    pub pharmacist: String,
    pub pharmacist_license_number: String,
    pub main_doctor: String,
    pub main_doctor_license_number: String,
    pub business_registration_number: String,
}

impl AppConfig {
    /// Load configuration from the environment, reading `.env` first when
    /// present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = AppConfig {
            public_host: text("PUBLIC_HOST", "http://localhost"),
            port: parsed("PORT", 19230)?,
            db_user: text("DB_USER", "root"),
            db_password: text("DB_PASSWORD", ""),
            db_host: text("DB_HOST", "127.0.0.1"),
            db_port: parsed("DB_PORT", 3306)?,
            db_name: text("DB_NAME", "pos_test"),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 5)?,
            jwt_exp: parsed("JWT_EXP", 43_200)?,
            jwt_secret: text("JWT_SECRET", "access-secret"),
            static_dir: PathBuf::from(text("STATIC_DIR", "static")),
            company: CompanyBranding {
                name: text("COMPANY_NAME", "Apotek"),
                address: text("COMPANY_ADDRESS", ""),
                phone_number: text("COMPANY_PHONE_NUMBER", ""),
                whatsapp_number: text("COMPANY_WHATSAPP_NUMBER", ""),
                slogan: text("COMPANY_SLOGAN", ""),
                logo_url: text("COMPANY_LOGO_URL", "static/assets/logo/Logo.png"),
                pharmacist: text("PHARMACIST", ""),
                pharmacist_license_number: text("PHARMACIST_LICENSE_NUMBER", ""),
                main_doctor: text("MAIN_DOCTOR", ""),
                main_doctor_license_number: text("MAIN_DOCTOR_LICENSE_NUMBER", ""),
                business_registration_number: text("BUSINESS_REGISTRATION_NUMBER", ""),
            },
        };

        if config.jwt_exp <= 0 {
            return Err(ConfigError::InvalidValue("JWT_EXP".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    /// Defaults with an in-memory database rooted at `static_dir`, for tests.
    pub fn for_tests(static_dir: impl Into<PathBuf>) -> Self {
        AppConfig {
            public_host: "http://localhost".to_string(),
            port: 19230,
            db_user: "root".to_string(),
            db_password: String::new(),
            db_host: "127.0.0.1".to_string(),
            db_port: 3306,
            db_name: ":memory:".to_string(),
            db_max_connections: 1,
            jwt_exp: 43_200,
            jwt_secret: "test-secret".to_string(),
            static_dir: static_dir.into(),
            company: CompanyBranding {
                name: "Apotek".to_string(),
                ..CompanyBranding::default()
            },
        }
    }

    /// Maps `DB_NAME` to a SQLite location.
    ///
    /// ## Rules
    /// - `:memory:` → in-memory database
    /// - contains `/` or ends with `.db` → used as a path
    /// - anything else → `<DB_NAME>.db` in the working directory
    pub fn database_path(&self) -> PathBuf {
        let name = self.db_name.trim();
        if name == ":memory:" || name.contains('/') || name.ends_with(".db") {
            PathBuf::from(name)
        } else {
            PathBuf::from(format!("{name}.db"))
        }
    }

    pub fn db_config(&self) -> DbConfig {
        if self.db_name.trim() == ":memory:" {
            return DbConfig::in_memory();
        }
        DbConfig::new(self.database_path()).max_connections(self.db_max_connections)
    }

    /// Prefix of every public artifact URL: `<PUBLIC_HOST>:<PORT>`.
    pub fn public_base(&self) -> String {
        format!("{}:{}", self.public_host.trim_end_matches('/'), self.port)
    }

    pub fn letterhead(&self) -> Letterhead {
        let c = &self.company;
        Letterhead {
            company_name: c.name.clone(),
            address: c.address.clone(),
            phone_number: c.phone_number.clone(),
            whatsapp_number: c.whatsapp_number.clone(),
            slogan: c.slogan.clone(),
            pharmacist: c.pharmacist.clone(),
            pharmacist_license_number: c.pharmacist_license_number.clone(),
            business_registration_number: c.business_registration_number.clone(),
        }
    }
}

fn text(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
