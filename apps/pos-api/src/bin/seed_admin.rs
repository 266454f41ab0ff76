//! Creates the first administrator.
//!
//! ```text
//! seed-admin <name> <password> [phone]
//! ```
//!
//! Uses the same configuration as the server. Refuses to run when an
//! active user with that name already exists.

use tracing::info;
use tracing_subscriber::EnvFilter;

use pharma_core::validation::{validate_name, validate_password};
use pos_api::password::hash_password;
use pos_api::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(name), Some(password)) = (args.next(), args.next()) else {
        eprintln!("usage: seed-admin <name> <password> [phone]");
        std::process::exit(2);
    };
    let phone = args.next().unwrap_or_default();

    validate_name("name", &name)?;
    validate_password(&password)?;

    let state = AppState::connect(AppConfig::load()?).await?;
    let mut session = state.db.begin().await?;

    if session.users().credentials(&name).await?.is_some() {
        eprintln!("user {} already exists", name.trim());
        std::process::exit(1);
    }

    let hash = hash_password(&password)?;
    let id = session.users().create(&name, &phone, &hash, true, None).await?;
    session.commit().await?;

    info!(user_id = id, name = %name.trim(), "Administrator created");
    state.db.close().await;
    Ok(())
}
