//! Health check.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    Serving,
    NotServing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: ServingStatus,
    pub message: String,
    pub server_time: DateTime<Utc>,
}

impl HealthReport {
    pub fn is_serving(&self) -> bool {
        self.status == ServingStatus::Serving
    }
}

/// Checks the database and reports the server time.
pub async fn check(state: &AppState) -> HealthReport {
    let (status, message) = if state.db.health_check().await {
        (ServingStatus::Serving, "Database is healthy".to_string())
    } else {
        warn!("Database health check failed");
        (ServingStatus::NotServing, "Database health check failed".to_string())
    };

    HealthReport {
        status,
        message,
        server_time: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;

    #[tokio::test]
    async fn test_healthy_database() {
        let app = state().await;
        let report = check(&app.state).await;
        assert!(report.is_serving());
    }
}
