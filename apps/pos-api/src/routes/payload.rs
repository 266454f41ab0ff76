//! Request bodies shared by several routes.

use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use pharma_core::{DateRange, Id};

/// `{ "id": 7 }`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IdPayload {
    pub id: Id,
}

/// `{ "id": 7, "newData": {...}, "force": false }`
///
/// `id` is absent for the company profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyPayload<T> {
    #[serde(default)]
    pub id: Id,
    pub new_data: T,
    #[serde(default)]
    pub force: bool,
}

impl<T> ModifyPayload<T> {
    pub fn require_id(&self) -> ApiResult<Id> {
        require_id(self.id)
    }
}

/// `{ "id": 7, "force": false }`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DeletePayload {
    pub id: Id,
    #[serde(default)]
    pub force: bool,
}

/// `{ "id": 7, "startDate": "2024-03-01", "endDate": "2024-03-31" }`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HistoryPayload {
    pub id: Id,
    #[serde(flatten)]
    pub range: DateRange,
}

pub fn require_id(id: Id) -> ApiResult<Id> {
    if id <= 0 {
        return Err(ApiError::bad_payload("id is required"));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_modify_payload_defaults() {
        let p: ModifyPayload<serde_json::Value> =
            serde_json::from_value(json!({ "newData": { "name": "x" } })).unwrap();
        assert_eq!(p.id, 0);
        assert!(!p.force);
        assert!(p.require_id().is_err());
    }

    #[test]
    fn test_history_payload_dates() {
        let p: HistoryPayload = serde_json::from_value(json!({
            "id": 3, "startDate": "2024-03-01", "endDate": "2024-03-31"
        }))
        .unwrap();
        assert_eq!(p.range.end_date.to_string(), "2024-03-31");

        let bad = serde_json::from_value::<HistoryPayload>(json!({
            "id": 3, "startDate": "01-03-2024", "endDate": "2024-03-31"
        }));
        assert!(bad.is_err());
    }
}
