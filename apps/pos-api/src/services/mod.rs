//! Services behind the HTTP handlers.
//!
//! Each service borrows the shared [`AppState`](crate::AppState), opens its
//! own session per call and returns [`ApiResult`](crate::ApiResult).

pub mod auth_service;
pub mod catalog_service;
pub mod document_service;
pub mod health_service;
pub mod stock_service;
