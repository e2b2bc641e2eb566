//! HTTP API handlers.
//!
//! # Purpose
//! One module per resource. Every handler follows the same dispatch shape:
//! authenticate the caller, locate the record, check the minimum relation
//! the operation needs, then act, forwarding to the owning backend where
//! the operation is backend-sourced.

pub mod audit;
pub mod controllers;
pub mod credentials;
pub mod error;
pub mod models;
pub mod offers;
pub mod openapi;
pub mod relations;
pub mod system;
pub mod types;

use std::sync::Arc;

use armada_backend::{Dialer, ModelManager};
use armada_catalog::{AuditEntry, Catalog, Controller, Error};
use axum::http::HeaderMap;
use chrono::Utc;

use crate::app::AppState;
use crate::auth::{Authenticator, Principal};
use error::ApiError;

/// The control plane's own identity in the relationship graph; audit-log
/// access is a relation on this tag.
pub const CONTROL_PLANE_NAME: &str = "armada";

impl AppState {
    pub(crate) async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        Ok(self.authenticator.authenticate(headers).await?)
    }

    /// Record a fleet mutation. Audit writes never fail the request.
    pub(crate) async fn audit(
        &self,
        principal: &Principal,
        action: &str,
        subject: &str,
        success: bool,
        message: &str,
    ) {
        let entry = AuditEntry {
            time: Utc::now(),
            actor: principal.username.clone(),
            action: action.to_string(),
            subject: subject.to_string(),
            success,
            message: message.to_string(),
        };
        if let Err(err) = self.catalog.append_audit(entry).await {
            tracing::warn!(error = %err, action, "audit append failed");
        }
    }

    /// Borrow a session to the controller; an unreachable backend is a
    /// retriable `ConnectionFailure`.
    pub(crate) async fn session_for(
        &self,
        ctl: &Controller,
    ) -> Result<Arc<dyn ModelManager>, ApiError> {
        self.dialer
            .open(ctl)
            .await
            .map_err(|err| Error::ConnectionFailure(format!("{err:#}")).into())
    }
}

/// Map a backend RPC failure onto the error taxonomy. Remote errors carry
/// their code in the message; anything else is a transport failure.
pub(crate) fn map_backend_error(err: anyhow::Error) -> ApiError {
    let message = format!("{err:#}");
    let mapped = if message.contains("backend error (not_found)") {
        Error::NotFound(message)
    } else if message.contains("backend error (unauthorized)") {
        Error::Unauthorized(message)
    } else if message.contains("backend error (already_exists)") {
        Error::AlreadyExists(message)
    } else if message.contains("backend error (") {
        Error::Internal(err)
    } else {
        Error::ConnectionFailure(message)
    };
    mapped.into()
}
