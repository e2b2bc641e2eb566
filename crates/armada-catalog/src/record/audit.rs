//! Audit-log entries for fleet mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub time: DateTime<Utc>,
    /// Authenticated principal that performed the action.
    pub actor: String,
    /// Operation name, e.g. `AddController`.
    pub action: String,
    /// Identity of the record acted on.
    pub subject: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Time-bounded audit query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}
