//! Rider domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A rider profile as persisted in the relational store. Rider identity is
/// managed by an upstream service; dispatch keeps the minimal row needed to
/// reference ride requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}
