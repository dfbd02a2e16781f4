//! Represents a raw object (blob) as reported by an object store listing.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One entry of an object store listing.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    /// Object key inside the bucket.
    pub key: String,

    /// Size in bytes.
    pub size: i64,

    /// Last modification time, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}
