use serde::{Deserialize, Serialize};

use crate::utils::format_date;

/// Snapshot of the signed-in user as returned by the auth endpoints.
///
/// Timestamps are kept as the server sends them; use [`format_date`] for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl UserProfile {
    /// Human-readable account creation date
    pub fn member_since(&self) -> String {
        format_date(&self.created_at)
    }
}
