use serde::{Deserialize, Serialize};

/// Authenticated identity on whose behalf an operation runs.
///
/// Identity is issued upstream; the gateway only trusts the tenant and user
/// it was handed for the connection or request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Tenant the user belongs to
    pub tenant_id: String,
    /// User identifier
    pub user_id: String,
    /// Display name shown next to messages and typing indicators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Actor {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}
