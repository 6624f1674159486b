//! Shared state types.

use serde::Serialize;

/// Sync status shown by the external status indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

/// Lifecycle of the sync service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServiceMode {
    Uninitialized,
    GuestReady,
    Reconciling { user_id: String },
    UserReady { user_id: String },
}

impl ServiceMode {
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::GuestReady | Self::UserReady { .. })
    }

    /// Signed-in user, including while reconciling
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Reconciling { user_id } | Self::UserReady { user_id } => Some(user_id),
            Self::Uninitialized | Self::GuestReady => None,
        }
    }
}
