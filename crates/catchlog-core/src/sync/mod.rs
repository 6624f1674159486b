//! Offline-first synchronization engine.
//!
//! [`SyncService`] is the entry point. It routes each record operation
//! through a [`StorageStrategy`] chosen when the service mode changes:
//! guests stay local, signed-in users go remote-first with an
//! [`OfflineQueue`] behind them. Local and remote ids are related through the
//! [`IdMappingRegistry`]. Signing in merges guest records once via
//! [`reconcile`], which finishes with an [`OrphanAuditor`] pass.

mod orphans;
mod queue;
mod reconcile;
mod registry;
mod remote_records;
mod service;
mod strategy;

#[cfg(test)]
mod tests;

pub use orphans::{AuditAction, AuditReport, OrphanAuditor};
pub use queue::{DrainReport, OfflineQueue, OpType, OperationReplayer, QueuedOperation};
pub use reconcile::{deferred_merge_key, migration_key, reconcile, MergeReport};
pub use registry::IdMappingRegistry;
pub use remote_records::RemoteRecords;
pub use service::{SyncDiagnostics, SyncService};
pub use strategy::{
    ActiveStorage, AuthenticatedStorage, Connectivity, GuestStorage, StorageStrategy,
};
