pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{CallLogEntry, Contact, ReschedulingRequest, TenantConfig};

pub use memory::MemoryStorage;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Outcome of an idempotent create: the persisted request, and whether this
/// call actually created it.
#[derive(Debug, Clone)]
pub struct CreateRequestOutcome {
    pub request: ReschedulingRequest,
    pub created: bool,
}

/// Persistence seam consumed by the workflow engine. Implementations must
/// serialize updates per key and make `create_rescheduling_request` atomic
/// with respect to concurrent creations carrying the same idempotency key,
/// so duplicate webhook deliveries resolve to one request.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_rescheduling_request(
        &self,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<ReschedulingRequest>, StorageError>;

    /// Check-then-create under one guard: if a request with the same
    /// `(tenant_id, idempotency_key)` exists, it is returned with
    /// `created = false` and the candidate is discarded.
    async fn create_rescheduling_request(
        &self,
        request: ReschedulingRequest,
    ) -> Result<CreateRequestOutcome, StorageError>;

    async fn update_rescheduling_request(
        &self,
        request: &ReschedulingRequest,
    ) -> Result<(), StorageError>;

    /// Unresolved requests created before the cutoff, for the expiry sweep.
    async fn list_unresolved_requests_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ReschedulingRequest>, StorageError>;

    async fn get_contact(&self, id: Uuid, tenant_id: Uuid)
        -> Result<Option<Contact>, StorageError>;

    async fn update_contact(&self, contact: &Contact) -> Result<(), StorageError>;

    async fn get_tenant_config(&self, tenant_id: Uuid)
        -> Result<Option<TenantConfig>, StorageError>;

    async fn create_call_log(&self, entry: CallLogEntry) -> Result<(), StorageError>;
}
