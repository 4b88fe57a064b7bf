use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::{CallLogEntry, Contact, ReschedulingRequest, TenantConfig};

use crate::{CreateRequestOutcome, Storage, StorageError};

/// In-process storage backing tests and single-node deployments. Each table
/// sits behind one `RwLock`, which serializes updates per key; the
/// idempotency index is consulted and written under the same write guard as
/// the request table, making duplicate creation atomic.
#[derive(Default)]
pub struct MemoryStorage {
    requests: RwLock<RequestTable>,
    contacts: RwLock<HashMap<(Uuid, Uuid), Contact>>,
    tenants: RwLock<HashMap<Uuid, TenantConfig>>,
    call_logs: RwLock<Vec<CallLogEntry>>,
}

#[derive(Default)]
struct RequestTable {
    by_id: HashMap<(Uuid, Uuid), ReschedulingRequest>,
    by_idempotency_key: HashMap<(Uuid, String), Uuid>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.contacts
            .write()
            .await
            .insert((contact.tenant_id, contact.id), contact);
    }

    pub async fn insert_tenant(&self, tenant: TenantConfig) {
        self.tenants
            .write()
            .await
            .insert(tenant.tenant_id, tenant);
    }

    pub async fn call_log_entries(&self) -> Vec<CallLogEntry> {
        self.call_logs.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.by_id.len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_rescheduling_request(
        &self,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<ReschedulingRequest>, StorageError> {
        Ok(self.requests.read().await.by_id.get(&(tenant_id, id)).cloned())
    }

    async fn create_rescheduling_request(
        &self,
        request: ReschedulingRequest,
    ) -> Result<CreateRequestOutcome, StorageError> {
        let mut table = self.requests.write().await;

        let dedup_key = (request.tenant_id, request.idempotency_key.clone());
        if let Some(existing_id) = table.by_idempotency_key.get(&dedup_key) {
            let existing = table
                .by_id
                .get(&(request.tenant_id, *existing_id))
                .cloned()
                .ok_or_else(|| {
                    StorageError::Conflict(format!(
                        "idempotency index points at missing request {}",
                        existing_id
                    ))
                })?;
            debug!(
                request_id = %existing.id,
                idempotency_key = %existing.idempotency_key,
                "duplicate creation resolved to existing request"
            );
            return Ok(CreateRequestOutcome {
                request: existing,
                created: false,
            });
        }

        table.by_idempotency_key.insert(dedup_key, request.id);
        table
            .by_id
            .insert((request.tenant_id, request.id), request.clone());

        Ok(CreateRequestOutcome {
            request,
            created: true,
        })
    }

    async fn update_rescheduling_request(
        &self,
        request: &ReschedulingRequest,
    ) -> Result<(), StorageError> {
        let mut table = self.requests.write().await;
        let key = (request.tenant_id, request.id);
        if !table.by_id.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "rescheduling request {} not found for tenant {}",
                request.id, request.tenant_id
            )));
        }
        table.by_id.insert(key, request.clone());
        Ok(())
    }

    async fn list_unresolved_requests_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ReschedulingRequest>, StorageError> {
        let table = self.requests.read().await;
        let mut matches: Vec<ReschedulingRequest> = table
            .by_id
            .values()
            .filter(|request| request.is_unresolved() && request.created_at < cutoff)
            .cloned()
            .collect();
        matches.sort_by_key(|request| request.created_at);
        Ok(matches)
    }

    async fn get_contact(
        &self,
        id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<Contact>, StorageError> {
        Ok(self.contacts.read().await.get(&(tenant_id, id)).cloned())
    }

    async fn update_contact(&self, contact: &Contact) -> Result<(), StorageError> {
        let mut contacts = self.contacts.write().await;
        contacts.insert((contact.tenant_id, contact.id), contact.clone());
        Ok(())
    }

    async fn get_tenant_config(
        &self,
        tenant_id: Uuid,
    ) -> Result<Option<TenantConfig>, StorageError> {
        Ok(self.tenants.read().await.get(&tenant_id).cloned())
    }

    async fn create_call_log(&self, entry: CallLogEntry) -> Result<(), StorageError> {
        self.call_logs.write().await.push(entry);
        Ok(())
    }
}
