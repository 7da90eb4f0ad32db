use async_trait::async_trait;

use crate::{
    api::Result,
    service::{NewRequest, Request, RequestFilter, RequestId, RequestTransition, TenantId},
};

/// CRUD over pending and terminal request records. Records are never
/// physically deleted; cancellation is the DELETED status.
#[async_trait]
pub trait RequestLedger
where
    Self: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Atomically checks for an existing CREATED request with the same
    /// `(kind, resource_name, environment_id, tenant_id)` and inserts the
    /// new record only if none exists. The check and the insert are one
    /// operation; concurrent submissions cannot both pass the guard.
    ///
    /// # Errors
    /// `DuplicateRequest` when a CREATED request already exists.
    async fn create_if_absent(&self, request: NewRequest) -> Result<Request>;

    async fn get(&self, tenant_id: TenantId, id: RequestId) -> Result<Option<Request>>;

    /// Compare-and-set transition out of CREATED. Status changes are
    /// monotonic and one-way; a record that already left CREATED is never
    /// written again.
    ///
    /// # Errors
    /// `NotFound` when the record does not exist, `StaleRequest` when its
    /// status is no longer CREATED.
    async fn finalize(
        &self,
        tenant_id: TenantId,
        id: RequestId,
        transition: RequestTransition,
    ) -> Result<Request>;

    /// All records of a tenant matching `filter`, unordered and unpaged.
    /// Free-text search covers the resource name plus the request's
    /// description and remarks, case-insensitive. Environment scoping,
    /// ordering and pagination are applied by the caller.
    async fn list(&self, tenant_id: TenantId, filter: &RequestFilter) -> Result<Vec<Request>>;
}
