use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    api::{GovernanceError, Result},
    service::{
        NewRequest, Request, RequestFilter, RequestId, RequestLedger, RequestStatus,
        RequestTransition, TenantId,
    },
};

/// In-memory request ledger. The whole store sits behind one mutex so the
/// duplicate check and the insert in `create_if_absent` are a single
/// critical section.
#[derive(Debug, Clone, Default)]
pub struct MemoryRequestLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    requests: Vec<Request>,
    counters: HashMap<TenantId, i32>,
}

#[async_trait]
impl RequestLedger for MemoryRequestLedger {
    async fn create_if_absent(&self, new_request: NewRequest) -> Result<Request> {
        let mut inner = self.inner.lock().await;

        let duplicate = inner.requests.iter().any(|r| {
            r.tenant_id == new_request.tenant_id
                && r.kind == new_request.kind
                && r.resource_name == new_request.resource_name
                && r.environment_id == new_request.environment_id
                && r.status == RequestStatus::Created
        });
        if duplicate {
            return Err(GovernanceError::duplicate_request(format!(
                "A pending request already exists for '{}' in this environment.",
                new_request.resource_name
            )));
        }

        let counter = inner.counters.entry(new_request.tenant_id).or_insert(0);
        *counter += 1;
        let request = Request {
            id: RequestId::new(*counter),
            tenant_id: new_request.tenant_id,
            kind: new_request.kind,
            resource_name: new_request.resource_name,
            environment_id: new_request.environment_id,
            requesting_team_id: new_request.requesting_team_id,
            requestor: new_request.requestor,
            operation: new_request.operation,
            status: RequestStatus::Created,
            approver: None,
            requested_at: Utc::now(),
            approved_at: None,
            decline_reason: None,
            extra_config: new_request.extra_config,
            history: new_request.history,
            owning_team_id: new_request.owning_team_id,
            description: new_request.description,
            remarks: new_request.remarks,
        };
        inner.requests.push(request.clone());
        Ok(request)
    }

    async fn get(&self, tenant_id: TenantId, id: RequestId) -> Result<Option<Request>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .requests
            .iter()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .cloned())
    }

    async fn finalize(
        &self,
        tenant_id: TenantId,
        id: RequestId,
        transition: RequestTransition,
    ) -> Result<Request> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .iter_mut()
            .find(|r| r.tenant_id == tenant_id && r.id == id)
            .ok_or_else(|| GovernanceError::not_found(format!("Request '{id}' not found.")))?;
        if request.status.is_terminal() {
            return Err(GovernanceError::stale_request(format!(
                "Request '{id}' has already been processed."
            )));
        }

        request.status = transition.status;
        match transition.status {
            RequestStatus::Approved | RequestStatus::Declined => {
                request.approver = Some(transition.actor);
                request.approved_at = Some(Utc::now());
            }
            // Cancellation records no approver.
            RequestStatus::Created | RequestStatus::Deleted => {}
        }
        request.decline_reason = transition.reason;
        if let Some(history) = transition.history {
            request.history = history;
        }
        Ok(request.clone())
    }

    async fn list(&self, tenant_id: TenantId, filter: &RequestFilter) -> Result<Vec<Request>> {
        let inner = self.inner.lock().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);
        Ok(inner
            .requests
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| {
                filter
                    .environment
                    .as_ref()
                    .is_none_or(|env| &r.environment_id == env)
            })
            .filter(|r| filter.status.is_none_or(|status| r.status == status))
            .filter(|r| filter.operation.is_none_or(|op| r.operation == op))
            .filter(|r| {
                needle.as_deref().is_none_or(|needle| {
                    r.resource_name.to_lowercase().contains(needle)
                        || r.description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                        || r.remarks
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                })
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::ErrorKind,
        service::{OperationType, ResourceKind, TeamId},
    };

    fn new_request(name: &str) -> NewRequest {
        NewRequest::builder()
            .tenant_id(TenantId::new(101))
            .kind(ResourceKind::Topic)
            .resource_name(name)
            .environment_id("dev".into())
            .requesting_team_id(TeamId::new(1001))
            .requestor("alice")
            .operation(OperationType::Create)
            .build()
    }

    #[tokio::test]
    async fn test_duplicate_guard_holds_under_concurrent_submission() {
        let ledger = MemoryRequestLedger::default();
        let (first, second) = tokio::join!(
            ledger.create_if_absent(new_request("orders")),
            ledger.create_if_absent(new_request("orders")),
        );
        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let failure = outcomes.iter().find(|r| r.is_err()).unwrap();
        assert_eq!(
            failure.as_ref().unwrap_err().kind,
            ErrorKind::DuplicateRequest
        );
    }

    #[tokio::test]
    async fn test_terminal_requests_do_not_block_resubmission() {
        let ledger = MemoryRequestLedger::default();
        let request = ledger.create_if_absent(new_request("orders")).await.unwrap();
        ledger
            .finalize(
                request.tenant_id,
                request.id,
                RequestTransition {
                    status: RequestStatus::Declined,
                    actor: "carol".to_string(),
                    reason: Some("not now".to_string()),
                    history: None,
                },
            )
            .await
            .unwrap();

        assert!(ledger.create_if_absent(new_request("orders")).await.is_ok());
    }

    #[tokio::test]
    async fn test_finalize_is_a_one_way_transition() {
        let ledger = MemoryRequestLedger::default();
        let request = ledger.create_if_absent(new_request("orders")).await.unwrap();

        let transition = |status| RequestTransition {
            status,
            actor: "carol".to_string(),
            reason: None,
            history: None,
        };
        let approved = ledger
            .finalize(request.tenant_id, request.id, transition(RequestStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.approver.as_deref(), Some("carol"));
        assert!(approved.approved_at.is_some());

        let err = ledger
            .finalize(request.tenant_id, request.id, transition(RequestStatus::Declined))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::StaleRequest);
    }

    #[tokio::test]
    async fn test_list_filters_by_search_and_status() {
        let ledger = MemoryRequestLedger::default();
        ledger.create_if_absent(new_request("orders")).await.unwrap();
        ledger
            .create_if_absent(new_request("payments"))
            .await
            .unwrap();

        let filter = RequestFilter::builder()
            .search(Some("ORD".to_string()))
            .build();
        let matches = ledger.list(TenantId::new(101), &filter).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].resource_name, "orders");

        let none = ledger
            .list(TenantId::new(999), &RequestFilter::default())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_covers_description_and_remarks() {
        let ledger = MemoryRequestLedger::default();
        let mut described = new_request("audit-log");
        described.description = Some("Mirrors the orders stream.".to_string());
        ledger.create_if_absent(described).await.unwrap();
        let mut remarked = new_request("payments");
        remarked.remarks = Some("Needed for the ORDERS migration.".to_string());
        ledger.create_if_absent(remarked).await.unwrap();
        ledger.create_if_absent(new_request("clickstream")).await.unwrap();

        let filter = RequestFilter::builder()
            .search(Some("orders".to_string()))
            .build();
        let matches = ledger.list(TenantId::new(101), &filter).await.unwrap();
        let names = matches
            .iter()
            .map(|r| r.resource_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["audit-log", "payments"]);
    }
}
