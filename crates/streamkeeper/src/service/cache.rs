use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use moka::future::Cache;

use crate::{
    api::Result,
    service::{SotTopic, SyncStateStore, TenantId},
    CONFIG,
};

/// Process-wide, tenant-scoped mirror of the topic overview used by
/// read-side listings. Best-effort acceleration only: authorization and
/// duplicate checks never consult it, and writers invalidate rather than
/// update in place. Readers may observe stale data for up to the TTL after
/// a write.
static TOPIC_OVERVIEW_CACHE: LazyLock<Cache<TenantId, Arc<Vec<SotTopic>>>> =
    LazyLock::new(|| {
        Cache::builder()
            .max_capacity(CONFIG.cache.capacity)
            .time_to_live(Duration::from_secs(CONFIG.cache.ttl_secs))
            .build()
    });

pub(crate) async fn topics_cached<S: SyncStateStore>(
    store: &S,
    tenant_id: TenantId,
) -> Result<Arc<Vec<SotTopic>>> {
    if !CONFIG.cache.enabled {
        return Ok(Arc::new(store.list_topics(tenant_id).await?));
    }

    if let Some(topics) = TOPIC_OVERVIEW_CACHE.get(&tenant_id).await {
        return Ok(topics);
    }

    let topics = Arc::new(store.list_topics(tenant_id).await?);
    TOPIC_OVERVIEW_CACHE
        .insert(tenant_id, Arc::clone(&topics))
        .await;
    Ok(topics)
}

/// Drops the tenant's cached overview after a resource change. Submitted
/// fire-and-forget; the triggering call does not await the invalidation.
pub(crate) fn invalidate_tenant_metadata(tenant_id: TenantId) {
    if !CONFIG.cache.enabled {
        return;
    }
    tokio::spawn(async move {
        tracing::debug!(%tenant_id, "Invalidating tenant metadata cache");
        TOPIC_OVERVIEW_CACHE.invalidate(&tenant_id).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        implementations::memory::MemorySyncStore,
        service::{EnvironmentId, ResourceId, TeamId},
    };

    fn topic(tenant_id: TenantId, name: &str) -> SotTopic {
        SotTopic {
            resource_id: ResourceId::new(0),
            tenant_id,
            name: name.to_string(),
            environment_id: EnvironmentId::new("dev"),
            team_id: TeamId::new(1001),
            partitions: 1,
            replication_factor: 1,
            advanced_config: std::collections::BTreeMap::new(),
            description: None,
            documentation: None,
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_cache_serves_stale_reads_until_invalidated() {
        let store = MemorySyncStore::default();
        let tenant_id = TenantId::new(77);
        store.upsert_topic(topic(tenant_id, "orders")).await.unwrap();

        let first = topics_cached(&store, tenant_id).await.unwrap();
        assert_eq!(first.len(), 1);

        // A second row lands in the store; the cached overview does not see
        // it yet.
        store
            .upsert_topic(topic(tenant_id, "payments"))
            .await
            .unwrap();
        let stale = topics_cached(&store, tenant_id).await.unwrap();
        assert_eq!(stale.len(), 1);

        invalidate_tenant_metadata(tenant_id);
        // The invalidation task is not awaited by the writer; give it a tick.
        tokio::task::yield_now().await;
        TOPIC_OVERVIEW_CACHE.invalidate(&tenant_id).await;

        let fresh = topics_cached(&store, tenant_id).await.unwrap();
        assert_eq!(fresh.len(), 2);
    }
}
