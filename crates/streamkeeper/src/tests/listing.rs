use pretty_assertions::assert_eq;

use super::{seed_topic, setup, TEAM_OSPREYS};
use crate::service::{
    lifecycle::TopicRequestInput, RequestFilter, RequestScope, RequestStatus, ResourceKind,
};

fn topic_input(name: &str, environment_id: &str) -> TopicRequestInput {
    TopicRequestInput::builder()
        .topic_name(name)
        .environment_id(environment_id)
        .partitions(2)
        .replication_factor(1)
        .build()
}

fn default_filter() -> RequestFilter {
    RequestFilter::builder().build()
}

#[tokio::test]
async fn test_request_listing_pages_most_recent_first() {
    let env = setup().await;
    for i in 0..13 {
        env.service
            .request_topic_create(&env.alice, topic_input(&format!("topic-{i:02}"), "dev"))
            .await
            .unwrap();
    }

    let first = env
        .service
        .list_requests(&env.alice, ResourceKind::Topic, &default_filter())
        .await
        .unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.total_items, 13);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.items[0].resource_name, "topic-12");

    let second = env
        .service
        .list_requests(
            &env.alice,
            ResourceKind::Topic,
            &RequestFilter::builder().page(2).build(),
        )
        .await
        .unwrap();
    assert_eq!(second.items.len(), 3);
    assert_eq!(second.items[2].resource_name, "topic-00");

    // Out-of-range pages clamp to the last page instead of erroring.
    let clamped = env
        .service
        .list_requests(
            &env.alice,
            ResourceKind::Topic,
            &RequestFilter::builder().page(99).build(),
        )
        .await
        .unwrap();
    assert_eq!(clamped.page, 2);
    assert_eq!(clamped.items, second.items);
}

#[tokio::test]
async fn test_scope_separates_own_requests_from_the_team() {
    let env = setup().await;
    env.service
        .request_topic_create(&env.alice, topic_input("orders", "dev"))
        .await
        .unwrap();
    env.service
        .request_topic_create(&env.bob, topic_input("payments", "dev"))
        .await
        .unwrap();

    let mine = env
        .service
        .list_requests(
            &env.alice,
            ResourceKind::Topic,
            &RequestFilter::builder()
                .scope(RequestScope::MyRequests)
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(mine.items.len(), 1);
    assert_eq!(mine.items[0].requestor, "alice");

    let team = env
        .service
        .list_requests(&env.alice, ResourceKind::Topic, &default_filter())
        .await
        .unwrap();
    assert_eq!(team.items.len(), 2);

    // Another team sees nothing of it.
    let other_team = env
        .service
        .list_requests(&env.carol, ResourceKind::Topic, &default_filter())
        .await
        .unwrap();
    assert!(other_team.items.is_empty());
}

#[tokio::test]
async fn test_search_narrows_by_resource_name() {
    let env = setup().await;
    for name in ["orders-v1", "orders-v2", "payments"] {
        env.service
            .request_topic_create(&env.alice, topic_input(name, "dev"))
            .await
            .unwrap();
    }

    let hits = env
        .service
        .list_requests(
            &env.alice,
            ResourceKind::Topic,
            &RequestFilter::builder().search(Some("ORDERS".to_string())).build(),
        )
        .await
        .unwrap();
    assert_eq!(hits.items.len(), 2);
    assert!(hits.items.iter().all(|r| r.resource_name.starts_with("orders")));
}

#[tokio::test]
async fn test_approval_queue_defaults_to_pending_requests() {
    let env = setup().await;
    let approved = env
        .service
        .request_topic_create(&env.alice, topic_input("orders", "dev"))
        .await
        .unwrap();
    env.service
        .request_topic_create(&env.alice, topic_input("payments", "dev"))
        .await
        .unwrap();
    env.service
        .approve_topic_request(&env.bob, approved.id)
        .await
        .unwrap();

    let pending = env
        .service
        .list_requests_for_approval(&env.bob, ResourceKind::Topic, &default_filter())
        .await
        .unwrap();
    assert_eq!(pending.items.len(), 1);
    assert_eq!(pending.items[0].resource_name, "payments");

    // An explicit status filter overrides the pending default.
    let done = env
        .service
        .list_requests_for_approval(
            &env.bob,
            ResourceKind::Topic,
            &RequestFilter::builder()
                .status(Some(RequestStatus::Approved))
                .build(),
        )
        .await
        .unwrap();
    assert_eq!(done.items.len(), 1);
    assert_eq!(done.items[0].resource_name, "orders");
}

#[tokio::test]
async fn test_approval_queue_is_limited_to_the_approving_team() {
    let env = setup().await;
    env.service
        .request_topic_create(&env.alice, topic_input("orders", "dev"))
        .await
        .unwrap();
    env.service
        .request_topic_create(&env.carol, topic_input("audits", "prd"))
        .await
        .unwrap();

    let falcons = env
        .service
        .list_requests_for_approval(&env.bob, ResourceKind::Topic, &default_filter())
        .await
        .unwrap();
    assert_eq!(falcons.items.len(), 1);
    assert_eq!(falcons.items[0].resource_name, "orders");

    let ospreys = env
        .service
        .list_requests_for_approval(&env.carol, ResourceKind::Topic, &default_filter())
        .await
        .unwrap();
    assert_eq!(ospreys.items.len(), 1);
    assert_eq!(ospreys.items[0].resource_name, "audits");
}

#[tokio::test]
async fn test_topic_overview_pages_and_respects_environment_scope() {
    let env = setup().await;
    for i in 0..25 {
        seed_topic(&env, &format!("t{i:02}"), "dev", TEAM_OSPREYS).await;
    }
    seed_topic(&env, "restricted", "prd", TEAM_OSPREYS).await;

    // alice's team may not see prd, so the restricted topic never shows.
    let first = env
        .service
        .list_topic_overview(&env.alice, 1, None)
        .await
        .unwrap();
    assert_eq!(first.items.len(), 21);
    assert_eq!(first.total_items, 25);
    assert_eq!(first.items[0].name, "t00");

    let second = env
        .service
        .list_topic_overview(&env.alice, 2, None)
        .await
        .unwrap();
    assert_eq!(second.items.len(), 4);

    let carol_sees = env
        .service
        .list_topic_overview(&env.carol, 1, Some("restricted"))
        .await
        .unwrap();
    assert_eq!(carol_sees.items.len(), 1);

    let search = env
        .service
        .list_topic_overview(&env.alice, 1, Some("t2"))
        .await
        .unwrap();
    assert_eq!(search.total_items, 5);
}
