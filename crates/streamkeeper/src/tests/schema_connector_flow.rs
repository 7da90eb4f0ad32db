use pretty_assertions::assert_eq;

use super::{seed_topic, setup, TEAM_FALCONS, TEAM_OSPREYS};
use crate::{
    api::ErrorKind,
    service::{
        lifecycle::{ConnectorRequestInput, SchemaRequestInput},
        RemoteOperation, RequestStatus, SyncStateStore, TeamId,
    },
};

const ORDER_SCHEMA: &str = r#"{"type":"record","name":"Order","fields":[]}"#;

fn schema_input(schema_json: &str) -> SchemaRequestInput {
    SchemaRequestInput::builder()
        .topic_name("orders")
        .environment_id("dev")
        .schema_json(schema_json)
        .build()
}

fn sink_input(config_json: &str) -> ConnectorRequestInput {
    ConnectorRequestInput::builder()
        .connector_name("orders-sink")
        .environment_id("dev")
        .config_json(config_json)
        .build()
}

#[tokio::test]
async fn test_schema_versions_grow_monotonically() {
    let env = setup().await;
    seed_topic(&env, "orders", "dev", TEAM_FALCONS).await;

    let first = env
        .service
        .request_schema(&env.alice, schema_input(ORDER_SCHEMA))
        .await
        .unwrap();
    env.service
        .approve_schema_request(&env.bob, first.id)
        .await
        .unwrap();

    let second = env
        .service
        .request_schema(&env.alice, schema_input(ORDER_SCHEMA))
        .await
        .unwrap();
    env.service
        .approve_schema_request(&env.bob, second.id)
        .await
        .unwrap();

    let versions = env
        .service
        .schema_versions(&env.alice, "orders", &"dev".into())
        .await
        .unwrap();
    assert_eq!(
        versions.iter().map(|v| v.version).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert!(matches!(
        env.gateway.executed()[0],
        RemoteOperation::RegisterSchema { .. }
    ));
}

#[tokio::test]
async fn test_schema_submission_validation() {
    let env = setup().await;
    seed_topic(&env, "orders", "dev", TEAM_OSPREYS).await;

    // Not the caller's topic.
    let foreign = env
        .service
        .request_schema(&env.alice, schema_input(ORDER_SCHEMA))
        .await
        .unwrap_err();
    assert_eq!(foreign.kind, ErrorKind::NotAuthorized);

    seed_topic(&env, "payments", "dev", TEAM_FALCONS).await;
    let mut input = schema_input("not json at all");
    input.topic_name = "payments".to_string();
    let invalid = env
        .service
        .request_schema(&env.alice, input)
        .await
        .unwrap_err();
    assert_eq!(invalid.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_connector_lifecycle_create_update_delete() {
    let env = setup().await;

    let create = env
        .service
        .request_connector_create(
            &env.alice,
            sink_input(r#"{"connector.class":"S3Sink","topics":"orders"}"#),
        )
        .await
        .unwrap();
    env.service
        .approve_connector_request(&env.bob, create.id)
        .await
        .unwrap();
    let row = env
        .sot
        .find_connector(env.tenant_id, "orders-sink", &"dev".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.team_id, TeamId::new(TEAM_FALCONS));

    // A second create for the same name and environment is rejected
    // before it reaches the ledger.
    let duplicate = env
        .service
        .request_connector_create(&env.alice, sink_input(r"{}"))
        .await
        .unwrap_err();
    assert_eq!(duplicate.kind, ErrorKind::Validation);

    let update = env
        .service
        .request_connector_update(
            &env.alice,
            sink_input(r#"{"connector.class":"S3Sink","topics":"orders,payments"}"#),
        )
        .await
        .unwrap();
    env.service
        .approve_connector_request(&env.bob, update.id)
        .await
        .unwrap();
    let row = env
        .sot
        .find_connector(env.tenant_id, "orders-sink", &"dev".into())
        .await
        .unwrap()
        .unwrap();
    assert!(row.config_json.contains("payments"));
    // Create approval left one entry; the update appends its own.
    assert_eq!(row.history.len(), 2);

    let delete = env
        .service
        .request_connector_delete(&env.alice, "orders-sink", &"dev".into(), None)
        .await
        .unwrap();
    let approved = env
        .service
        .approve_connector_request(&env.bob, delete.id)
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert!(env
        .sot
        .find_connector(env.tenant_id, "orders-sink", &"dev".into())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_connector_claim_falls_to_the_owning_team() {
    let env = setup().await;
    env.sot
        .upsert_connector(crate::service::SotConnector {
            resource_id: crate::service::ResourceId::new(0),
            tenant_id: env.tenant_id,
            name: "orders-sink".to_string(),
            environment_id: "dev".into(),
            team_id: TeamId::new(TEAM_OSPREYS),
            config_json: r#"{"connector.class":"S3Sink"}"#.to_string(),
            documentation: None,
            history: Vec::new(),
        })
        .await
        .unwrap();

    let claim = env
        .service
        .request_connector_claim(&env.alice, "orders-sink", &"dev".into(), None)
        .await
        .unwrap();
    assert_eq!(claim.owning_team_id, Some(TeamId::new(TEAM_OSPREYS)));

    let err = env
        .service
        .approve_connector_request(&env.bob, claim.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAuthorized);

    env.service
        .approve_connector_request(&env.carol, claim.id)
        .await
        .unwrap();
    let row = env
        .sot
        .find_connector(env.tenant_id, "orders-sink", &"dev".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.team_id, TeamId::new(TEAM_FALCONS));
    assert!(env.gateway.executed().is_empty());
}

#[tokio::test]
async fn test_connector_documentation_updates_are_ownership_checked() {
    let env = setup().await;
    env.sot
        .upsert_connector(crate::service::SotConnector {
            resource_id: crate::service::ResourceId::new(0),
            tenant_id: env.tenant_id,
            name: "orders-sink".to_string(),
            environment_id: "dev".into(),
            team_id: TeamId::new(TEAM_FALCONS),
            config_json: r#"{"connector.class":"S3Sink"}"#.to_string(),
            documentation: None,
            history: Vec::new(),
        })
        .await
        .unwrap();

    let err = env
        .service
        .update_connector_documentation(&env.carol, "orders-sink", Some("not ours".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotAuthorized);

    env.service
        .update_connector_documentation(
            &env.alice,
            "orders-sink",
            Some("owned by falcons".to_string()),
        )
        .await
        .unwrap();
    let row = env
        .sot
        .find_connector(env.tenant_id, "orders-sink", &"dev".into())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.documentation.as_deref(), Some("owned by falcons"));

    let missing = env
        .service
        .update_connector_documentation(&env.alice, "no-such-sink", None)
        .await
        .unwrap_err();
    assert_eq!(missing.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_connector_status_passthrough() {
    let env = setup().await;
    let status = env
        .service
        .connector_status(&env.alice, &"dev".into(), "orders-sink")
        .await
        .unwrap();
    assert_eq!(status["connector_state"], "RUNNING");
}
