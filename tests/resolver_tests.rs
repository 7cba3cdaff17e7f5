mod common;

use std::sync::Arc;

use common::{RecordingSink, RecordingTransport};
use lattice::{
    ClientError, FieldPlan, FieldRead, GraphQLResponse, Identity, PlanRoot, RefetchTarget, Value,
};
use serde_json::json;

#[tokio::test]
async fn distinct_reads_in_one_tick_share_one_request() {
    let transport = RecordingTransport::answering(json!({
        "e0": { "email": "ada@example.com", "fullName": "Ada Lovelace", "bio": "Analyst" }
    }));
    let client = common::client(transport.clone(), RecordingSink::new());
    let user = Identity::new("User", "u1");

    let (email, name, bio) = tokio::join!(
        client.resolve(&user, "email"),
        client.resolve(&user, "fullName"),
        client.resolve(&user, "bio"),
    );

    assert_eq!(email.unwrap(), Value::from("ada@example.com"));
    assert_eq!(name.unwrap(), Value::from("Ada Lovelace"));
    assert_eq!(bio.unwrap(), Value::from("Analyst"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].query.contains("... on User { bio email fullName }"));
    assert_eq!(requests[0].variables["e0"], json!("u1"));
}

#[tokio::test]
async fn same_field_read_twice_is_requested_once() {
    let transport = RecordingTransport::answering(json!({ "e0": { "fullName": "Ada Lovelace" } }));
    let client = common::client(transport.clone(), RecordingSink::new());
    let user = Identity::new("User", "u1");

    let (first, second) = tokio::join!(
        client.resolve(&user, "fullName"),
        client.resolve(&user, "fullName"),
    );
    assert_eq!(first.unwrap(), second.unwrap());

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query.matches("fullName").count(), 1);
}

#[tokio::test]
async fn cached_fields_are_served_without_transport() {
    let transport = RecordingTransport::answering(json!({ "e0": { "fullName": "Ada Lovelace" } }));
    let client = common::client(transport.clone(), RecordingSink::new());
    let user = Identity::new("User", "u1");

    client.resolve(&user, "fullName").await.unwrap();
    assert_eq!(
        client.read(&user, "fullName"),
        FieldRead::Ready(Value::from("Ada Lovelace"))
    );
    assert_eq!(transport.request_count(), 1);

    let first = client.cache().get(&user).unwrap();
    let second = client.cache().get(&user).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn plan_waits_for_every_field() {
    let transport = RecordingTransport::answering(json!({
        "e0": { "name": "President", "description": "Leads the club" }
    }));
    let client = common::client(transport.clone(), RecordingSink::new());
    let role = Identity::new("MemberRole", "r1");

    let resolved = client
        .resolve_plan(
            &PlanRoot::Entity(role.clone()),
            &FieldPlan::new().field("id").field("name"),
        )
        .await
        .unwrap();

    assert_eq!(resolved, json!({ "id": "r1", "name": "President" }));
    let entity = client.cache().get(&role).unwrap();
    assert_eq!(entity.get("name"), Some(Value::from("President")));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn plan_fails_naming_the_missing_path() {
    let transport = RecordingTransport::answering(json!({ "e0": { "name": "President" } }));
    let client = common::client(transport, RecordingSink::new());

    let err = client
        .resolve_plan(
            &PlanRoot::Entity(Identity::new("MemberRole", "r1")),
            &FieldPlan::new().field("name").field("description"),
        )
        .await
        .unwrap_err();

    let ClientError::PartialResolution { path, source } = err else {
        panic!("expected a partial resolution, got {:?}", err);
    };
    assert_eq!(path, "description");
    assert!(source.is_transport());
}

#[tokio::test]
async fn nested_plan_resolves_level_by_level() {
    let transport = RecordingTransport::new(|request| {
        if request.query.contains("memberRoles") {
            Ok(GraphQLResponse::data(json!({
                "memberRoles": [{ "id": "r1" }, { "id": "r2" }]
            })))
        } else {
            Ok(GraphQLResponse::data(json!({
                "e0": { "name": "President", "description": "Leads" },
                "e1": { "name": "Treasurer", "description": null }
            })))
        }
    });
    let client = common::client(transport.clone(), RecordingSink::new());

    let roles = client.member_roles().await.unwrap();

    assert_eq!(roles.len(), 2);
    assert_eq!(roles[0].name.as_deref(), Some("President"));
    assert_eq!(roles[1].id, "r2");
    assert_eq!(roles[1].description, None);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].query, "query Resolve { memberRoles { id } }");
    assert_eq!(requests[1].variables["e1"], json!("r2"));
}

#[tokio::test]
async fn null_link_ends_the_path() {
    let transport = RecordingTransport::answering(json!({ "viewer": null }));
    let client = common::client(transport.clone(), RecordingSink::new());

    assert_eq!(client.viewer().await.unwrap(), None);
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn transport_error_fails_the_whole_batch() {
    let transport = RecordingTransport::new(|_| Err(ClientError::Transport("offline".into())));
    let client = common::client(transport.clone(), RecordingSink::new());
    let user = Identity::new("User", "u1");

    let (email, bio) = tokio::join!(client.resolve(&user, "email"), client.resolve(&user, "bio"));
    assert_eq!(email.unwrap_err(), ClientError::Transport("offline".into()));
    assert!(bio.is_err());

    // failures are sticky until retried
    assert!(matches!(client.read(&user, "email"), FieldRead::Failed(_)));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn refetch_reloads_root_field() {
    let transport = RecordingTransport::answering(json!({ "memberRoles": [{ "id": "r9" }] }));
    let client = common::client(transport.clone(), RecordingSink::new());
    client.cache().upsert(
        &Identity::root(),
        vec![("memberRoles".to_string(), Value::List(Vec::new()))],
    );

    client
        .resolver()
        .refetch(&RefetchTarget::root_field("memberRoles"))
        .await
        .unwrap();

    assert_eq!(
        client.read(&Identity::root(), "memberRoles"),
        FieldRead::Ready(Value::List(vec![Value::Ref(Identity::new("MemberRole", "r9"))]))
    );
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn directory_lists_users_in_two_rounds() {
    let transport = RecordingTransport::new(|request| {
        if request.query.contains("users") {
            Ok(GraphQLResponse::data(json!({ "users": [{ "id": "u1" }] })))
        } else {
            Ok(GraphQLResponse::data(json!({
                "e0": {
                    "fullName": "Ada Lovelace",
                    "email": "ada@example.com",
                    "phone": null,
                    "photoUrl": null,
                    "websiteUrl": null,
                    "twitterHandle": "ada",
                    "instagramHandle": null,
                    "bio": null
                }
            })))
        }
    });
    let client = common::client(transport.clone(), RecordingSink::new());

    let users = client.users().await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, "u1");
    assert_eq!(users[0].full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(users[0].twitter_handle.as_deref(), Some("ada"));
    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.requests()[0].query, "query Resolve { users { id } }");
}
