use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::post;
use axum::{Json, Router};
use lattice::{
    AuthSession, Client, ClientConfig, ClientError, GraphQLRequest, HttpTransport, SignedInUser,
    TokenSource, Transport,
};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Seen {
    authorization: Arc<Mutex<Vec<Option<String>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

async fn graphql(State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    seen.authorization.lock().unwrap().push(authorization);

    let query = body["query"].as_str().unwrap_or_default().to_string();
    seen.queries.lock().unwrap().push(query.clone());

    if query.contains("node(") {
        Json(json!({
            "data": {
                "e0": {
                    "fullName": "Ada Lovelace",
                    "email": "ada@example.com",
                    "phone": null,
                    "photoUrl": null,
                    "websiteUrl": "https://ada.example.com",
                    "twitterHandle": "ada",
                    "instagramHandle": null,
                    "bio": "Analyst"
                }
            }
        }))
    } else {
        Json(json!({ "data": { "viewer": { "id": "u1" } } }))
    }
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn spawn_server(seen: Seen) -> SocketAddr {
    let app = Router::new()
        .route("/api/graphql", post(graphql))
        .route("/broken/graphql", post(unavailable))
        .with_state(seen);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn bearer_token_follows_the_session() {
    let seen = Seen::default();
    let addr = spawn_server(seen.clone()).await;
    let session = Arc::new(AuthSession::new());
    let tokens: Arc<dyn TokenSource> = session.clone();
    let config = ClientConfig::new().origin(&format!("http://{}", addr));
    let transport = HttpTransport::new(&config, Some(tokens)).unwrap();
    assert_eq!(transport.endpoint(), format!("http://{}/api/graphql", addr));

    let request = GraphQLRequest::new("query Resolve { viewer { id } }");
    transport.execute(request.clone()).await.unwrap();

    session.sign_in(SignedInUser::new(Some("Ada Lovelace"), "token-1")).await;
    let response = transport.execute(request).await.unwrap();
    assert_eq!(response.into_data().unwrap(), json!({ "viewer": { "id": "u1" } }));

    let authorization = seen.authorization.lock().unwrap().clone();
    assert_eq!(authorization, vec![None, Some("Bearer token-1".to_string())]);
}

#[tokio::test]
async fn http_errors_become_transport_errors() {
    let addr = spawn_server(Seen::default()).await;
    let config = ClientConfig::new().api_url(&format!("http://{}/broken", addr));
    let transport = HttpTransport::new(&config, None).unwrap();

    let err = transport
        .execute(GraphQLRequest::new("query Resolve { viewer { id } }"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(message) if message.contains("503")));
}

#[tokio::test]
async fn missing_endpoint_is_a_configuration_error() {
    let err = Client::connect(&ClientConfig::new()).err().unwrap();
    assert_eq!(
        err,
        ClientError::Configuration("Unable to determine GraphQL endpoint.".into())
    );
}

#[tokio::test]
async fn client_reads_viewer_over_http() {
    let seen = Seen::default();
    let addr = spawn_server(seen.clone()).await;
    let client = Client::connect(&ClientConfig::new().api_url(&format!("http://{}/api", addr))).unwrap();

    let viewer = client.viewer().await.unwrap().unwrap();

    assert_eq!(viewer.id, "u1");
    assert_eq!(viewer.full_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(viewer.twitter_handle.as_deref(), Some("ada"));
    assert_eq!(viewer.phone, None);

    let queries = seen.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0], "query Resolve { viewer { id } }");
    assert!(queries[1].starts_with("query Resolve($e0: ID!)"));
}
