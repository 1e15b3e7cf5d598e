use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Form, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};

use super::*;

#[derive(Debug, Clone)]
struct SeenRequest {
    fields: HashMap<String, String>,
    cache_control: Option<String>,
}

#[derive(Clone, Default)]
struct ServerState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

async fn handle_sijax(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    let cache_control = headers
        .get("cache-control")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let function = fields.get("sijax_rq").cloned().unwrap_or_default();
    state.seen.lock().await.push(SeenRequest {
        fields,
        cache_control,
    });

    match function.as_str() {
        "greet" => (
            StatusCode::OK,
            json!([
                { "type": "html", "selector": "#out", "setType": "replace", "html": "hi" },
                { "type": "alert", "alert": "done" }
            ])
            .to_string(),
        ),
        "broken" => (StatusCode::OK, "<html>oops</html>".to_owned()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "no handler".to_owned()),
    }
}

async fn spawn_sijax_server() -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let state = ServerState::default();
    let app = Router::new()
        .route("/sijax", post(handle_sijax))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn transport(base: &str) -> HttpTransport {
    HttpTransport::new(Duration::from_secs(5))
        .expect("http client")
        .with_base_url(Url::parse(base).expect("base url"))
}

#[tokio::test]
async fn posts_form_fields_and_decodes_the_batch() {
    let (base, state) = spawn_sijax_server().await;
    let payload = RequestPayload::new("greet", vec![json!("Ann"), json!({ "age": 3 })]);

    let batch = transport(&base)
        .post("/sijax", &payload)
        .await
        .expect("post");
    assert_eq!(batch.len(), 2);

    let seen = state.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].fields.get("sijax_rq").map(String::as_str), Some("greet"));
    let args: serde_json::Value =
        serde_json::from_str(seen[0].fields.get("sijax_args").expect("args field"))
            .expect("args json");
    assert_eq!(args, json!(["Ann", { "age": 3 }]));
    assert_eq!(seen[0].cache_control.as_deref(), Some("no-cache"));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let (base, _state) = spawn_sijax_server().await;
    let err = transport(&base)
        .post("/sijax", &RequestPayload::new("missing", Vec::new()))
        .await
        .expect_err("status error");
    assert!(matches!(err, TransportError::Status { status: 500, .. }));
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let (base, _state) = spawn_sijax_server().await;
    let err = transport(&base)
        .post("/sijax", &RequestPayload::new("broken", Vec::new()))
        .await
        .expect_err("decode error");
    assert!(matches!(err, TransportError::Decode { .. }));
}

#[test]
fn relative_uri_without_base_is_invalid() {
    let transport = HttpTransport::new(Duration::from_secs(1)).expect("http client");
    assert!(matches!(
        transport.resolve("/sijax"),
        Err(TransportError::InvalidUri { .. })
    ));
    assert_eq!(
        transport
            .resolve("http://example.test/a")
            .expect("absolute")
            .as_str(),
        "http://example.test/a"
    );
}
