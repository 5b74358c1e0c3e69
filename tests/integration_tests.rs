//! Integration tests for the servell RPC bridge.

use servell::prelude::*;
use servell::rpc::{Member, ARGS_HEADER, FUNCTION_HEADER};
use std::sync::{Arc, Mutex};

/// Business logic shared by the server and client declarations.
async fn get_balance(invocation: Invocation) -> Result<Value, Failure> {
    let id: String = invocation.arg_as(0)?;
    if id == "u1" {
        Ok(json!(42))
    } else {
        Err(Failure::new("not found"))
    }
}

async fn greet(invocation: Invocation) -> Result<Value, Failure> {
    let name: String = invocation.arg_as(0)?;
    Ok(json!(format!("Hello, {}", name)))
}

async fn always_missing(_invocation: Invocation) -> Result<Value, Failure> {
    Err(Failure::new("not found"))
}

/// Client-side body: leaves the raw response to the caller.
async fn passthrough(_invocation: Invocation) -> Result<Value, Failure> {
    Ok(Value::Null)
}

/// Client-side body that decodes the envelope itself.
async fn unwrap_envelope(invocation: Invocation) -> Result<Value, Failure> {
    let response = invocation
        .response()
        .ok_or_else(|| Failure::new("no response"))?;
    let envelope: Envelope = response
        .json_body::<Envelope>()
        .ok_or_else(|| Failure::new("empty body"))??;
    Ok(envelope.data().cloned().unwrap_or(Value::Null))
}

#[rpc_method(name = "deposit", verb = "POST", body = "json", header = "X-Tenant: acme")]
async fn deposit(invocation: Invocation) -> Result<Value, Failure> {
    let amount: Value = invocation.arg_as(0)?;
    Ok(json!({ "received": amount }))
}

#[rpc_method(content = "text")]
async fn summary(_invocation: Invocation) -> Result<Value, Failure> {
    Ok(json!([1, 2, 3]))
}

/// Forwards to a dispatcher and keeps every request it sent.
struct RecordingTransport {
    inner: LocalTransport,
    seen: Mutex<Vec<RpcRequest>>,
}

impl RecordingTransport {
    fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inner: LocalTransport::new(dispatcher),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn last(&self) -> RpcRequest {
        self.seen.lock().unwrap().last().cloned().expect("a request was sent")
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        self.seen.lock().unwrap().push(request.clone());
        self.inner.send(request).await
    }
}

struct Bridge {
    registry: Arc<FunctionRegistry>,
    server: AugmentedClass,
    client: AugmentedClass,
    transport: Arc<RecordingTransport>,
}

/// Augment `Accounts` on both sides of an in-process bridge.
async fn bridge(server_def: ClassDef, client_def: ClassDef) -> Bridge {
    let registry = Arc::new(FunctionRegistry::new());
    let transport = Arc::new(RecordingTransport::new(Dispatcher::new(registry.clone())));

    let server = Augmenter::new(registry.clone())
        .augment(server_def, &AugmentOptions::server())
        .await
        .unwrap();
    let client = Augmenter::new(registry.clone())
        .with_transport(transport.clone())
        .augment(client_def, &AugmentOptions::client())
        .await
        .unwrap();

    Bridge {
        registry,
        server,
        client,
        transport,
    }
}

fn response_of(outcome: Outcome) -> RpcResponse {
    match outcome {
        Outcome::Response(response) => response,
        other => panic!("expected a raw response, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_balance_scenario() {
    let bridge = bridge(
        ClassDef::new("Accounts").method("getBalance", get_balance),
        ClassDef::new("Accounts").method("getBalance", passthrough),
    )
    .await;

    let outcome = bridge.client.call("getBalance", vec![json!("u1")]).await.unwrap();
    let response = response_of(outcome);

    let request = bridge.transport.last();
    assert_eq!(request.url, "/api/rpc");
    assert_eq!(request.method, Verb::Get);
    assert_eq!(
        request.get_header(FUNCTION_HEADER),
        Some(&"Accounts.getBalance".to_string())
    );
    assert_eq!(request.get_header(ARGS_HEADER), Some(&r#"["u1"]"#.to_string()));

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text_body(), Some(r#"{"status":"ok","data":42}"#.to_string()));
}

#[tokio::test]
async fn test_failing_method_scenario() {
    let bridge = bridge(
        ClassDef::new("Accounts").method("getBalance", always_missing),
        ClassDef::new("Accounts").method("getBalance", passthrough),
    )
    .await;

    let response = response_of(bridge.client.call("getBalance", vec![json!("u1")]).await.unwrap());

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.text_body(),
        Some(r#"{"status":"error","data":"Error: not found"}"#.to_string())
    );
}

#[tokio::test]
async fn test_body_mode_scenario() {
    let bridge = bridge(
        ClassDef::new("Accounts").declare::<DepositMethod>(),
        ClassDef::new("Accounts")
            .method("deposit", passthrough)
            .param("deposit", DepositMethod::meta()),
    )
    .await;

    let response = response_of(bridge.client.call("deposit", vec![json!({"amt": 5})]).await.unwrap());

    let request = bridge.transport.last();
    assert_eq!(request.method, Verb::Post);
    assert_eq!(request.get_header(ARGS_HEADER), Some(&"body".to_string()));
    assert_eq!(request.get_header("X-Tenant"), Some(&"acme".to_string()));
    assert_eq!(request.text(), Some(r#"[{"amt":5}]"#.to_string()));

    let envelope = Envelope::from_response(&response).unwrap();
    assert_eq!(envelope, Envelope::ok(json!({"received": {"amt": 5}})));
}

#[tokio::test]
async fn test_round_trip_matches_direct_call() {
    let bridge = bridge(
        ClassDef::new("Accounts").method("getBalance", get_balance),
        ClassDef::new("Accounts").method("getBalance", passthrough),
    )
    .await;

    for id in ["u1", "u2"] {
        let direct = bridge.server.call("getBalance", vec![json!(id)]).await.unwrap();
        let remote = response_of(bridge.client.call("getBalance", vec![json!(id)]).await.unwrap());

        let direct = direct.envelope().cloned().expect("server call yields an envelope");
        assert_eq!(Envelope::from_response(&remote).unwrap(), direct);
    }
}

#[tokio::test]
async fn test_truthy_client_body_result_is_returned() {
    let bridge = bridge(
        ClassDef::new("Accounts").method("getBalance", get_balance),
        ClassDef::new("Accounts").method("getBalance", unwrap_envelope),
    )
    .await;

    let outcome = bridge.client.call("getBalance", vec![json!("u1")]).await.unwrap();
    assert_eq!(outcome, Outcome::Value(json!(42)));
}

#[tokio::test]
async fn test_text_content_declared_by_macro() {
    assert_eq!(SummaryMethod::NAME, "summary");
    assert_eq!(SummaryMethod::meta().content, ContentMode::Text);

    let bridge = bridge(
        ClassDef::new("Reports").declare::<SummaryMethod>(),
        ClassDef::new("Reports").method("summary", unwrap_envelope),
    )
    .await;

    let outcome = bridge.client.call("summary", vec![]).await.unwrap();
    assert_eq!(outcome, Outcome::Value(json!("1,2,3")));
}

#[tokio::test]
async fn test_macro_metadata() {
    let meta = DepositMethod::meta();
    assert_eq!(DepositMethod::NAME, "deposit");
    assert_eq!(meta.verb, Verb::Post);
    assert_eq!(meta.body, BodyMode::Json);
    assert_eq!(meta.headers, vec![("X-Tenant".to_string(), "acme".to_string())]);
    assert!(meta.cache.is_none());
}

#[tokio::test]
async fn test_missing_function_header_never_reaches_registry() {
    let registry = Arc::new(FunctionRegistry::new());
    let dispatcher = Dispatcher::new(registry);

    let request = RpcRequest::new(Verb::Get, "/api/rpc").header(ARGS_HEADER, "[]");
    let err = dispatcher.dispatch(request).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Required headers 'X-Servell-Function' or 'X-Servell-Args' missing from the request"
    );
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unregistered_method_is_404() {
    let bridge = bridge(
        ClassDef::new("Accounts").method("getBalance", get_balance),
        ClassDef::new("Accounts").method("close", passthrough),
    )
    .await;

    let response = response_of(bridge.client.call("close", vec![]).await.unwrap());
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let envelope = Envelope::from_response(&response).unwrap();
    assert_eq!(
        envelope,
        Envelope::error("Function 'Accounts.close' is not registered at '/api/rpc'")
    );
}

#[tokio::test]
async fn test_every_verb_handler_dispatches() {
    let registry = Arc::new(FunctionRegistry::new());
    Augmenter::new(registry.clone())
        .augment(
            ClassDef::new("Accounts").method("getBalance", get_balance),
            &AugmentOptions::server(),
        )
        .await
        .unwrap();
    let dispatcher = Dispatcher::new(registry);

    for verb in Verb::ALL {
        let request = RpcRequest::new(verb, "/api/rpc")
            .header(FUNCTION_HEADER, "Accounts.getBalance")
            .header(ARGS_HEADER, r#"["u1"]"#);
        let response = match verb {
            Verb::Get => dispatcher.get_handler(request).await,
            Verb::Post => dispatcher.post_handler(request).await,
            Verb::Put => dispatcher.put_handler(request).await,
            Verb::Patch => dispatcher.patch_handler(request).await,
            Verb::Delete => dispatcher.delete_handler(request).await,
        }
        .unwrap();
        assert_eq!(response.status, StatusCode::OK, "verb {}", verb);
    }
}

#[tokio::test]
async fn test_endpoints_are_separate_namespaces() {
    let registry = Arc::new(FunctionRegistry::new());
    let augmenter = Augmenter::new(registry.clone());

    augmenter
        .augment(
            ClassDef::new("Accounts").method("getBalance", get_balance),
            &AugmentOptions::server().endpoint("/internal/rpc"),
        )
        .await
        .unwrap();

    assert!(registry.contains("/internal/rpc", "Accounts").await);
    assert!(!registry.contains("/api/rpc", "Accounts").await);

    let dispatcher = Dispatcher::new(registry);
    let request = RpcRequest::new(Verb::Get, "/api/rpc")
        .header(FUNCTION_HEADER, "Accounts.getBalance")
        .header(ARGS_HEADER, r#"["u1"]"#);
    let response = dispatcher.dispatch(request).await.unwrap();
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_client_augmentation_leaves_server_bucket_intact() {
    let bridge = bridge(
        ClassDef::new("Accounts").method("getBalance", get_balance),
        ClassDef::new("Accounts").method("getBalance", passthrough),
    )
    .await;

    assert!(matches!(bridge.client.member("getBalance"), Some(Member::Client(_))));
    assert_eq!(
        bridge.registry.methods("/api/rpc", "Accounts").await,
        vec!["getBalance".to_string()]
    );
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let registry = Arc::new(FunctionRegistry::new());
    Augmenter::new(registry.clone())
        .augment(
            ClassDef::new("Accounts")
                .method("getBalance", get_balance)
                .declare::<DepositMethod>(),
            &AugmentOptions::server(),
        )
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = RpcServer::new(ServerConfig::new().host("127.0.0.1"), registry.clone());
    tokio::spawn(server.serve(listener));

    let transport = Arc::new(HttpTransport::new(format!("http://{}", addr)));

    let health = transport
        .send(RpcRequest::new(Verb::Get, "/_health"))
        .await
        .unwrap();
    assert_eq!(health.text_body(), Some("OK".to_string()));

    let client = Augmenter::new(Arc::new(FunctionRegistry::new()))
        .with_transport(transport.clone())
        .augment(
            ClassDef::new("Accounts")
                .method("getBalance", passthrough)
                .method("deposit", unwrap_envelope)
                .param("deposit", DepositMethod::meta()),
            &AugmentOptions::client(),
        )
        .await
        .unwrap();

    let response = response_of(client.call("getBalance", vec![json!("u1")]).await.unwrap());
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(Envelope::from_response(&response).unwrap(), Envelope::ok(42));

    let outcome = client.call("deposit", vec![json!({"amt": 5})]).await.unwrap();
    assert_eq!(outcome, Outcome::Value(json!({"received": {"amt": 5}})));

    let malformed = transport
        .send(
            RpcRequest::new(Verb::Get, "/api/rpc")
                .header(FUNCTION_HEADER, "Accounts")
                .header(ARGS_HEADER, "[]"),
        )
        .await
        .unwrap();
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_non_ascii_arguments_over_http() {
    let registry = Arc::new(FunctionRegistry::new());
    Augmenter::new(registry.clone())
        .augment(
            ClassDef::new("Greeter").method("greet", greet),
            &AugmentOptions::server(),
        )
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(RpcServer::new(ServerConfig::new().host("127.0.0.1"), registry).serve(listener));

    let client = Augmenter::new(Arc::new(FunctionRegistry::new()))
        .with_transport(Arc::new(HttpTransport::new(format!("http://{}", addr))))
        .augment(
            ClassDef::new("Greeter").method("greet", passthrough),
            &AugmentOptions::client(),
        )
        .await
        .unwrap();

    let response = response_of(client.call("greet", vec![json!("Zoë 🌍")]).await.unwrap());
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        Envelope::from_response(&response).unwrap(),
        Envelope::ok("Hello, Zoë 🌍")
    );
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let registry = Arc::new(FunctionRegistry::new());
    Augmenter::new(registry.clone())
        .augment(
            ClassDef::new("Accounts").declare::<DepositMethod>(),
            &AugmentOptions::server(),
        )
        .await
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig::new().host("127.0.0.1").max_body_size(64);
    tokio::spawn(RpcServer::new(config, registry).serve(listener));

    let transport = HttpTransport::new(format!("http://{}", addr));
    let request = |note: String| {
        RpcRequest::new(Verb::Post, "/api/rpc")
            .header(FUNCTION_HEADER, "Accounts.deposit")
            .header(ARGS_HEADER, "body")
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&json!([{ "note": note }])).unwrap())
    };

    let accepted = transport.send(request("small".to_string())).await.unwrap();
    assert_eq!(accepted.status, StatusCode::OK);

    let rejected = transport.send(request("x".repeat(256))).await.unwrap();
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert!(rejected.text_body().unwrap().contains("exceeds the limit of 64 bytes"));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Augmenter::new(Arc::new(FunctionRegistry::new()))
        .with_transport(Arc::new(HttpTransport::new(format!("http://{}", addr))))
        .augment(
            ClassDef::new("Accounts").method("getBalance", passthrough),
            &AugmentOptions::client(),
        )
        .await
        .unwrap();

    let err = client.call("getBalance", vec![json!("u1")]).await.err().unwrap();
    assert!(matches!(err, RpcError::Transport(_)));
}
