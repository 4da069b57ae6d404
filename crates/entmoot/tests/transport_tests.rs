//! End-to-end tests over the TCP harness

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use entmoot::service::{CreateSelectionRequest, CreateValueRequest};
use entmoot::transport::{Server, ServerHandle};
use entmoot::*;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Notify;

fn int32() -> TypeSignature {
    DType::Int32.into()
}

fn add_one() -> Computation {
    Computation::lambda(
        "x",
        int32(),
        Computation::call(
            Computation::intrinsic(Intrinsic::Add(DType::Int32)),
            Some(Computation::unnamed_tuple(vec![
                Computation::reference("x", int32()),
                Computation::literal(1),
            ])),
        ),
    )
}

async fn start<E: Executor + 'static>(executor: E) -> (ServerHandle, Arc<ExecutorService<E>>) {
    let service = Arc::new(ExecutorService::new(executor));
    let server = Server::bind("127.0.0.1:0", Arc::clone(&service))
        .await
        .unwrap();
    (server.spawn().unwrap(), service)
}

// ═══════════════════════════════════════════════════════════════════════
// Client Protocol
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_client_round_trip_and_call() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let client = ExecutorClient::connect(server.local_addr()).await.unwrap();

    let a = client
        .create_value(Payload::from(10).into(), Some(int32()))
        .await
        .unwrap();
    assert_eq!(client.compute(&a).await.unwrap(), Payload::from(10));

    let f = client.create_value(add_one().into(), None).await.unwrap();
    let call = client.create_call(&f, Some(&a)).await.unwrap();
    assert_eq!(client.compute(&call).await.unwrap(), Payload::from(11));
    server.shutdown();
}

#[tokio::test]
async fn test_client_tuple_selection() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let client = ExecutorClient::connect(server.local_addr()).await.unwrap();

    let a = client
        .create_value(Payload::from(10).into(), Some(int32()))
        .await
        .unwrap();
    let b = client
        .create_value(Payload::from(20).into(), Some(int32()))
        .await
        .unwrap();
    let t = client
        .create_tuple(vec![(Some("a".into()), a), (Some("b".into()), b)])
        .await
        .unwrap();
    let by_name = client
        .create_selection(&t, Selection::Name("b".into()))
        .await
        .unwrap();
    let by_index = client.create_selection(&t, Selection::Index(1)).await.unwrap();
    assert_eq!(client.compute(&by_name).await.unwrap(), Payload::from(20));
    assert_eq!(client.compute(&by_index).await.unwrap(), Payload::from(20));
    assert_eq!(
        client.compute(&t).await.unwrap(),
        Payload::named(vec![("a", Payload::from(10)), ("b", Payload::from(20))])
    );
    server.shutdown();
}

#[tokio::test]
async fn test_errors_cross_the_wire_structured() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let client = ExecutorClient::connect(server.local_addr()).await.unwrap();

    let a = client
        .create_value(Payload::from(1).into(), Some(int32()))
        .await
        .unwrap();
    client.dispose(&a).await.unwrap();
    assert_eq!(
        client.compute(&a).await.unwrap_err(),
        ExecutorError::not_found(a.id())
    );
    assert_eq!(
        client.dispose(&a).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let both = Request::CreateSelection(CreateSelectionRequest {
        source_ref: a,
        index: Some(0),
        name: Some("a".into()),
    });
    let err = client
        .request(both)
        .await
        .unwrap()
        .into_value_ref()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    server.shutdown();
}

#[tokio::test]
async fn test_malformed_frames_do_not_kill_connection() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(b"this is not json\n").await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let resp: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(resp["id"], 0);
    assert_eq!(resp["body"]["type"], "error");
    assert_eq!(resp["body"]["error"]["kind"], "InvalidArgument");

    let req = serde_json::json!({
        "id": 9,
        "body": {
            "type": "create_value",
            "value": { "Data": { "Int32": 4 } },
            "type_signature": { "Tensor": "Int32" }
        }
    });
    writer
        .write_all(format!("{}\n", req).as_bytes())
        .await
        .unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let resp: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(resp["id"], 9);
    assert_eq!(resp["body"]["type"], "created");
    server.shutdown();
}

#[tokio::test]
async fn test_non_finite_floats_cross_the_wire() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let client = ExecutorClient::connect(server.local_addr()).await.unwrap();
    let float64: TypeSignature = DType::Float64.into();

    // x -> multiply(<x,x>) overflows to inf for large x
    let square = Computation::lambda(
        "x",
        float64.clone(),
        Computation::call(
            Computation::intrinsic(Intrinsic::Multiply(DType::Float64)),
            Some(Computation::unnamed_tuple(vec![
                Computation::reference("x", float64.clone()),
                Computation::reference("x", float64.clone()),
            ])),
        ),
    );
    let f = client.create_value(square.into(), None).await.unwrap();
    let big = client
        .create_value(Payload::from(1e300f64).into(), Some(float64.clone()))
        .await
        .unwrap();
    let call = client.create_call(&f, Some(&big)).await.unwrap();
    let out = tokio::time::timeout(Duration::from_secs(5), client.compute(&call))
        .await
        .expect("compute of an infinite result stalled")
        .unwrap();
    assert_eq!(out, Payload::Float64(f64::INFINITY));

    let nan = client
        .create_value(Payload::Float64(f64::NAN).into(), Some(float64.clone()))
        .await
        .unwrap();
    let out = client.compute(&nan).await.unwrap();
    assert!(out.as_f64().unwrap().is_nan());

    let neg = client
        .create_value(
            Payload::Float32(f32::NEG_INFINITY).into(),
            Some(DType::Float32.into()),
        )
        .await
        .unwrap();
    assert_eq!(
        client.compute(&neg).await.unwrap(),
        Payload::Float32(f32::NEG_INFINITY)
    );
    server.shutdown();
}

#[tokio::test]
async fn test_oversized_request_frame_rejected() {
    let service = Arc::new(ExecutorService::new(EagerExecutor::new()));
    let server = Server::bind("127.0.0.1:0", Arc::clone(&service))
        .await
        .unwrap()
        .with_max_frame_len(256)
        .spawn()
        .unwrap();
    let stream = TcpStream::connect(server.local_addr()).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let huge = format!("{{\"id\":1,\"body\":\"{}\"}}\n", "x".repeat(1000));
    writer.write_all(huge.as_bytes()).await.unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let resp: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(resp["id"], 0);
    assert_eq!(resp["body"]["error"]["kind"], "InvalidArgument");

    // The connection keeps serving frames within the limit
    let req = serde_json::json!({
        "id": 2,
        "body": {
            "type": "create_value",
            "value": { "Data": { "Int32": 4 } },
            "type_signature": { "Tensor": "Int32" }
        }
    });
    writer
        .write_all(format!("{}\n", req).as_bytes())
        .await
        .unwrap();
    let line = lines.next_line().await.unwrap().unwrap();
    let resp: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(resp["id"], 2);
    assert_eq!(resp["body"]["type"], "created");
    assert_eq!(service.live_refs(), 1);
    server.shutdown();
}

#[tokio::test]
async fn test_oversized_response_fails_instead_of_hanging() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let client = ExecutorClient::connect_with_max_frame_len(server.local_addr(), 256)
        .await
        .unwrap();

    let long = client
        .create_value(
            Payload::string("z".repeat(1000)).into(),
            Some(DType::String.into()),
        )
        .await
        .unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), client.compute(&long))
        .await
        .expect("oversized response left the caller waiting")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(client.is_closed());
    server.shutdown();
}

// ═══════════════════════════════════════════════════════════════════════
// Concurrency
// ═══════════════════════════════════════════════════════════════════════

struct GatedExecutor {
    inner: EagerExecutor,
    gate: Arc<Notify>,
}

#[async_trait]
impl Executor for GatedExecutor {
    type Value = EagerValue;

    async fn create_value(
        &self,
        value: RawValue,
        type_signature: Option<TypeSignature>,
    ) -> Result<EagerValue> {
        if value == RawValue::Data(Payload::string("block")) {
            self.gate.notified().await;
        }
        self.inner.create_value(value, type_signature).await
    }

    async fn create_call(
        &self,
        function: EagerValue,
        argument: Option<EagerValue>,
    ) -> Result<EagerValue> {
        self.inner.create_call(function, argument).await
    }

    async fn create_tuple(&self, elements: Vec<(Option<String>, EagerValue)>) -> Result<EagerValue> {
        self.inner.create_tuple(elements).await
    }

    async fn create_selection(&self, source: EagerValue, selection: Selection) -> Result<EagerValue> {
        self.inner.create_selection(source, selection).await
    }
}

#[tokio::test]
async fn test_slow_request_does_not_block_same_connection() {
    let gate = Arc::new(Notify::new());
    let (server, _service) = start(GatedExecutor {
        inner: EagerExecutor::new(),
        gate: Arc::clone(&gate),
    })
    .await;
    let client = ExecutorClient::connect(server.local_addr()).await.unwrap();

    let slow = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .request(Request::CreateValue(CreateValueRequest {
                    value: Payload::string("block").into(),
                    type_signature: Some(DType::String.into()),
                }))
                .await
        }
    });

    let fast = tokio::time::timeout(Duration::from_secs(5), async {
        let r = client
            .create_value(Payload::from(3).into(), Some(int32()))
            .await?;
        client.compute(&r).await
    })
    .await
    .expect("request on the same connection stalled")
    .unwrap();
    assert_eq!(fast, Payload::from(3));
    assert!(!slow.is_finished());

    gate.notify_one();
    let r = slow.await.unwrap().unwrap().into_value_ref().unwrap();
    assert_eq!(client.compute(&r).await.unwrap(), Payload::string("block"));
    server.shutdown();
}

// ═══════════════════════════════════════════════════════════════════════
// Remote Executor
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_remote_executor_matches_local() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let remote = RemoteExecutor::connect(server.local_addr()).await.unwrap();

    let f = remote.create_value(add_one().into(), None).await.unwrap();
    assert_eq!(f.type_signature().to_string(), "(int32 -> int32)");
    let a = remote
        .create_value(Payload::from(41).into(), Some(int32()))
        .await
        .unwrap();
    let call = remote.create_call(f, Some(a)).await.unwrap();
    assert_eq!(call.compute().await.unwrap(), Payload::from(42));
    assert_eq!(call.compute().await.unwrap(), Payload::from(42));
    server.shutdown();
}

#[tokio::test]
async fn test_remote_executor_checks_types_locally() {
    let (server, service) = start(EagerExecutor::new()).await;
    let remote = RemoteExecutor::connect(server.local_addr()).await.unwrap();

    let n = remote
        .create_value(Payload::from(1).into(), Some(int32()))
        .await
        .unwrap();
    let live = service.live_refs();
    let err = remote.create_call(n.clone(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = remote
        .create_selection(n.clone(), Selection::Name("a".into()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(service.live_refs(), live);
    server.shutdown();
}

#[tokio::test]
async fn test_dropping_remote_value_disposes_it() {
    let (server, service) = start(EagerExecutor::new()).await;
    let remote = RemoteExecutor::connect(server.local_addr()).await.unwrap();

    let v = remote
        .create_value(Payload::from(1).into(), Some(int32()))
        .await
        .unwrap();
    let value_ref = v.value_ref().clone();
    assert!(service.contains(&value_ref));
    drop(v);

    tokio::time::timeout(Duration::from_secs(5), async {
        while service.contains(&value_ref) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("remote value was not disposed");
    server.shutdown();
}

#[tokio::test]
async fn test_service_over_remote_executor() {
    // A proxy service whose backend is another service across the wire
    let (backend, _service) = start(EagerExecutor::new()).await;
    let remote = RemoteExecutor::connect(backend.local_addr()).await.unwrap();
    let (proxy, _proxy_service) = start(remote).await;
    let client = ExecutorClient::connect(proxy.local_addr()).await.unwrap();

    let f = client.create_value(add_one().into(), None).await.unwrap();
    let a = client
        .create_value(Payload::from(1).into(), Some(int32()))
        .await
        .unwrap();
    let call = client.create_call(&f, Some(&a)).await.unwrap();
    assert_eq!(client.compute(&call).await.unwrap(), Payload::from(2));
    proxy.shutdown();
    backend.shutdown();
}

#[tokio::test]
async fn test_execution_context_over_remote() {
    let (server, _service) = start(EagerExecutor::new()).await;
    let remote = RemoteExecutor::connect(server.local_addr()).await.unwrap();
    let ctx = ExecutionContext::new(remote);

    let out = ctx
        .run(add_one(), Some((Payload::from(5), int32())))
        .await
        .unwrap();
    assert_eq!(out, Payload::from(6));
    server.shutdown();
}
