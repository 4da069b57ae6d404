//! Executor service tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use entmoot::service::{
    ComputeRequest, CreateCallRequest, CreateSelectionRequest, CreateTupleRequest,
    CreateValueRequest, DisposeRequest, TupleElement,
};
use entmoot::*;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

fn int32() -> TypeSignature {
    DType::Int32.into()
}

fn int_value(n: i32) -> CreateValueRequest {
    CreateValueRequest {
        value: RawValue::Data(Payload::from(n)),
        type_signature: Some(int32()),
    }
}

fn add_one() -> CreateValueRequest {
    let body = Computation::call(
        Computation::intrinsic(Intrinsic::Add(DType::Int32)),
        Some(Computation::unnamed_tuple(vec![
            Computation::reference("x", int32()),
            Computation::literal(1),
        ])),
    );
    CreateValueRequest {
        value: RawValue::Computation(Computation::lambda("x", int32(), body)),
        type_signature: None,
    }
}

fn compute(value_ref: &ValueRef) -> ComputeRequest {
    ComputeRequest {
        value_ref: value_ref.clone(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Round Trip and Composition
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_round_trip_values() {
    let service = ExecutorService::new(EagerExecutor::new());
    let cases = vec![
        (Payload::from(10), int32()),
        (Payload::from(2.5f64), DType::Float64.into()),
        (Payload::from(true), DType::Bool.into()),
        (Payload::string("hi"), DType::String.into()),
        (
            Payload::named(vec![("a", Payload::from(1)), ("b", Payload::from(7i64))]),
            TypeSignature::named_tuple(vec![
                (Some("a"), int32()),
                (Some("b"), DType::Int64.into()),
            ]),
        ),
    ];
    for (payload, ty) in cases {
        let r = service
            .create_value(CreateValueRequest {
                value: RawValue::Data(payload.clone()),
                type_signature: Some(ty),
            })
            .await
            .unwrap();
        assert_eq!(service.compute(compute(&r)).await.unwrap(), payload);
    }
}

#[tokio::test]
async fn test_call_add_one() {
    let service = ExecutorService::new(EagerExecutor::new());
    let f = service.create_value(add_one()).await.unwrap();
    let a = service.create_value(int_value(10)).await.unwrap();
    let call = service
        .create_call(CreateCallRequest {
            function_ref: f,
            argument_ref: Some(a),
        })
        .await
        .unwrap();
    assert_eq!(service.compute(compute(&call)).await.unwrap(), Payload::from(11));
}

#[tokio::test]
async fn test_nullary_call() {
    let service = ExecutorService::new(EagerExecutor::new());
    let f = service
        .create_value(CreateValueRequest {
            value: RawValue::Computation(Computation::nullary(Computation::literal(10))),
            type_signature: None,
        })
        .await
        .unwrap();
    let call = service
        .create_call(CreateCallRequest {
            function_ref: f,
            argument_ref: None,
        })
        .await
        .unwrap();
    assert_eq!(service.compute(compute(&call)).await.unwrap(), Payload::from(10));
}

#[tokio::test]
async fn test_selection_by_name_and_index_agree() {
    let service = ExecutorService::new(EagerExecutor::new());
    let a = service.create_value(int_value(10)).await.unwrap();
    let b = service.create_value(int_value(20)).await.unwrap();
    let t = service
        .create_tuple(CreateTupleRequest {
            elements: vec![
                TupleElement {
                    name: Some("a".into()),
                    value_ref: a,
                },
                TupleElement {
                    name: Some("b".into()),
                    value_ref: b,
                },
            ],
        })
        .await
        .unwrap();

    for (name, index, expected) in [("a", 0, 10), ("b", 1, 20)] {
        let by_name = service
            .create_selection(CreateSelectionRequest::by_name(t.clone(), name))
            .await
            .unwrap();
        let by_index = service
            .create_selection(CreateSelectionRequest::by_index(t.clone(), index))
            .await
            .unwrap();
        let by_name = service.compute(compute(&by_name)).await.unwrap();
        let by_index = service.compute(compute(&by_index)).await.unwrap();
        assert_eq!(by_name, Payload::from(expected));
        assert_eq!(by_index, by_name);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unknown_refs_fail_not_found() {
    let service = ExecutorService::new(EagerExecutor::new());
    let r = service.create_value(int_value(1)).await.unwrap();
    service
        .dispose(DisposeRequest {
            value_ref: r.clone(),
        })
        .unwrap();

    let never = ValueRef::new("never-issued");
    for missing in [r, never] {
        let err = service.compute(compute(&missing)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = service
            .create_call(CreateCallRequest {
                function_ref: missing.clone(),
                argument_ref: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = service
            .create_tuple(CreateTupleRequest {
                elements: vec![TupleElement {
                    name: None,
                    value_ref: missing.clone(),
                }],
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = service
            .create_selection(CreateSelectionRequest::by_index(missing, 0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[tokio::test]
async fn test_unknown_argument_ref_fails_not_found() {
    let service = ExecutorService::new(EagerExecutor::new());
    let f = service.create_value(add_one()).await.unwrap();
    let err = service
        .create_call(CreateCallRequest {
            function_ref: f,
            argument_ref: Some(ValueRef::new("missing")),
        })
        .await
        .unwrap_err();
    assert_eq!(err, ExecutorError::not_found("missing"));
}

#[tokio::test]
async fn test_selection_request_validation() {
    let service = ExecutorService::new(EagerExecutor::new());
    let a = service.create_value(int_value(1)).await.unwrap();
    let t = service
        .create_tuple(CreateTupleRequest {
            elements: vec![TupleElement {
                name: Some("a".into()),
                value_ref: a,
            }],
        })
        .await
        .unwrap();
    for (index, name) in [(Some(0), Some("a".to_string())), (None, None)] {
        let err = service
            .create_selection(CreateSelectionRequest {
                source_ref: t.clone(),
                index,
                name,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

#[tokio::test]
async fn test_ambiguous_and_missing_names() {
    let service = ExecutorService::new(EagerExecutor::new());
    let a = service.create_value(int_value(1)).await.unwrap();
    let b = service.create_value(int_value(2)).await.unwrap();
    let t = service
        .create_tuple(CreateTupleRequest {
            elements: vec![
                TupleElement {
                    name: Some("x".into()),
                    value_ref: a,
                },
                TupleElement {
                    name: Some("x".into()),
                    value_ref: b,
                },
            ],
        })
        .await
        .unwrap();
    let err = service
        .create_selection(CreateSelectionRequest::by_name(t.clone(), "x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("ambiguous"));
    let err = service
        .create_selection(CreateSelectionRequest::by_name(t.clone(), "y"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let second = service
        .create_selection(CreateSelectionRequest::by_index(t, 1))
        .await
        .unwrap();
    assert_eq!(service.compute(compute(&second)).await.unwrap(), Payload::from(2));
}

#[tokio::test]
async fn test_type_errors_are_invalid_argument() {
    let service = ExecutorService::new(EagerExecutor::new());
    let n = service.create_value(int_value(1)).await.unwrap();
    let f = service.create_value(add_one()).await.unwrap();
    let s = service
        .create_value(CreateValueRequest {
            value: RawValue::Data(Payload::string("x")),
            type_signature: Some(DType::String.into()),
        })
        .await
        .unwrap();

    // Non-callable used as function
    let err = service
        .create_call(CreateCallRequest {
            function_ref: n.clone(),
            argument_ref: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Argument type mismatch
    let err = service
        .create_call(CreateCallRequest {
            function_ref: f,
            argument_ref: Some(s),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Non-tuple selection source
    let err = service
        .create_selection(CreateSelectionRequest::by_index(n, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Data without a type, data with the wrong type
    let err = service
        .create_value(CreateValueRequest {
            value: RawValue::Data(Payload::from(1)),
            type_signature: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = service
        .create_value(CreateValueRequest {
            value: RawValue::Data(Payload::from(1)),
            type_signature: Some(DType::Float32.into()),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_ill_typed_references_rejected_at_creation() {
    let service = ExecutorService::new(EagerExecutor::new());

    // Reference typed differently from the parameter it names
    let mistyped = Computation::lambda(
        "x",
        int32(),
        Computation::reference("x", DType::Float32.into()),
    );
    let err = service
        .create_value(CreateValueRequest {
            value: RawValue::Computation(mistyped),
            type_signature: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::TypeMismatch { .. }));

    // Reference to a name nothing binds
    let unbound = Computation::lambda("x", int32(), Computation::reference("y", int32()));
    let err = service
        .create_value(CreateValueRequest {
            value: RawValue::Computation(unbound),
            type_signature: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidArgument(_)));
    assert_eq!(service.live_refs(), 0);
}

#[tokio::test]
async fn test_computed_payloads_conform_to_declared_types() {
    let service = ExecutorService::new(EagerExecutor::new());
    let f = service.create_value(add_one()).await.unwrap();
    let a = service.create_value(int_value(10)).await.unwrap();
    let call = service
        .create_call(CreateCallRequest {
            function_ref: f,
            argument_ref: Some(a.clone()),
        })
        .await
        .unwrap();
    let t = service
        .create_tuple(CreateTupleRequest {
            elements: vec![
                TupleElement {
                    name: Some("sum".into()),
                    value_ref: call.clone(),
                },
                TupleElement {
                    name: None,
                    value_ref: a.clone(),
                },
            ],
        })
        .await
        .unwrap();
    let s = service
        .create_selection(CreateSelectionRequest::by_name(t.clone(), "sum"))
        .await
        .unwrap();

    for value_ref in [a, call, t, s] {
        let declared = service.type_signature(&value_ref).unwrap();
        let payload = service.compute(compute(&value_ref)).await.unwrap();
        assert!(
            payload.conforms_to(&declared),
            "{} does not conform to {}",
            payload,
            declared
        );
    }
}

#[tokio::test]
async fn test_backend_failure_does_not_poison_table() {
    let service = ExecutorService::new(EagerExecutor::new());
    let f = service.create_value(add_one()).await.unwrap();
    let max = service.create_value(int_value(i32::MAX)).await.unwrap();
    let one = service.create_value(int_value(1)).await.unwrap();
    let overflow = service
        .create_call(CreateCallRequest {
            function_ref: f.clone(),
            argument_ref: Some(max),
        })
        .await
        .unwrap();
    let err = service.compute(compute(&overflow)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendFailure);

    let ok = service
        .create_call(CreateCallRequest {
            function_ref: f,
            argument_ref: Some(one),
        })
        .await
        .unwrap();
    assert_eq!(service.compute(compute(&ok)).await.unwrap(), Payload::from(2));
}

// ═══════════════════════════════════════════════════════════════════════
// Concurrency and Idempotency
// ═══════════════════════════════════════════════════════════════════════

/// Blocks `create_value` for the marker string until the gate opens.
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
async fn test_slow_create_does_not_block_others() {
    let gate = Arc::new(Notify::new());
    let service = Arc::new(ExecutorService::new(GatedExecutor {
        inner: EagerExecutor::new(),
        gate: Arc::clone(&gate),
    }));

    let slow = tokio::spawn({
        let service = Arc::clone(&service);
        async move {
            service
                .create_value(CreateValueRequest {
                    value: RawValue::Data(Payload::string("block")),
                    type_signature: Some(DType::String.into()),
                })
                .await
        }
    });
    tokio::task::yield_now().await;

    let fast = tokio::time::timeout(Duration::from_secs(5), async {
        let r = service.create_value(int_value(5)).await?;
        service.compute(compute(&r)).await
    })
    .await
    .expect("independent request stalled behind the slow one")
    .unwrap();
    assert_eq!(fast, Payload::from(5));
    assert!(!slow.is_finished());

    gate.notify_one();
    let r = slow.await.unwrap().unwrap();
    assert_eq!(service.compute(compute(&r)).await.unwrap(), Payload::string("block"));
}

#[tokio::test]
async fn test_compute_twice_evaluates_once() {
    let executor = Arc::new(EagerExecutor::new());
    let service = Arc::new(ExecutorService::from_arc(Arc::clone(&executor)));
    let f = service.create_value(add_one()).await.unwrap();
    let a = service.create_value(int_value(10)).await.unwrap();
    let call = service
        .create_call(CreateCallRequest {
            function_ref: f,
            argument_ref: Some(a),
        })
        .await
        .unwrap();
    let before = executor.evaluation_count();

    let (x, y) = tokio::join!(
        service.compute(compute(&call)),
        service.compute(compute(&call))
    );
    let x = x.unwrap();
    assert_eq!(x, Payload::from(11));
    assert_eq!(y.unwrap(), x);
    assert_eq!(service.compute(compute(&call)).await.unwrap(), x);
    assert_eq!(executor.evaluation_count() - before, 1);
}

#[tokio::test]
async fn test_many_concurrent_callers() {
    let service = Arc::new(ExecutorService::new(EagerExecutor::new()));
    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let r = service.create_value(int_value(n)).await?;
                let payload = service.compute(compute(&r)).await?;
                Ok::<_, ExecutorError>((n, r, payload))
            })
        })
        .collect();

    let mut refs = std::collections::HashSet::new();
    for task in tasks {
        let (n, r, payload) = task.await.unwrap().unwrap();
        assert_eq!(payload, Payload::from(n));
        assert!(refs.insert(r));
    }
    assert_eq!(service.live_refs(), 32);
}
