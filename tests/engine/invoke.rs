//! Engine invoke tests — dispatch, argument handling, speculative apply and
//! settlement, exercised through mock state/transport hosts.

use std::collections::BTreeMap;
use std::sync::Arc;

use optimistic_ui::engine::RemoteError;
use optimistic_ui::error::InvokeError;
use optimistic_ui::overlay::OverlayEvent;
use optimistic_ui::registry::{
    operation, OperationRegistry, ParamType, Script, ScriptOp, ValueTemplate,
};
use serde_json::{json, Value};

use super::support::{
    build_engine, recorder, todo_registry, wait_until, CallRecord, MockSource, MockTransport,
};

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn unknown_operation_calls_remote_directly() {
    let transport = Arc::new(MockTransport::new());
    let engine = build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    );

    let result = engine
        .invoke("unknownOp", vec![json!(1), json!("x")])
        .await
        .unwrap();

    assert_eq!(result, Value::Null);
    assert_eq!(
        transport.calls(),
        vec![CallRecord {
            operation: "unknownOp".to_string(),
            args: vec![json!(1), json!("x")],
        }]
    );
    assert!(!engine.has_pending(), "no speculative state for unknown ops");
}

#[tokio::test]
async fn injected_id_prepends_to_remote_args() {
    let transport = Arc::new(MockTransport::new());
    let engine = build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    );

    engine
        .invoke("createTodo", vec![json!("buy milk")])
        .await
        .unwrap();

    assert_eq!(
        transport.calls(),
        vec![CallRecord {
            operation: "createTodo".to_string(),
            args: vec![json!("g1"), json!("buy milk")],
        }]
    );
    assert_eq!(engine.pending_count(), 0, "success settles and unwinds");
}

#[tokio::test]
async fn empty_script_operation_is_pure_passthrough() {
    let registry = OperationRegistry::from_descriptors([operation("refreshTodos")
        .state_path("todos")
        .parameter("id", ParamType::String)
        .build()
        .unwrap()])
    .unwrap();
    let transport = Arc::new(MockTransport::new());
    let engine = build_engine(registry, Arc::new(MockSource::default()), transport.clone());
    let overlay = engine.overlay();
    let (events, sink) = recorder();
    let _sub = overlay.on_change(sink);

    let result = engine.invoke("refreshTodos", vec![json!("7")]).await.unwrap();

    assert_eq!(result, Value::Null);
    assert_eq!(transport.calls().len(), 1);
    assert!(events.lock().is_empty(), "empty plan writes nothing");
    assert!(!engine.has_pending());
}

// ============================================================================
// Pre-Flight Failures
// ============================================================================

#[tokio::test]
async fn arity_mismatch_stops_before_overlay_and_remote() {
    let transport = Arc::new(MockTransport::new());
    let engine = build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    );

    let err = engine
        .invoke("updateTodo", vec![json!("5")])
        .await
        .unwrap_err();

    match err {
        InvokeError::ArityMismatch {
            operation,
            expected,
            received,
        } => {
            assert_eq!(operation, "updateTodo");
            assert_eq!(expected, 2);
            assert_eq!(received, 1);
        }
        other => panic!("expected arity mismatch, got {other}"),
    }
    assert!(transport.calls().is_empty(), "remote is never reached");
    assert!(!engine.has_pending());
}

#[tokio::test]
async fn missing_id_argument_stops_before_overlay_and_remote() {
    let transport = Arc::new(MockTransport::new());
    let engine = build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    );

    let err = engine
        .invoke("updateTodo", vec![json!(null), json!("x")])
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::MissingIdArgument { .. }), "{err}");
    assert!(transport.calls().is_empty());
    assert!(!engine.has_pending());
}

#[tokio::test]
async fn unresolvable_script_target_leaves_no_partial_state() {
    // First op resolves, second targets a non-scalar id; neither may land.
    let registry = OperationRegistry::from_descriptors([operation("touchBoth")
        .state_path("todos")
        .parameter("id", ParamType::String)
        .script(Script(vec![
            ScriptOp::Update {
                id: ValueTemplate::Id,
                data: BTreeMap::new(),
            },
            ScriptOp::Remove {
                id: ValueTemplate::Literal(json!({"not": "scalar"})),
            },
        ]))
        .build()
        .unwrap()])
    .unwrap();
    let transport = Arc::new(MockTransport::new());
    let engine = build_engine(registry, Arc::new(MockSource::default()), transport.clone());

    let err = engine.invoke("touchBoth", vec![json!("5")]).await.unwrap_err();

    assert!(matches!(err, InvokeError::MissingIdArgument { .. }), "{err}");
    assert!(transport.calls().is_empty());
    assert!(!engine.has_pending(), "planning failures apply nothing");
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
async fn success_unwinds_applied_primitives() {
    let transport = Arc::new(MockTransport::new());
    let engine = build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    );
    let overlay = engine.overlay();
    let (events, sink) = recorder();
    let _sub = overlay.on_change(sink);

    engine.invoke("deleteTodo", vec![json!("5")]).await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            OverlayEvent::Removed {
                state_path: "todos".to_string(),
                id: "5".to_string(),
            },
            OverlayEvent::Unwound {
                state_path: "todos".to_string(),
                id: "5".to_string(),
                dropped: true,
            },
        ]
    );
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test]
async fn failure_unwinds_and_propagates_the_remote_error() {
    let transport = Arc::new(MockTransport::new());
    transport.on_call(|_, _| Err(RemoteError::new("boom")));
    let engine = build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    );

    let err = engine
        .invoke("deleteTodo", vec![json!("5")])
        .await
        .unwrap_err();

    match err {
        InvokeError::Remote(remote) => assert_eq!(remote.message, "boom"),
        other => panic!("expected remote error, got {other}"),
    }
    assert!(!engine.has_pending(), "rollback leaves no speculative state");
    assert!(!engine.overlay().is_removed("todos", "5"));
}

#[tokio::test]
async fn numeric_id_argument_is_stringified_for_the_overlay() {
    let transport = Arc::new(MockTransport::gated());
    let engine = Arc::new(build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    ));

    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .invoke("updateTodo", vec![json!(42), json!("renumbered")])
                .await
        }
    });
    wait_until(|| !transport.calls().is_empty()).await;

    let overlay = engine.overlay();
    let entry = overlay.entry("todos", "42").unwrap();
    assert!(entry.edited);
    assert_eq!(entry.fields.get("text"), Some(&json!("renumbered")));
    // The remote still receives the argument exactly as given.
    assert_eq!(transport.calls()[0].args, vec![json!(42), json!("renumbered")]);

    transport.release(1);
    handle.await.unwrap().unwrap();
    assert!(overlay.entry("todos", "42").is_none());
}

#[tokio::test]
async fn unwind_order_follows_application_order() {
    let registry = OperationRegistry::from_descriptors([operation("touchPair")
        .state_path("pairs")
        .parameter("id", ParamType::String)
        .script(Script(vec![
            ScriptOp::Update {
                id: ValueTemplate::Literal(json!("a")),
                data: BTreeMap::new(),
            },
            ScriptOp::Remove {
                id: ValueTemplate::Literal(json!("b")),
            },
        ]))
        .build()
        .unwrap()])
    .unwrap();
    let engine = build_engine(
        registry,
        Arc::new(MockSource::default()),
        Arc::new(MockTransport::new()),
    );
    let overlay = engine.overlay();
    let (events, sink) = recorder();
    let _sub = overlay.on_change(sink);

    engine.invoke("touchPair", vec![json!("z")]).await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            OverlayEvent::Updated {
                state_path: "pairs".to_string(),
                id: "a".to_string(),
            },
            OverlayEvent::Removed {
                state_path: "pairs".to_string(),
                id: "b".to_string(),
            },
            OverlayEvent::Unwound {
                state_path: "pairs".to_string(),
                id: "a".to_string(),
                dropped: true,
            },
            OverlayEvent::Unwound {
                state_path: "pairs".to_string(),
                id: "b".to_string(),
                dropped: true,
            },
        ]
    );
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn optimistic_entry_visible_until_release() {
    let transport = Arc::new(MockTransport::gated());
    let engine = Arc::new(build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    ));

    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.invoke("createTodo", vec![json!("buy milk")]).await }
    });
    wait_until(|| !transport.calls().is_empty()).await;

    assert!(engine.has_pending());
    let projected = engine.projector().combined("todos");
    assert_eq!(projected.len(), 1);
    assert_eq!(projected[0].id, "g1");
    assert_eq!(projected[0].data["text"], json!("buy milk"));
    assert!(projected[0].created);

    transport.release(1);
    handle.await.unwrap().unwrap();

    assert!(!engine.has_pending());
    assert!(engine.projector().combined("todos").is_empty());
}

#[tokio::test]
async fn references_compose_across_concurrent_invokes() {
    let transport = Arc::new(MockTransport::gated());
    let engine = Arc::new(build_engine(
        todo_registry(),
        Arc::new(MockSource::default()),
        transport.clone(),
    ));
    let overlay = engine.overlay();
    let (events, sink) = recorder();
    let _sub = overlay.on_change(sink);

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.invoke("updateTodo", vec![json!("5"), json!("one")]).await }
    });
    let second = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.invoke("updateTodo", vec![json!("5"), json!("two")]).await }
    });
    wait_until(|| transport.calls().len() == 2).await;

    let entry = overlay.entry("todos", "5").unwrap();
    assert!(entry.edited);
    assert_eq!(entry.refcount, 2);

    let unwound = |events: &[OverlayEvent]| {
        events
            .iter()
            .filter(|event| matches!(event, OverlayEvent::Unwound { .. }))
            .count()
    };

    transport.release(1);
    wait_until(|| unwound(&events.lock()) == 1).await;
    let entry = overlay.entry("todos", "5").unwrap();
    assert_eq!(entry.refcount, 1, "still pinned by the other invoke");

    transport.release(1);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert!(overlay.entry("todos", "5").is_none());

    let dropped: Vec<bool> = events
        .lock()
        .iter()
        .filter_map(|event| match event {
            OverlayEvent::Unwound { dropped, .. } => Some(*dropped),
            _ => None,
        })
        .collect();
    assert_eq!(dropped, vec![false, true]);
}

#[tokio::test]
async fn duplicate_create_takes_no_reference() {
    let registry = OperationRegistry::from_descriptors([operation("createThing")
        .state_path("things")
        .parameter("id", ParamType::String)
        .parameter("text", ParamType::String)
        .script(Script(vec![ScriptOp::Create {
            data: [("text".to_string(), ValueTemplate::Arg(1))].into(),
        }]))
        .build()
        .unwrap()])
    .unwrap();
    let transport = Arc::new(MockTransport::gated());
    let engine = Arc::new(build_engine(
        registry,
        Arc::new(MockSource::default()),
        transport.clone(),
    ));
    let overlay = engine.overlay();

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .invoke("createThing", vec![json!("x1"), json!("one")])
                .await
        }
    });
    wait_until(|| transport.calls().len() == 1).await;
    assert_eq!(overlay.entry("things", "x1").unwrap().refcount, 1);

    let second = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            engine
                .invoke("createThing", vec![json!("x1"), json!("two")])
                .await
        }
    });
    wait_until(|| transport.calls().len() == 2).await;

    let entry = overlay.entry("things", "x1").unwrap();
    assert_eq!(entry.refcount, 1, "colliding create holds no reference");
    assert_eq!(entry.fields.get("text"), Some(&json!("one")));

    transport.release(2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert!(overlay.entry("things", "x1").is_none());
}
