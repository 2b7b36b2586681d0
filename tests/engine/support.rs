//! Shared test doubles for the engine suites: an in-memory state source, a
//! recording transport with an optional settlement gate, and engine fixtures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use optimistic_ui::engine::{Engine, EngineOptions, RemoteError, RemoteTransport, StateSource};
use optimistic_ui::overlay::OverlayEvent;
use optimistic_ui::registry::{operation, CrudKind, OperationRegistry, ParamType};
use optimistic_ui::types::IdGenerator;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

#[derive(Default)]
pub(crate) struct MockSource {
    state: Mutex<HashMap<String, Vec<Value>>>,
}

impl MockSource {
    /// Replace the authoritative rows under `state_path`, as a host store
    /// would after absorbing a remote result.
    pub(crate) fn set_state(&self, state_path: &str, entities: Vec<Value>) {
        self.state.lock().insert(state_path.to_string(), entities);
    }
}

impl StateSource for MockSource {
    fn get_state(&self, state_path: &str) -> Vec<Value> {
        self.state.lock().get(state_path).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CallRecord {
    pub(crate) operation: String,
    pub(crate) args: Vec<Value>,
}

type Responder = Box<dyn Fn(&str, &[Value]) -> Result<Value, RemoteError> + Send + Sync>;

#[derive(Default)]
struct MockTransportInner {
    calls: Vec<CallRecord>,
    response: Option<Responder>,
}

/// Transport double. `gated()` parks every call on a zero-permit semaphore so
/// tests can observe speculative state while the remote is in flight, then
/// `release` settlements one at a time.
pub(crate) struct MockTransport {
    inner: Mutex<MockTransportInner>,
    gate: Semaphore,
    gated: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(MockTransportInner::default()),
            gate: Semaphore::new(0),
            gated: false,
        }
    }

    pub(crate) fn gated() -> Self {
        Self {
            gated: true,
            ..Self::new()
        }
    }

    pub(crate) fn on_call(
        &self,
        respond: impl Fn(&str, &[Value]) -> Result<Value, RemoteError> + Send + Sync + 'static,
    ) {
        self.inner.lock().response = Some(Box::new(respond));
    }

    pub(crate) fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    pub(crate) fn calls(&self) -> Vec<CallRecord> {
        self.inner.lock().calls.clone()
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn call(&self, operation: &str, args: &[Value]) -> Result<Value, RemoteError> {
        {
            let mut inner = self.inner.lock();
            inner.calls.push(CallRecord {
                operation: operation.to_string(),
                args: args.to_vec(),
            });
        }
        // Guard dropped before the await; the settlement future must stay Send.
        if self.gated {
            self.gate.acquire().await.unwrap().forget();
        }
        let inner = self.inner.lock();
        match &inner.response {
            Some(respond) => respond(operation, args),
            None => Ok(Value::Null),
        }
    }
}

/// The registry most suites share: an injected create, a two-argument update,
/// and a delete, all over `todos`.
pub(crate) fn todo_registry() -> OperationRegistry {
    OperationRegistry::from_descriptors([
        operation("createTodo")
            .state_path("todos")
            .parameter("id", ParamType::String)
            .parameter("text", ParamType::String)
            .crud(CrudKind::Create)
            .inject_optimistic_id(true)
            .build()
            .unwrap(),
        operation("updateTodo")
            .state_path("todos")
            .parameter("id", ParamType::String)
            .parameter("text", ParamType::String)
            .crud(CrudKind::Update)
            .build()
            .unwrap(),
        operation("deleteTodo")
            .state_path("todos")
            .parameter("id", ParamType::String)
            .crud(CrudKind::Delete)
            .build()
            .unwrap(),
    ])
    .unwrap()
}

/// Engine over the mocks with a deterministic `g1`, `g2`, ... id sequence.
pub(crate) fn build_engine(
    registry: OperationRegistry,
    source: Arc<MockSource>,
    transport: Arc<MockTransport>,
) -> Engine {
    let ids = AtomicUsize::new(0);
    let generate: Arc<IdGenerator> =
        Arc::new(move || format!("g{}", ids.fetch_add(1, Ordering::SeqCst) + 1));
    Engine::new(EngineOptions {
        registry,
        source,
        transport,
        generate_id: Some(generate),
    })
}

pub(crate) fn recorder() -> (
    Arc<Mutex<Vec<OverlayEvent>>>,
    impl Fn(&OverlayEvent) + Send + Sync,
) {
    let events: Arc<Mutex<Vec<OverlayEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = Arc::clone(&events);
        move |event: &OverlayEvent| events.lock().push(event.clone())
    };
    (events, sink)
}

/// Yields to in-flight tasks until `ready` holds; panics rather than hangs
/// when it never does.
pub(crate) async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if ready() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("in-flight operation never reached the expected state");
}

// Keeps the fixture JSON terse in suites that only need one row.
pub(crate) fn todo_row(id: &str, text: &str) -> Value {
    json!({"id": id, "text": text})
}
