//! Engine — optimistic invocation orchestration.
//!
//! `invoke` applies a descriptor's script to the overlay, dispatches the
//! remote call, and releases the applied primitives when the call settles.
//! Settlement runs on a detached task: once an invocation has dispatched,
//! dropping the caller's future cannot leak overlay references.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::oneshot;

use crate::engine::host::{RemoteError, RemoteTransport, StateSource};
use crate::error::InvokeError;
use crate::overlay::OverlayStore;
use crate::registry::{OperationDescriptor, OperationRegistry, ScriptOp, ValueTemplate};
use crate::types::IdGenerator;
use crate::view::Projector;

// ============================================================================
// EngineOptions
// ============================================================================

/// Configuration for [`Engine`].
pub struct EngineOptions {
    pub registry: OperationRegistry,
    pub source: Arc<dyn StateSource>,
    pub transport: Arc<dyn RemoteTransport>,
    /// Id generator override (`None` = the built-in time-ordered generator).
    pub generate_id: Option<Arc<IdGenerator>>,
}

// ============================================================================
// Engine
// ============================================================================

pub struct Engine {
    registry: Arc<OperationRegistry>,
    source: Arc<dyn StateSource>,
    transport: Arc<dyn RemoteTransport>,
    overlay: Arc<OverlayStore>,
    generate_id: Arc<IdGenerator>,
}

/// One applied primitive awaiting release at settlement.
struct UndoOp {
    state_path: String,
    id: String,
}

/// A script op with every template resolved to a concrete value.
#[derive(Debug)]
enum PlannedOp {
    Create { id: String, data: Map<String, Value> },
    Update { id: String, data: Map<String, Value> },
    Remove { id: String },
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            registry: Arc::new(options.registry),
            source: options.source,
            transport: options.transport,
            overlay: Arc::new(OverlayStore::new()),
            generate_id: options
                .generate_id
                .unwrap_or_else(|| Arc::new(crate::id::generate_id)),
        }
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Invoke a named operation optimistically.
    ///
    /// The descriptor's script is applied to the overlay before the remote
    /// call is dispatched, so projections reflect the speculative outcome
    /// immediately. The returned future resolves with the remote outcome
    /// once the call settles; by then every primitive this invocation
    /// applied has been released, on success and on failure alike.
    ///
    /// An operation name absent from the registry degrades to a direct
    /// remote call with no overlay side effects.
    pub async fn invoke(&self, operation: &str, args: Vec<Value>) -> Result<Value, InvokeError> {
        let Some(descriptor) = self.registry.resolve(operation) else {
            tracing::warn!(%operation, "operation not registered; calling remote directly");
            return Ok(self.transport.call(operation, &args).await?);
        };

        // Resolve the target id, injecting a generated one when configured.
        let mut args = args;
        let id = if descriptor.inject_optimistic_id {
            let id = (self.generate_id)();
            args.insert(0, Value::String(id.clone()));
            id
        } else {
            resolve_id_argument(descriptor, &args)?
        };

        // Errors surface before any overlay mutation.
        if args.len() != descriptor.parameters.len() {
            return Err(InvokeError::ArityMismatch {
                operation: descriptor.name.clone(),
                expected: descriptor.parameters.len(),
                received: args.len(),
            });
        }
        let planned = plan_script(descriptor, &args, &id)?;

        let undos = self.apply(descriptor, planned);
        self.settle(descriptor.name.clone(), args, undos).await
    }

    /// The overlay store backing this engine.
    pub fn overlay(&self) -> Arc<OverlayStore> {
        Arc::clone(&self.overlay)
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// A projector over this engine's overlay and data source.
    pub fn projector(&self) -> Projector {
        Projector::new(Arc::clone(&self.source), Arc::clone(&self.overlay))
    }

    /// Generate an id with this engine's generator, for callers allocating
    /// one outside the standard injection flow.
    pub fn generate_id(&self) -> String {
        (self.generate_id)()
    }

    /// Whether any invocation is still awaiting settlement.
    pub fn has_pending(&self) -> bool {
        self.overlay.has_pending()
    }

    pub fn pending_count(&self) -> usize {
        self.overlay.pending_count()
    }

    // -----------------------------------------------------------------------
    // Script Application
    // -----------------------------------------------------------------------

    /// Run the planned primitives, recording an unwind for each applied one.
    fn apply(&self, descriptor: &OperationDescriptor, planned: Vec<PlannedOp>) -> Vec<UndoOp> {
        let state_path = &descriptor.state_path;
        let mut undos = Vec::with_capacity(planned.len());
        for op in planned {
            let applied = match op {
                PlannedOp::Create { id, data } => {
                    // Duplicate create is a logged no-op with nothing to release.
                    self.overlay.create(state_path, &id, data).then_some(id)
                }
                PlannedOp::Update { id, data } => {
                    self.overlay.update(state_path, &id, data);
                    Some(id)
                }
                PlannedOp::Remove { id } => {
                    self.overlay.remove(state_path, &id);
                    Some(id)
                }
            };
            if let Some(id) = applied {
                undos.push(UndoOp {
                    state_path: state_path.clone(),
                    id,
                });
            }
        }
        undos
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Dispatch the remote call on a detached task and await its outcome.
    ///
    /// The task owns the undo list: whatever happens to the caller after
    /// dispatch, the overlay references this invocation took are released
    /// exactly once, in the order the primitives applied.
    async fn settle(
        &self,
        operation: String,
        args: Vec<Value>,
        undos: Vec<UndoOp>,
    ) -> Result<Value, InvokeError> {
        let transport = Arc::clone(&self.transport);
        let overlay = Arc::clone(&self.overlay);
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let outcome = transport.call(&operation, &args).await;
            if let Err(error) = &outcome {
                tracing::error!(%operation, %error, "remote call failed; rolling back optimistic state");
            }
            for undo in &undos {
                overlay.unwind(&undo.state_path, &undo.id);
            }
            let _ = tx.send(outcome);
        });

        match rx.await {
            Ok(outcome) => Ok(outcome?),
            // The settlement task holds the sender, so losing it means the
            // transport panicked. Surface that as a remote failure.
            Err(_) => Err(RemoteError::new("settlement task aborted before completion").into()),
        }
    }
}

// ============================================================================
// Template Resolution
// ============================================================================

fn missing_id(descriptor: &OperationDescriptor) -> InvokeError {
    InvokeError::MissingIdArgument {
        operation: descriptor.name.clone(),
        id_attribute: descriptor.id_attribute.clone(),
    }
}

fn resolve_id_argument(
    descriptor: &OperationDescriptor,
    args: &[Value],
) -> Result<String, InvokeError> {
    let position = descriptor.id_position().ok_or_else(|| missing_id(descriptor))?;
    coerce_id(args.get(position)).ok_or_else(|| missing_id(descriptor))
}

/// Overlay keys are strings; numeric ids are stringified to match.
fn coerce_id(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

/// Resolve every template in the script before touching the overlay, so an
/// unresolvable target id aborts with zero effects.
fn plan_script(
    descriptor: &OperationDescriptor,
    args: &[Value],
    id: &str,
) -> Result<Vec<PlannedOp>, InvokeError> {
    let resolve = |template: &ValueTemplate| -> Value {
        match template {
            // In range: checked against arity at registry build time, and
            // args.len() equals arity here.
            ValueTemplate::Arg(index) => args[*index].clone(),
            ValueTemplate::Id => Value::String(id.to_string()),
            ValueTemplate::Literal(value) => value.clone(),
        }
    };
    let resolve_target = |template: &ValueTemplate| -> Result<String, InvokeError> {
        coerce_id(Some(&resolve(template))).ok_or_else(|| missing_id(descriptor))
    };
    let resolve_data = |data: &BTreeMap<String, ValueTemplate>| -> Map<String, Value> {
        data.iter()
            .map(|(field, template)| (field.clone(), resolve(template)))
            .collect()
    };

    descriptor
        .script
        .iter()
        .map(|op| {
            Ok(match op {
                ScriptOp::Create { data } => PlannedOp::Create {
                    id: id.to_string(),
                    data: resolve_data(data),
                },
                ScriptOp::Update { id: target, data } => PlannedOp::Update {
                    id: resolve_target(target)?,
                    data: resolve_data(data),
                },
                ScriptOp::Remove { id: target } => PlannedOp::Remove {
                    id: resolve_target(target)?,
                },
            })
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
