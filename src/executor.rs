//! Node execution
//!
//! The executor owns the call contract: validate argument sources (cycle
//! and bounds checks come before the dry-run exit, so validation is
//! unchanged when nothing runs), materialize arguments, invoke the user
//! function on a worker thread raced against the cancellation token, and
//! split the result into output values or a propagated error.
//!
//! Cancellation never kills the worker; the resolver stops waiting and
//! the late result is dropped with its rendezvous slot.

use crate::cancel::{CancelToken, Notify, WaitSlot};
use crate::error::{ResolveError, Result};
use crate::introspect::{is_error_sentinel, ConformanceTable, Value};
use crate::logger::{LogLevel, Logger};
use crate::node::{CallFailure, CallOutcome, Node, NodeId, NodeState};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What the worker thread reports back.
struct CallReply {
    outcome: CallOutcome,
    elapsed: Duration,
}

/// Borrowed context for calling nodes in an arena.
pub(crate) struct Executor<'a> {
    pub(crate) token: &'a CancelToken,
    pub(crate) logger: &'a dyn Logger,
    pub(crate) table: &'a ConformanceTable,
    pub(crate) dry_run: bool,
}

impl Executor<'_> {
    /// Call a node at most once.
    ///
    /// The node ends up `Called` on every exit path, success or not, so
    /// state-based cycle detection stays truthful for later consumers.
    pub(crate) fn call(&self, pool: &mut [Node], id: NodeId) -> Result<()> {
        if pool[id].state >= NodeState::Called {
            return Ok(());
        }
        let result = self.run(pool, id);
        pool[id].state = NodeState::Called;
        result
    }

    fn run(&self, pool: &mut [Node], id: NodeId) -> Result<()> {
        let signature = pool[id].signature();

        let args = self.collect_args(pool, id, &signature)?;

        let func = match &pool[id].func {
            Some(func) => Arc::clone(func),
            // Pre-supplied value: nothing to run.
            None => return Ok(()),
        };
        let args = match args {
            Some(args) => args,
            // Dry run: sources validated, invocation skipped.
            None => return Ok(()),
        };

        let slot = WaitSlot::new();
        let _guard = self.token.register(Arc::clone(&slot) as Arc<dyn Notify>);

        let worker_slot = Arc::clone(&slot);
        let spawned = thread::Builder::new()
            .name("revolve-call".into())
            .spawn(move || {
                let started = Instant::now();
                // Every worker exit path must reach the slot, or the
                // resolver would park on it forever.
                let outcome = match panic::catch_unwind(AssertUnwindSafe(|| func(args))) {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(CallFailure::Panicked(panic_message(payload.as_ref()))),
                };
                worker_slot.fill(CallReply {
                    outcome,
                    elapsed: started.elapsed(),
                });
            });
        if let Err(e) = spawned {
            return Err(ResolveError::Internal(format!(
                "failed to spawn call worker for {signature}: {e}"
            )));
        }

        let reply = match slot.wait(self.token) {
            Some(reply) => reply,
            None => return Err(ResolveError::Cancelled),
        };

        self.logger.print(
            LogLevel::Info,
            &format!("executing {signature} completed in {:?}", reply.elapsed),
        );

        let values = match reply.outcome {
            Ok(values) => values,
            Err(CallFailure::User(e)) => return Err(ResolveError::User(e)),
            Err(CallFailure::Panicked(message)) => {
                return Err(ResolveError::User(
                    format!("call to {signature} panicked: {message}").into(),
                ))
            }
            Err(CallFailure::ArgMismatch(spec)) => {
                return Err(ResolveError::Internal(format!(
                    "argument of type {} did not match while calling {signature}",
                    spec.name()
                )))
            }
        };

        let node = &mut pool[id];
        let mut values = values.into_iter();
        for output in node.outputs.iter_mut() {
            if is_error_sentinel(&output.spec) {
                continue;
            }
            match values.next() {
                Some(value) => output.value = Some(value),
                None => {
                    return Err(ResolveError::Internal(format!(
                        "missing value for output {} of {signature}",
                        output.spec.name()
                    )))
                }
            }
        }
        Ok(())
    }

    /// Validate every argument source, and materialize the values unless
    /// this is a dry run.
    ///
    /// A provider still short of `Called` here means the DFS chain
    /// re-entered a node whose call has not completed: a cycle. The path
    /// is filled in by the traversal as the error unwinds.
    fn collect_args(
        &self,
        pool: &[Node],
        id: NodeId,
        signature: &str,
    ) -> Result<Option<Vec<Value>>> {
        let node = &pool[id];
        let mut args = Vec::with_capacity(node.inputs.len());

        for input in &node.inputs {
            let (provider_id, output_index) = match input.source {
                Some(source) => source,
                None => {
                    return Err(ResolveError::Internal(format!(
                        "unlinked input {} of {signature}",
                        input.spec.name()
                    )))
                }
            };

            let provider = &pool[provider_id];
            if provider.state < NodeState::Called {
                return Err(ResolveError::CyclicProvideDetected { path: Vec::new() });
            }

            let slot = match provider.outputs.get(output_index) {
                Some(slot) => slot,
                None => {
                    return Err(ResolveError::Internal(format!(
                        "output index {output_index} out of range collecting {} for {signature}",
                        input.spec.name()
                    )))
                }
            };

            if self.dry_run {
                continue;
            }

            let value = match &slot.value {
                Some(value) => value,
                None => {
                    return Err(ResolveError::Internal(format!(
                        "output {} of {} was never populated",
                        slot.spec.name(),
                        pool[provider_id].signature()
                    )))
                }
            };

            match self.table.convert(value, &slot.spec, &input.spec) {
                Some(value) => args.push(value),
                None => {
                    return Err(ResolveError::Internal(format!(
                        "no conversion from {} to {} for {signature}",
                        slot.spec.name(),
                        input.spec.name()
                    )))
                }
            }
        }

        Ok(if self.dry_run { None } else { Some(args) })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
