//! Graph vertices: an execution unit wrapped with retry, params, and a
//! successor table.
//!
//! A [`Node`] pairs one [`Unit`] with the per-node configuration the
//! traversal needs: the retry policy handed to the unit's compute, the
//! node-level params merged into every visit, and the action-labelled
//! successor table that drives routing. Successors hold node *ids*; the
//! owning flow's registry resolves them, so cyclic graphs need no shared
//! ownership between nodes.

use futures_util::future::{BoxFuture, join_all};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::errors::{FlowError, StepError, json_type_name};
use crate::flow::Flow;
use crate::retry::RetryPolicy;
use crate::step::{Action, AsyncStep, DEFAULT_ACTION, Step, StepContext};
use crate::store::{Params, SharedStore, merge_params};

/// The closed set of execution behaviours a node can carry.
pub enum Unit {
    /// One blocking step: prepare, compute (retried), finalize.
    Step(Arc<dyn Step>),
    /// A blocking step mapped over each item of an array-valued prepare.
    /// Each item gets its own retry chain; results keep input order.
    Batch(Arc<dyn Step>),
    /// One suspension-capable step. Only runnable through the async
    /// entrypoints.
    Suspendable(Arc<dyn AsyncStep>),
    /// A suspension-capable step fanned out concurrently over each item of
    /// an array-valued prepare.
    ConcurrentBatch(Arc<dyn AsyncStep>),
    /// A whole flow embedded as a single vertex. Its traversal result
    /// becomes this node's action.
    Flow(Arc<Flow>),
}

impl std::fmt::Debug for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Step(_) => f.write_str("Unit::Step"),
            Unit::Batch(_) => f.write_str("Unit::Batch"),
            Unit::Suspendable(_) => f.write_str("Unit::Suspendable"),
            Unit::ConcurrentBatch(_) => f.write_str("Unit::ConcurrentBatch"),
            Unit::Flow(flow) => write!(f, "Unit::Flow({})", flow.name()),
        }
    }
}

/// A graph vertex: one execution unit plus retry policy, params, and
/// successor edges.
#[derive(Debug)]
pub struct Node {
    pub(crate) unit: Unit,
    pub(crate) retry: RetryPolicy,
    pub(crate) params: Params,
    pub(crate) successors: FxHashMap<Action, String>,
}

impl Node {
    fn with_unit(unit: Unit) -> Self {
        Self {
            unit,
            retry: RetryPolicy::default(),
            params: Params::default(),
            successors: FxHashMap::default(),
        }
    }

    /// Node wrapping one blocking step.
    pub fn step(step: impl Step + 'static) -> Self {
        Self::with_unit(Unit::Step(Arc::new(step)))
    }

    /// Node mapping a blocking step over each prepared item.
    pub fn batch(step: impl Step + 'static) -> Self {
        Self::with_unit(Unit::Batch(Arc::new(step)))
    }

    /// Node wrapping one suspension-capable step.
    pub fn suspendable(step: impl AsyncStep + 'static) -> Self {
        Self::with_unit(Unit::Suspendable(Arc::new(step)))
    }

    /// Node fanning a suspension-capable step out over prepared items
    /// concurrently.
    pub fn concurrent_batch(step: impl AsyncStep + 'static) -> Self {
        Self::with_unit(Unit::ConcurrentBatch(Arc::new(step)))
    }

    /// Node embedding a whole flow as a single vertex.
    pub fn flow(flow: impl Into<Arc<Flow>>) -> Self {
        Self::with_unit(Unit::Flow(flow.into()))
    }

    /// Sets the retry policy for this node's compute.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets node-level params, merged (lowest precedence) into every visit.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Routes `label` to the node registered under `target`.
    ///
    /// Wiring the same label twice keeps the last target and logs a
    /// warning.
    #[must_use]
    pub fn connect(mut self, target: impl Into<String>, label: impl Into<Action>) -> Self {
        let label = label.into();
        let target = target.into();
        if let Some(previous) = self.successors.insert(label.clone(), target) {
            warn!(%label, %previous, "overwriting successor for action label");
        }
        self
    }

    /// Routes the `"default"` label to `target`.
    #[must_use]
    pub fn then(self, target: impl Into<String>) -> Self {
        self.connect(target, DEFAULT_ACTION)
    }

    /// Routes `label` to `target`. Alias of [`connect`](Self::connect) with
    /// the arguments in routing order.
    #[must_use]
    pub fn on(self, label: impl Into<Action>, target: impl Into<String>) -> Self {
        self.connect(target, label)
    }

    /// The action-labelled successor table.
    #[must_use]
    pub fn successors(&self) -> &FxHashMap<Action, String> {
        &self.successors
    }

    /// Whether this node needs the async entrypoints.
    #[must_use]
    pub fn is_suspension_capable(&self) -> bool {
        match &self.unit {
            Unit::Step(_) | Unit::Batch(_) => false,
            Unit::Suspendable(_) | Unit::ConcurrentBatch(_) => true,
            Unit::Flow(flow) => flow.is_suspension_capable(),
        }
    }

    /// Runs this node standalone, outside any flow, returning its action.
    ///
    /// Successor edges are ignored here; if any exist a warning is logged,
    /// since routing only happens inside a flow traversal.
    pub fn run(&self, shared: &SharedStore) -> Result<Option<Action>, FlowError> {
        self.warn_if_wired();
        if self.is_suspension_capable() {
            return Err(FlowError::SuspensionRequired {
                what: "standalone node".into(),
            });
        }
        let ctx = StepContext::new(shared, self.params.clone(), "standalone", 1);
        self.execute_sync(&ctx)
    }

    /// Async counterpart of [`run`](Self::run); accepts every unit kind.
    pub async fn run_async(&self, shared: &SharedStore) -> Result<Option<Action>, FlowError> {
        self.warn_if_wired();
        let ctx = StepContext::new(shared, self.params.clone(), "standalone", 1);
        self.execute_async(&ctx).await
    }

    fn warn_if_wired(&self) {
        if !self.successors.is_empty() {
            warn!(
                successors = self.successors.len(),
                "node run standalone; successors are not followed outside a flow"
            );
        }
    }

    /// One blocking visit. Hook errors are wrapped with this visit's node
    /// id.
    pub(crate) fn execute_sync(&self, ctx: &StepContext) -> Result<Option<Action>, FlowError> {
        match &self.unit {
            Unit::Step(step) => {
                let prep = step.prepare(ctx).map_err(|e| step_err(ctx, e))?;
                let exec = self
                    .retry
                    .drive_sync(step.as_ref(), &prep)
                    .map_err(|e| step_err(ctx, e))?;
                step.finalize(ctx, prep, exec).map_err(|e| step_err(ctx, e))
            }
            Unit::Batch(step) => {
                let prep = step.prepare(ctx).map_err(|e| step_err(ctx, e))?;
                let items = batch_items(&ctx.node_id, &prep)?;
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    let out = self
                        .retry
                        .drive_sync(step.as_ref(), &item)
                        .map_err(|e| step_err(ctx, e))?;
                    results.push(out);
                }
                step.finalize(ctx, prep, Value::Array(results))
                    .map_err(|e| step_err(ctx, e))
            }
            Unit::Suspendable(_) | Unit::ConcurrentBatch(_) => Err(FlowError::SuspensionRequired {
                what: ctx.node_id.clone(),
            }),
            Unit::Flow(flow) => {
                if flow.is_suspension_capable() {
                    return Err(FlowError::SuspensionRequired {
                        what: flow.name().to_string(),
                    });
                }
                flow.execute_sync(&ctx.shared, &ctx.params)
            }
        }
    }

    /// One async visit. Blocking units run inline on the task; their retry
    /// delays still suspend.
    pub(crate) fn execute_async<'a>(
        &'a self,
        ctx: &'a StepContext,
    ) -> BoxFuture<'a, Result<Option<Action>, FlowError>> {
        Box::pin(async move {
        match &self.unit {
            Unit::Step(step) => {
                let prep = step.prepare(ctx).map_err(|e| step_err(ctx, e))?;
                let exec = self
                    .retry
                    .drive_sync_in_async(step.as_ref(), &prep)
                    .await
                    .map_err(|e| step_err(ctx, e))?;
                step.finalize(ctx, prep, exec).map_err(|e| step_err(ctx, e))
            }
            Unit::Batch(step) => {
                let prep = step.prepare(ctx).map_err(|e| step_err(ctx, e))?;
                let items = batch_items(&ctx.node_id, &prep)?;
                let mut results = Vec::with_capacity(items.len());
                for item in items {
                    let out = self
                        .retry
                        .drive_sync_in_async(step.as_ref(), &item)
                        .await
                        .map_err(|e| step_err(ctx, e))?;
                    results.push(out);
                }
                step.finalize(ctx, prep, Value::Array(results))
                    .map_err(|e| step_err(ctx, e))
            }
            Unit::Suspendable(step) => {
                let prep = step.prepare(ctx).await.map_err(|e| step_err(ctx, e))?;
                let exec = self
                    .retry
                    .drive_async(step.as_ref(), &prep)
                    .await
                    .map_err(|e| step_err(ctx, e))?;
                step.finalize(ctx, prep, exec)
                    .await
                    .map_err(|e| step_err(ctx, e))
            }
            Unit::ConcurrentBatch(step) => {
                let prep = step.prepare(ctx).await.map_err(|e| step_err(ctx, e))?;
                let items = batch_items(&ctx.node_id, &prep)?;
                // Fan-out/join: every item runs its own retry chain; the
                // join waits for every outcome, then the first failure in
                // input order surfaces. Results keep input order.
                let joined = join_all(
                    items
                        .iter()
                        .map(|item| self.retry.drive_async(step.as_ref(), item)),
                )
                .await;
                let mut results = Vec::with_capacity(joined.len());
                for outcome in joined {
                    results.push(outcome.map_err(|e| step_err(ctx, e))?);
                }
                step.finalize(ctx, prep, Value::Array(results))
                    .await
                    .map_err(|e| step_err(ctx, e))
            }
            Unit::Flow(flow) => {
                // Boxed to keep the recursive async type finite.
                let nested: BoxFuture<'_, Result<Option<Action>, FlowError>> =
                    Box::pin(flow.execute_async(&ctx.shared, &ctx.params));
                nested.await
            }
        }
        })
    }

    /// Params merged for a visit of this node: node params under
    /// `run_params`.
    pub(crate) fn merged_params(&self, run_params: &Params) -> Params {
        merge_params(&self.params, run_params)
    }
}

fn step_err(ctx: &StepContext, source: StepError) -> FlowError {
    FlowError::Step {
        node: ctx.node_id.clone(),
        source,
    }
}

/// Interprets a batch prepare result as the item list: `Null` is empty, an
/// array yields its elements, anything else is a usage error.
pub(crate) fn batch_items(node_id: &str, prep: &Value) -> Result<Vec<Value>, FlowError> {
    match prep {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.clone()),
        other => Err(FlowError::BatchPrep {
            what: node_id.to_string(),
            got: json_type_name(other),
        }),
    }
}
