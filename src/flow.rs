//! Flow construction and traversal.
//!
//! A [`Flow`] is an immutable registry of named [`Node`]s plus a start id,
//! produced by [`FlowBuilder::build`] after structural validation. Running
//! a flow walks the graph from the start node: each visit executes one node
//! and follows the successor edge labelled by the action it returned. A
//! label with no matching edge ends the traversal normally; the run's
//! result is the last action produced.
//!
//! Batch variants re-run the whole traversal once per override set yielded
//! by a flow-level prepare hook, sequentially ([`FlowKind::Batch`]) or
//! concurrently over independent tasks ([`FlowKind::ConcurrentBatch`]).
//! Cycles are legal and common (agent decision loops); nothing bounds
//! traversal length.

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::errors::{BuildError, FlowError, json_type_name};
use crate::node::Node;
use crate::step::{Action, AsyncStep, DEFAULT_ACTION, Step, StepContext};
use crate::store::{Params, SharedStore, merge_params};

/// How a flow treats its own prepare result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowKind {
    /// One traversal per run.
    Single,
    /// One traversal per override set, sequentially, over one shared store.
    Batch,
    /// One traversal per override set, concurrently, over one shared store.
    ConcurrentBatch,
}

/// Optional flow-level prepare/finalize hooks.
///
/// For batch kinds the prepare hook supplies the override sets; for a
/// single flow the hooks bracket the traversal and finalize may replace
/// the run's result.
enum FlowHooks {
    None,
    Sync(Arc<dyn Step>),
    Suspendable(Arc<dyn AsyncStep>),
}

impl std::fmt::Debug for FlowHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowHooks::None => f.write_str("FlowHooks::None"),
            FlowHooks::Sync(_) => f.write_str("FlowHooks::Sync"),
            FlowHooks::Suspendable(_) => f.write_str("FlowHooks::Suspendable"),
        }
    }
}

/// A validated, runnable graph of nodes.
#[derive(Debug)]
pub struct Flow {
    name: String,
    start: String,
    nodes: FxHashMap<String, Node>,
    params: Params,
    kind: FlowKind,
    hooks: FlowHooks,
}

impl Flow {
    /// The flow's name, used in spans and diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Single, batch, or concurrent-batch.
    #[must_use]
    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    /// Whether any part of this flow needs the async entrypoints.
    #[must_use]
    pub fn is_suspension_capable(&self) -> bool {
        self.kind == FlowKind::ConcurrentBatch
            || matches!(self.hooks, FlowHooks::Suspendable(_))
            || self.nodes.values().any(Node::is_suspension_capable)
    }

    /// Runs the flow to completion on the current thread.
    ///
    /// Returns the last action produced by the traversal (or the flow
    /// finalize hook's replacement). Fails up front with
    /// [`FlowError::SuspensionRequired`] if the graph contains any
    /// suspension-capable unit.
    #[instrument(skip_all, fields(flow = %self.name))]
    pub fn run(&self, shared: &SharedStore) -> Result<Option<Action>, FlowError> {
        if self.is_suspension_capable() {
            return Err(FlowError::SuspensionRequired {
                what: self.name.clone(),
            });
        }
        self.execute_sync(shared, &Params::default())
    }

    /// Runs the flow to completion on the async runtime. Accepts every
    /// graph, suspension-capable or not.
    #[instrument(skip_all, fields(flow = %self.name))]
    pub async fn run_async(&self, shared: &SharedStore) -> Result<Option<Action>, FlowError> {
        self.execute_async(shared, &Params::default()).await
    }

    /// Blocking execution with `run_params` overlaid on the flow's own
    /// params. Called by [`run`](Self::run) and by nested-flow visits.
    pub(crate) fn execute_sync(
        &self,
        shared: &SharedStore,
        run_params: &Params,
    ) -> Result<Option<Action>, FlowError> {
        let base = merge_params(&self.params, run_params);
        let ctx = StepContext::new(shared, base.clone(), &self.name, 0);
        let hook: Option<&Arc<dyn Step>> = match &self.hooks {
            FlowHooks::None => None,
            FlowHooks::Sync(step) => Some(step),
            FlowHooks::Suspendable(_) => {
                return Err(FlowError::SuspensionRequired {
                    what: self.name.clone(),
                });
            }
        };
        let prep = match hook {
            Some(step) => step.prepare(&ctx).map_err(|e| self.hook_err(e))?,
            None => Value::Null,
        };
        match self.kind {
            FlowKind::Single => {
                let last = self.orchestrate_sync(shared, &base)?;
                match hook {
                    None => Ok(last),
                    Some(step) => step
                        .finalize(&ctx, prep, action_value(&last))
                        .map_err(|e| self.hook_err(e)),
                }
            }
            FlowKind::Batch => {
                let overrides = param_sets(&self.name, &prep)?;
                for over in &overrides {
                    let merged = merge_params(&base, over);
                    self.orchestrate_sync(shared, &merged)?;
                }
                match hook {
                    None => Ok(None),
                    Some(step) => step
                        .finalize(&ctx, prep, Value::Null)
                        .map_err(|e| self.hook_err(e)),
                }
            }
            FlowKind::ConcurrentBatch => Err(FlowError::SuspensionRequired {
                what: self.name.clone(),
            }),
        }
    }

    /// Async execution with `run_params` overlaid on the flow's own params.
    pub(crate) async fn execute_async(
        &self,
        shared: &SharedStore,
        run_params: &Params,
    ) -> Result<Option<Action>, FlowError> {
        let base = merge_params(&self.params, run_params);
        let ctx = StepContext::new(shared, base.clone(), &self.name, 0);
        let prep = match &self.hooks {
            FlowHooks::None => Value::Null,
            FlowHooks::Sync(step) => step.prepare(&ctx).map_err(|e| self.hook_err(e))?,
            FlowHooks::Suspendable(step) => {
                step.prepare(&ctx).await.map_err(|e| self.hook_err(e))?
            }
        };
        match self.kind {
            FlowKind::Single => {
                let last = self.orchestrate_async(shared, &base).await?;
                self.finalize_hooks(&ctx, prep, action_value(&last), last)
                    .await
            }
            FlowKind::Batch => {
                let overrides = param_sets(&self.name, &prep)?;
                for over in &overrides {
                    let merged = merge_params(&base, over);
                    self.orchestrate_async(shared, &merged).await?;
                }
                self.finalize_hooks(&ctx, prep, Value::Null, None).await
            }
            FlowKind::ConcurrentBatch => {
                let overrides = param_sets(&self.name, &prep)?;
                let merged: Vec<Params> = overrides
                    .iter()
                    .map(|over| merge_params(&base, over))
                    .collect();
                // All traversals run to completion; the first failure in
                // input order surfaces after the join.
                let joined = futures_util::future::join_all(
                    merged.iter().map(|p| self.orchestrate_async(shared, p)),
                )
                .await;
                for outcome in joined {
                    outcome?;
                }
                self.finalize_hooks(&ctx, prep, Value::Null, None).await
            }
        }
    }

    /// Runs the flow-level finalize hook if present, otherwise passes the
    /// traversal result through.
    async fn finalize_hooks(
        &self,
        ctx: &StepContext,
        prep: Value,
        exec: Value,
        fallthrough: Option<Action>,
    ) -> Result<Option<Action>, FlowError> {
        match &self.hooks {
            FlowHooks::None => Ok(fallthrough),
            FlowHooks::Sync(step) => step
                .finalize(ctx, prep, exec)
                .map_err(|e| self.hook_err(e)),
            FlowHooks::Suspendable(step) => step
                .finalize(ctx, prep, exec)
                .await
                .map_err(|e| self.hook_err(e)),
        }
    }

    /// One blocking traversal from the start node.
    fn orchestrate_sync(
        &self,
        shared: &SharedStore,
        run_params: &Params,
    ) -> Result<Option<Action>, FlowError> {
        let mut current = self.start.clone();
        let mut visit = 0u64;
        loop {
            let node = self.nodes.get(&current).ok_or_else(|| FlowError::UnknownNode {
                flow: self.name.clone(),
                node: current.clone(),
            })?;
            visit += 1;
            let ctx = StepContext::new(shared, node.merged_params(run_params), &current, visit);
            let last = node.execute_sync(&ctx)?;
            match self.next_node(node, &current, &last) {
                Some(next) => current = next,
                None => return Ok(last),
            }
        }
    }

    /// One async traversal from the start node.
    async fn orchestrate_async(
        &self,
        shared: &SharedStore,
        run_params: &Params,
    ) -> Result<Option<Action>, FlowError> {
        let mut current = self.start.clone();
        let mut visit = 0u64;
        loop {
            let node = self.nodes.get(&current).ok_or_else(|| FlowError::UnknownNode {
                flow: self.name.clone(),
                node: current.clone(),
            })?;
            visit += 1;
            let ctx = StepContext::new(shared, node.merged_params(run_params), &current, visit);
            let last = node.execute_async(&ctx).await?;
            match self.next_node(node, &current, &last) {
                Some(next) => current = next,
                None => return Ok(last),
            }
        }
    }

    /// Resolves the successor for a visit's action, logging the routing
    /// decision. `None` means the traversal ends here.
    fn next_node(&self, node: &Node, current: &str, last: &Option<Action>) -> Option<String> {
        let label = last.clone().unwrap_or_else(|| DEFAULT_ACTION.to_string());
        match node.successors().get(&label) {
            Some(next) => {
                debug!(flow = %self.name, from = %current, %label, to = %next, "routing");
                Some(next.clone())
            }
            None => {
                if !node.successors().is_empty() {
                    let available: Vec<&str> =
                        node.successors().keys().map(String::as_str).collect();
                    debug!(
                        flow = %self.name,
                        at = %current,
                        %label,
                        ?available,
                        "flow ends: action has no successor"
                    );
                }
                None
            }
        }
    }

    fn hook_err(&self, source: crate::errors::StepError) -> FlowError {
        FlowError::Step {
            node: self.name.clone(),
            source,
        }
    }
}

/// Interprets a batch flow's prepare result as a list of param overrides:
/// `Null` means no iterations, an array of objects yields one override set
/// per element.
fn param_sets(name: &str, prep: &Value) -> Result<Vec<Params>, FlowError> {
    match prep {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let mut sets = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => {
                        sets.push(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
                    }
                    other => {
                        return Err(FlowError::BatchPrep {
                            what: name.to_string(),
                            got: json_type_name(other),
                        });
                    }
                }
            }
            Ok(sets)
        }
        other => Err(FlowError::BatchPrep {
            what: name.to_string(),
            got: json_type_name(other),
        }),
    }
}

fn action_value(last: &Option<Action>) -> Value {
    match last {
        Some(action) => Value::String(action.clone()),
        None => Value::Null,
    }
}

/// Staged construction for [`Flow`]. Register nodes, pick a start, then
/// [`build`](Self::build) validates the wiring before anything runs.
#[derive(Debug)]
pub struct FlowBuilder {
    name: String,
    kind: FlowKind,
    start: Option<String>,
    nodes: FxHashMap<String, Node>,
    params: Params,
    hooks: FlowHooks,
}

impl FlowBuilder {
    /// Builder for a single-traversal flow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FlowKind::Single,
            start: None,
            nodes: FxHashMap::default(),
            params: Params::default(),
            hooks: FlowHooks::None,
        }
    }

    /// Builder for a sequential batch flow.
    #[must_use]
    pub fn batch(name: impl Into<String>) -> Self {
        Self {
            kind: FlowKind::Batch,
            ..Self::new(name)
        }
    }

    /// Builder for a concurrent batch flow.
    #[must_use]
    pub fn concurrent_batch(name: impl Into<String>) -> Self {
        Self {
            kind: FlowKind::ConcurrentBatch,
            ..Self::new(name)
        }
    }

    /// Registers `node` under `id`. Re-registering an id replaces the node
    /// and logs a warning.
    #[must_use]
    pub fn add_node(mut self, id: impl Into<String>, node: Node) -> Self {
        let id = id.into();
        if self.nodes.insert(id.clone(), node).is_some() {
            warn!(%id, flow = %self.name, "replacing node registered under the same id");
        }
        self
    }

    /// Sets the traversal entry node.
    #[must_use]
    pub fn start(mut self, id: impl Into<String>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Sets flow-level params, the base layer of every visit's merge.
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Attaches blocking flow-level prepare/finalize hooks. For batch kinds
    /// the prepare hook yields the override sets.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl Step + 'static) -> Self {
        self.hooks = FlowHooks::Sync(Arc::new(hooks));
        self
    }

    /// Attaches suspension-capable flow-level hooks; the flow then requires
    /// the async entrypoints.
    #[must_use]
    pub fn with_async_hooks(mut self, hooks: impl AsyncStep + 'static) -> Self {
        self.hooks = FlowHooks::Suspendable(Arc::new(hooks));
        self
    }

    /// Validates wiring and produces the immutable [`Flow`].
    ///
    /// Checks that a start node is set and registered and that every
    /// successor edge targets a registered node. Cycles are fine.
    pub fn build(self) -> Result<Flow, BuildError> {
        let start = self.start.ok_or_else(|| BuildError::MissingStart {
            flow: self.name.clone(),
        })?;
        if !self.nodes.contains_key(&start) {
            return Err(BuildError::UnknownStart {
                flow: self.name,
                node: start,
            });
        }
        for (id, node) in &self.nodes {
            for (action, target) in node.successors() {
                if !self.nodes.contains_key(target) {
                    return Err(BuildError::UnknownSuccessor {
                        flow: self.name,
                        from: id.clone(),
                        action: action.clone(),
                        to: target.clone(),
                    });
                }
            }
        }
        Ok(Flow {
            name: self.name,
            start,
            nodes: self.nodes,
            params: self.params,
            kind: self.kind,
            hooks: self.hooks,
        })
    }
}
