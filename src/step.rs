//! The three-hook unit of work.
//!
//! Every pipeline step — blocking or suspension-capable — has the same
//! lifecycle:
//!
//! 1. `prepare(ctx)`: read-only extraction from the shared store.
//! 2. `compute(prep)`: the actual work. It receives only the prepare result
//!    and should not touch shared state; this is the part the engine
//!    retries.
//! 3. `finalize(ctx, prep, exec)`: write results back, pick the next action
//!    label. Returning `None` routes along the `"default"` label.
//!
//! A fourth hook, `fallback(prep, error)`, runs once when `compute` has
//! exhausted its retries; the default re-raises the error, aborting the run.
//!
//! Implement [`Step`] for blocking hooks and [`AsyncStep`] when any hook or
//! the retry delay needs to suspend on I/O or timers. Retries, routing, and
//! batching are engine-provided; these hooks are the only extension points.
//!
//! # Examples
//!
//! ```rust
//! use weft::step::{Step, StepContext, Action};
//! use weft::errors::StepError;
//! use serde_json::{json, Value};
//!
//! struct Greet;
//!
//! impl Step for Greet {
//!     fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
//!         Ok(ctx.shared.get("name").unwrap_or(json!("world")))
//!     }
//!
//!     fn compute(&self, prep: Value) -> Result<Value, StepError> {
//!         Ok(json!(format!("hello, {}", prep.as_str().unwrap_or("?"))))
//!     }
//!
//!     fn finalize(
//!         &self,
//!         ctx: &StepContext,
//!         _prep: Value,
//!         exec: Value,
//!     ) -> Result<Option<Action>, StepError> {
//!         ctx.shared.insert("greeting", exec);
//!         Ok(None) // routes along "default"
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::StepError;
use crate::store::{Params, SharedStore};

/// A string label produced by a step's finalize hook, selecting the next
/// node during traversal.
pub type Action = String;

/// Label used when finalize returns no explicit action.
pub const DEFAULT_ACTION: &str = "default";

/// Execution context handed to prepare and finalize hooks.
///
/// Carries the shared-store handle, the params merged for this visit, and
/// the node's identity within the running flow. A fresh context is built
/// for every traversal visit, so nothing in it leaks between visits or
/// between runs.
#[derive(Clone, Debug)]
pub struct StepContext {
    /// Handle to the run's shared store.
    pub shared: SharedStore,
    /// Params merged for this visit (node params ⊕ run params ⊕ override).
    pub params: Arc<Params>,
    /// Id of the node being visited (the flow name for flow-level hooks).
    pub node_id: String,
    /// 1-based visit ordinal within the current traversal (0 for
    /// flow-level hooks).
    pub visit: u64,
}

impl StepContext {
    pub(crate) fn new(shared: &SharedStore, params: Params, node_id: &str, visit: u64) -> Self {
        Self {
            shared: shared.clone(),
            params: Arc::new(params),
            node_id: node_id.to_string(),
            visit,
        }
    }

    /// Looks up a single param by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// A blocking unit of work.
///
/// All hooks have working defaults: `prepare` yields `Null`, `compute` is
/// the identity, `finalize` returns no action (routed as `"default"`), and
/// `fallback` re-raises. A step that only needs one hook implements just
/// that one.
pub trait Step: Send + Sync {
    /// Read-only extraction from the shared store.
    fn prepare(&self, _ctx: &StepContext) -> Result<Value, StepError> {
        Ok(Value::Null)
    }

    /// The work. Retried by the node's retry policy; must not touch shared
    /// state.
    fn compute(&self, prep: Value) -> Result<Value, StepError> {
        Ok(prep)
    }

    /// Writes results, picks the next action label. `None` routes along
    /// [`DEFAULT_ACTION`].
    fn finalize(
        &self,
        _ctx: &StepContext,
        _prep: Value,
        _exec: Value,
    ) -> Result<Option<Action>, StepError> {
        Ok(None)
    }

    /// Invoked once after retries are exhausted, with the prepare result
    /// and the last error. The default re-raises, aborting the run.
    fn fallback(&self, _prep: Value, error: StepError) -> Result<Value, StepError> {
        Err(error)
    }
}

/// A suspension-capable unit of work.
///
/// Same lifecycle shape as [`Step`], but every hook — and the retry delay
/// between attempts — may suspend the task instead of blocking the thread.
/// Drive it only through the async run entrypoints; the blocking
/// entrypoints refuse it with
/// [`FlowError::SuspensionRequired`](crate::errors::FlowError::SuspensionRequired).
#[async_trait]
pub trait AsyncStep: Send + Sync {
    /// Read-only extraction from the shared store.
    async fn prepare(&self, _ctx: &StepContext) -> Result<Value, StepError> {
        Ok(Value::Null)
    }

    /// The work. Retried by the node's retry policy; must not touch shared
    /// state.
    async fn compute(&self, prep: Value) -> Result<Value, StepError> {
        Ok(prep)
    }

    /// Writes results, picks the next action label. `None` routes along
    /// [`DEFAULT_ACTION`].
    async fn finalize(
        &self,
        _ctx: &StepContext,
        _prep: Value,
        _exec: Value,
    ) -> Result<Option<Action>, StepError> {
        Ok(None)
    }

    /// Invoked once after retries are exhausted, with the prepare result
    /// and the last error. The default re-raises, aborting the run.
    async fn fallback(&self, _prep: Value, error: StepError) -> Result<Value, StepError> {
        Err(error)
    }
}
