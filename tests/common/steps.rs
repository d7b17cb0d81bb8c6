//! Step implementations shared across the integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use weft::errors::StepError;
use weft::step::{Action, AsyncStep, Step, StepContext};

use super::push_visit;

/// Records its visit in `shared["visited"]` and returns a fixed action.
pub struct Trace {
    pub name: &'static str,
    pub action: Option<&'static str>,
}

impl Trace {
    pub fn new(name: &'static str) -> Self {
        Self { name, action: None }
    }

    pub fn with_action(name: &'static str, action: &'static str) -> Self {
        Self {
            name,
            action: Some(action),
        }
    }
}

impl Step for Trace {
    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        _exec: Value,
    ) -> Result<Option<Action>, StepError> {
        push_visit(&ctx.shared, self.name);
        Ok(self.action.map(str::to_string))
    }
}

/// Returns a scripted action per visit, recording visits like [`Trace`].
/// Once the script runs out it keeps returning the last entry.
pub struct Scripted {
    pub name: &'static str,
    actions: Vec<&'static str>,
    cursor: AtomicUsize,
}

impl Scripted {
    pub fn new(name: &'static str, actions: Vec<&'static str>) -> Self {
        Self {
            name,
            actions,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Step for Scripted {
    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        _exec: Value,
    ) -> Result<Option<Action>, StepError> {
        push_visit(&ctx.shared, self.name);
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        let action = self
            .actions
            .get(i)
            .or_else(|| self.actions.last())
            .copied();
        Ok(action.map(str::to_string))
    }
}

/// Fails the first `failures` compute calls, then yields `"recovered"`.
/// The call counter is shared so tests can assert attempt counts.
pub struct Flaky {
    pub failures: u32,
    pub calls: Arc<AtomicU32>,
}

impl Flaky {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl Step for Flaky {
    fn compute(&self, _prep: Value) -> Result<Value, StepError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(StepError::Other(format!("transient failure {call}")))
        } else {
            Ok(json!("recovered"))
        }
    }

    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared.insert("flaky_result", exec);
        Ok(None)
    }
}

/// Always fails compute; records what its fallback hook received and
/// substitutes a sentinel value instead of re-raising.
pub struct CapturingFallback {
    pub fallback_args: Arc<parking_lot::Mutex<Option<(Value, String)>>>,
}

impl CapturingFallback {
    pub fn new() -> Self {
        Self {
            fallback_args: Arc::new(parking_lot::Mutex::new(None)),
        }
    }
}

impl Step for CapturingFallback {
    fn prepare(&self, _ctx: &StepContext) -> Result<Value, StepError> {
        Ok(json!("prep-payload"))
    }

    fn compute(&self, _prep: Value) -> Result<Value, StepError> {
        Err(StepError::Other("hard failure".into()))
    }

    fn fallback(&self, prep: Value, error: StepError) -> Result<Value, StepError> {
        *self.fallback_args.lock() = Some((prep, error.to_string()));
        Ok(json!("fallback-sentinel"))
    }

    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared.insert("result", exec);
        Ok(None)
    }
}

/// Always fails and lets the default fallback re-raise, aborting the run.
pub struct AlwaysFail;

impl Step for AlwaysFail {
    fn compute(&self, _prep: Value) -> Result<Value, StepError> {
        Err(StepError::Validation("bad input".into()))
    }
}

/// Appends the `item` param to `shared["seen"]`. Used to observe the
/// per-iteration param override in batch flow tests.
pub struct AppendItemParam;

impl Step for AppendItemParam {
    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        _exec: Value,
    ) -> Result<Option<Action>, StepError> {
        let item = ctx
            .param("item")
            .cloned()
            .ok_or(StepError::MissingInput { what: "item param" })?;
        ctx.shared.with_mut(|map| {
            let entry = map
                .entry("seen".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                items.push(item);
            }
        });
        Ok(None)
    }
}

/// Async step: sleeps for the item's `delay_ms`, then yields its `v`.
/// Errors on items carrying `"fail": true`.
pub struct DelayEcho;

#[async_trait]
impl AsyncStep for DelayEcho {
    async fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
        Ok(ctx.shared.get("items").unwrap_or(Value::Null))
    }

    async fn compute(&self, prep: Value) -> Result<Value, StepError> {
        let delay = prep.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }
        if prep.get("fail").and_then(Value::as_bool) == Some(true) {
            return Err(StepError::Other("scripted item failure".into()));
        }
        prep.get("v")
            .cloned()
            .ok_or(StepError::MissingInput { what: "item v" })
    }

    async fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared.insert("out", exec);
        Ok(None)
    }
}
