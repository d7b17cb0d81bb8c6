//! Error types for the Weft workflow engine.
//!
//! Three layers, matching where a failure can originate:
//!
//! - [`StepError`]: a failure inside a user hook or collaborator call. These
//!   are the errors the retry machinery sees and retries.
//! - [`FlowError`]: a failure surfaced by a run — a step failure that
//!   survived retry and fallback, a wrong-entrypoint usage error, or a
//!   malformed batch prepare. The original [`StepError`] is always preserved
//!   as the `source`.
//! - [`BuildError`]: a structural problem caught by
//!   [`FlowBuilder::build`](crate::flow::FlowBuilder::build) before any run.
//!
//! An action label with no matching successor is *not* an error; it is the
//! normal stop signal of a traversal.

use miette::Diagnostic;
use thiserror::Error;

/// Errors produced by step hooks and collaborators.
///
/// Transient variants are retried by the engine up to the node's
/// [`RetryPolicy`](crate::retry::RetryPolicy); whatever survives retry is
/// handed to the step's `fallback` hook, whose default re-raises.
#[derive(Debug, Error, Diagnostic)]
pub enum StepError {
    /// Expected input data is missing from the shared store or params.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(weft::step::missing_input),
        help("Check that an earlier node wrote the required key.")
    )]
    MissingInput { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(weft::step::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(weft::step::serde))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(
        code(weft::step::validation),
        help("Check input data format and required fields.")
    )]
    Validation(String),

    /// Free-form failure for anything the other variants do not cover.
    #[error("{0}")]
    #[diagnostic(code(weft::step::other))]
    Other(String),
}

/// Errors surfaced by running a node or a flow.
#[derive(Debug, Error, Diagnostic)]
pub enum FlowError {
    /// A step failed after exhausting its retries and fallback. Aborts the
    /// whole run; the original error is the `source`.
    #[error("node '{node}' failed: {source}")]
    #[diagnostic(code(weft::flow::step))]
    Step {
        node: String,
        #[source]
        source: StepError,
    },

    /// A suspension-capable unit was driven through the blocking entrypoint.
    #[error("'{what}' is suspension-capable; drive it with run_async")]
    #[diagnostic(
        code(weft::flow::suspension_required),
        help("Use the async run entrypoint for graphs containing async units.")
    )]
    SuspensionRequired { what: String },

    /// A successor label resolved to a node id missing from the registry.
    #[error("flow '{flow}' references unknown node '{node}'")]
    #[diagnostic(code(weft::flow::unknown_node))]
    UnknownNode { flow: String, node: String },

    /// A batch prepare hook yielded something other than an array.
    #[error("batch prepare for '{what}' must yield an array, got {got}")]
    #[diagnostic(
        code(weft::flow::batch_prep),
        help("Return a JSON array of items (or overrides) from prepare.")
    )]
    BatchPrep { what: String, got: &'static str },
}

/// Structural errors reported by `FlowBuilder::build`.
#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    /// No start node was set.
    #[error("flow '{flow}' has no start node")]
    #[diagnostic(
        code(weft::build::missing_start),
        help("Call FlowBuilder::start with the entry node id.")
    )]
    MissingStart { flow: String },

    /// The start id does not name a registered node.
    #[error("start node '{node}' is not registered in flow '{flow}'")]
    #[diagnostic(code(weft::build::unknown_start))]
    UnknownStart { flow: String, node: String },

    /// A successor edge points at a node id that was never registered.
    #[error("flow '{flow}': node '{from}' routes action '{action}' to unknown node '{to}'")]
    #[diagnostic(code(weft::build::unknown_successor))]
    UnknownSuccessor {
        flow: String,
        from: String,
        action: String,
        to: String,
    },
}

/// Short JSON type name used in batch-prepare diagnostics.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
