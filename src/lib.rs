//! Weft: a minimal graph workflow engine.
//!
//! Pipelines are directed graphs of nodes sharing one mutable store. Each
//! node wraps a three-hook step (prepare, compute, finalize), an optional
//! retry policy, and an action-labelled successor table; a traversal walks
//! the graph following the label each visit returns. Cycles are legal, so
//! agent-style decision loops fall out of plain routing.
//!
//! Variants cover the common shapes: blocking and suspension-capable
//! steps, per-item batch nodes, concurrent fan-out, batch orchestrators
//! that re-run a whole graph per parameter set, and flows nested as nodes
//! of larger flows.
//!
//! # Quick start
//!
//! ```rust
//! use weft::errors::StepError;
//! use weft::flow::FlowBuilder;
//! use weft::node::Node;
//! use weft::step::{Action, Step, StepContext};
//! use serde_json::{Value, json};
//!
//! struct Double;
//!
//! impl Step for Double {
//!     fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
//!         Ok(ctx.shared.get("n").unwrap_or(json!(0)))
//!     }
//!     fn compute(&self, prep: Value) -> Result<Value, StepError> {
//!         Ok(json!(prep.as_i64().unwrap_or(0) * 2))
//!     }
//!     fn finalize(
//!         &self,
//!         ctx: &StepContext,
//!         _prep: Value,
//!         exec: Value,
//!     ) -> Result<Option<Action>, StepError> {
//!         ctx.shared.insert("n", exec);
//!         Ok(None)
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let flow = FlowBuilder::new("doubler")
//!     .add_node("first", Node::step(Double).then("second"))
//!     .add_node("second", Node::step(Double))
//!     .start("first")
//!     .build()?;
//!
//! let shared = weft::store::SharedStore::new();
//! shared.insert("n", json!(3));
//! flow.run(&shared)?;
//! assert_eq!(shared.get("n"), Some(json!(12)));
//! # Ok(())
//! # }
//! ```

pub mod collaborators;
pub mod errors;
pub mod flow;
pub mod node;
pub mod retry;
pub mod step;
pub mod store;
pub mod telemetry;
