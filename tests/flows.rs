mod common;

use serde_json::{Value, json};
use weft::errors::{BuildError, FlowError, StepError};
use weft::flow::{Flow, FlowBuilder};
use weft::node::Node;
use weft::step::{Action, Step, StepContext};
use weft::store::{Params, SharedStore};

use common::steps::{AlwaysFail, Scripted, Trace};
use common::visited;

fn chain() -> Flow {
    FlowBuilder::new("chain")
        .add_node("a", Node::step(Trace::new("a")).then("b"))
        .add_node("b", Node::step(Trace::new("b")).then("c"))
        .add_node("c", Node::step(Trace::new("c")))
        .start("a")
        .build()
        .unwrap()
}

#[test]
fn linear_chain_visits_in_order() {
    let flow = chain();
    let shared = SharedStore::new();
    let last = flow.run(&shared).unwrap();
    assert_eq!(visited(&shared), vec!["a", "b", "c"]);
    // Terminal node returned no action.
    assert_eq!(last, None);
}

#[test]
fn decision_loop_cycles_until_complete() {
    let flow = FlowBuilder::new("agent-loop")
        .add_node(
            "decide",
            Node::step(Scripted::new(
                "decide",
                vec!["research", "research", "answer"],
            ))
            .on("research", "search")
            .on("answer", "reply"),
        )
        .add_node("search", Node::step(Trace::new("search")).then("decide"))
        .add_node("reply", Node::step(Trace::new("reply")))
        .start("decide")
        .build()
        .unwrap();

    let shared = SharedStore::new();
    let last = flow.run(&shared).unwrap();
    assert_eq!(
        visited(&shared),
        vec!["decide", "search", "decide", "search", "decide", "reply"]
    );
    assert_eq!(last, None);
}

#[test]
fn unmatched_label_ends_traversal_with_that_action() {
    let flow = FlowBuilder::new("dead-end")
        .add_node(
            "a",
            Node::step(Trace::with_action("a", "sideways")).then("b"),
        )
        .add_node("b", Node::step(Trace::new("b")))
        .start("a")
        .build()
        .unwrap();

    let shared = SharedStore::new();
    let last = flow.run(&shared).unwrap();
    // "sideways" matches no edge, so the flow stops after "a" and reports it.
    assert_eq!(visited(&shared), vec!["a"]);
    assert_eq!(last, Some("sideways".to_string()));
}

#[test]
fn nested_flow_runs_as_one_node() {
    let inner = FlowBuilder::new("inner")
        .add_node("i1", Node::step(Trace::new("i1")).then("i2"))
        .add_node("i2", Node::step(Trace::with_action("i2", "inner-done")))
        .start("i1")
        .build()
        .unwrap();

    let outer = FlowBuilder::new("outer")
        .add_node("pre", Node::step(Trace::new("pre")).then("sub"))
        .add_node("sub", Node::flow(inner).on("inner-done", "post"))
        .add_node("post", Node::step(Trace::new("post")))
        .start("pre")
        .build()
        .unwrap();

    let shared = SharedStore::new();
    outer.run(&shared).unwrap();
    // The inner flow's last action routed the outer traversal.
    assert_eq!(visited(&shared), vec!["pre", "i1", "i2", "post"]);
}

#[test]
fn failure_aborts_run_and_preserves_source() {
    let flow = FlowBuilder::new("failing")
        .add_node("a", Node::step(Trace::new("a")).then("boom"))
        .add_node("boom", Node::step(AlwaysFail).then("after"))
        .add_node("after", Node::step(Trace::new("after")))
        .start("a")
        .build()
        .unwrap();

    let shared = SharedStore::new();
    let err = flow.run(&shared).unwrap_err();
    match err {
        FlowError::Step { node, source } => {
            assert_eq!(node, "boom");
            assert!(matches!(source, StepError::Validation(_)));
        }
        other => panic!("expected step failure, got {other}"),
    }
    // Nothing downstream of the failure ran.
    assert_eq!(visited(&shared), vec!["a"]);
}

#[test]
fn runs_do_not_share_state() {
    let flow = chain();
    let first = SharedStore::new();
    let second = SharedStore::new();
    flow.run(&first).unwrap();
    flow.run(&second).unwrap();
    assert_eq!(visited(&first), vec!["a", "b", "c"]);
    assert_eq!(visited(&second), vec!["a", "b", "c"]);
}

struct RecordParam;

impl Step for RecordParam {
    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        _exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared
            .insert("observed", ctx.param("knob").cloned().unwrap_or(Value::Null));
        Ok(None)
    }
}

#[test]
fn flow_params_override_node_params() {
    let mut node_params = Params::default();
    node_params.insert("knob".into(), json!("node-level"));
    let mut flow_params = Params::default();
    flow_params.insert("knob".into(), json!("flow-level"));

    let flow = FlowBuilder::new("params")
        .add_node("only", Node::step(RecordParam).with_params(node_params))
        .with_params(flow_params)
        .start("only")
        .build()
        .unwrap();

    let shared = SharedStore::new();
    flow.run(&shared).unwrap();
    assert_eq!(shared.get("observed"), Some(json!("flow-level")));
}

#[test]
fn node_params_apply_when_not_overridden() {
    let mut node_params = Params::default();
    node_params.insert("knob".into(), json!("node-level"));

    let flow = FlowBuilder::new("params")
        .add_node("only", Node::step(RecordParam).with_params(node_params))
        .start("only")
        .build()
        .unwrap();

    let shared = SharedStore::new();
    flow.run(&shared).unwrap();
    assert_eq!(shared.get("observed"), Some(json!("node-level")));
}

#[test]
fn build_rejects_missing_start() {
    let err = FlowBuilder::new("no-start")
        .add_node("a", Node::step(Trace::new("a")))
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::MissingStart { .. }));
}

#[test]
fn build_rejects_unknown_start() {
    let err = FlowBuilder::new("bad-start")
        .add_node("a", Node::step(Trace::new("a")))
        .start("ghost")
        .build()
        .unwrap_err();
    assert!(matches!(err, BuildError::UnknownStart { .. }));
}

#[test]
fn build_rejects_dangling_successor() {
    let err = FlowBuilder::new("dangling")
        .add_node("a", Node::step(Trace::new("a")).then("ghost"))
        .start("a")
        .build()
        .unwrap_err();
    match err {
        BuildError::UnknownSuccessor {
            from, action, to, ..
        } => {
            assert_eq!(from, "a");
            assert_eq!(action, "default");
            assert_eq!(to, "ghost");
        }
        other => panic!("expected dangling successor error, got {other}"),
    }
}

#[test]
fn cycles_pass_validation() {
    let flow = FlowBuilder::new("cycle")
        .add_node("a", Node::step(Trace::with_action("a", "stop")).then("a"))
        .start("a")
        .build();
    assert!(flow.is_ok());
}
