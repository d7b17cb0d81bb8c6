//! Agent decision loop: a decide node routes between researching and
//! answering until it is satisfied, cycling through the graph.
//!
//! Run with `cargo run --example agent`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use weft::collaborators::{ContentFetcher, LlmClient, MockFetcher, MockLlm};
use weft::errors::StepError;
use weft::flow::FlowBuilder;
use weft::node::Node;
use weft::step::{Action, AsyncStep, StepContext};
use weft::store::SharedStore;

/// Asks the model whether to research more or answer now.
struct Decide {
    llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl AsyncStep for Decide {
    async fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
        let question = ctx
            .shared
            .get("question")
            .ok_or(StepError::MissingInput { what: "question" })?;
        let notes = ctx.shared.get("notes").unwrap_or(json!([]));
        Ok(json!({ "question": question, "notes": notes }))
    }

    async fn compute(&self, prep: Value) -> Result<Value, StepError> {
        let prompt = format!(
            "Question: {}\nNotes so far: {}\nReply SEARCH:<url> or FINAL:<answer>.",
            prep["question"], prep["notes"]
        );
        Ok(Value::String(self.llm.generate(&prompt).await?))
    }

    async fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        let reply = exec.as_str().unwrap_or_default();
        if let Some(url) = reply.strip_prefix("SEARCH:") {
            ctx.shared.insert("next_url", json!(url.trim()));
            Ok(Some("research".into()))
        } else {
            let answer = reply.strip_prefix("FINAL:").unwrap_or(reply).trim();
            ctx.shared.insert("answer", json!(answer));
            Ok(Some("answer".into()))
        }
    }
}

/// Fetches the page the decide node asked for and appends it to the notes.
struct Research {
    fetcher: Arc<dyn ContentFetcher>,
}

#[async_trait]
impl AsyncStep for Research {
    async fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
        ctx.shared
            .get("next_url")
            .ok_or(StepError::MissingInput { what: "next_url" })
    }

    async fn compute(&self, prep: Value) -> Result<Value, StepError> {
        let url = prep.as_str().ok_or(StepError::MissingInput { what: "url" })?;
        Ok(Value::String(self.fetcher.fetch(url).await?))
    }

    async fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared.with_mut(|map| {
            let entry = map
                .entry("notes".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(notes) = entry {
                notes.push(exec);
            }
        });
        Ok(None) // default routes back to decide
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    weft::telemetry::init();

    let llm: Arc<dyn LlmClient> = Arc::new(
        MockLlm::new()
            .with_reply("SEARCH: doc://looms")
            .with_reply("FINAL: A weft thread is carried across the warp by the shuttle."),
    );
    let fetcher: Arc<dyn ContentFetcher> = Arc::new(MockFetcher::new().with_page(
        "doc://looms",
        "In weaving, the shuttle carries the weft across the warp.",
    ));

    let flow = FlowBuilder::new("agent")
        .add_node(
            "decide",
            Node::suspendable(Decide { llm })
                .on("research", "search")
                .on("answer", "reply"),
        )
        .add_node("search", Node::suspendable(Research { fetcher }).then("decide"))
        .add_node(
            "reply",
            Node::step(PrintAnswer),
        )
        .start("decide")
        .build()
        .map_err(miette::Report::new)?;

    let shared = SharedStore::new();
    shared.insert("question", json!("What does a weft do?"));
    flow.run_async(&shared).await.map_err(miette::Report::new)?;
    Ok(())
}

/// Terminal node: prints the agreed answer.
struct PrintAnswer;

impl weft::step::Step for PrintAnswer {
    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        _exec: Value,
    ) -> Result<Option<Action>, StepError> {
        let answer = ctx.shared.get("answer").unwrap_or(json!("(no answer)"));
        println!("answer: {answer}");
        Ok(None)
    }
}
