//! Retrieval pipeline: chunk a document, embed the chunks concurrently,
//! retrieve the best match for a question, and answer with the model.
//!
//! Run with `cargo run --example rag`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use weft::collaborators::{Embedder, HashEmbedder, LlmClient, MockLlm, chunk_text, cosine};
use weft::errors::StepError;
use weft::flow::FlowBuilder;
use weft::node::Node;
use weft::retry::RetryPolicy;
use weft::step::{Action, AsyncStep, Step, StepContext};
use weft::store::SharedStore;

const CHUNK_CHARS: usize = 80;
const CHUNK_OVERLAP: usize = 16;

/// Splits the source document into overlapping chunks.
struct Chunk;

impl Step for Chunk {
    fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
        ctx.shared
            .get("document")
            .ok_or(StepError::MissingInput { what: "document" })
    }

    fn compute(&self, prep: Value) -> Result<Value, StepError> {
        let text = prep.as_str().ok_or(StepError::MissingInput { what: "document text" })?;
        let chunks = chunk_text(text, CHUNK_CHARS, CHUNK_OVERLAP)?;
        Ok(json!(chunks))
    }

    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared.insert("chunks", exec);
        Ok(None)
    }
}

/// Embeds every chunk concurrently.
struct Embed {
    embedder: Arc<dyn Embedder>,
}

#[async_trait]
impl AsyncStep for Embed {
    async fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
        ctx.shared
            .get("chunks")
            .ok_or(StepError::MissingInput { what: "chunks" })
    }

    async fn compute(&self, prep: Value) -> Result<Value, StepError> {
        let chunk = prep.as_str().ok_or(StepError::MissingInput { what: "chunk text" })?;
        Ok(json!(self.embedder.embed(chunk)?))
    }

    async fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared.insert("embeddings", exec);
        Ok(None)
    }
}

/// Picks the chunk whose embedding is closest to the question's.
struct Retrieve {
    embedder: Arc<dyn Embedder>,
}

impl Step for Retrieve {
    fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
        let question = ctx
            .shared
            .get("question")
            .ok_or(StepError::MissingInput { what: "question" })?;
        let chunks = ctx
            .shared
            .get("chunks")
            .ok_or(StepError::MissingInput { what: "chunks" })?;
        let embeddings = ctx
            .shared
            .get("embeddings")
            .ok_or(StepError::MissingInput { what: "embeddings" })?;
        Ok(json!({ "question": question, "chunks": chunks, "embeddings": embeddings }))
    }

    fn compute(&self, prep: Value) -> Result<Value, StepError> {
        let question = prep["question"].as_str().unwrap_or_default();
        let query = self.embedder.embed(question)?;
        let embeddings: Vec<Vec<f32>> = serde_json::from_value(prep["embeddings"].clone())?;
        let chunks: Vec<String> = serde_json::from_value(prep["chunks"].clone())?;

        let best = embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine(&query, e)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .ok_or(StepError::MissingInput { what: "at least one chunk" })?;
        Ok(json!(chunks[best]))
    }

    fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        ctx.shared.insert("context", exec);
        Ok(None)
    }
}

/// Answers the question against the retrieved context, with retries for a
/// flaky provider.
struct Answer {
    llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl AsyncStep for Answer {
    async fn prepare(&self, ctx: &StepContext) -> Result<Value, StepError> {
        let question = ctx
            .shared
            .get("question")
            .ok_or(StepError::MissingInput { what: "question" })?;
        let context = ctx
            .shared
            .get("context")
            .ok_or(StepError::MissingInput { what: "context" })?;
        Ok(json!({ "question": question, "context": context }))
    }

    async fn compute(&self, prep: Value) -> Result<Value, StepError> {
        let prompt = format!(
            "Context: {}\nQuestion: {}\nAnswer from the context only.",
            prep["context"], prep["question"]
        );
        Ok(Value::String(self.llm.generate(&prompt).await?))
    }

    async fn finalize(
        &self,
        ctx: &StepContext,
        _prep: Value,
        exec: Value,
    ) -> Result<Option<Action>, StepError> {
        println!("answer: {exec}");
        ctx.shared.insert("answer", exec);
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    weft::telemetry::init();

    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
    // First call fails so the retry policy gets exercised.
    let llm: Arc<dyn LlmClient> = Arc::new(
        MockLlm::new()
            .failing(1)
            .with_reply("The shuttle carries the weft across the warp."),
    );

    let flow = FlowBuilder::new("rag")
        .add_node("chunk", Node::step(Chunk).then("embed"))
        .add_node(
            "embed",
            Node::concurrent_batch(Embed {
                embedder: embedder.clone(),
            })
            .then("retrieve"),
        )
        .add_node("retrieve", Node::step(Retrieve { embedder }).then("answer"))
        .add_node(
            "answer",
            Node::suspendable(Answer { llm })
                .with_retry(RetryPolicy::new(3, Duration::from_millis(50))),
        )
        .start("chunk")
        .build()
        .map_err(miette::Report::new)?;

    let shared = SharedStore::new();
    shared.insert(
        "document",
        json!(
            "A loom interlaces two thread systems. The warp runs lengthwise and is \
             held under tension. The weft is carried across the warp by the shuttle, \
             row after row, to build up cloth. Weave structure comes from which warp \
             threads the weft passes over and under."
        ),
    );
    shared.insert("question", json!("What carries the weft across the warp?"));

    flow.run_async(&shared).await.map_err(miette::Report::new)?;
    Ok(())
}
