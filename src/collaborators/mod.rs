//! Integration contracts for the services pipelines typically talk to,
//! plus deterministic in-process implementations for tests and demos.
//!
//! Steps should depend on these traits (behind `Arc<dyn …>`), not on a
//! concrete provider, so pipelines stay runnable offline.

pub mod chunk;
pub mod embedding;
pub mod fetch;
pub mod llm;
pub mod tabular;

pub use chunk::chunk_text;
pub use embedding::{Embedder, HashEmbedder, cosine};
pub use fetch::{ContentFetcher, MockFetcher};
pub use llm::{LlmClient, MockLlm};
pub use tabular::parse_rows;
