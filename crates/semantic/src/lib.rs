//! Semantic selection: embedding-backed retrieval with a multi-factor
//! utility score, diversity-aware MMR re-ranking and a per-kind budget
//! knapsack.
//!
//! The stage runs only when a request is still over budget after the
//! deterministic heuristics. Both external collaborators live behind traits:
//! [`Embedder`] turns text into unit-norm vectors and [`VectorStore`] serves
//! persisted neighbours; either being unavailable degrades the stage rather
//! than failing the run.

mod embed;
mod error;
mod knapsack;
mod mmr;
mod score;
mod selector;
mod similarity;
mod store;

pub use embed::{Embedder, HttpEmbedder, LazyEmbedder};
pub use error::SemanticError;
pub use selector::{Selection, SelectionParams, select};
pub use similarity::{cosine, l2_normalize};
pub use store::{MemoryVectorStore, VectorRecord, VectorStore};
