//! The optimization pipeline: canonicalize, heuristics, cache, semantic
//! selection, compression, validation, orchestration.
//!
//! The single entry point is [`Optimizer::run`], which rewrites an incoming
//! conversation into a budget-conforming one. Stages degrade individually
//! when their collaborators misbehave; the only observable failures are an
//! invalid request and a validation failure that survived every fallback.

mod canonicalize;
mod error;
mod heuristics;
mod optimizer;
mod request;
mod stats;
mod validate;

pub use error::Error;
pub use optimizer::{Optimized, Optimizer, OptimizerBuilder};
pub use request::{ChatMessage, OptimizeRequest, RetrievedDoc, Role, ToolSchema};
pub use stats::{OptimizeStats, StageTimings};
pub use validate::PostCondition;
