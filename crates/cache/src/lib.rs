//! Content-addressed cache of finalized pipeline outputs.
//!
//! The cache is keyed by a digest of everything that determines the output:
//! target model, tokenizer version, the input block fingerprints and the
//! output-affecting configuration. Storage sits behind [`CacheStore`] so a
//! deployment can swap the bundled in-memory implementation for a shared
//! backend; the pipeline treats every store error as a miss.
//!
//! [`SingleFlight`] collapses concurrent runs for the same key into one
//! producer execution whose result all callers share.

mod flight;
mod key;
mod store;

pub use flight::SingleFlight;
pub use key::{CacheKey, KeyMaterial};
pub use store::{CacheError, CacheStore, MemoryCache};
