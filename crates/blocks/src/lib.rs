//! The block intermediate representation shared by every pipeline stage.
//!
//! A request is canonicalized into an ordered list of [`Block`]s, and every
//! later stage reads and rewrites that list. The types here carry the
//! invariants the stages rely on: fingerprints are a pure function of
//! content, content mutation goes through methods that keep `token_count`
//! and `fingerprint` coherent, and `must_keep` blocks survive verbatim.

mod block;
mod fingerprint;
mod kind;
mod reason;
pub mod signals;

pub use block::{Block, BlockId, total_tokens};
pub use fingerprint::{Fingerprint, normalize};
pub use kind::BlockKind;
pub use reason::{DropReason, DroppedBlock};
