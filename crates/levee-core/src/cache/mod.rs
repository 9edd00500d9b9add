//! Cache policy and write-back

mod commit;
mod policy;

pub use commit::{CommitKind, commit};
pub use policy::{CachePolicy, MismatchPolicy};
