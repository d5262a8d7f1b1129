// file: src/lineage/mod.rs
// description: lineage module exports
// reference: internal module structure

mod merger;

pub use merger::{DETAIL_BRANCH, LineageMerger, PARENT_BRANCH, build_history};
