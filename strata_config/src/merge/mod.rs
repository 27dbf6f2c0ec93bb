//! Merge-tree compilation, application and policy resolution.

mod apply;
mod build;
mod op;
mod policy;
mod tree;

pub use apply::{apply_merge_tree, apply_merge_tree_in_place};
pub use build::create_merge_tree;
pub use op::{MatchCase, OpKind, Operation};
pub use policy::{AttrWeight, MergePolicyRegistry, RuleAttrs, RuleWeightMap};
pub use tree::MergeTree;
