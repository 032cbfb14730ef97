//! Tree construction and lazy expansion for topic map outlines.
//!
//! This crate turns parsed outlines into a navigable tree ([`tree`]), keeps a
//! reverse index from resource locator to node ([`index`]), expands document
//! nodes on demand by scanning their includes ([`explorer`]), and broadcasts
//! tree changes to observers ([`notify`]).

pub mod explorer;
pub mod index;
pub mod notify;
pub mod tree;

pub use explorer::{Explorer, VisibleRow};
pub use index::ResourceIndex;
pub use notify::{ChangeNotifier, TreeChange};
pub use tree::{
    Built, BuiltChildren, CollapsibleState, DocumentNode, Expansion, GroupNode, IndexEntry,
    NodeKind, NodePath, NodeView, SourceNode, TreeNode, build_includes, build_topic,
    build_topics,
};
