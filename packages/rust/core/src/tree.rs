//! Topic tree model and builder.
//!
//! Converts parsed topic definitions into [`TreeNode`]s, accumulating the
//! directory path of every `Dir` group into the locators of the documents
//! below it. Building is pure: the index entries a subtree contributes are
//! returned next to it ([`Built`], [`BuiltChildren`]) and applied by the
//! caller.

use std::fmt;

use serde::Serialize;
use topicmaps_shared::{LayoutConfig, OpenAction, ResourceLocator, TopicDefinition};
use tracing::warn;

static NO_RESOURCE: ResourceLocator = ResourceLocator::Invalid;

// ---------------------------------------------------------------------------
// NodePath
// ---------------------------------------------------------------------------

/// Handle of a node: child indices from the root list down to the node.
///
/// Nodes are only ever appended between refreshes, so a path stays valid
/// until the tree is rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Path of the `index`-th root node.
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    /// Path of this node's `index`-th child.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// `relative` resolved below this path.
    pub fn join(&self, relative: &NodePath) -> Self {
        let mut indices = self.0.clone();
        indices.extend_from_slice(&relative.0);
        Self(indices)
    }

    /// Path of the parent node; `None` for roots.
    pub fn parent(&self) -> Option<Self> {
        match self.0.len() {
            0 | 1 => None,
            n => Some(Self(self.0[..n - 1].to_vec())),
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Nesting depth; roots are at depth 0.
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", parts.join("."))
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Whether a node's children are known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Expansion {
    /// Not loaded yet (or a plain leaf).
    #[default]
    Unexpanded,
    /// Loaded; possibly empty.
    Expanded(Vec<TreeNode>),
}

impl Expansion {
    pub fn children(&self) -> Option<&[TreeNode]> {
        match self {
            Self::Unexpanded => None,
            Self::Expanded(children) => Some(children),
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, Self::Expanded(_))
    }
}

/// Root node for one outline source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    pub file_name: String,
    pub children: Expansion,
}

/// Directory group from a `Dir` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNode {
    pub label: String,
    /// Accumulated directory path (`A/B` for `B` nested in `A`).
    pub dir: String,
    pub children: Vec<TreeNode>,
}

/// A document: an outline `File` entry or an included module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    pub label: String,
    pub locator: ResourceLocator,
    pub open_action: Option<OpenAction>,
    pub children: Expansion,
}

impl DocumentNode {
    /// Unexpanded document; concrete locators get an open action.
    pub fn new(label: impl Into<String>, locator: ResourceLocator) -> Self {
        Self {
            label: label.into(),
            open_action: OpenAction::open(&locator),
            locator,
            children: Expansion::Unexpanded,
        }
    }
}

/// A node of the topic tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Source(SourceNode),
    Group(GroupNode),
    Document(DocumentNode),
}

/// Node variant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Source,
    Group,
    Document,
}

/// Whether a host should offer drill-down on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapsibleState {
    None,
    Collapsed,
}

impl TreeNode {
    /// Unexpanded root node for an outline source.
    pub fn source(file_name: impl Into<String>) -> Self {
        Self::Source(SourceNode {
            file_name: file_name.into(),
            children: Expansion::Unexpanded,
        })
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Source(s) => &s.file_name,
            Self::Group(g) => &g.label,
            Self::Document(d) => &d.label,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Source(_) => NodeKind::Source,
            Self::Group(_) => NodeKind::Group,
            Self::Document(_) => NodeKind::Document,
        }
    }

    /// The node's locator; sources and groups have none.
    pub fn locator(&self) -> &ResourceLocator {
        match self {
            Self::Document(d) => &d.locator,
            Self::Source(_) | Self::Group(_) => &NO_RESOURCE,
        }
    }

    pub fn open_action(&self) -> Option<&OpenAction> {
        match self {
            Self::Document(d) => d.open_action.as_ref(),
            Self::Source(_) | Self::Group(_) => None,
        }
    }

    /// Loaded children; `None` while unexpanded.
    pub fn children(&self) -> Option<&[TreeNode]> {
        match self {
            Self::Source(s) => s.children.children(),
            Self::Group(g) => Some(&g.children),
            Self::Document(d) => d.children.children(),
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<TreeNode>> {
        match self {
            Self::Source(SourceNode {
                children: Expansion::Expanded(children),
                ..
            })
            | Self::Document(DocumentNode {
                children: Expansion::Expanded(children),
                ..
            }) => Some(children),
            Self::Group(g) => Some(&mut g.children),
            _ => None,
        }
    }

    /// Whether the children are known. Groups always are.
    pub fn is_expanded(&self) -> bool {
        self.children().is_some()
    }

    pub fn collapsible_state(&self) -> CollapsibleState {
        let offer = match self {
            Self::Source(_) | Self::Group(_) => true,
            Self::Document(d) => match &d.children {
                Expansion::Unexpanded => d.locator.is_concrete(),
                Expansion::Expanded(children) => !children.is_empty(),
            },
        };
        if offer {
            CollapsibleState::Collapsed
        } else {
            CollapsibleState::None
        }
    }

    /// Attach loaded children. Only the first attach on a node takes effect.
    pub(crate) fn attach(&mut self, nodes: Vec<TreeNode>) -> bool {
        let slot = match self {
            Self::Source(s) => &mut s.children,
            Self::Document(d) => &mut d.children,
            Self::Group(_) => return false,
        };
        if slot.is_expanded() {
            return false;
        }
        *slot = Expansion::Expanded(nodes);
        true
    }
}

/// Node at `path` among `roots`, following loaded children only.
pub fn node_at<'a>(roots: &'a [TreeNode], path: &NodePath) -> Option<&'a TreeNode> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = roots.get(*first)?;
    for &index in rest {
        node = node.children()?.get(index)?;
    }
    Some(node)
}

pub(crate) fn node_at_mut<'a>(
    roots: &'a mut [TreeNode],
    path: &NodePath,
) -> Option<&'a mut TreeNode> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = roots.get_mut(*first)?;
    for &index in rest {
        node = node.children_mut()?.get_mut(index)?;
    }
    Some(node)
}

/// Loaded nodes in preorder. Children of a node are visited only when
/// `descend` returns true for it.
pub fn preorder<'a>(
    roots: &'a [TreeNode],
    mut descend: impl FnMut(&NodePath, &TreeNode) -> bool,
) -> Vec<(NodePath, &'a TreeNode)> {
    let mut out = Vec::new();
    let mut stack: Vec<(NodePath, &TreeNode)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, node)| (NodePath::root(i), node))
        .collect();

    while let Some((path, node)) = stack.pop() {
        if descend(&path, node) {
            if let Some(children) = node.children() {
                for (i, child) in children.iter().enumerate().rev() {
                    stack.push((path.child(i), child));
                }
            }
        }
        out.push((path, node));
    }
    out
}

// ---------------------------------------------------------------------------
// NodeView
// ---------------------------------------------------------------------------

/// Detached, serializable view of one node (without its children).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub path: NodePath,
    pub kind: NodeKind,
    pub label: String,
    pub state: CollapsibleState,
    pub locator: ResourceLocator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_action: Option<OpenAction>,
    pub expanded: bool,
}

impl NodeView {
    pub fn of(path: NodePath, node: &TreeNode) -> Self {
        Self {
            path,
            kind: node.kind(),
            label: node.label().to_string(),
            state: node.collapsible_state(),
            locator: node.locator().clone(),
            open_action: node.open_action().cloned(),
            expanded: node.is_expanded(),
        }
    }

    /// Views of `children` below `parent` (an empty parent means roots).
    pub fn children_of(parent: &NodePath, children: &[TreeNode]) -> Vec<Self> {
        children
            .iter()
            .enumerate()
            .map(|(i, child)| Self::of(parent.child(i), child))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Resource index entry contributed by a built subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub locator: String,
    /// Path relative to the node the entry was built under.
    pub path: NodePath,
}

impl IndexEntry {
    fn nested_under(self, index: usize) -> Self {
        Self {
            locator: self.locator,
            path: NodePath::root(index).join(&self.path),
        }
    }
}

/// A built node with the index entries of its subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Built {
    pub node: TreeNode,
    /// Entries relative to `node` (the node itself is the empty path).
    pub entries: Vec<IndexEntry>,
}

/// Built siblings with the index entries of all their subtrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltChildren {
    pub nodes: Vec<TreeNode>,
    /// Entries relative to the parent the siblings are attached to.
    pub entries: Vec<IndexEntry>,
}

impl BuiltChildren {
    fn push(&mut self, built: Built) {
        let index = self.nodes.len();
        self.entries
            .extend(built.entries.into_iter().map(|e| e.nested_under(index)));
        self.nodes.push(built.node);
    }
}

/// Build the node for one topic definition below `parent_dir`.
pub fn build_topic(
    definition: &TopicDefinition,
    parent_dir: Option<&str>,
    layout: &LayoutConfig,
) -> Built {
    if let Some(dir) = definition.group_dir() {
        let child_dir = match parent_dir.filter(|p| !p.is_empty()) {
            Some(parent) => format!("{parent}/{dir}"),
            None => dir.to_string(),
        };
        let topics = definition.topics.as_deref().unwrap_or_default();
        let children = build_topics(topics, Some(&child_dir), layout);

        return Built {
            node: TreeNode::Group(GroupNode {
                label: dir.to_string(),
                dir: child_dir,
                children: children.nodes,
            }),
            entries: children.entries,
        };
    }

    if let Some(file) = definition.file_name() {
        let locator = ResourceLocator::document(parent_dir, file, &layout.doc_extension);
        let entries = vec![IndexEntry {
            locator: locator.to_string(),
            path: NodePath::default(),
        }];
        let label = format!("{file}.{}", layout.doc_extension);
        return Built {
            node: TreeNode::Document(DocumentNode::new(label, locator)),
            entries,
        };
    }

    warn!(
        name = definition.name.as_deref().unwrap_or(""),
        parent = parent_dir.unwrap_or(""),
        "topic has neither Dir nor File, keeping a degenerate node"
    );
    let label = definition.name.clone().unwrap_or_default();
    Built {
        node: TreeNode::Document(DocumentNode::new(label, ResourceLocator::Invalid)),
        entries: Vec::new(),
    }
}

/// Build sibling nodes for `definitions`, in order.
pub fn build_topics(
    definitions: &[TopicDefinition],
    parent_dir: Option<&str>,
    layout: &LayoutConfig,
) -> BuiltChildren {
    let mut built = BuiltChildren::default();
    for definition in definitions {
        built.push(build_topic(definition, parent_dir, layout));
    }
    built
}

/// Build the children of an expanded document from its include names.
pub fn build_includes(names: &[String], layout: &LayoutConfig) -> BuiltChildren {
    let mut built = BuiltChildren::default();
    for name in names {
        let target = if layout.module_locator_extension {
            format!("{name}.{}", layout.doc_extension)
        } else {
            name.clone()
        };
        let locator = ResourceLocator::join(Some(&layout.modules_dir), &target);
        built.push(Built {
            entries: vec![IndexEntry {
                locator: locator.to_string(),
                path: NodePath::default(),
            }],
            node: TreeNode::Document(DocumentNode::new(name.clone(), locator)),
        });
    }
    built
}
