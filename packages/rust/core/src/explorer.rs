//! Topic map explorer: root listing, lazy expansion, refresh.
//!
//! The explorer owns the tree, the resource index, and the change notifier.
//! Children are loaded on first request:
//! - a source node parses its outline file into groups and documents
//! - a document node scans its text for module includes
//!
//! Tree state sits behind one async mutex that is never held across I/O, so
//! every mutation lands in a single step. Concurrent loads of the same
//! resource share one in-flight result.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell, broadcast};
use tracing::{debug, info, instrument, warn};

use topicmaps_asciidoc::IncludeScanner;
use topicmaps_discovery::{FileSystem, list_outline_sources, parse_outline};
use topicmaps_shared::{AppConfig, LayoutConfig, Result, TopicMapsError};

use crate::index::ResourceIndex;
use crate::notify::{ChangeNotifier, TreeChange};
use crate::tree::{
    BuiltChildren, Expansion, NodeKind, NodePath, NodeView, TreeNode, build_includes,
    build_topics, node_at, node_at_mut, preorder,
};

/// Default capacity of the change channel.
const DEFAULT_NOTIFY_CAPACITY: usize = 64;

/// What a pending load reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LoadKey {
    /// Outline source file name inside the topic map directory.
    Outline(String),
    /// Workspace-relative document locator.
    Document(String),
}

type PendingLoad = Arc<OnceCell<BuiltChildren>>;

#[derive(Debug, Default)]
struct TreeState {
    /// Bumped by every refresh; loads started under an older generation are dropped.
    generation: u64,
    roots: Option<Vec<TreeNode>>,
    index: ResourceIndex,
}

struct Inner {
    fs: Arc<dyn FileSystem>,
    workspace_root: PathBuf,
    layout: LayoutConfig,
    scanner: IncludeScanner,
    state: Mutex<TreeState>,
    in_flight: Mutex<HashMap<LoadKey, PendingLoad>>,
    notifier: ChangeNotifier,
}

/// One row of the visible tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub depth: usize,
    pub node: NodeView,
}

/// Shared handle to a topic map tree. Cloning is cheap.
#[derive(Clone)]
pub struct Explorer {
    inner: Arc<Inner>,
}

impl Explorer {
    /// Explorer over the workspace rooted at `workspace_root`.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        workspace_root: impl Into<PathBuf>,
        layout: LayoutConfig,
    ) -> Result<Self> {
        Self::with_capacity(fs, workspace_root, layout, DEFAULT_NOTIFY_CAPACITY)
    }

    /// Explorer using the layout and channel capacity from `config`.
    pub fn from_config(
        fs: Arc<dyn FileSystem>,
        workspace_root: impl Into<PathBuf>,
        config: &AppConfig,
    ) -> Result<Self> {
        Self::with_capacity(
            fs,
            workspace_root,
            config.layout.clone(),
            config.explorer.notify_capacity,
        )
    }

    fn with_capacity(
        fs: Arc<dyn FileSystem>,
        workspace_root: impl Into<PathBuf>,
        layout: LayoutConfig,
        notify_capacity: usize,
    ) -> Result<Self> {
        layout.validate()?;
        let scanner = IncludeScanner::from_layout(&layout)?;
        Ok(Self {
            inner: Arc::new(Inner {
                fs,
                workspace_root: workspace_root.into(),
                layout,
                scanner,
                state: Mutex::new(TreeState::default()),
                in_flight: Mutex::new(HashMap::new()),
                notifier: ChangeNotifier::new(notify_capacity),
            }),
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.inner.workspace_root
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.inner.layout
    }

    /// Directory holding the outline sources.
    pub fn topic_maps_dir(&self) -> PathBuf {
        self.inner.workspace_root.join(&self.inner.layout.topic_maps_dir)
    }

    /// Absolute path of a workspace-relative locator.
    pub fn resolve(&self, locator: &str) -> PathBuf {
        locator
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.inner.workspace_root.clone(), |path, segment| {
                path.join(segment)
            })
    }

    /// Receive tree change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeChange> {
        self.inner.notifier.subscribe()
    }

    // -----------------------------------------------------------------------
    // Queries that load
    // -----------------------------------------------------------------------

    /// Root nodes, one per outline source, listed once per refresh.
    #[instrument(skip_all)]
    pub async fn roots(&self) -> Result<Vec<NodeView>> {
        {
            let state = self.inner.state.lock().await;
            if let Some(roots) = &state.roots {
                return Ok(NodeView::children_of(&NodePath::default(), roots));
            }
        }

        let dir = self.topic_maps_dir();
        let sources =
            list_outline_sources(self.inner.fs.as_ref(), &dir, &self.inner.layout).await?;

        let (views, populated) = {
            let mut state = self.inner.state.lock().await;
            let populated = state.roots.is_none();
            if populated {
                state.roots = Some(sources.into_iter().map(TreeNode::source).collect());
            }
            let roots = state.roots.as_deref().unwrap_or_default();
            (NodeView::children_of(&NodePath::default(), roots), populated)
        };

        if populated {
            info!(sources = views.len(), "topic map sources listed");
            self.inner.notifier.notify(TreeChange::All);
        }
        Ok(views)
    }

    /// Children of the node at `path`, loading them on first request.
    ///
    /// Sources parse their outline file; documents scan their includes.
    /// A failed read leaves the node unexpanded so a later call retries.
    #[instrument(skip_all, fields(path = %path))]
    pub async fn children(&self, path: &NodePath) -> Result<Vec<NodeView>> {
        let (key, label, generation) = {
            let state = self.inner.state.lock().await;
            let node = state
                .roots
                .as_deref()
                .and_then(|roots| node_at(roots, path))
                .ok_or_else(|| unknown_node(path))?;

            let key = match node {
                TreeNode::Group(group) => {
                    return Ok(NodeView::children_of(path, &group.children));
                }
                TreeNode::Source(source) => match &source.children {
                    Expansion::Expanded(children) => {
                        return Ok(NodeView::children_of(path, children));
                    }
                    Expansion::Unexpanded => LoadKey::Outline(source.file_name.clone()),
                },
                TreeNode::Document(doc) => match (&doc.children, doc.locator.as_path()) {
                    (Expansion::Expanded(children), _) => {
                        return Ok(NodeView::children_of(path, children));
                    }
                    (Expansion::Unexpanded, Some(locator)) => {
                        LoadKey::Document(locator.to_string())
                    }
                    (Expansion::Unexpanded, None) => {
                        return Err(TopicMapsError::NotExpandable {
                            label: doc.label.clone(),
                        });
                    }
                },
            };
            (key, node.label().to_string(), state.generation)
        };

        let built = self.load_shared(key).await?;

        let (views, attached) = {
            let mut state = self.inner.state.lock().await;
            if state.generation != generation {
                debug!(%label, "tree refreshed during load, dropping result");
                return Err(TopicMapsError::Refreshed { label });
            }

            let TreeState { roots, index, .. } = &mut *state;
            let node = roots
                .as_deref_mut()
                .and_then(|roots| node_at_mut(roots, path))
                .ok_or_else(|| unknown_node(path))?;

            let attached = node.attach(built.nodes);
            if attached {
                index.record(path, built.entries);
            }
            let views = node
                .children()
                .map(|children| NodeView::children_of(path, children))
                .unwrap_or_default();
            (views, attached)
        };

        if attached {
            debug!(%label, children = views.len(), "children attached");
            self.inner.notifier.notify(TreeChange::Node(path.clone()));
        }
        Ok(views)
    }

    /// Lazily expand a document node by scanning its includes.
    pub async fn expand(&self, path: &NodePath) -> Result<Vec<NodeView>> {
        match self.node(path).await {
            Some(view) if view.kind == NodeKind::Document => self.children(path).await,
            Some(view) => Err(TopicMapsError::NotExpandable { label: view.label }),
            None => Err(unknown_node(path)),
        }
    }

    /// Drop the whole tree; the next query rebuilds it from disk.
    #[instrument(skip_all)]
    pub async fn refresh(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            state.roots = None;
            state.index = ResourceIndex::new();
        }
        self.inner.in_flight.lock().await.clear();

        info!("topic map tree refreshed");
        self.inner.notifier.notify(TreeChange::All);
    }

    // -----------------------------------------------------------------------
    // Queries over loaded nodes (no I/O)
    // -----------------------------------------------------------------------

    /// View of a loaded node.
    pub async fn node(&self, path: &NodePath) -> Option<NodeView> {
        let state = self.inner.state.lock().await;
        let node = node_at(state.roots.as_deref()?, path)?;
        Some(NodeView::of(path.clone(), node))
    }

    /// Node currently indexed under `locator`.
    pub async fn lookup(&self, locator: &str) -> Option<NodeView> {
        let state = self.inner.state.lock().await;
        let path = state.index.get(locator)?;
        let node = node_at(state.roots.as_deref()?, path)?;
        Some(NodeView::of(path.clone(), node))
    }

    /// Ask observers to re-render the node indexed under `locator`.
    pub async fn invalidate(&self, locator: &str) -> Option<NodePath> {
        let path = {
            let state = self.inner.state.lock().await;
            state.index.get(locator).cloned()?
        };
        debug!(%locator, %path, "node invalidated");
        self.inner.notifier.notify(TreeChange::Node(path.clone()));
        Some(path)
    }

    /// Loaded nodes in display order, descending only into nodes in `open`.
    pub async fn visible(&self, open: &HashSet<NodePath>) -> Vec<VisibleRow> {
        let state = self.inner.state.lock().await;
        let Some(roots) = state.roots.as_deref() else {
            return Vec::new();
        };
        preorder(roots, |path, _| open.contains(path))
            .into_iter()
            .map(|(path, node)| VisibleRow {
                depth: path.depth(),
                node: NodeView::of(path, node),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load `key`, sharing the result with concurrent requests for it.
    async fn load_shared(&self, key: LoadKey) -> Result<BuiltChildren> {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock().await;
            in_flight.entry(key.clone()).or_default().clone()
        };

        let result = pending
            .get_or_try_init(|| self.load(&key))
            .await
            .cloned();

        let mut in_flight = self.inner.in_flight.lock().await;
        if in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &pending))
        {
            in_flight.remove(&key);
        }
        result
    }

    async fn load(&self, key: &LoadKey) -> Result<BuiltChildren> {
        match key {
            LoadKey::Outline(file_name) => {
                let path = self.topic_maps_dir().join(file_name);
                let content = self.read(&path).await?;
                let topics = parse_outline(&content);
                debug!(source = %file_name, topics = topics.len(), "outline parsed");
                Ok(build_topics(&topics, None, &self.inner.layout))
            }
            LoadKey::Document(locator) => {
                let path = self.resolve(locator);
                let content = self.read(&path).await?;
                let names = self.inner.scanner.scan(&content);
                debug!(%locator, includes = names.len(), "document scanned");
                Ok(build_includes(&names, &self.inner.layout))
            }
        }
    }

    async fn read(&self, path: &Path) -> Result<String> {
        self.inner.fs.read_to_string(path).await.map_err(|e| {
            warn!(path = %path.display(), error = %e, "read failed");
            TopicMapsError::io(path, e)
        })
    }
}

fn unknown_node(path: &NodePath) -> TopicMapsError {
    TopicMapsError::UnknownNode {
        path: path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::CollapsibleState;
    use tokio::sync::Semaphore;
    use topicmaps_discovery::MemoryFs;
    use topicmaps_shared::ResourceLocator;

    const OUTLINE: &str = "\
Dir: intro
Topics:
- File: overview
- File: missing
- Name: Orphan
";

    const OVERVIEW: &str = "\
= Overview

See include::modules/setup.adoc[] for details.
include::other/ignored.adoc[]
";

    fn workspace() -> MemoryFs {
        MemoryFs::new()
            .with_file("/ws/_topic_maps/_topic_map.yml", OUTLINE)
            .with_file("/ws/_topic_maps/notes.txt", "")
            .with_file("/ws/intro/overview.adoc", OVERVIEW)
            .with_file("/ws/modules/setup.adoc", "= Setup\n")
    }

    fn explorer(fs: Arc<MemoryFs>) -> Explorer {
        Explorer::new(fs, "/ws", LayoutConfig::default()).expect("explorer")
    }

    fn intro() -> NodePath {
        NodePath::from_indices([0, 0])
    }

    fn overview() -> NodePath {
        NodePath::from_indices([0, 0, 0])
    }

    /// Load roots, the first source, and return the explorer.
    async fn loaded(fs: Arc<MemoryFs>) -> Explorer {
        let explorer = explorer(fs);
        explorer.roots().await.unwrap();
        explorer.children(&NodePath::root(0)).await.unwrap();
        explorer
    }

    #[tokio::test]
    async fn outline_source_becomes_root_with_topic_children() {
        let explorer = explorer(Arc::new(workspace()));

        let roots = explorer.roots().await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].label, "_topic_map.yml");
        assert_eq!(roots[0].kind, NodeKind::Source);
        assert_eq!(roots[0].state, CollapsibleState::Collapsed);
        assert_eq!(roots[0].locator, ResourceLocator::Invalid);
        assert!(!roots[0].expanded);

        let topics = explorer.children(&NodePath::root(0)).await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].label, "intro");
        assert_eq!(topics[0].kind, NodeKind::Group);
        assert!(topics[0].expanded);

        let docs = explorer.children(&intro()).await.unwrap();
        let labels: Vec<_> = docs.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["overview.adoc", "missing.adoc", "Orphan"]);
        assert_eq!(docs[0].locator.as_path(), Some("intro/overview.adoc"));
        assert_eq!(docs[0].path, overview());
        assert!(!docs[0].expanded);
        assert!(docs[2].open_action.is_none());
    }

    #[tokio::test]
    async fn expanding_a_document_attaches_includes() {
        let explorer = loaded(Arc::new(workspace())).await;
        let mut changes = explorer.subscribe();

        let children = explorer.expand(&overview()).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].label, "setup");
        assert_eq!(children[0].locator.as_path(), Some("modules/setup"));
        assert_eq!(children[0].open_action.as_ref().unwrap().target, "modules/setup");

        assert_eq!(changes.try_recv().unwrap(), TreeChange::Node(overview()));

        let node = explorer.node(&overview()).await.unwrap();
        assert!(node.expanded);

        let found = explorer.lookup("modules/setup").await.unwrap();
        assert_eq!(found.path, overview().child(0));

        // Second query is served from the tree.
        let again = explorer.children(&overview()).await.unwrap();
        assert_eq!(again, children);
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn read_failure_leaves_node_unexpanded() {
        let fs = Arc::new(workspace());
        let explorer = loaded(fs.clone()).await;
        let missing = NodePath::from_indices([0, 0, 1]);

        let err = explorer.children(&missing).await.unwrap_err();
        assert!(err.is_io(), "unexpected error: {err}");
        assert!(!explorer.node(&missing).await.unwrap().expanded);

        // Not cached: the next request reads again.
        assert!(explorer.children(&missing).await.is_err());
        assert_eq!(fs.read_count("/ws/intro/missing.adoc"), 2);
    }

    #[tokio::test]
    async fn invalid_locator_is_not_expandable() {
        let explorer = loaded(Arc::new(workspace())).await;
        let orphan = NodePath::from_indices([0, 0, 2]);
        let err = explorer.children(&orphan).await.unwrap_err();
        assert!(matches!(err, TopicMapsError::NotExpandable { .. }));

        let err = explorer.expand(&intro()).await.unwrap_err();
        assert!(matches!(err, TopicMapsError::NotExpandable { .. }));

        let err = explorer.children(&NodePath::from_indices([7])).await.unwrap_err();
        assert!(matches!(err, TopicMapsError::UnknownNode { .. }));
    }

    #[tokio::test]
    async fn concurrent_expansions_share_one_read() {
        // One permit for the outline read; document reads wait.
        let gate = Arc::new(Semaphore::new(1));
        let fs = Arc::new(workspace().gated(gate.clone()));
        let explorer = loaded(fs.clone()).await;
        let mut changes = explorer.subscribe();

        let doc = overview();
        let (first, second, ()) = tokio::join!(
            explorer.children(&doc),
            explorer.children(&doc),
            async {
                tokio::task::yield_now().await;
                gate.add_permits(1);
            }
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(fs.read_count("/ws/intro/overview.adoc"), 1);
        assert_eq!(changes.try_recv().unwrap(), TreeChange::Node(overview()));
        assert!(changes.try_recv().is_err(), "only one attach notifies");
    }

    #[tokio::test]
    async fn refresh_during_load_discards_result() {
        let gate = Arc::new(Semaphore::new(1));
        let fs = Arc::new(workspace().gated(gate.clone()));
        let explorer = loaded(fs.clone()).await;

        let doc = overview();
        let (result, ()) = tokio::join!(explorer.children(&doc), async {
            tokio::task::yield_now().await;
            explorer.refresh().await;
            gate.add_permits(10);
        });

        assert!(matches!(result, Err(TopicMapsError::Refreshed { .. })));
        assert!(explorer.lookup("modules/setup").await.is_none());
        assert!(explorer.node(&overview()).await.is_none());
    }

    #[tokio::test]
    async fn refresh_rebuilds_identical_tree() {
        let explorer = loaded(Arc::new(workspace())).await;
        explorer.expand(&overview()).await.unwrap();
        let all: HashSet<NodePath> = [NodePath::root(0), intro(), overview()].into();
        let before = explorer.visible(&all).await;

        let mut changes = explorer.subscribe();
        explorer.refresh().await;
        assert_eq!(changes.try_recv().unwrap(), TreeChange::All);
        assert!(explorer.visible(&all).await.is_empty());
        assert!(explorer.lookup("intro/overview.adoc").await.is_none());

        explorer.roots().await.unwrap();
        assert_eq!(changes.try_recv().unwrap(), TreeChange::All);
        explorer.children(&NodePath::root(0)).await.unwrap();
        explorer.expand(&overview()).await.unwrap();
        assert_eq!(explorer.visible(&all).await, before);
    }

    #[tokio::test]
    async fn index_covers_every_loaded_locator() {
        let fs = Arc::new(
            workspace().with_file(
                "/ws/intro/overview.adoc",
                "include::modules/setup.adoc[]\ninclude::modules/setup.adoc[]\n",
            ),
        );
        let explorer = loaded(fs).await;
        explorer.expand(&overview()).await.unwrap();

        let state = explorer.inner.state.lock().await;
        let roots = state.roots.as_deref().unwrap();
        let mut locators = HashSet::new();
        for (_, node) in preorder(roots, |_, _| true) {
            if let Some(locator) = node.locator().as_path() {
                locators.insert(locator.to_string());
                let path = state.index.get(locator).expect("indexed");
                let indexed = node_at(roots, path).expect("reachable");
                assert_eq!(indexed.locator().as_path(), Some(locator));
            }
        }
        assert_eq!(state.index.len(), locators.len());
        // Duplicate includes: the later node wins.
        assert_eq!(state.index.get("modules/setup"), Some(&overview().child(1)));
    }

    #[tokio::test]
    async fn invalidate_notifies_indexed_node() {
        let explorer = loaded(Arc::new(workspace())).await;
        let mut changes = explorer.subscribe();

        assert_eq!(
            explorer.invalidate("intro/overview.adoc").await,
            Some(overview())
        );
        assert_eq!(changes.try_recv().unwrap(), TreeChange::Node(overview()));
        assert!(explorer.invalidate("nowhere.adoc").await.is_none());
    }

    #[tokio::test]
    async fn malformed_outline_yields_empty_source() {
        let fs = Arc::new(
            MemoryFs::new().with_file("/ws/_topic_maps/_topic_map.yml", "Dir: [unterminated"),
        );
        let explorer = explorer(fs);
        explorer.roots().await.unwrap();
        let children = explorer.children(&NodePath::root(0)).await.unwrap();
        assert!(children.is_empty());
        assert!(explorer.node(&NodePath::root(0)).await.unwrap().expanded);
    }

    #[tokio::test]
    async fn visible_rows_follow_open_set() {
        let explorer = loaded(Arc::new(workspace())).await;

        let closed = explorer.visible(&HashSet::new()).await;
        assert_eq!(closed.len(), 1);

        let open: HashSet<NodePath> = [NodePath::root(0), intro()].into();
        let rows = explorer.visible(&open).await;
        let shape: Vec<_> = rows
            .iter()
            .map(|r| (r.depth, r.node.label.as_str()))
            .collect();
        assert_eq!(
            shape,
            [
                (0, "_topic_map.yml"),
                (1, "intro"),
                (2, "overview.adoc"),
                (2, "missing.adoc"),
                (2, "Orphan"),
            ]
        );
    }

    #[tokio::test]
    async fn resolve_joins_under_workspace_root() {
        let explorer = explorer(Arc::new(workspace()));
        assert_eq!(
            explorer.resolve("intro/overview.adoc"),
            PathBuf::from("/ws/intro/overview.adoc")
        );
        assert_eq!(explorer.topic_maps_dir(), PathBuf::from("/ws/_topic_maps"));
    }
}
