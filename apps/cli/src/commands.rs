//! CLI command definitions, routing, and tracing setup.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use topicmaps_asciidoc::IncludeScanner;
use topicmaps_core::{
    CollapsibleState, Explorer, NodeKind, NodePath, NodeView, VisibleRow, build_includes,
};
use topicmaps_discovery::{LocalFs, locate_workspace_root};
use topicmaps_shared::{AppConfig, init_config, load_config, load_config_from};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// topicmaps: explore documentation topic maps.
#[derive(Parser)]
#[command(
    name = "topicmaps",
    version,
    about = "Explore the topic maps and module includes of an AsciiDoc documentation workspace.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Workspace folder to search for the topic map directory (repeatable).
    /// Defaults to the current directory.
    #[arg(short, long, global = true)]
    pub workspace: Vec<PathBuf>,

    /// Config file to use instead of ~/.topicmaps/topicmaps.toml.
    #[arg(long, global = true, env = "TOPICMAPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Tree output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the topic map tree.
    Tree {
        /// Stop expanding below this depth (roots are depth 0).
        #[arg(short, long)]
        depth: Option<usize>,

        /// Also expand documents by following their module includes.
        #[arg(long)]
        documents: bool,

        /// Output format.
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List the module includes of one document.
    Includes {
        /// AsciiDoc file to scan.
        file: PathBuf,
    },

    /// Find the node for a resource locator and print its position.
    Locate {
        /// Workspace-relative locator, e.g. `intro/overview.adoc`.
        locator: String,

        /// Also expand documents while searching.
        #[arg(long)]
        documents: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "topicmaps=info",
        1 => "topicmaps=debug",
        _ => "topicmaps=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr; stdout carries the tree output.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let Cli {
        workspace,
        config,
        command,
        ..
    } = cli;

    match command {
        Command::Tree {
            depth,
            documents,
            format,
        } => {
            let config = resolve_config(config.as_deref())?;
            let opts = WalkOptions { depth, documents };
            cmd_tree(&config, &workspace, &opts, format).await
        }
        Command::Includes { file } => {
            let config = resolve_config(config.as_deref())?;
            cmd_includes(&config, &file).await
        }
        Command::Locate { locator, documents } => {
            let config = resolve_config(config.as_deref())?;
            let opts = WalkOptions {
                depth: None,
                documents,
            };
            cmd_locate(&config, &workspace, &locator, &opts).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Build an explorer for the first workspace folder holding a topic map
/// directory. Prints the missing-directory message and returns `None` when
/// there is none.
async fn open_explorer(config: &AppConfig, workspace: &[PathBuf]) -> Result<Option<Explorer>> {
    let folders = if workspace.is_empty() {
        let cwd = std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
        vec![cwd]
    } else {
        workspace.to_vec()
    };

    let fs = Arc::new(LocalFs);
    let Some(root) = locate_workspace_root(&*fs, &folders, &config.layout).await else {
        println!("{}", config.layout.missing_dir_message());
        return Ok(None);
    };

    info!(root = %root.display(), "opening workspace");
    Ok(Some(Explorer::from_config(fs, root, config)?))
}

// ---------------------------------------------------------------------------
// Tree walking
// ---------------------------------------------------------------------------

/// How far a walk expands the tree.
#[derive(Debug, Clone, Default)]
struct WalkOptions {
    depth: Option<usize>,
    documents: bool,
}

/// Expand the tree breadth-first. Returns the set of expanded nodes.
///
/// Nodes that fail to load are logged and left collapsed.
async fn walk(
    explorer: &Explorer,
    opts: &WalkOptions,
    spinner: &ProgressBar,
) -> Result<HashSet<NodePath>> {
    let mut open = HashSet::new();
    let mut locators: HashMap<NodePath, String> = HashMap::new();
    let mut queue: VecDeque<NodeView> = explorer.roots().await?.into();

    while let Some(view) = queue.pop_front() {
        if let Some(locator) = view.locator.as_path() {
            locators.insert(view.path.clone(), locator.to_string());
        }
        if !should_descend(&view, opts, &locators) {
            continue;
        }

        spinner.set_message(format!("Loading {}", view.label));
        match explorer.children(&view.path).await {
            Ok(children) => {
                open.insert(view.path.clone());
                queue.extend(children);
            }
            Err(e) => warn!(node = %view.label, error = %e, "skipping node"),
        }
    }

    Ok(open)
}

fn should_descend(
    view: &NodeView,
    opts: &WalkOptions,
    locators: &HashMap<NodePath, String>,
) -> bool {
    if opts.depth.is_some_and(|max| view.path.depth() >= max) {
        return false;
    }
    match view.kind {
        NodeKind::Source | NodeKind::Group => true,
        NodeKind::Document => {
            opts.documents && view.locator.is_concrete() && !includes_itself(view, locators)
        }
    }
}

/// Whether an ancestor of `view` is backed by the same resource.
fn includes_itself(view: &NodeView, locators: &HashMap<NodePath, String>) -> bool {
    let Some(locator) = view.locator.as_path() else {
        return false;
    };
    let mut parent = view.path.parent();
    while let Some(path) = parent {
        if locators.get(&path).is_some_and(|l| l == locator) {
            return true;
        }
        parent = path.parent();
    }
    false
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_text(rows: &[VisibleRow], open: &HashSet<NodePath>) -> String {
    let mut out = String::new();
    for row in rows {
        let node = &row.node;
        let marker = match node.state {
            CollapsibleState::None => "  ",
            CollapsibleState::Collapsed if open.contains(&node.path) => "▾ ",
            CollapsibleState::Collapsed => "▸ ",
        };
        out.push_str(&"  ".repeat(row.depth));
        out.push_str(marker);
        out.push_str(&node.label);
        if let Some(locator) = node.locator.as_path() {
            out.push_str("  (");
            out.push_str(locator);
            out.push(')');
        }
        out.push('\n');
    }
    out
}

/// Nest preorder rows back into a JSON tree.
fn nest(rows: &[VisibleRow], depth: usize, pos: &mut usize) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    while let Some(row) = rows.get(*pos) {
        if row.depth < depth {
            break;
        }
        *pos += 1;
        let mut value = serde_json::to_value(&row.node)?;
        let children = nest(rows, depth + 1, pos)?;
        if let Value::Object(map) = &mut value {
            map.insert("children".into(), Value::Array(children));
        }
        out.push(value);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_tree(
    config: &AppConfig,
    workspace: &[PathBuf],
    opts: &WalkOptions,
    format: OutputFormat,
) -> Result<()> {
    let Some(explorer) = open_explorer(config, workspace).await? else {
        return Ok(());
    };

    let spinner = spinner();
    let open = walk(&explorer, opts, &spinner).await;
    spinner.finish_and_clear();
    let open = open?;

    let rows = explorer.visible(&open).await;
    match format {
        OutputFormat::Text => print!("{}", render_text(&rows, &open)),
        OutputFormat::Json => {
            let tree = nest(&rows, 0, &mut 0)?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
    }
    Ok(())
}

async fn cmd_includes(config: &AppConfig, file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;

    let scanner = IncludeScanner::from_layout(&config.layout)?;
    let names = scanner.scan(&text);
    info!(file = %file.display(), includes = names.len(), "scanned document");

    for node in build_includes(&names, &config.layout).nodes {
        println!("{}\t{}", node.label(), node.locator());
    }
    Ok(())
}

async fn cmd_locate(
    config: &AppConfig,
    workspace: &[PathBuf],
    locator: &str,
    opts: &WalkOptions,
) -> Result<()> {
    let Some(explorer) = open_explorer(config, workspace).await? else {
        return Ok(());
    };

    let spinner = spinner();
    let walked = walk(&explorer, opts, &spinner).await;
    spinner.finish_and_clear();
    walked?;

    let node = explorer
        .lookup(locator)
        .await
        .ok_or_else(|| eyre!("no node found for '{locator}'"))?;

    let mut labels = vec![node.label.clone()];
    let mut parent = node.path.parent();
    while let Some(path) = parent {
        if let Some(ancestor) = explorer.node(&path).await {
            labels.push(ancestor.label);
        }
        parent = path.parent();
    }
    labels.reverse();

    println!("{}", labels.join(" > "));
    println!("  path:     {}", node.path);
    println!("  resource: {}", explorer.resolve(locator).display());
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicmaps_shared::ResourceLocator;

    fn view(path: NodePath, kind: NodeKind, label: &str, locator: ResourceLocator) -> NodeView {
        NodeView {
            path,
            kind,
            label: label.into(),
            state: CollapsibleState::Collapsed,
            locator,
            open_action: None,
            expanded: false,
        }
    }

    fn source(index: usize, label: &str) -> NodeView {
        view(NodePath::root(index), NodeKind::Source, label, ResourceLocator::Invalid)
    }

    #[test]
    fn self_including_document_is_not_descended() {
        let opts = WalkOptions {
            depth: None,
            documents: true,
        };
        let mut locators = HashMap::new();
        locators.insert(NodePath::from_indices([0, 0]), "modules/a".to_string());

        let repeat = view(
            NodePath::from_indices([0, 0, 1]),
            NodeKind::Document,
            "a",
            ResourceLocator::from("modules/a"),
        );
        assert!(!should_descend(&repeat, &opts, &locators));

        let fresh = view(
            NodePath::from_indices([0, 0, 2]),
            NodeKind::Document,
            "b",
            ResourceLocator::from("modules/b"),
        );
        assert!(should_descend(&fresh, &opts, &locators));
    }

    #[test]
    fn depth_and_document_flags_limit_descent() {
        let locators = HashMap::new();
        let doc = view(
            NodePath::from_indices([0, 1]),
            NodeKind::Document,
            "overview.adoc",
            ResourceLocator::from("intro/overview.adoc"),
        );
        assert!(!should_descend(&doc, &WalkOptions::default(), &locators));

        let shallow = WalkOptions {
            depth: Some(1),
            documents: true,
        };
        assert!(!should_descend(&doc, &shallow, &locators));

        let root = source(0, "_topic_map.yml");
        assert!(should_descend(&root, &shallow, &locators));
    }

    #[test]
    fn rows_nest_into_json_tree() {
        let rows = vec![
            VisibleRow {
                depth: 0,
                node: source(0, "_topic_map.yml"),
            },
            VisibleRow {
                depth: 1,
                node: view(
                    NodePath::from_indices([0, 0]),
                    NodeKind::Group,
                    "intro",
                    ResourceLocator::from("intro"),
                ),
            },
            VisibleRow {
                depth: 0,
                node: source(1, "_topic_map_b.yml"),
            },
        ];

        let tree = nest(&rows, 0, &mut 0).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0]["label"], "_topic_map.yml");
        assert_eq!(tree[0]["children"][0]["label"], "intro");
        assert_eq!(tree[0]["children"][0]["path"], serde_json::json!([0, 0]));
        assert!(tree[1]["children"].as_array().unwrap().is_empty());
    }

    #[test]
    fn text_rendering_marks_open_nodes() {
        let rows = vec![
            VisibleRow {
                depth: 0,
                node: source(0, "_topic_map.yml"),
            },
            VisibleRow {
                depth: 1,
                node: view(
                    NodePath::from_indices([0, 0]),
                    NodeKind::Document,
                    "overview.adoc",
                    ResourceLocator::from("intro/overview.adoc"),
                ),
            },
        ];
        let open: HashSet<NodePath> = [NodePath::root(0)].into();
        let text = render_text(&rows, &open);
        assert_eq!(text, "▾ _topic_map.yml\n  ▸ overview.adoc  (intro/overview.adoc)\n");
    }
}
