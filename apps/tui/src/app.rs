//! Core TUI application state and event loop.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::Child;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::eyre::{Result, eyre};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use topicmaps_core::{CollapsibleState, Explorer, NodePath, TreeChange};
use topicmaps_discovery::{LocalFs, locate_workspace_root};
use topicmaps_shared::{AppConfig, config_dir, load_config};
use tracing::{debug, info, warn};

use crate::screens::ExplorerScreen;
use crate::widgets::status_bar;

/// Outcome of a background load.
enum LoadEvent {
    Loaded { label: String, children: usize },
    Failed { path: NodePath, message: String },
}

/// Application state.
pub(crate) struct App {
    runtime: Runtime,
    explorer: Explorer,
    open_command: Option<String>,
    screen: ExplorerScreen,
    changes: broadcast::Receiver<TreeChange>,
    loads_tx: mpsc::UnboundedSender<LoadEvent>,
    loads_rx: mpsc::UnboundedReceiver<LoadEvent>,
    /// Processes started by `open_command`, reaped as they exit.
    opened: Vec<Child>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
}

impl App {
    fn new(runtime: Runtime, explorer: Explorer, config: &AppConfig) -> Self {
        let (loads_tx, loads_rx) = mpsc::unbounded_channel();
        let changes = explorer.subscribe();
        let title = format!("Topic Maps: {}", explorer.workspace_root().display());

        Self {
            runtime,
            explorer,
            open_command: config.explorer.open_command.clone(),
            screen: ExplorerScreen::new(title),
            changes,
            loads_tx,
            loads_rx,
            opened: Vec::new(),
            should_quit: false,
            status: "Ready, press ? for help".to_string(),
            show_help: false,
        }
    }

    /// List the roots (after startup or a refresh).
    fn load_roots(&mut self) {
        match self.runtime.block_on(self.explorer.roots()) {
            Ok(roots) => self.status = format!("{} topic map source(s)", roots.len()),
            Err(e) => self.status = format!("Failed to list topic maps: {e}"),
        }
        self.sync_rows();
    }

    fn sync_rows(&mut self) {
        let rows = self
            .runtime
            .block_on(self.explorer.visible(self.screen.open_set()));
        self.screen.set_rows(rows);
    }

    /// Drain change notifications and load results. Returns true if the
    /// tree needs redrawing.
    fn pump(&mut self) -> bool {
        reap(&mut self.opened);

        let mut dirty = false;
        loop {
            match self.changes.try_recv() {
                Ok(change) => {
                    debug!(?change, "tree changed");
                    dirty = true;
                }
                Err(TryRecvError::Lagged(_)) => dirty = true,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        while let Ok(event) = self.loads_rx.try_recv() {
            match event {
                LoadEvent::Loaded { label, children } => {
                    self.status = format!("{label}: {children} child node(s)");
                }
                LoadEvent::Failed { path, message } => {
                    self.screen.close(&path);
                    self.status = message;
                    dirty = true;
                }
            }
        }
        dirty
    }

    /// Open the selected node, loading its children in the background.
    fn expand_selected(&mut self) {
        let Some(row) = self.screen.selected_row() else {
            return;
        };
        if row.node.state == CollapsibleState::None {
            return;
        }
        let path = row.node.path.clone();
        let label = row.node.label.clone();
        let loaded = row.node.expanded;

        self.screen.open(path.clone());
        if loaded {
            self.sync_rows();
            return;
        }

        self.status = format!("Loading {label}...");
        let explorer = self.explorer.clone();
        let tx = self.loads_tx.clone();
        self.runtime.spawn(async move {
            let event = match explorer.children(&path).await {
                Ok(children) => LoadEvent::Loaded {
                    label,
                    children: children.len(),
                },
                Err(e) => LoadEvent::Failed {
                    path,
                    message: format!("{label}: {e}"),
                },
            };
            // Receiver gone means the app is shutting down.
            let _ = tx.send(event);
        });
    }

    fn collapse_selected(&mut self) {
        let Some(path) = self.screen.selected_row().map(|row| row.node.path.clone()) else {
            return;
        };
        if self.screen.close(&path) {
            self.sync_rows();
        } else {
            self.screen.select_parent();
        }
    }

    fn open_selected(&mut self) {
        let Some(action) = self
            .screen
            .selected_row()
            .and_then(|row| row.node.open_action.clone())
        else {
            self.status = "Nothing to open".to_string();
            return;
        };
        let file = self.explorer.resolve(&action.target);

        let Some(command) = &self.open_command else {
            self.status = format!("{}: {}", action.title, file.display());
            return;
        };
        match std::process::Command::new(command).arg(&file).spawn() {
            Ok(child) => {
                info!(command, file = %file.display(), "opened file");
                self.status = format!("Opened {}", file.display());
                self.opened.push(child);
            }
            Err(e) => {
                warn!(command, error = %e, "open command failed");
                self.status = format!("{command}: {e}");
            }
        }
    }

    fn collapse_all(&mut self) {
        self.screen.collapse_all();
        self.sync_rows();
        self.status = "Collapsed all".to_string();
    }

    fn refresh(&mut self) {
        self.runtime.block_on(self.explorer.refresh());
        self.screen.reset();
        self.load_roots();
    }
}

/// Drop handles of exited child processes.
fn reap(children: &mut Vec<Child>) {
    children.retain_mut(|child| match child.try_wait() {
        Ok(None) => true,
        Ok(Some(status)) => {
            debug!(pid = child.id(), %status, "open command exited");
            false
        }
        Err(e) => {
            warn!(pid = child.id(), error = %e, "cannot wait for open command");
            false
        }
    });
}

/// Log to `~/.topicmaps/tui.log`; the terminal belongs to the UI.
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let Ok(dir) = config_dir() else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = File::create(dir.join("tui.log")) else {
        return;
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("topicmaps=info"));
    fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

/// Entry point: locates the workspace, sets up the terminal, runs the
/// event loop, restores the terminal.
pub(crate) fn run() -> Result<()> {
    init_tracing();
    let config = load_config()?;
    let runtime = Runtime::new()?;

    let mut folders: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if folders.is_empty() {
        folders.push(std::env::current_dir()?);
    }

    let fs = Arc::new(LocalFs);
    let root = runtime.block_on(locate_workspace_root(&*fs, &folders, &config.layout));
    let Some(root) = root else {
        println!("{}", config.layout.missing_dir_message());
        return Ok(());
    };

    let explorer = Explorer::from_config(fs, root, &config)
        .map_err(|e| eyre!("cannot open workspace: {e}"))?;
    let mut app = App::new(runtime, explorer, &config);
    app.load_roots();

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        if app.pump() {
            app.sync_rows();
        }
        terminal.draw(|f| draw(f, app))?;

        // Poll for events with 100ms timeout for responsive UI
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                handle_key(app, key.code, key.modifiers);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // Global keybindings (always active)
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('?') => {
            app.show_help = !app.show_help;
            return;
        }
        _ => {}
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return;
    }

    match code {
        KeyCode::Down | KeyCode::Char('j') => app.screen.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.screen.select_prev(),
        KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => app.expand_selected(),
        KeyCode::Left | KeyCode::Char('h') => app.collapse_selected(),
        KeyCode::Char('o') => app.open_selected(),
        KeyCode::Char('c') => app.collapse_all(),
        KeyCode::Char('r') => app.refresh(),
        _ => {}
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Tree
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    app.screen.draw(f, chunks[0]);

    let bar = status_bar(&app.status);
    f.render_widget(bar, chunks[1]);

    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  j/k ↑/↓      Move"),
        Line::from("  Enter/→      Expand (loads includes)"),
        Line::from("  ←            Collapse / go to parent"),
        Line::from("  c            Collapse all"),
        Line::from("  o            Open file"),
        Line::from("  r            Refresh tree"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help: press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn exited_open_commands_are_reaped() {
        let mut opened = vec![std::process::Command::new("true").spawn().unwrap()];

        for _ in 0..200 {
            reap(&mut opened);
            if opened.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(opened.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn running_open_commands_are_kept() {
        let mut opened = vec![std::process::Command::new("sleep").arg("5").spawn().unwrap()];
        reap(&mut opened);
        assert_eq!(opened.len(), 1);

        opened[0].kill().unwrap();
        opened[0].wait().unwrap();
    }
}
