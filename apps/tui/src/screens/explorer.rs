//! Explorer screen: the topic map tree with a cursor.

use std::collections::HashSet;

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListState, Paragraph};
use topicmaps_core::{NodePath, VisibleRow};

use crate::widgets::node_line;

pub(crate) struct ExplorerScreen {
    title: String,
    rows: Vec<VisibleRow>,
    /// Nodes the user has opened; only these show their children.
    open: HashSet<NodePath>,
    selected: usize,
}

impl ExplorerScreen {
    pub(crate) fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
            open: HashSet::new(),
            selected: 0,
        }
    }

    pub(crate) fn open_set(&self) -> &HashSet<NodePath> {
        &self.open
    }

    pub(crate) fn selected_row(&self) -> Option<&VisibleRow> {
        self.rows.get(self.selected)
    }

    /// Replace the rows, keeping the cursor on the same node when it is
    /// still visible.
    pub(crate) fn set_rows(&mut self, rows: Vec<VisibleRow>) {
        let current = self.selected_row().map(|row| row.node.path.clone());
        self.rows = rows;
        if let Some(index) = current.and_then(|path| self.position(&path)) {
            self.selected = index;
        }
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    pub(crate) fn select_next(&mut self) {
        if self.selected + 1 < self.rows.len() {
            self.selected += 1;
        }
    }

    pub(crate) fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Move the cursor to the parent of the selected node.
    pub(crate) fn select_parent(&mut self) {
        let parent = self.selected_row().and_then(|row| row.node.path.parent());
        if let Some(index) = parent.and_then(|path| self.position(&path)) {
            self.selected = index;
        }
    }

    /// Mark `path` open. Returns false if it already was.
    pub(crate) fn open(&mut self, path: NodePath) -> bool {
        self.open.insert(path)
    }

    /// Close `path` and everything below it.
    pub(crate) fn close(&mut self, path: &NodePath) -> bool {
        let was_open = self.open.remove(path);
        let prefix = path.indices();
        self.open.retain(|p| !p.indices().starts_with(prefix));
        was_open
    }

    /// Close every node; rows are kept until the next sync.
    pub(crate) fn collapse_all(&mut self) {
        self.open.clear();
    }

    pub(crate) fn reset(&mut self) {
        self.open.clear();
        self.rows.clear();
        self.selected = 0;
    }

    fn position(&self, path: &NodePath) -> Option<usize> {
        self.rows.iter().position(|row| &row.node.path == path)
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.title));

        if self.rows.is_empty() {
            let empty = Paragraph::new("No topic map sources found.\n\nPress 'r' to refresh.")
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(empty, area);
            return;
        }

        let items: Vec<_> = self.rows.iter().map(|row| node_line(row, &self.open)).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .highlight_symbol("▸");

        let mut state = ListState::default().with_selected(Some(self.selected));
        f.render_stateful_widget(list, area, &mut state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicmaps_core::{CollapsibleState, NodeKind, NodeView};
    use topicmaps_shared::ResourceLocator;

    fn row(indices: &[usize], label: &str) -> VisibleRow {
        let path = NodePath::from_indices(indices.to_vec());
        VisibleRow {
            depth: path.depth(),
            node: NodeView {
                path,
                kind: NodeKind::Document,
                label: label.into(),
                state: CollapsibleState::Collapsed,
                locator: ResourceLocator::Invalid,
                open_action: None,
                expanded: false,
            },
        }
    }

    fn screen() -> ExplorerScreen {
        let mut screen = ExplorerScreen::new("ws");
        screen.set_rows(vec![row(&[0], "a"), row(&[0, 0], "b"), row(&[1], "c")]);
        screen
    }

    #[test]
    fn cursor_follows_node_across_row_updates() {
        let mut screen = screen();
        screen.select_next();
        screen.select_next();
        assert_eq!(screen.selected_row().unwrap().node.label, "c");

        // "b" disappears; "c" keeps the cursor.
        screen.set_rows(vec![row(&[0], "a"), row(&[1], "c")]);
        assert_eq!(screen.selected_row().unwrap().node.label, "c");

        screen.set_rows(vec![row(&[0], "a")]);
        assert_eq!(screen.selected_row().unwrap().node.label, "a");
    }

    #[test]
    fn navigation_stays_in_bounds() {
        let mut screen = screen();
        screen.select_prev();
        assert_eq!(screen.selected_row().unwrap().node.label, "a");
        for _ in 0..10 {
            screen.select_next();
        }
        assert_eq!(screen.selected_row().unwrap().node.label, "c");
    }

    #[test]
    fn select_parent_moves_up_one_level() {
        let mut screen = screen();
        screen.select_next();
        screen.select_parent();
        assert_eq!(screen.selected_row().unwrap().node.label, "a");
    }

    #[test]
    fn closing_drops_open_descendants() {
        let mut screen = screen();
        assert!(screen.open(NodePath::root(0)));
        assert!(!screen.open(NodePath::root(0)));
        screen.open(NodePath::from_indices([0, 0]));
        screen.open(NodePath::root(1));

        assert!(screen.close(&NodePath::root(0)));
        assert_eq!(screen.open_set().len(), 1);
        assert!(screen.open_set().contains(&NodePath::root(1)));
    }

    #[test]
    fn collapse_all_keeps_rows() {
        let mut screen = screen();
        screen.open(NodePath::root(0));
        screen.open(NodePath::from_indices([0, 0]));
        screen.select_next();

        screen.collapse_all();
        assert!(screen.open_set().is_empty());
        assert_eq!(screen.selected_row().unwrap().node.label, "b");
    }
}
