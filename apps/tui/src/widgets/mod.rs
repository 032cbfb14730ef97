//! Reusable TUI widgets.

use std::collections::HashSet;

use ratatui::prelude::*;
use ratatui::widgets::{ListItem, Paragraph};
use topicmaps_core::{CollapsibleState, NodeKind, NodePath, VisibleRow};

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str) -> Paragraph<'_> {
    Paragraph::new(format!(" {msg}")).style(Style::default().bg(Color::DarkGray).fg(Color::White))
}

/// One tree row: indent, expand marker, label, and the dimmed locator.
pub(crate) fn node_line<'a>(row: &'a VisibleRow, open: &HashSet<NodePath>) -> ListItem<'a> {
    let node = &row.node;
    let marker = match node.state {
        CollapsibleState::None => "  ",
        CollapsibleState::Collapsed if open.contains(&node.path) => "▾ ",
        CollapsibleState::Collapsed => "▸ ",
    };
    let label_style = match node.kind {
        NodeKind::Source => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        NodeKind::Group => Style::default().fg(Color::Blue),
        NodeKind::Document if node.locator.is_concrete() => Style::default(),
        NodeKind::Document => Style::default().fg(Color::Red),
    };

    let mut spans = vec![
        Span::raw("  ".repeat(row.depth)),
        Span::raw(marker),
        Span::styled(node.label.as_str(), label_style),
    ];
    if let Some(locator) = node.locator.as_path() {
        spans.push(Span::styled(
            format!("  {locator}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    ListItem::new(Line::from(spans))
}
