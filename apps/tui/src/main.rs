//! topicmaps TUI: interactive topic map explorer.
//!
//! Shows the workspace's topic map tree, expands documents on demand by
//! following their module includes, and opens the backing files. Built
//! with `ratatui` + `crossterm`.

mod app;
mod screens;
mod widgets;

use color_eyre::eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    app::run()
}
