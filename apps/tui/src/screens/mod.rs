//! TUI screen definitions.

mod explorer;

pub(crate) use explorer::ExplorerScreen;
