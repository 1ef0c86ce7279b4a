//! UI Components
//!
//! Each component encapsulates its own view state, event handling, and
//! rendering. Components communicate through Actions rather than by touching
//! the grid directly.

pub mod column_dialog;
pub mod export_dialog;
pub mod filter_dialog;
pub mod grid_view;
pub mod help_dialog;
pub mod layout;
pub mod quit_dialog;
pub mod record_dialog;

pub use column_dialog::ColumnDialog;
pub use export_dialog::ExportDialog;
pub use filter_dialog::FilterDialog;
pub use grid_view::{draw_grid_screen, GridRenderContext, GridView};
pub use help_dialog::HelpDialog;
pub use layout::{calculate_main_layout, centered_popup};
pub use quit_dialog::QuitDialog;
pub use record_dialog::RecordDialog;
