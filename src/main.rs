//! datagrid - browse a JSON or CSV file as a sortable, filterable grid
//!
//! The binary is a ratatui front end over the `datagrid` library. It uses the
//! same Component Architecture as the rest of the UI: events become Actions,
//! and the App applies them to the grid.

mod action;
mod app;
mod cli;
mod component;
mod components;
mod logging;
mod modal;
mod tui;

use crate::action::Action;
use crate::app::App;
use crate::cli::Cli;
use crate::component::Component;
use crate::tui::Tui;
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::Event;
use datagrid::GridConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let state_dir = if cli.no_state {
        None
    } else {
        cli.state_dir.clone().or_else(GridConfig::state_dir)
    };
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| logging::default_log_path(state_dir.as_deref()));
    logging::init(&log_path)?;

    let config = load_config(&cli)?;
    tracing::info!(grid = %config.id, data = %cli.data.display(), "starting");

    let mut app = App::new(
        config,
        state_dir,
        cli.data.clone(),
        cli.export_dir.clone(),
        cli.load_timeout(),
    )?;

    // Setup terminal
    let mut tui = Tui::new()?.with_tick_rate(cli.tick_rate());
    tui.enter()?;

    app.init()?;
    let result = run_app(&mut tui, &mut app);

    // Cleanup terminal
    tui.exit()?;

    if let Err(err) = result {
        tracing::error!(error = %err, "exiting after error");
        eprintln!("Error: {:?}", err);
        std::process::exit(1);
    }

    Ok(())
}

/// Grid configuration from `--config`, else an empty one whose columns are
/// inferred from the data
fn load_config(cli: &Cli) -> Result<GridConfig> {
    let mut config = match &cli.config {
        Some(path) => GridConfig::load(path)
            .with_context(|| format!("Failed to read grid config {}", path.display()))?,
        None => GridConfig::new(cli.resolved_grid_id(), Vec::new()),
    };
    if let Some(id) = &cli.grid_id {
        config.id = id.clone();
    }
    Ok(config)
}

/// Run the main application loop
fn run_app(tui: &mut Tui, app: &mut App) -> Result<()> {
    while !app.should_quit {
        tui.draw(|frame| {
            if let Err(e) = app.draw(frame, frame.area()) {
                tracing::error!(error = %e, "draw failed");
            }
        })?;

        if let Some(event) = tui.next_event()? {
            let action = match event {
                Event::Key(key) => app.handle_key_event(key)?,
                Event::Mouse(mouse) => app.handle_mouse_event(mouse)?,
                Event::Resize(w, h) => Some(Action::Resize(w, h)),
                _ => None,
            };

            // Action might produce a follow-up action
            let mut current_action = action;
            while let Some(a) = current_action {
                current_action = app.update(a)?;
            }
        } else {
            // No event - send a tick so background loads are picked up
            app.update(Action::Tick)?;
        }
    }

    Ok(())
}
