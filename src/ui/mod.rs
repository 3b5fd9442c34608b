pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let breadcrumb = app.breadcrumb();
  let title = app.title().to_string();
  let status = app.status().map(str::to_string);

  if let Some(view) = app.current_view_mut() {
    let context = view.context();
    renderfns::draw_header(frame, chunks[0], &title, context.as_deref(), &view.shortcuts());
    view.render(frame, chunks[1]);
  } else {
    renderfns::draw_header(frame, chunks[0], &title, None, &[]);
  }

  renderfns::draw_footer(frame, chunks[2], &breadcrumb, status.as_deref());

  // Command overlay draws over everything in the content area
  app.command_input().render_overlay(frame, chunks[1]);
}

/// Keep a list's highlighted row inside `len` rows.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}
