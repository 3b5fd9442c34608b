use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Key hint shown in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  /// Lower sorts first
  pub priority: u8,
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Navigation a view asks the app for after a key
pub enum ViewAction {
  None,
  /// Open a view on top (detail, form dialog)
  Push(Box<dyn View>),
  /// Go back one level
  Pop,
}

/// One screen on the app's view stack.
///
/// A view owns its controllers and the components it overlays (search,
/// confirmations); the app only routes keys, ticks and navigation. Work a
/// view started (loads, saves, deletes) is picked up in `tick`, never by
/// blocking in `handle_key`.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Short state summary for the header (resource, page, record id)
  fn context(&self) -> Option<String> {
    None
  }

  fn tick(&mut self) {}

  /// While true the `:` prompt stays closed and every key goes to the view
  fn captures_input(&self) -> bool {
    false
  }

  /// Checked after each tick; a view returning true is popped
  fn wants_close(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "go to").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
