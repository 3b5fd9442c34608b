use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Search text changed (emitted on each keystroke, empty string on
  /// cancel). Parents debounce before querying.
  Changed(String),
  /// Enter: the box closes, the search stays applied
  Submitted,
}

/// Search box toggled with `/`. Reopening it continues editing the
/// current search instead of starting over.
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Open the box with the cursor after the current text.
  pub fn activate(&mut self) {
    self.active = true;
    let current = self.input.value().to_string();
    self.input.set_value(&current);
  }

  /// Feed every key here: while closed only `/` is taken.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => KeyResult::Event(SearchEvent::Changed(self.query().to_string())),
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 3 / 5).clamp(30, 60).min(area.width);
    let overlay = Rect::new(area.x + 1, area.y + 1, width, 3).intersection(area);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    if inner.height == 0 {
      return;
    }

    let value = self.query();
    let split = value
      .char_indices()
      .nth(self.input.cursor_position())
      .map(|(i, _)| i)
      .unwrap_or(value.len());
    let line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(&value[..split]),
      Span::styled("_", Style::default().fg(Color::Yellow)),
      Span::raw(&value[split..]),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_slash_activates_and_keystrokes_emit_changes() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('j'))), KeyResult::NotHandled);

    assert_eq!(search.handle_key(key(KeyCode::Char('/'))), KeyResult::Handled);
    assert!(search.is_active());
    assert_eq!(
      search.handle_key(key(KeyCode::Char('j'))),
      KeyResult::Event(SearchEvent::Changed("j".into()))
    );
    assert_eq!(
      search.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(SearchEvent::Submitted)
    );
    assert!(!search.is_active());
    assert_eq!(search.query(), "j");
  }

  #[test]
  fn test_reopening_continues_current_search() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    search.handle_key(key(KeyCode::Char('j')));
    search.handle_key(key(KeyCode::Enter));

    search.handle_key(key(KeyCode::Char('/')));
    assert_eq!(
      search.handle_key(key(KeyCode::Char('o'))),
      KeyResult::Event(SearchEvent::Changed("jo".into()))
    );
  }

  #[test]
  fn test_escape_clears_search() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    search.handle_key(key(KeyCode::Char('x')));
    assert_eq!(
      search.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(SearchEvent::Changed(String::new()))
    );
    assert_eq!(search.query(), "");
  }
}
