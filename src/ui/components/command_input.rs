use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::commands::{self, Command};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// Enter: the resolved command name
  Submitted(String),
  /// Esc
  Cancelled,
}

/// `:` prompt for switching between resource views, with autocomplete
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
  input: TextInput,
  active: bool,
  selected_suggestion: usize,
}

const MAX_SUGGESTIONS: usize = 8;

impl CommandInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.input.value())
  }

  fn open(&mut self) {
    self.active = true;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  fn close(&mut self) {
    self.active = false;
    self.input.clear();
    self.selected_suggestion = 0;
  }

  /// Move the highlighted suggestion, wrapping at either end.
  fn step(&mut self, forward: bool) {
    let count = self.suggestions().len();
    if count == 0 {
      return;
    }
    self.selected_suggestion = if forward {
      (self.selected_suggestion + 1) % count
    } else {
      (self.selected_suggestion + count - 1) % count
    };
  }

  /// Feed every key here: while closed only `:` is taken (to open the
  /// prompt), everything else falls through to the view.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if !self.active {
      if key.code == KeyCode::Char(':') {
        self.open();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc => {
        self.close();
        KeyResult::Event(CommandEvent::Cancelled)
      }
      KeyCode::Enter => {
        let command = self.resolve_command();
        self.close();
        KeyResult::Event(CommandEvent::Submitted(command))
      }
      KeyCode::Tab | KeyCode::Down => {
        self.step(true);
        KeyResult::Handled
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.step(false);
        KeyResult::Handled
      }
      _ => match self.input.handle_key(key) {
        InputResult::Consumed => {
          // Suggestions changed under the cursor
          self.selected_suggestion = 0;
          KeyResult::Handled
        }
        InputResult::Submitted(_) | InputResult::Cancelled => KeyResult::Handled,
        InputResult::NotHandled => KeyResult::NotHandled,
      },
    }
  }

  /// The highlighted suggestion, or the raw text when nothing matches
  /// (so the app can report it as unknown).
  fn resolve_command(&self) -> String {
    match self.suggestions().get(self.selected_suggestion) {
      Some(command) => command.name.to_string(),
      None => self.input.value().trim().to_lowercase(),
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let suggestions = self.suggestions();
    let shown = suggestions.len().min(MAX_SUGGESTIONS) as u16;
    let width = (area.width * 3 / 5).clamp(30, 60).min(area.width);
    let height = (3 + shown).min(area.height);
    let overlay = Rect::new(area.x + 1, area.y + 1, width, height).intersection(area);

    frame.render_widget(Clear, overlay);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Go to ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    if inner.height == 0 {
      return;
    }

    let prompt = Line::from(vec![
      Span::styled(":", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(
      Paragraph::new(prompt),
      Rect {
        height: 1,
        ..inner
      },
    );

    let list_area = Rect {
      y: inner.y + 1,
      height: inner.height.saturating_sub(1),
      ..inner
    };
    if suggestions.is_empty() || list_area.height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(MAX_SUGGESTIONS)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(
            format!("{:<14}", cmd.aliases.join(",")),
            Style::default().fg(Color::Blue),
          ),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();
    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(self.selected_suggestion));
    frame.render_stateful_widget(list, list_area, &mut state);
  }
}
