use super::rows::OnSaved;
use crate::api::types::Resource;
use crate::app::Services;
use crate::form::{FieldKind, FieldSpec, FormController, FormMode, FormModel, SubmitError};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

const LABEL_WIDTH: usize = 18;

/// Create/edit dialog for one record
pub struct FormView<F: FormModel> {
  form: FormController<F>,
  fields: Vec<FieldSpec>,
  focus: usize,
  input: TextInput,
  message: Option<String>,
}

impl<F: FormModel> FormView<F> {
  pub fn create(services: &Services, on_saved: OnSaved<F::Record>) -> Self {
    let form = FormController::new_create(services.cache.clone(), services.service::<F::Record>());
    Self::from_controller(form.with_on_success(on_saved))
  }

  pub fn edit(services: &Services, record: &F::Record, on_saved: OnSaved<F::Record>) -> Self {
    let form = FormController::new_edit(
      services.cache.clone(),
      services.service::<F::Record>(),
      record,
    );
    Self::from_controller(form.with_on_success(on_saved))
  }

  fn from_controller(form: FormController<F>) -> Self {
    let fields = form.fields();
    let mut view = Self {
      form,
      fields,
      focus: 0,
      input: TextInput::new(),
      message: None,
    };
    view.load_input();
    view
  }

  fn focused(&self) -> Option<&FieldSpec> {
    self.fields.get(self.focus)
  }

  /// Point the text input at the focused field's current value.
  fn load_input(&mut self) {
    let value = self
      .focused()
      .map(|f| self.form.value(f.name))
      .unwrap_or_default();
    self.input = TextInput::with_value(&value);
  }

  fn move_focus(&mut self, forward: bool) {
    if self.fields.is_empty() {
      return;
    }
    if let Some(name) = self.focused().map(|f| f.name) {
      self.form.check_field(name);
    }
    let len = self.fields.len();
    self.focus = if forward {
      (self.focus + 1) % len
    } else {
      (self.focus + len - 1) % len
    };
    self.load_input();
  }

  fn submit(&mut self) {
    match self.form.submit() {
      Ok(()) => self.message = Some("Saving...".to_string()),
      Err(SubmitError::Invalid(errors)) => {
        let first = errors.fields().next();
        if let Some(pos) = first.and_then(|name| self.fields.iter().position(|f| f.name == name)) {
          self.focus = pos;
          self.load_input();
        }
        self.message = Some(format!("{} field(s) need attention", errors.len()));
      }
      Err(err) => self.message = Some(err.to_string()),
    }
  }

  fn title(&self) -> String {
    let label = <F::Record as Resource>::LABEL;
    match self.form.mode() {
      FormMode::Create => format!(" New {} ", label),
      FormMode::Edit(id) => format!(" Edit {} {} ", label, id),
    }
  }

  fn field_line(&self, index: usize, field: &FieldSpec) -> Line<'static> {
    let focused = index == self.focus;
    let value = self.form.value(field.name);
    let shown = match field.kind {
      FieldKind::Secret => "*".repeat(value.chars().count()),
      FieldKind::Choice(_) if value.is_empty() => "(none)".to_string(),
      FieldKind::Choice(_) | FieldKind::Flag => format!("‹ {} ›", value),
      _ => value,
    };

    let marker = if field.required { "*" } else { " " };
    let label_style = if focused {
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::DarkGray)
    };
    let mut spans = vec![
      Span::styled(
        format!("{:>width$}{} ", field.label, marker, width = LABEL_WIDTH),
        label_style,
      ),
      Span::raw(shown),
    ];
    if focused && is_text(field.kind) {
      spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = self.form.error_for(field.name) {
      spans.push(Span::styled(
        format!("  {}", error),
        Style::default().fg(Color::Red),
      ));
    }
    Line::from(spans)
  }
}

fn is_text(kind: FieldKind) -> bool {
  matches!(
    kind,
    FieldKind::Text | FieldKind::Secret | FieldKind::Date | FieldKind::Number
  )
}

impl<F: FormModel> View for FormView<F> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => {
        if self.form.is_submitting() {
          self.message = Some("Still saving, please wait".to_string());
          return ViewAction::None;
        }
        return ViewAction::Pop;
      }
      KeyCode::Enter => {
        self.submit();
        return ViewAction::None;
      }
      KeyCode::Char('s') if ctrl => {
        self.submit();
        return ViewAction::None;
      }
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(true);
        return ViewAction::None;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(false);
        return ViewAction::None;
      }
      _ => {}
    }

    let Some(field) = self.focused().copied() else {
      return ViewAction::None;
    };
    if is_text(field.kind) {
      if self.form.is_submitting() {
        return ViewAction::None;
      }
      if let InputResult::Consumed = self.input.handle_key(key) {
        self.form.set_field(field.name, self.input.value());
      }
    } else if matches!(
      key.code,
      KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right
    ) {
      self.form.cycle_field(field.name);
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    frame.render_widget(Clear, area);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(1),    // Fields
        Constraint::Length(1), // Status
      ])
      .split(inner);

    let lines: Vec<Line> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| self.field_line(i, field))
      .collect();
    // Keep the focused field on screen
    let visible = chunks[0].height as usize;
    let scroll = self.focus.saturating_sub(visible.saturating_sub(1));
    frame.render_widget(Paragraph::new(lines).scroll((scroll as u16, 0)), chunks[0]);

    let (status, color) = if let Some(err) = self.form.submit_error() {
      (format!("Save failed: {}", err), Color::Red)
    } else if self.form.is_submitting() {
      ("Saving...".to_string(), Color::Yellow)
    } else if let Some(message) = &self.message {
      (message.clone(), Color::Yellow)
    } else {
      (
        "Enter to save, Esc to cancel, Space to change a choice".to_string(),
        Color::DarkGray,
      )
    };
    frame.render_widget(
      Paragraph::new(status).style(Style::default().fg(color)),
      chunks[1],
    );
  }

  fn breadcrumb_label(&self) -> String {
    self.title().trim().to_string()
  }

  fn tick(&mut self) {
    if self.form.poll() {
      self.message = None;
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn wants_close(&self) -> bool {
    !self.form.is_open()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("enter", "save").with_priority(10),
      ShortcutInfo::new("tab", "next field").with_priority(20),
      ShortcutInfo::new("space", "change").with_priority(30),
      ShortcutInfo::new("esc", "cancel").with_priority(40),
    ]
  }
}
