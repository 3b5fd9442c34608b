use super::rows::{Cell, ListRow, OnSaved};
use super::RecordDetailView;
use crate::app::Services;
use crate::list::{ListController, ListState as LoadState, PageItem};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use tokio::sync::mpsc;

/// A destructive action waiting for `y`
enum Confirm {
  DeleteOne(String),
  BulkDelete(usize),
}

/// Paginated, searchable list of one resource
pub struct ResourceListView<R: ListRow> {
  services: Services,
  title: String,
  list: ListController<R>,
  list_state: ListState,
  search: SearchInput,
  confirm: Option<Confirm>,
  /// Position in `R::FILTER` values; None = all
  filter_index: Option<usize>,
  /// "Created ..." / "Saved ..." from dialogs opened here
  saved_tx: mpsc::UnboundedSender<String>,
  saved_rx: mpsc::UnboundedReceiver<String>,
  flash: Option<String>,
}

impl<R: ListRow> ResourceListView<R> {
  pub fn new(services: &Services, title: &str) -> Self {
    let list = ListController::new(
      services.cache.clone(),
      services.service::<R>(),
      services.page_size,
      services.search_delay,
    );
    Self::with_controller(services, title, list)
  }

  /// List restricted by a fixed query parameter (e.g. customers are users
  /// with `role=customer`).
  pub fn filtered(services: &Services, title: &str, name: &str, value: &str) -> Self {
    let list = ListController::new(
      services.cache.clone(),
      services.service::<R>(),
      services.page_size,
      services.search_delay,
    )
    .with_filter(name, value);
    Self::with_controller(services, title, list)
  }

  fn with_controller(services: &Services, title: &str, mut list: ListController<R>) -> Self {
    list.start();
    let (saved_tx, saved_rx) = mpsc::unbounded_channel();
    Self {
      services: services.clone(),
      title: title.to_string(),
      list,
      list_state: ListState::default(),
      search: SearchInput::new(),
      confirm: None,
      filter_index: None,
      saved_tx,
      saved_rx,
      flash: None,
    }
  }

  fn on_saved(&self, verb: &'static str) -> OnSaved<R> {
    let tx = self.saved_tx.clone();
    Box::new(move |record: &R| {
      let _ = tx.send(format!("{} {}", verb, record.title()));
    })
  }

  fn selected_row(&self) -> Option<&R> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.list.rows().get(idx))
  }

  fn cycle_filter(&mut self) {
    let Some((name, values)) = R::FILTER else {
      return;
    };
    self.filter_index = match self.filter_index {
      None => Some(0),
      Some(i) if i + 1 < values.len() => Some(i + 1),
      Some(_) => None,
    };
    let value = self.filter_index.and_then(|i| values.get(i)).copied();
    self.list.set_filter(name, value);
  }

  fn handle_confirm(&mut self, key: KeyEvent, confirm: Confirm) {
    if key.code != KeyCode::Char('y') {
      return;
    }
    self.list.dismiss_notice();
    match confirm {
      Confirm::DeleteOne(id) => self.list.delete_one(&id),
      Confirm::BulkDelete(_) => {
        self.list.start_bulk_delete();
      }
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.list.rows().len();
    ensure_valid_selection(&mut self.list_state, len);

    let mut title = format!(" {} [{}]", self.title, self.list.total());
    if !self.list.applied_search().is_empty() {
      title.push_str(&format!(" /{}", self.list.applied_search()));
    }
    if let Some((name, _)) = R::FILTER {
      if let Some(value) = self.list.filter(name) {
        title.push_str(&format!(" {}={}", name, value));
      }
    }
    if self.list.is_loading() {
      title.push_str(" (loading...)");
    }
    title.push(' ');

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let content = match self.list.state() {
        LoadState::Errored(e) => format!("Failed to load {}: {}\n\nPress 'r' to retry.", R::NAME, e),
        LoadState::Idle | LoadState::Loading => format!("Loading {}...", R::NAME),
        LoadState::Ready => format!("No {} found.", R::NAME),
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(1)])
      .split(inner);

    let mut heading = vec![Span::raw("      ")];
    for (name, width) in R::COLUMNS {
      heading.push(Span::styled(
        format!("{:<w$} ", name, w = *width),
        Style::default().fg(Color::DarkGray).bold(),
      ));
    }
    frame.render_widget(Paragraph::new(Line::from(heading)), chunks[0]);

    let items: Vec<ListItem> = self
      .list
      .rows()
      .iter()
      .map(|row| {
        let check = if self.list.is_selected(row.id()) {
          Span::styled("[x] ", Style::default().fg(Color::Yellow))
        } else {
          Span::styled("[ ] ", Style::default().fg(Color::DarkGray))
        };
        let mut spans = vec![check];
        spans.extend(
          row
            .cells()
            .into_iter()
            .zip(R::COLUMNS)
            .map(|(cell, (_, width))| cell_span(cell, *width)),
        );
        ListItem::new(Line::from(spans))
      })
      .collect();

    let list = List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
  }

  fn render_pagination(&self, frame: &mut Frame, area: Rect) {
    let mut spans = vec![Span::styled(" « ", Style::default().fg(Color::DarkGray))];
    for item in self.list.page_window() {
      let style = match item {
        PageItem::Page(n) if n == self.list.page() => Style::default().fg(Color::Yellow).bold(),
        _ => Style::default().fg(Color::White),
      };
      spans.push(Span::styled(format!("{} ", item), style));
    }
    spans.push(Span::styled("» ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
      format!(
        "  page {} of {}, {} selected",
        self.list.page(),
        self.list.total_pages().max(1),
        self.list.selection().len()
      ),
      Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  fn render_status(&self, frame: &mut Frame, area: Rect) {
    let (text, color) = match &self.confirm {
      Some(Confirm::DeleteOne(id)) => (format!("Delete {} {}? (y/n)", R::LABEL, id), Color::Red),
      Some(Confirm::BulkDelete(n)) => (format!("Delete {} selected {}(s)? (y/n)", n, R::LABEL), Color::Red),
      None if self.list.is_bulk_deleting() => ("Deleting...".to_string(), Color::Yellow),
      None => match (&self.flash, self.list.last_report(), self.list.notice()) {
        (Some(flash), _, _) => (flash.clone(), Color::Green),
        (None, Some(report), _) => {
          let color = if report.is_clean() { Color::Green } else { Color::Red };
          (report.summary(R::LABEL), color)
        }
        (None, None, Some(notice)) => (notice.to_string(), Color::Yellow),
        // Rows from before a failed reload are still listed above
        (None, None, None) => match self.list.error() {
          Some(error) => (format!("Reload failed: {} (r to retry)", error), Color::Red),
          None => (String::new(), Color::DarkGray),
        },
      },
    };
    frame.render_widget(
      Paragraph::new(format!(" {}", text)).style(Style::default().fg(color)),
      area,
    );
  }
}

pub(super) fn cell_span(cell: Cell, width: usize) -> Span<'static> {
  let (text, color) = cell;
  Span::styled(
    format!("{:<w$} ", truncate(&text, width), w = width),
    Style::default().fg(color),
  )
}

impl<R: ListRow> View for ResourceListView<R> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(confirm) = self.confirm.take() {
      self.handle_confirm(key, confirm);
      return ViewAction::None;
    }
    self.flash = None;

    // Let search component try to handle first
    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(text)) => {
        self.list.set_search(&text);
        return ViewAction::None;
      }
      KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    // Normal mode key handling
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') | KeyCode::Right => self.list.next_page(),
      KeyCode::Char('p') | KeyCode::Left => self.list.prev_page(),
      KeyCode::Char(' ') => {
        if let Some(id) = self.selected_row().map(|r| r.id().to_string()) {
          self.list.toggle(&id);
          self.list_state.select_next();
        }
      }
      KeyCode::Char('a') => self.list.toggle_all(),
      KeyCode::Char('r') => {
        if matches!(self.list.state(), LoadState::Errored(_)) {
          self.list.retry();
        } else {
          self.list.refresh();
        }
      }
      KeyCode::Char('f') => self.cycle_filter(),
      KeyCode::Char('d') => {
        if let Some(id) = self.selected_row().map(|r| r.id().to_string()) {
          self.confirm = Some(Confirm::DeleteOne(id));
        }
      }
      KeyCode::Char('D') => {
        let count = self.list.selection().len();
        if count > 0 && !self.list.is_bulk_deleting() {
          self.confirm = Some(Confirm::BulkDelete(count));
        }
      }
      KeyCode::Char('s') => {
        let update = self
          .selected_row()
          .and_then(|row| row.quick_update().map(|(_, payload)| (row.id().to_string(), payload)));
        if let Some((id, payload)) = update {
          self.list.dismiss_notice();
          self.list.update_one(&id, payload);
        }
      }
      KeyCode::Char('c') => {
        if let Some(view) = R::create_view(&self.services, self.on_saved("Created")) {
          return ViewAction::Push(view);
        }
      }
      KeyCode::Char('e') => {
        let on_saved = self.on_saved("Saved");
        if let Some(view) = self
          .selected_row()
          .and_then(|row| row.edit_view(&self.services, on_saved))
        {
          return ViewAction::Push(view);
        }
      }
      KeyCode::Enter => {
        if let Some(row) = self.selected_row() {
          return ViewAction::Push(Box::new(RecordDetailView::<R>::new(
            &self.services,
            row.id(),
          )));
        }
      }
      KeyCode::Esc if !self.list.selection().is_empty() => self.list.clear_selection(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(3),    // List
        Constraint::Length(1), // Pagination
        Constraint::Length(1), // Status line
      ])
      .split(area);

    self.render_list(frame, chunks[0]);
    self.render_pagination(frame, chunks[1]);
    self.render_status(frame, chunks[2]);
    // Let search component render its overlay
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.title.clone()
  }

  fn context(&self) -> Option<String> {
    Some(format!(
      "{} {}/{}",
      R::NAME,
      self.list.page(),
      self.list.total_pages().max(1)
    ))
  }

  fn tick(&mut self) {
    self.list.tick();
    while let Ok(message) = self.saved_rx.try_recv() {
      self.flash = Some(message);
    }
  }

  fn captures_input(&self) -> bool {
    self.search.is_active() || self.confirm.is_some()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("n/p", "page").with_priority(30),
      ShortcutInfo::new("space", "select").with_priority(40),
      ShortcutInfo::new("d/D", "delete").with_priority(50),
      ShortcutInfo::new("enter", "details").with_priority(60),
    ];
    if R::FILTER.is_some() {
      shortcuts.push(ShortcutInfo::new("f", "filter").with_priority(70));
    }
    if R::EDITABLE {
      shortcuts.push(ShortcutInfo::new("c/e", "create/edit").with_priority(80));
    }
    shortcuts
  }
}
