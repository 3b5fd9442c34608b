use super::rows::{ListRow, OnSaved};
use crate::api::ApiError;
use crate::app::Services;
use crate::query::{Mutation, Query, QueryKey, QueryState};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

/// Single record fetched through its detail cache key
pub struct RecordDetailView<R: ListRow> {
  services: Services,
  id: String,
  query: Query<R>,
  confirm_delete: bool,
  pending_delete: Option<oneshot::Receiver<Result<(), ApiError>>>,
  deleted: bool,
  notice: Option<String>,
  saved_tx: mpsc::UnboundedSender<String>,
  saved_rx: mpsc::UnboundedReceiver<String>,
}

impl<R: ListRow> RecordDetailView<R> {
  pub fn new(services: &Services, id: &str) -> Self {
    let service = services.service::<R>();
    let record_id = id.to_string();
    let mut query = Query::new(
      services.cache.clone(),
      QueryKey::detail::<R>(id),
      move || {
        let service = Arc::clone(&service);
        let id = record_id.clone();
        async move { service.get(&id).await }
      },
    );

    // Start fetching immediately
    query.fetch();

    let (saved_tx, saved_rx) = mpsc::unbounded_channel();
    Self {
      services: services.clone(),
      id: id.to_string(),
      query,
      confirm_delete: false,
      pending_delete: None,
      deleted: false,
      notice: None,
      saved_tx,
      saved_rx,
    }
  }

  fn start_delete(&mut self) {
    let (tx, rx) = oneshot::channel();
    let cache = self.services.cache.clone();
    let service = self.services.service::<R>();
    let id = self.id.clone();
    tokio::spawn(async move {
      let result = cache
        .mutate(Mutation::delete::<R>(&id), service.delete(&id))
        .await;
      let _ = tx.send(result);
    });
    self.pending_delete = Some(rx);
    self.notice = Some(format!("Deleting {} {}...", R::LABEL, self.id));
  }

  fn poll_delete(&mut self) {
    let Some(rx) = self.pending_delete.as_mut() else {
      return;
    };
    let result = match rx.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => return,
      Err(oneshot::error::TryRecvError::Closed) => {
        Err(ApiError::Transport("delete was cancelled".into()))
      }
    };
    self.pending_delete = None;
    match result {
      Ok(()) => {
        info!(resource = R::NAME, id = %self.id, "record deleted");
        self.deleted = true;
      }
      Err(err) => self.notice = Some(format!("Delete failed: {}", err)),
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" {} {} (loading...) ", R::LABEL, self.id),
      QueryState::Error(_) => format!(" {} {} (error) ", R::LABEL, self.id),
      _ => match self.query.data() {
        Some(record) => format!(" {} ", record.title()),
        None => format!(" {} {} ", R::LABEL, self.id),
      },
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(1),    // Fields
        Constraint::Length(1), // Status line
      ])
      .split(inner);

    if let Some(record) = self.query.data() {
      let lines: Vec<Line> = record
        .detail()
        .into_iter()
        .map(|(label, value)| {
          Line::from(vec![
            Span::styled(format!("{:>16}: ", label), Style::default().fg(Color::DarkGray)),
            Span::raw(value),
          ])
        })
        .collect();
      frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[0]);
    } else if let Some(error) = self.query.error() {
      let text = if error.is_not_found() {
        format!("This {} no longer exists.", R::LABEL)
      } else {
        format!("Error: {}\n\nPress 'r' to retry.", error)
      };
      let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, chunks[0]);
    } else {
      let paragraph = Paragraph::new(format!("Loading {} details...", R::LABEL))
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, chunks[0]);
    }

    let status = if self.confirm_delete {
      Span::styled(
        format!(" Delete {} {}? (y/n)", R::LABEL, self.id),
        Style::default().fg(Color::Red),
      )
    } else if let Some(notice) = &self.notice {
      Span::styled(format!(" {}", notice), Style::default().fg(Color::Yellow))
    } else {
      Span::raw("")
    };
    frame.render_widget(Paragraph::new(Line::from(status)), chunks[1]);
  }
}

impl<R: ListRow> View for RecordDetailView<R> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.confirm_delete {
      self.confirm_delete = false;
      if key.code == KeyCode::Char('y') && self.pending_delete.is_none() {
        self.start_delete();
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('r') => {
        if !self.query.is_loading() {
          self.query.refetch();
        }
        ViewAction::None
      }
      KeyCode::Char('d') => {
        self.confirm_delete = true;
        ViewAction::None
      }
      KeyCode::Char('e') => {
        let tx = self.saved_tx.clone();
        let on_saved: OnSaved<R> = Box::new(move |record: &R| {
          let _ = tx.send(format!("Saved {}", record.title()));
        });
        match self
          .query
          .data()
          .and_then(|r| r.edit_view(&self.services, on_saved))
        {
          Some(view) => ViewAction::Push(view),
          None => ViewAction::None,
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    match self.query.data() {
      Some(record) => record.title(),
      None => format!("{} {}", R::LABEL, self.id),
    }
  }

  fn context(&self) -> Option<String> {
    Some(format!("{} {}", R::NAME, self.id))
  }

  fn tick(&mut self) {
    self.query.poll();
    self.poll_delete();
    while let Ok(message) = self.saved_rx.try_recv() {
      self.notice = Some(message);
    }
  }

  fn captures_input(&self) -> bool {
    self.confirm_delete
  }

  fn wants_close(&self) -> bool {
    self.deleted
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new("r", "refresh").with_priority(10),
      ShortcutInfo::new("d", "delete").with_priority(20),
      ShortcutInfo::new("q", "back").with_priority(40),
    ];
    if R::EDITABLE {
      shortcuts.push(ShortcutInfo::new("e", "edit").with_priority(30));
    }
    shortcuts
  }
}
