use super::resource_list::cell_span;
use super::rows::ListRow;
use super::RecordDetailView;
use crate::api::types::Order;
use crate::app::Services;
use crate::dashboard::{Dashboard, Overview, ORDER_SAMPLE};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::format_money;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Stat cards, recent orders and quick stats
pub struct DashboardView {
  services: Services,
  dashboard: Dashboard,
  list_state: ListState,
}

impl DashboardView {
  pub fn new(services: &Services) -> Self {
    Self {
      services: services.clone(),
      dashboard: Dashboard::new(
        &services.cache,
        services.service(),
        services.service(),
        services.service(),
      ),
      list_state: ListState::default(),
    }
  }

  fn render_cards(&self, frame: &mut Frame, area: Rect, overview: &Overview) {
    let revenue_note = if overview.is_partial() {
      format!("newest {} orders", overview.sampled)
    } else {
      "all orders".to_string()
    };
    let cards = [
      ("Total Revenue", format_money(overview.revenue), revenue_note, Color::Green),
      ("Total Orders", overview.orders.to_string(), "placed".to_string(), Color::Cyan),
      ("Total Customers", overview.customers.to_string(), "registered".to_string(), Color::Magenta),
      ("Total Products", overview.products.to_string(), "in catalog".to_string(), Color::Yellow),
    ];

    let chunks = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Ratio(1, 4); 4])
      .split(area);

    for ((title, value, note, color), chunk) in cards.into_iter().zip(chunks.iter()) {
      let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
      let lines = vec![
        Line::from(Span::styled(value, Style::default().fg(color).bold())),
        Line::from(Span::styled(note, Style::default().fg(Color::DarkGray))),
      ];
      frame.render_widget(Paragraph::new(lines).block(block), *chunk);
    }
  }

  fn render_recent(&mut self, frame: &mut Frame, area: Rect, recent: &[Order]) {
    ensure_valid_selection(&mut self.list_state, recent.len());

    let block = Block::default()
      .title(" Recent Orders ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if recent.is_empty() {
      let paragraph = Paragraph::new("No orders yet.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = recent
      .iter()
      .map(|order| {
        let spans: Vec<Span> = order
          .cells()
          .into_iter()
          .zip(Order::COLUMNS)
          .map(|(cell, (_, width))| cell_span(cell, *width))
          .collect();
        ListItem::new(Line::from(spans))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_quick_stats(&self, frame: &mut Frame, area: Rect, overview: &Overview) {
    let block = Block::default()
      .title(" Quick Stats ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let label = |text: &'static str| Span::styled(format!("{:>16}: ", text), Style::default().fg(Color::DarkGray));
    let average = overview
      .average_order()
      .map(format_money)
      .unwrap_or_else(|| "-".to_string());
    let mut lines = vec![
      Line::from(vec![label("Avg order value"), Span::raw(average)]),
      Line::from(vec![label("Products sold"), Span::raw(overview.items_sold.to_string())]),
    ];
    if overview.is_partial() {
      lines.push(Line::from(Span::styled(
        format!("Figures cover the newest {} orders", ORDER_SAMPLE),
        Style::default().fg(Color::DarkGray),
      )));
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn selected_order(&self) -> Option<&Order> {
    let overview = self.dashboard.overview()?;
    overview.recent.get(self.list_state.selected()?)
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.dashboard.refresh(),
      KeyCode::Enter => {
        if let Some(order) = self.selected_order() {
          return ViewAction::Push(Box::new(RecordDetailView::<Order>::new(
            &self.services,
            &order.id,
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let Some(overview) = self.dashboard.overview().cloned() else {
      let (text, color) = match self.dashboard.error() {
        Some(error) => (
          format!("Failed to load the overview: {}\n\nPress 'r' to retry.", error),
          Color::Red,
        ),
        None => ("Loading overview...".to_string(), Color::DarkGray),
      };
      let block = Block::default()
        .title(" Dashboard ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
      frame.render_widget(
        Paragraph::new(text).block(block).style(Style::default().fg(color)),
        area,
      );
      return;
    };

    let rows = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(4), // Cards
        Constraint::Min(5),    // Recent orders and quick stats
        Constraint::Length(1), // Status line
      ])
      .split(area);
    self.render_cards(frame, rows[0], &overview);

    let bottom = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
      .split(rows[1]);
    self.render_recent(frame, bottom[0], &overview.recent);
    self.render_quick_stats(frame, bottom[1], &overview);

    let status = match (self.dashboard.is_loading(), self.dashboard.error()) {
      (true, _) => Span::styled(" Refreshing...", Style::default().fg(Color::DarkGray)),
      (false, Some(error)) => Span::styled(
        format!(" Refresh failed: {} (r to retry)", error),
        Style::default().fg(Color::Red),
      ),
      (false, None) => Span::raw(""),
    };
    frame.render_widget(Paragraph::new(Line::from(status)), rows[2]);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn tick(&mut self) {
    self.dashboard.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(20),
      ShortcutInfo::new("enter", "order").with_priority(30),
    ]
  }
}
