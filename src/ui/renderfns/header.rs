use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, backend title, view context and the
/// current view's shortcuts.
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  context: Option<&str>,
  shortcuts: &[ShortcutInfo],
) {
  let mut spans = vec![
    Span::styled(" shopdesk ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
  ];

  if let Some(context) = context {
    spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
      format!(" {} ", context),
      Style::default().fg(Color::Yellow).bold(),
    ));
  }

  spans.push(Span::raw(" "));
  for shortcut in sorted_shortcuts(shortcuts) {
    // Keys and brackets highlighted, descriptions dimmed
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Shortcuts in display order: by priority, then as declared.
fn sorted_shortcuts(shortcuts: &[ShortcutInfo]) -> Vec<&ShortcutInfo> {
  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);
  sorted
}
