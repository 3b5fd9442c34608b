use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for an order, product or account status
pub fn status_color(status: &str) -> Color {
  match status.to_lowercase().as_str() {
    "delivered" | "active" | "published" | "paid" => Color::Green,
    "shipped" | "confirmed" => Color::Cyan,
    "pending" | "processing" | "draft" => Color::Yellow,
    "cancelled" | "refunded" | "inactive" | "suspended" => Color::Red,
    _ => Color::White,
  }
}

pub fn format_money(amount: f64) -> String {
  format!("${:.2}", amount)
}

pub fn format_date(date: Option<&DateTime<Utc>>) -> String {
  date
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("Café Crème Brûlée", 8), "Café ...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color("delivered"), Color::Green);
    assert_eq!(status_color("Active"), Color::Green);
    assert_eq!(status_color("shipped"), Color::Cyan);
    assert_eq!(status_color("pending"), Color::Yellow);
    assert_eq!(status_color("cancelled"), Color::Red);
    assert_eq!(status_color("unknown"), Color::White);
  }

  #[test]
  fn test_formatting() {
    assert_eq!(format_money(109.5), "$109.50");
    let date = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
    assert_eq!(format_date(Some(&date)), "2024-01-15");
    assert_eq!(format_date(None), "-");
  }
}
