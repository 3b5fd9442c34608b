//! Page-number button window for list footers.

use std::fmt;

/// One slot in the page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
  Page(u32),
  Ellipsis,
}

impl fmt::Display for PageItem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PageItem::Page(n) => write!(f, "{}", n),
      PageItem::Ellipsis => f.write_str("…"),
    }
  }
}

/// Bounded set of page buttons around `current`.
///
/// - up to 5 pages: all of them
/// - near the start: 1 2 3 4 … last
/// - near the end: 1 … last-3 last-2 last-1 last
/// - otherwise: 1 … current-1 current current+1 … last
///
/// No pages yields an empty window.
pub fn page_window(current: u32, total: u32) -> Vec<PageItem> {
  use PageItem::{Ellipsis, Page};

  if total == 0 {
    return Vec::new();
  }
  if total <= 5 {
    return (1..=total).map(Page).collect();
  }

  if current <= 3 {
    vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(total)]
  } else if current >= total - 2 {
    let mut window = vec![Page(1), Ellipsis];
    window.extend((total - 3..=total).map(Page));
    window
  } else {
    vec![
      Page(1),
      Ellipsis,
      Page(current - 1),
      Page(current),
      Page(current + 1),
      Ellipsis,
      Page(total),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use PageItem::{Ellipsis, Page};

  #[test]
  fn test_small_totals_show_every_page() {
    for total in 1..=5 {
      for current in 1..=total {
        let window = page_window(current, total);
        let expected: Vec<PageItem> = (1..=total).map(Page).collect();
        assert_eq!(window, expected, "current={} total={}", current, total);
      }
    }
  }

  #[test]
  fn test_near_start() {
    let expected = vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)];
    assert_eq!(page_window(1, 10), expected);
    assert_eq!(page_window(3, 10), expected);
  }

  #[test]
  fn test_near_end() {
    let expected = vec![Page(1), Ellipsis, Page(7), Page(8), Page(9), Page(10)];
    assert_eq!(page_window(9, 10), expected);
    assert_eq!(page_window(8, 10), expected);
    assert_eq!(page_window(10, 10), expected);
  }

  #[test]
  fn test_middle() {
    assert_eq!(
      page_window(5, 10),
      vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
    );
  }

  #[test]
  fn test_six_pages_boundary() {
    assert_eq!(
      page_window(4, 6),
      vec![Page(1), Ellipsis, Page(3), Page(4), Page(5), Page(6)]
    );
  }

  #[test]
  fn test_no_pages() {
    assert!(page_window(1, 0).is_empty());
  }

  #[test]
  fn test_display() {
    let labels: Vec<String> = page_window(5, 10).iter().map(|p| p.to_string()).collect();
    assert_eq!(labels.join(" "), "1 … 4 5 6 … 10");
  }
}
