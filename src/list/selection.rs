//! Checked rows of the page currently on screen.

/// Ordered set of selected record ids. Insertion order is kept so bulk
/// actions run and report in the order rows were picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
  ids: Vec<String>,
}

impl Selection {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.ids.iter().any(|selected| selected == id)
  }

  /// Add `id` if absent, remove it if present. Returns whether it is now
  /// selected.
  pub fn toggle(&mut self, id: &str) -> bool {
    if let Some(pos) = self.ids.iter().position(|selected| selected == id) {
      self.ids.remove(pos);
      false
    } else {
      self.ids.push(id.to_string());
      true
    }
  }

  pub fn set(&mut self, id: &str, selected: bool) {
    match (selected, self.contains(id)) {
      (true, false) => self.ids.push(id.to_string()),
      (false, true) => self.ids.retain(|s| s != id),
      _ => {}
    }
  }

  /// Replace the selection with exactly the visible rows.
  pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>) {
    self.ids.clear();
    for id in visible {
      if !self.contains(id) {
        self.ids.push(id.to_string());
      }
    }
  }

  /// Whether every one of `visible` is selected (and there is at least one)
  pub fn covers<'a>(&self, visible: impl IntoIterator<Item = &'a str>) -> bool {
    let mut any = false;
    for id in visible {
      if !self.contains(id) {
        return false;
      }
      any = true;
    }
    any
  }

  /// Drop ids that are no longer on screen.
  pub fn retain_visible<'a>(&mut self, visible: impl IntoIterator<Item = &'a str>) {
    let visible: Vec<&str> = visible.into_iter().collect();
    self.ids.retain(|id| visible.contains(&id.as_str()));
  }

  pub fn clear(&mut self) {
    self.ids.clear();
  }

  pub fn ids(&self) -> &[String] {
    &self.ids
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_toggle() {
    let mut selection = Selection::new();
    assert!(selection.toggle("1"));
    assert!(selection.toggle("2"));
    assert!(!selection.toggle("1"));
    assert_eq!(selection.ids(), ["2"]);
  }

  #[test]
  fn test_select_all_replaces_with_visible_rows() {
    let mut selection = Selection::new();
    selection.toggle("hidden");
    selection.select_all(["1", "2", "3"]);
    assert_eq!(selection.ids(), ["1", "2", "3"]);
    assert!(selection.covers(["1", "2", "3"]));
    assert!(!selection.covers(["1", "4"]));
    assert!(!selection.covers(std::iter::empty()));
  }

  #[test]
  fn test_set_is_idempotent() {
    let mut selection = Selection::new();
    selection.set("1", true);
    selection.set("1", true);
    assert_eq!(selection.len(), 1);
    selection.set("1", false);
    selection.set("1", false);
    assert!(selection.is_empty());
  }

  #[test]
  fn test_retain_visible() {
    let mut selection = Selection::new();
    selection.select_all(["1", "2", "3"]);
    selection.retain_visible(["2", "3", "4"]);
    assert_eq!(selection.ids(), ["2", "3"]);
  }
}
