use crate::comms::Content;

/// Session-scoped, ordered, duplicate-free list of articles.
#[derive(Debug, Clone, Default)]
pub struct ReadingList {
  items: Vec<Content>,
}

impl ReadingList {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `item` unless an equal item is already present.
  pub fn add(&mut self, item: Content) -> bool {
    if self.items.contains(&item) {
      return false;
    }
    self.items.push(item);
    true
  }

  pub fn remove(&mut self, item: &Content) -> bool {
    match self.items.iter().position(|existing| existing == item) {
      Some(index) => {
        self.items.remove(index);
        true
      }
      None => false,
    }
  }

  pub fn items(&self) -> &[Content] {
    &self.items
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}
