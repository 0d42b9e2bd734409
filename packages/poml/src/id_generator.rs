use crate::element::ElementId;

/// Sequential ID generator for the elements of one document
///
/// Owned by the document, so independent documents never share a counter.
/// Ids are never reused: removing an element retires its id.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    count: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate next sequential ID
    pub fn new_id(&mut self) -> ElementId {
        self.count += 1;
        ElementId::from_counter(self.count)
    }

    /// The id the `n`th next call to [`new_id`](Self::new_id) will return
    pub fn peek(&self, n: u64) -> ElementId {
        ElementId::from_counter(self.count + n)
    }

    /// Number of ids handed out so far
    pub fn count(&self) -> u64 {
        self.count
    }
}
