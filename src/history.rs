/// Bounded linear undo stack of whole-model snapshots.
///
/// Snapshots are pushed *before* a gesture mutates the live model. The cursor
/// sits one past the newest snapshot while the user is editing; each undo
/// steps it back by one and hands out the snapshot there. Undoing past the
/// oldest snapshot keeps returning the oldest one.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: Vec<T>,
    cursor: usize,
    capacity: usize,
}

impl<T: Clone> History<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Drops every snapshot after the cursor, appends `snapshot`, then evicts
    /// the oldest entries beyond capacity.
    pub fn save(&mut self, snapshot: T) {
        self.entries.truncate(self.cursor);
        self.entries.push(snapshot);
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
        self.cursor = self.entries.len();
    }

    /// `None` only when nothing was ever saved.
    pub fn undo(&mut self) -> Option<T> {
        if self.entries.is_empty() {
            return None;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.entries.get(self.cursor).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
