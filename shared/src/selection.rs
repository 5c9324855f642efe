//! Guards asynchronous loads against out-of-order completion.
//!
//! Every call to [`Selection::select`] hands out a fresh token. A load started
//! for that selection carries the token back with its result, and
//! [`Selection::accept`] drops the result unless the token is still the latest.

/// Opaque generation number captured when a load starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionToken(u64);

#[derive(Debug, Clone)]
pub struct Selection<K> {
    current: Option<K>,
    generation: u64,
}

impl<K> Default for Selection<K> {
    fn default() -> Self {
        Self {
            current: None,
            generation: 0,
        }
    }
}

impl<K> Selection<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, key: K) -> SelectionToken {
        self.generation += 1;
        self.current = Some(key);
        SelectionToken(self.generation)
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.current = None;
    }

    pub fn current(&self) -> Option<&K> {
        self.current.as_ref()
    }

    pub fn is_current(&self, token: SelectionToken) -> bool {
        self.current.is_some() && token.0 == self.generation
    }

    /// Hand back `value` only when `token` belongs to the live selection.
    pub fn accept<T>(&self, token: SelectionToken, value: T) -> Option<T> {
        self.is_current(token).then_some(value)
    }
}
