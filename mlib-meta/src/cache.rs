//! Invalidate-then-recompute cache for derived item fields

/// Cached derived value
///
/// Mutations call [`Cached::invalidate`]; the next read recomputes. Several
/// invalidations between reads cost one recomputation.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    value: Option<T>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> Cached<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.value = None;
    }

    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// Current value without recomputing
    pub fn peek(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn set(&mut self, value: T) -> &T {
        self.value.insert(value)
    }

    pub fn get_or_compute(&mut self, compute: impl FnOnce() -> T) -> &T {
        self.value.get_or_insert_with(compute)
    }
}
