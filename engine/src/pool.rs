//! Free-list pool for large per-slot structures.
//!
//! World details and avatars hold capacity-sized arrays; recycling them on
//! release avoids reallocating those arrays under login and logout churn.

/// Restores a pooled value to its freshly constructed state.
pub trait Reset {
    fn reset(&mut self);
}

/// A bounded free list of reusable values.
#[derive(Debug)]
pub struct Pool<T> {
    free: Vec<T>,
    max_pooled: usize,
    constructed: usize,
}

impl<T: Reset> Pool<T> {
    /// Creates a pool that keeps at most `max_pooled` released values.
    #[must_use]
    pub const fn new(max_pooled: usize) -> Self {
        Self {
            free: Vec::new(),
            max_pooled,
            constructed: 0,
        }
    }

    /// Takes a reset value from the free list, or builds one with `make`.
    pub fn acquire(&mut self, make: impl FnOnce() -> T) -> T {
        if let Some(mut value) = self.free.pop() {
            value.reset();
            return value;
        }
        self.constructed += 1;
        make()
    }

    /// Returns a value for later reuse. Values beyond the limit are dropped.
    pub fn release(&mut self, value: T) {
        if self.free.len() < self.max_pooled {
            self.free.push(value);
        }
    }

    /// Drops pooled values until at most `len` remain.
    pub fn shrink_to(&mut self, len: usize) {
        self.free.truncate(len);
        self.free.shrink_to_fit();
    }

    /// Values currently available for reuse.
    #[must_use]
    pub fn pooled(&self) -> usize {
        self.free.len()
    }

    /// Values built because the free list was empty.
    #[must_use]
    pub const fn constructed(&self) -> usize {
        self.constructed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Scratch {
        data: Vec<u32>,
    }

    impl Reset for Scratch {
        fn reset(&mut self) {
            self.data.clear();
        }
    }

    #[test]
    fn reuses_released_values_after_reset() {
        let mut pool = Pool::new(4);
        let mut value = pool.acquire(Scratch::default);
        value.data.extend([1, 2, 3]);
        let capacity = value.data.capacity();
        pool.release(value);
        assert_eq!(pool.pooled(), 1);

        let value = pool.acquire(Scratch::default);
        assert!(value.data.is_empty());
        assert_eq!(value.data.capacity(), capacity);
        assert_eq!(pool.constructed(), 1);
    }

    #[test]
    fn release_beyond_limit_drops() {
        let mut pool = Pool::new(1);
        pool.release(Scratch::default());
        pool.release(Scratch::default());
        assert_eq!(pool.pooled(), 1);
    }

    #[test]
    fn shrink_forces_fresh_construction() {
        let mut pool = Pool::new(4);
        pool.release(Scratch::default());
        pool.release(Scratch::default());
        pool.shrink_to(0);
        let _ = pool.acquire(Scratch::default);
        assert_eq!(pool.constructed(), 1);
        assert_eq!(pool.pooled(), 0);
    }
}
