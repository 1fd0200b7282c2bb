//! A generic object pool: a free-list plus generation index in place of
//! pointer-reuse pooling.
//!
//! This is the free-list variant: a `Pool<T>` hands out `Pooled<T>` guards
//! that return their value to a shared free-list on drop, avoiding a fresh
//! allocation on the hot per-request path.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

pub struct Pool<T> {
    free: Mutex<Vec<T>>,
    new: Box<dyn Fn() -> T + Send + Sync>,
    reset: Box<dyn Fn(&mut T) + Send + Sync>,
}

impl<T> Pool<T> {
    pub fn new(
        new: impl Fn() -> T + Send + Sync + 'static,
        reset: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Pool {
            free: Mutex::new(Vec::new()),
            new: Box::new(new),
            reset: Box::new(reset),
        }
    }

    /// Takes an item from the free-list, or allocates a new one if empty.
    pub fn take(&self) -> T {
        let mut free = self.free.lock().unwrap();
        free.pop().unwrap_or_else(|| (self.new)())
    }

    /// Resets and returns an item to the free-list for reuse.
    pub fn give(&self, mut item: T) {
        (self.reset)(&mut item);
        self.free.lock().unwrap().push(item);
    }

    pub fn len_idle(&self) -> usize {
        self.free.lock().unwrap().len()
    }
}

/// An RAII guard around a pooled value: returns it to `pool` on drop.
pub struct Pooled<'p, T> {
    value: Option<T>,
    pool: &'p Pool<T>,
}

impl<'p, T> Pooled<'p, T> {
    pub fn acquire(pool: &'p Pool<T>) -> Self {
        Pooled {
            value: Some(pool.take()),
            pool,
        }
    }
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value.as_ref().expect("value taken before drop")
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("value taken before drop")
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(v) = self.value.take() {
            self.pool.give(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_item_is_reset_between_uses() {
        let pool: Pool<Vec<u8>> = Pool::new(Vec::new, |v| v.clear());
        {
            let mut guard = Pooled::acquire(&pool);
            guard.extend_from_slice(b"hello");
        }
        assert_eq!(pool.len_idle(), 1);
        let guard = Pooled::acquire(&pool);
        assert!(guard.is_empty());
    }

    #[test]
    fn take_allocates_when_free_list_empty() {
        let pool: Pool<String> = Pool::new(|| "new".to_string(), |s| s.clear());
        assert_eq!(pool.take(), "new");
    }
}
