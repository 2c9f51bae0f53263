//! Shared view state that background renderers write into.
//!
//! The owner keeps the [`Region`]; renderers only get a [`RegionHandle`]. Once
//! the owner drops the region every handle turns inert and further updates
//! are refused.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

#[derive(Debug, Default)]
pub struct Region<V> {
    inner: Arc<Mutex<V>>,
}

impl<V> Region<V> {
    pub fn new(view: V) -> Self {
        Self {
            inner: Arc::new(Mutex::new(view)),
        }
    }

    pub fn handle(&self) -> RegionHandle<V> {
        RegionHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&lock(&self.inner))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        f(&mut lock(&self.inner))
    }
}

impl<V: Clone> Region<V> {
    pub fn snapshot(&self) -> V {
        self.read(V::clone)
    }
}

#[derive(Debug)]
pub struct RegionHandle<V> {
    inner: Weak<Mutex<V>>,
}

impl<V> Clone for RegionHandle<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> RegionHandle<V> {
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Runs `f` against the view, or returns `None` if the region is gone.
    pub fn update<R>(&self, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let inner = self.inner.upgrade()?;
        let mut view = lock(&inner);
        Some(f(&mut view))
    }
}

// a renderer that panicked mid-update leaves a view that is still safe to draw
fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
