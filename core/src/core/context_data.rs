// stepflow/src/core/context_data.rs
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Shared, interior-mutable context for one pipeline run.
///
/// Guards returned here block the thread and MUST NOT be held across an
/// `.await` in asynchronous handlers.
#[derive(Debug)]
pub struct ContextData<T: Send + Sync + 'static>(Arc<RwLock<T>>);

impl<T: Send + Sync + 'static> ContextData<T> {
  pub fn new(data: T) -> Self {
    ContextData(Arc::new(RwLock::new(data)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, T> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, T> {
    self.0.write()
  }

  pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
    self.0.try_read()
  }

  pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
    self.0.try_write()
  }

  /// Read guard narrowed to one part of the context, e.g. `ctx.map_read(|d| &d.cart)`.
  pub fn map_read<F, U: ?Sized>(&self, f: F) -> MappedRwLockReadGuard<'_, U>
  where
    F: FnOnce(&T) -> &U,
  {
    RwLockReadGuard::map(self.read(), f)
  }

  pub fn map_write<F, U: ?Sized>(&self, f: F) -> MappedRwLockWriteGuard<'_, U>
  where
    F: FnOnce(&mut T) -> &mut U,
  {
    RwLockWriteGuard::map(self.write(), f)
  }

  /// Runs `f` under a read lock and returns its result. The guard is released
  /// before this returns, so the value can be carried across an `.await`.
  pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
    f(&self.read())
  }

  /// Write-lock counterpart of [`ContextData::with`].
  pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
    f(&mut self.write())
  }

  /// Number of live handles to this context.
  pub fn handle_count(&self) -> usize {
    Arc::strong_count(&self.0)
  }
}

impl<T: Send + Sync + 'static> Clone for ContextData<T> {
  fn clone(&self) -> Self {
    ContextData(Arc::clone(&self.0))
  }
}

impl<T: Send + Sync + 'static + Default> Default for ContextData<T> {
  fn default() -> Self {
    Self::new(Default::default())
  }
}
