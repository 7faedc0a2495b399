use std::future::Future;

/// A source of loadable values, driven by a [`Loader`](crate::Loader).
///
/// Implementors provide:
/// - `load`: the background computation producing the value
/// - `discard`: cleanup for a result the loader no longer holds
/// - `same_result`: the identity contract used to skip discarding a result
///   that was re-delivered unchanged
///
/// The loader both caches a result and forwards it to the observer, so
/// `Output` is expected to be a cheaply clonable handle (typically an `Arc`)
/// when the underlying value is large.
pub trait LoadSource: Send + Sync + 'static {
    /// Type of values produced by a load.
    type Output: Send + 'static;

    /// Produce a value on a background task.
    ///
    /// Returns `None` for a valid "no result"; `None` never reaches the
    /// discard hook. May take arbitrarily long; the spawned task owns its
    /// execution.
    fn load(&self) -> impl Future<Output = Option<Self::Output>> + Send;

    /// Release whatever resources `result` holds (recycle buffers, close
    /// handles).
    ///
    /// Never called with an absent result. May run concurrently with an
    /// in-flight `load`, and in some circumstances more than once for
    /// logically distinct results delivered close together; implementations
    /// must be safe under both.
    fn discard(&self, result: Self::Output);

    /// Whether `a` and `b` are the same result.
    ///
    /// A replacement that is `same_result` as its predecessor does not
    /// trigger a discard of the predecessor. Sources built on `Arc` handles
    /// typically answer with `Arc::ptr_eq`; there is deliberately no default
    /// so every source states what identity means for its values.
    fn same_result(&self, a: &Self::Output, b: &Self::Output) -> bool;
}
