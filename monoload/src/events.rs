/// Events forwarded to the loader's observer.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderEvent<T> {
    /// A fresh delivery from a completed load (or a direct `deliver` call).
    /// `None` is a valid "no result" value.
    Loaded(Option<T>),
    /// The cached result, re-sent on start without recomputation. An empty
    /// cache slot never re-delivers, so the value is always present.
    Redelivered(T),
}

/// Message sent from a background load task back to its loader.
///
/// Received by the host event loop and fed into
/// [`Loader::handle_completion`](crate::Loader::handle_completion); the
/// generation lets the loader tell a live load from one that was cancelled
/// or superseded in the meantime.
#[derive(Debug)]
pub struct LoadCompletion<T> {
    pub(crate) generation: u64,
    pub(crate) value: Option<T>,
}
