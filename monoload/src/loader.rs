use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{LoadCompletion, LoaderEvent};
use crate::source::LoadSource;
use crate::state::LifecycleState;

/// Record of a spawned background load.
struct InflightLoad {
    generation: u64,
    handle: JoinHandle<()>,
    cancel_requested: bool,
}

/// Lifecycle-managed wrapper around one asynchronous producer of a value.
///
/// The loader runs [`LoadSource::load`] on a background tokio task, keeps
/// exactly one cached result, re-delivers it to a newly attached observer
/// without recomputation, and coordinates replacement/discard of results
/// with the start/stop/reset/cancel lifecycle.
///
/// All methods are non-blocking synchronous state transitions; the loader is
/// meant to be driven from one logical thread of control (the host event
/// loop), which also drains the completion receiver returned by [`new`] and
/// feeds each message into [`handle_completion`]. Background tasks never
/// touch the cached slot directly.
///
/// [`new`]: Loader::new
/// [`handle_completion`]: Loader::handle_completion
pub struct Loader<S: LoadSource> {
    source: Arc<S>,
    state: LifecycleState,
    cached: Option<S::Output>,
    content_changed: bool,
    generation: u64,
    inflight: Option<InflightLoad>,
    completion_tx: mpsc::UnboundedSender<LoadCompletion<S::Output>>,
    event_tx: mpsc::UnboundedSender<LoaderEvent<S::Output>>,
}

impl<S: LoadSource> Loader<S>
where
    S::Output: Clone,
{
    /// Create a loader delivering observer events through `event_tx`.
    ///
    /// Returns the loader together with the receiver for background-load
    /// completions. The host loop must drain that receiver and pass each
    /// message to [`Loader::handle_completion`].
    pub fn new(
        source: Arc<S>,
        event_tx: mpsc::UnboundedSender<LoaderEvent<S::Output>>,
    ) -> (Self, mpsc::UnboundedReceiver<LoadCompletion<S::Output>>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let loader = Self {
            source,
            state: LifecycleState::Idle,
            cached: None,
            content_changed: false,
            generation: 0,
            inflight: None,
            completion_tx,
            event_tx,
        };
        (loader, completion_rx)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The cached result, if any.
    pub fn cached(&self) -> Option<&S::Output> {
        self.cached.as_ref()
    }

    /// Begin observing: re-deliver the cached result if one exists, and
    /// trigger a fresh load if the content changed or nothing is cached.
    pub fn start(&mut self) {
        if self.state.is_reset() {
            tracing::warn!("start ignored: loader is reset");
            return;
        }
        if self.state.is_started() {
            tracing::debug!("start ignored: already started");
            return;
        }

        if let Some(cached) = self.cached.clone() {
            tracing::debug!("re-delivering cached result");
            let _ = self.event_tx.send(LoaderEvent::Redelivered(cached));
            self.state = LifecycleState::Delivered;
        }

        if self.take_content_changed() || self.cached.is_none() {
            self.spawn_load();
            self.state = LifecycleState::Loading;
        }
    }

    /// Stop observing. Requests cancellation of any in-flight load; the
    /// request is advisory and never blocks. The cached result is retained
    /// for re-delivery on the next start.
    pub fn stop(&mut self) {
        if self.state.is_reset() {
            return;
        }
        self.cancel_inflight();
        self.state = LifecycleState::Stopped;
    }

    /// Record `data` as the new cached result and forward it to the observer
    /// if one is attached.
    ///
    /// `None` is a valid "no result" value and never reaches the discard
    /// hook. After reset, nothing is cached or forwarded: a present value is
    /// discarded immediately, so late-arriving results are cleaned up rather
    /// than leaked.
    pub fn deliver(&mut self, data: Option<S::Output>) {
        if !self.state.accepts_delivery() {
            // Reset wins over late delivery.
            if let Some(data) = data {
                tracing::debug!("discarding result delivered after reset");
                self.source.discard(data);
            }
            return;
        }

        let old = self.cached.take();

        // Forward before discarding the replaced result, so the observer
        // sees the new result while the old one is still intact.
        if self.state.is_started() {
            let _ = self.event_tx.send(LoaderEvent::Loaded(data.clone()));
            self.state = LifecycleState::Delivered;
        }
        self.cached = data;

        if let Some(old) = old {
            let replaced_by_same = self
                .cached
                .as_ref()
                .is_some_and(|new| self.source.same_result(&old, new));
            if !replaced_by_same {
                self.source.discard(old);
            }
        }
    }

    /// Permanently tear down the loader: cancel any in-flight load, discard
    /// the cached result, and move to the terminal `Reset` state.
    pub fn reset(&mut self) {
        if self.state.is_reset() {
            return;
        }
        tracing::debug!("resetting loader");
        self.cancel_inflight();
        if let Some(old) = self.cached.take() {
            self.source.discard(old);
        }
        self.content_changed = false;
        self.state = LifecycleState::Reset;
    }

    /// Clean up a (possibly partial) result produced by a cancelled load.
    ///
    /// Discards `data` if present; the cached slot is untouched.
    pub fn canceled(&mut self, data: Option<S::Output>) {
        if let Some(data) = data {
            tracing::debug!("discarding result from cancelled load");
            self.source.discard(data);
        }
    }

    /// Unconditionally trigger a new background load, superseding any load
    /// already in flight (a superseded load's result, if it still arrives,
    /// goes through the cancelled path).
    pub fn force_load(&mut self) {
        if self.state.is_reset() {
            tracing::warn!("force_load ignored: loader is reset");
            return;
        }
        self.spawn_load();
        if self.state.is_started() {
            self.state = LifecycleState::Loading;
        }
    }

    /// Note that the underlying content changed: reload immediately if
    /// started, otherwise remember to reload on the next start.
    pub fn notify_content_changed(&mut self) {
        if self.state.is_reset() {
            return;
        }
        if self.state.is_started() {
            tracing::debug!("content changed while started; reloading");
            self.force_load();
        } else {
            self.content_changed = true;
        }
    }

    /// Route a completion received from the completion channel.
    ///
    /// A completion from the current, uncancelled load is delivered; one
    /// from a cancelled or superseded load goes to [`Loader::canceled`].
    /// After reset it goes through [`Loader::deliver`], whose reset guard
    /// owns the cleanup.
    pub fn handle_completion(&mut self, completion: LoadCompletion<S::Output>) {
        let LoadCompletion { generation, value } = completion;

        let mut fresh = false;
        if let Some(inflight) = self.inflight.take() {
            if inflight.generation == generation {
                fresh = !inflight.cancel_requested;
            } else {
                // A newer load is in flight; this completion was superseded.
                self.inflight = Some(inflight);
            }
        }

        if fresh || self.state.is_reset() {
            self.deliver(value);
        } else {
            tracing::debug!(generation, "load was cancelled or superseded");
            self.canceled(value);
        }
    }

    /// Read and clear the content-changed flag.
    fn take_content_changed(&mut self) -> bool {
        std::mem::take(&mut self.content_changed)
    }

    fn spawn_load(&mut self) {
        self.cancel_inflight();
        self.generation += 1;
        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let completion_tx = self.completion_tx.clone();
        tracing::debug!(generation, "spawning background load");
        let handle = tokio::spawn(async move {
            let value = source.load().await;
            let _ = completion_tx.send(LoadCompletion { generation, value });
        });
        self.inflight = Some(InflightLoad {
            generation,
            handle,
            cancel_requested: false,
        });
    }

    fn cancel_inflight(&mut self) {
        if let Some(inflight) = self.inflight.as_mut() {
            if !inflight.cancel_requested {
                tracing::debug!(
                    generation = inflight.generation,
                    "requesting cancellation of in-flight load"
                );
                inflight.cancel_requested = true;
                inflight.handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Minimal source: never loads anything on its own, records discards.
    struct SlotSource {
        discarded: Mutex<Vec<String>>,
    }

    impl SlotSource {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                discarded: Mutex::new(Vec::new()),
            })
        }

        fn discarded(&self) -> Vec<String> {
            self.discarded.lock().unwrap().clone()
        }
    }

    impl LoadSource for SlotSource {
        type Output = Arc<String>;

        async fn load(&self) -> Option<Arc<String>> {
            None
        }

        fn discard(&self, result: Arc<String>) {
            self.discarded.lock().unwrap().push(result.as_str().to_string());
        }

        fn same_result(&self, a: &Arc<String>, b: &Arc<String>) -> bool {
            Arc::ptr_eq(a, b)
        }
    }

    fn value(label: &str) -> Arc<String> {
        Arc::new(label.to_string())
    }

    #[test]
    fn deliver_while_idle_caches_without_forwarding() {
        let source = SlotSource::new();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (mut loader, _completions) = Loader::new(source.clone(), event_tx);

        loader.deliver(Some(value("a")));

        assert_eq!(loader.state(), LifecycleState::Idle);
        assert_eq!(loader.cached().map(|v| v.as_str()), Some("a"));
        assert!(event_rx.try_recv().is_err(), "no observer, no event");
        assert!(source.discarded().is_empty());
    }

    #[test]
    fn deliver_none_clears_slot_and_discards_old() {
        let source = SlotSource::new();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (mut loader, _completions) = Loader::new(source.clone(), event_tx);

        loader.deliver(Some(value("a")));
        loader.deliver(None);

        assert!(loader.cached().is_none());
        assert_eq!(source.discarded(), vec!["a".to_string()]);
    }

    #[test]
    fn stop_before_start_moves_to_stopped() {
        let source = SlotSource::new();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (mut loader, _completions) = Loader::new(source, event_tx);

        loader.stop();
        assert_eq!(loader.state(), LifecycleState::Stopped);
    }

    #[test]
    fn reset_is_terminal() {
        let source = SlotSource::new();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (mut loader, _completions) = Loader::new(source, event_tx);

        loader.reset();
        loader.stop();
        assert_eq!(loader.state(), LifecycleState::Reset);
        loader.notify_content_changed();
        assert_eq!(loader.state(), LifecycleState::Reset);
    }

    #[tokio::test]
    async fn start_after_reset_spawns_nothing() {
        let source = SlotSource::new();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (mut loader, mut completions) = Loader::new(source, event_tx);

        loader.reset();
        loader.start();

        assert_eq!(loader.state(), LifecycleState::Reset);
        assert!(event_rx.try_recv().is_err());
        assert!(completions.try_recv().is_err());
    }
}
