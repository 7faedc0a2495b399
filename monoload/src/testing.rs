use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::events::{LoadCompletion, LoaderEvent};
use crate::loader::Loader;
use crate::source::LoadSource;
use crate::state::LifecycleState;

/// Value handle used by the test harness. Identity is `Arc::ptr_eq`, so two
/// handles with equal labels are still distinct results unless cloned.
pub type TestValue = Arc<String>;

/// Mock source for tests (no real background work)
///
/// Loads pop from a scripted result queue; discards are recorded in call
/// order so tests can assert exactly what was released, and when.
pub struct RecordingSource {
    results: Mutex<VecDeque<Option<TestValue>>>,
    discarded: Mutex<Vec<String>>,
    loads: AtomicUsize,
}

impl RecordingSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(VecDeque::new()),
            discarded: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
        })
    }

    /// Create a fresh result handle with the given label.
    pub fn value(label: &str) -> TestValue {
        Arc::new(label.to_string())
    }

    /// Script the outcome of the next background load.
    pub fn push_result(&self, value: Option<TestValue>) {
        self.results.lock().unwrap().push_back(value);
    }

    /// Labels of every discarded result, in discard order.
    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().unwrap().clone()
    }

    /// How many background loads have run.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl LoadSource for RecordingSource {
    type Output = TestValue;

    async fn load(&self) -> Option<TestValue> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        // An unscripted load produces "no result"
        self.results.lock().unwrap().pop_front().flatten()
    }

    fn discard(&self, result: TestValue) {
        self.discarded
            .lock()
            .unwrap()
            .push(result.as_str().to_string());
    }

    fn same_result(&self, a: &TestValue, b: &TestValue) -> bool {
        Arc::ptr_eq(a, b)
    }
}

/// Test driver owning a loader, its observer channel and its completion
/// channel, with helpers for deterministic pumping and assertions.
pub struct TestLoader {
    pub source: Arc<RecordingSource>,
    loader: Loader<RecordingSource>,
    event_rx: mpsc::UnboundedReceiver<LoaderEvent<TestValue>>,
    completion_rx: mpsc::UnboundedReceiver<LoadCompletion<TestValue>>,
}

impl TestLoader {
    pub fn new() -> Self {
        let source = RecordingSource::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (loader, completion_rx) = Loader::new(source.clone(), event_tx);
        Self {
            source,
            loader,
            event_rx,
            completion_rx,
        }
    }

    // Lifecycle passthroughs

    pub fn start(&mut self) {
        self.loader.start();
    }

    pub fn stop(&mut self) {
        self.loader.stop();
    }

    pub fn reset(&mut self) {
        self.loader.reset();
    }

    pub fn force_load(&mut self) {
        self.loader.force_load();
    }

    pub fn notify_content_changed(&mut self) {
        self.loader.notify_content_changed();
    }

    /// Deliver a value directly, as the host's re-delivery path would.
    pub fn deliver(&mut self, value: Option<TestValue>) {
        self.loader.deliver(value);
    }

    /// Feed a value through the cancelled-load path.
    pub fn canceled(&mut self, value: Option<TestValue>) {
        self.loader.canceled(value);
    }

    pub fn state(&self) -> LifecycleState {
        self.loader.state()
    }

    /// Label of the cached result, if any.
    pub fn cached_label(&self) -> Option<String> {
        self.loader.cached().map(|v| v.as_str().to_string())
    }

    /// Let spawned load tasks run to completion (current-thread test
    /// runtime: they only make progress while we yield).
    pub async fn run_tasks(&mut self) {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    /// Route every queued completion into the loader. Returns how many were
    /// routed.
    pub fn route_completions(&mut self) -> usize {
        let mut routed = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.loader.handle_completion(completion);
            routed += 1;
        }
        routed
    }

    /// Run spawned tasks, then route all completions.
    pub async fn settle(&mut self) {
        self.run_tasks().await;
        self.route_completions();
    }

    /// Take every event delivered to the observer so far.
    pub fn drain_events(&mut self) -> Vec<LoaderEvent<TestValue>> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Assert that nothing was forwarded to the observer.
    pub fn assert_no_events(&mut self) {
        let events = self.drain_events();
        assert!(
            events.is_empty(),
            "Expected no observer events, got {:?}",
            events
        );
    }

    /// Assert the exact sequence of discarded result labels.
    pub fn assert_discards(&self, expected: &[&str]) {
        let actual = self.source.discarded();
        assert_eq!(
            actual, expected,
            "Discard sequence mismatch (actual vs expected)"
        );
    }
}

impl Default for TestLoader {
    fn default() -> Self {
        Self::new()
    }
}
