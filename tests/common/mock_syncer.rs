//! Recording syncer factory.
//!
//! Records every `SyncerRequest` and tracks how many syncers run at once,
//! so tests can assert that an applier never has two live workers.

use replication_applier::syncer::SyncFuture;
use replication_applier::{
    ApplierError, ApplierHandle, BatchProgress, ErrorCode, Syncer, SyncerFactory, SyncerRequest,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the next built syncer does.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Sleep through `wait` until stopped.
    Idle,
    /// Report each batch, then idle.
    Batches(Vec<BatchProgress>),
    /// Return this error immediately.
    Fail(ErrorCode, &'static str),
    Panic(&'static str),
    /// Return `Ok(())` immediately.
    Exit,
    /// Block for the duration without looking at the stop signal.
    Uninterruptible(Duration),
}

#[derive(Default)]
struct Counters {
    running: AtomicUsize,
    max_running: AtomicUsize,
    runs: AtomicUsize,
}

/// Decrements the running count on drop, including on panic.
struct RunGuard(Arc<Counters>);

impl RunGuard {
    fn enter(counters: Arc<Counters>) -> Self {
        let now = counters.running.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_running.fetch_max(now, Ordering::SeqCst);
        counters.runs.fetch_add(1, Ordering::SeqCst);
        Self(counters)
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct RecordingFactory {
    behavior: Mutex<Behavior>,
    /// Panic message for the next `build`, consumed once.
    build_panic: Mutex<Option<&'static str>>,
    requests: Mutex<Vec<SyncerRequest>>,
    counters: Arc<Counters>,
}

impl RecordingFactory {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            build_panic: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn idle() -> Arc<Self> {
        Self::new(Behavior::Idle)
    }

    /// Change the behaviour of syncers built from now on.
    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Make the next `build` call panic instead of returning a syncer.
    pub fn panic_on_next_build(&self, message: &'static str) {
        *self.build_panic.lock().unwrap() = Some(message);
    }

    pub fn requests(&self) -> Vec<SyncerRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<SyncerRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn built(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn running(&self) -> usize {
        self.counters.running.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.counters.max_running.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.counters.runs.load(Ordering::SeqCst)
    }
}

impl SyncerFactory for RecordingFactory {
    fn build(&self, request: SyncerRequest) -> Box<dyn Syncer> {
        let build_panic = self.build_panic.lock().unwrap().take();
        if let Some(message) = build_panic {
            panic!("{}", message);
        }
        self.requests.lock().unwrap().push(request);
        Box::new(ScriptedSyncer {
            behavior: self.behavior.lock().unwrap().clone(),
            counters: Arc::clone(&self.counters),
        })
    }
}

struct ScriptedSyncer {
    behavior: Behavior,
    counters: Arc<Counters>,
}

async fn idle(applier: &ApplierHandle) -> Result<(), ApplierError> {
    while applier.wait(Duration::from_millis(50)).await {}
    Err(ApplierError::Stopped)
}

impl Syncer for ScriptedSyncer {
    fn run(self: Box<Self>, applier: ApplierHandle) -> SyncFuture {
        Box::pin(async move {
            let _guard = RunGuard::enter(Arc::clone(&self.counters));
            match self.behavior {
                Behavior::Idle => idle(&applier).await,
                Behavior::Batches(batches) => {
                    for batch in batches {
                        applier.record_batch(batch).await?;
                    }
                    idle(&applier).await
                }
                Behavior::Fail(code, message) => Err(ApplierError::syncer(code, message)),
                Behavior::Panic(message) => panic!("{}", message),
                Behavior::Exit => Ok(()),
                Behavior::Uninterruptible(duration) => {
                    tokio::time::sleep(duration).await;
                    Err(ApplierError::Stopped)
                }
            }
        })
    }
}
