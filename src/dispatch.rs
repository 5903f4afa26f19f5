// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Asynchronous delivery of notification callbacks.
//!
//! A [`Dispatcher`] decouples the thread that mutates a collection from the thread that runs
//! observer callbacks. Callbacks are handed to a [`DispatchContext`]:
//!
//! - If the caller supplies one (for example a [`QueueContext`] pumped by a UI thread),
//!   callbacks are marshaled onto it and run with that context's ordering guarantees.
//! - Otherwise callbacks run on a shared [`BackgroundContext`] worker thread.
//!
//! Posting never waits for the callback to run. A callback that panics is caught by the
//! context; it never reaches the poster and never takes the dispatch thread down with it.

use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, OnceLock, mpsc},
    thread,
};

/// A unit of work posted to a [`DispatchContext`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Storage taken out of a collection that still needs to be dropped.
pub type Retired = Box<dyn Send>;

/// An execution context that runs posted jobs, typically on a single thread.
pub trait DispatchContext: Send + Sync {
    /// Schedules `job` to run. Must not run `job` synchronously while blocking the poster on
    /// anything other than the enqueueing itself.
    fn post(&self, job: Job);
}

/// Runs a job, turning a panic into a log record.
fn run_isolated(job: Job) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
        tracing::error!(
            panic = %panic_message(panic.as_ref()),
            "dispatched job panicked"
        );
    }
}

/// Extracts the message of a caught panic payload, if it has one.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// A context backed by one dedicated worker thread.
///
/// Jobs run in the order they were posted. The worker exits once the context is dropped and
/// all queued jobs have run.
pub struct BackgroundContext {
    sender: mpsc::Sender<Job>,
}

impl BackgroundContext {
    /// Spawns a new worker thread with the given name.
    pub fn spawn(name: impl Into<String>) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();
        thread::Builder::new().name(name.into()).spawn(move || {
            for job in receiver {
                run_isolated(job);
            }
        })?;
        Ok(Self { sender })
    }

    /// The process-wide worker used by collections that were not given a context.
    pub fn shared() -> Arc<dyn DispatchContext> {
        static SHARED: OnceLock<Arc<dyn DispatchContext>> = OnceLock::new();
        let shared = SHARED.get_or_init(|| -> Arc<dyn DispatchContext> {
            match BackgroundContext::spawn("collection-dispatch") {
                Ok(context) => Arc::new(context),
                Err(error) => {
                    tracing::error!(%error, "could not spawn dispatch worker; delivering inline");
                    Arc::new(InlineContext)
                }
            }
        });
        Arc::clone(shared)
    }
}

impl DispatchContext for BackgroundContext {
    fn post(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("dispatch worker has exited; dropping job");
        }
    }
}

impl fmt::Debug for BackgroundContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundContext").finish_non_exhaustive()
    }
}

/// Runs jobs immediately on the posting thread.
///
/// Only used when no worker thread can be spawned.
pub(crate) struct InlineContext;

impl DispatchContext for InlineContext {
    fn post(&self, job: Job) {
        run_isolated(job);
    }
}

/// A single-threaded context whose owner decides when jobs run.
///
/// Posted jobs are queued in FIFO order until the owning thread calls
/// [`QueueContext::run_pending`]. This mirrors a UI event loop and makes delivery fully
/// deterministic, which is also what makes it useful in tests.
#[derive(Default)]
pub struct QueueContext {
    jobs: Mutex<VecDeque<Job>>,
}

impl QueueContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs queued jobs on the calling thread until the queue is empty, including jobs posted
    /// while running. Returns how many jobs ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // the lock must not be held while a job runs, jobs may post more jobs
            let next = self.jobs.lock().pop_front();
            let Some(job) = next else {
                return ran;
            };
            run_isolated(job);
            ran += 1;
        }
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.jobs.lock().len()
    }
}

impl DispatchContext for QueueContext {
    fn post(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }
}

impl fmt::Debug for QueueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueContext")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Posts callbacks onto a [`DispatchContext`].
#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<dyn DispatchContext>,
}

impl Dispatcher {
    /// Creates a dispatcher for `context`, or for the shared background worker if `None`.
    pub fn new(context: Option<Arc<dyn DispatchContext>>) -> Self {
        Self {
            context: context.unwrap_or_else(BackgroundContext::shared),
        }
    }

    /// Creates a dispatcher that delivers onto `context`.
    pub fn with_context(context: Arc<dyn DispatchContext>) -> Self {
        Self { context }
    }

    /// Schedules `callback`; returns without waiting for it to run.
    pub fn post(&self, callback: impl FnOnce() + Send + 'static) {
        self.context.post(Box::new(callback));
    }

    /// Schedules `callback` to run with `payload`.
    pub fn post_with<P>(&self, callback: impl FnOnce(P) + Send + 'static, payload: P)
    where
        P: Send + 'static,
    {
        self.post(move || callback(payload));
    }

    /// Drops `storage` on the shared background worker.
    ///
    /// Large storage is released off the mutating thread and outside any collection lock.
    /// Bypasses the delivery context, which may be a UI thread.
    pub(crate) fn retire(&self, storage: Retired) {
        BackgroundContext::shared().post(Box::new(move || drop(storage)));
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn queue_context_runs_in_post_order() {
        let queue = QueueContext::new();
        let dispatcher = Dispatcher::with_context(queue.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            dispatcher.post_with(move |i| seen.lock().push(i), i);
        }
        assert!(seen.lock().is_empty(), "nothing runs until pumped");
        assert_eq!(queue.pending(), 5);
        assert_eq!(queue.run_pending(), 5);
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn queue_context_runs_jobs_posted_by_jobs() {
        let queue = QueueContext::new();
        let dispatcher = Dispatcher::with_context(queue.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (inner_seen, inner_dispatcher) = (Arc::clone(&seen), dispatcher.clone());
        dispatcher.post(move || {
            inner_seen.lock().push("outer");
            let seen = Arc::clone(&inner_seen);
            inner_dispatcher.post(move || seen.lock().push("inner"));
        });
        assert_eq!(queue.run_pending(), 2);
        assert_eq!(*seen.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn panicking_job_does_not_stop_the_queue() {
        let queue = QueueContext::new();
        let dispatcher = Dispatcher::with_context(queue.clone());
        let seen = Arc::new(Mutex::new(0));
        dispatcher.post(|| panic!("observer bug"));
        let counter = Arc::clone(&seen);
        dispatcher.post(move || *counter.lock() += 1);
        assert_eq!(queue.run_pending(), 2);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn background_worker_survives_panics_and_keeps_order() {
        let context = BackgroundContext::spawn("test-dispatch").unwrap();
        let dispatcher = Dispatcher::with_context(Arc::new(context));
        let (tx, rx) = mpsc::channel();
        dispatcher.post(|| panic!("observer bug"));
        for i in 0..3 {
            let tx = tx.clone();
            dispatcher.post(move || tx.send(i).unwrap());
        }
        let received: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(received, vec![0, 1, 2]);
    }

    #[test]
    fn default_dispatcher_delivers_in_background() {
        let dispatcher = Dispatcher::default();
        let (tx, rx) = mpsc::channel();
        dispatcher.post(move || tx.send(thread::current().id()).unwrap());
        let ran_on = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(ran_on, thread::current().id());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload = catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
        let payload = catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
