//! # Disk Scheduler
//!
//! Asynchronous request queue in front of a [`DiskManager`]. Callers enqueue
//! [`DiskRequest`]s and wait on the attached [`Completion`]; a single
//! background worker drains the queue in FIFO order, which preserves program
//! order for back-to-back requests against the same page.
//!
//! ## Request Flow
//!
//! ```text
//! let completion = scheduler.create_completion();
//! scheduler.schedule(DiskRequest {
//!     is_write: false,
//!     data: zeroed_page(),
//!     page_id,
//!     completion: completion.clone(),
//! });
//! let page = completion.wait()?;   // filled buffer, or the I/O error
//! ```
//!
//! Buffers travel by value: a read resolves the completion with the filled
//! buffer, a write resolves it with the reusable buffer once the write has
//! landed. I/O failures resolve the completion with the error, so the waiter
//! observes exactly what the backend reported.
//!
//! ## Shutdown
//!
//! Dropping the scheduler enqueues a shutdown sentinel and joins the worker,
//! so every request scheduled before the drop is fully processed first.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use eyre::Result;
use parking_lot::{Condvar, Mutex};

use super::{DiskManager, PageData, PageId};

/// A single I/O request against the backing store.
pub struct DiskRequest {
    /// `true` for a write, `false` for a read.
    pub is_write: bool,
    /// Owned page buffer: the payload of a write, the destination of a read.
    pub data: PageData,
    /// Target page.
    pub page_id: PageId,
    /// Signal fulfilled by the worker once the request has been processed.
    pub completion: Completion,
}

struct CompletionState {
    slot: Mutex<Option<Result<PageData>>>,
    ready: Condvar,
}

/// One-shot signal carrying the outcome of a [`DiskRequest`].
///
/// Cloned once into the request; the consumer side blocks in [`wait`] until
/// the worker fulfils it with [`complete`].
///
/// [`wait`]: Completion::wait
/// [`complete`]: Completion::complete
#[derive(Clone)]
pub struct Completion {
    state: Arc<CompletionState>,
}

impl Completion {
    fn new() -> Self {
        Self {
            state: Arc::new(CompletionState {
                slot: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Fulfils the signal. A second fulfilment of the same completion is a
    /// caller bug.
    pub fn complete(&self, result: Result<PageData>) {
        let mut slot = self.state.slot.lock();
        debug_assert!(slot.is_none(), "completion fulfilled twice");
        *slot = Some(result);
        self.state.ready.notify_all();
    }

    /// Blocks until the signal is fulfilled and takes the result.
    pub fn wait(&self) -> Result<PageData> {
        let mut slot = self.state.slot.lock();
        while slot.is_none() {
            self.state.ready.wait(&mut slot);
        }
        slot.take().expect("completion slot checked non-empty")
    }
}

/// Background I/O executor shared by the buffer pool.
pub struct DiskScheduler {
    request_tx: mpsc::Sender<Option<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
    disk_manager: Arc<dyn DiskManager>,
}

impl DiskScheduler {
    /// Spawns the worker thread draining the request queue against
    /// `disk_manager`.
    pub fn new(disk_manager: Arc<dyn DiskManager>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<Option<DiskRequest>>();

        let worker_dm = Arc::clone(&disk_manager);
        let worker = thread::Builder::new()
            .name("kilndb-disk-io".into())
            .spawn(move || Self::worker_loop(&request_rx, &*worker_dm))
            .expect("failed to spawn disk scheduler worker");

        Self {
            request_tx,
            worker: Some(worker),
            disk_manager,
        }
    }

    fn worker_loop(request_rx: &mpsc::Receiver<Option<DiskRequest>>, dm: &dyn DiskManager) {
        // `None` is the shutdown sentinel sent from Drop.
        while let Ok(Some(mut request)) = request_rx.recv() {
            let result = if request.is_write {
                dm.write_page(request.page_id, &request.data)
            } else {
                dm.read_page(request.page_id, &mut request.data)
            };
            request.completion.complete(result.map(|()| request.data));
        }
    }

    /// Produces a fresh one-shot signal for a request.
    pub fn create_completion(&self) -> Completion {
        Completion::new()
    }

    /// Enqueues `request` for the background worker.
    pub fn schedule(&self, request: DiskRequest) {
        self.request_tx
            .send(Some(request))
            .expect("disk scheduler worker has shut down");
    }

    /// The backing store this scheduler drains into.
    pub fn disk_manager(&self) -> &Arc<dyn DiskManager> {
        &self.disk_manager
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Queued requests are processed before the sentinel is reached.
        let _ = self.request_tx.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
