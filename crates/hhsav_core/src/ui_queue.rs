//! Marshals work from helper threads onto the single UI thread.
//!
//! Closures receive `&mut C`, the UI-side state, when the UI thread drains
//! the queue. Worker threads only ever hold a [`UiHandle`] and an owned
//! [`SaveDocument::snapshot`](crate::SaveDocument::snapshot), never the live
//! document. The CLI runs its file writes this way.
//!
//! [`LiveValidationThrottle`] is for an embedding GUI that validates while
//! the user types. The CLI receives each replacement whole, so it has no
//! keystroke bursts to coalesce.

use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;

type Job<C> = Box<dyn FnOnce(&mut C) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("UI queue is closed")]
pub struct QueueClosed;

pub struct UiQueue<C> {
    tx: Sender<Job<C>>,
    rx: Receiver<Job<C>>,
}

pub struct UiHandle<C> {
    tx: Sender<Job<C>>,
}

impl<C> Clone for UiHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> Default for UiQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> UiQueue<C> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> UiHandle<C> {
        UiHandle {
            tx: self.tx.clone(),
        }
    }

    /// Runs every queued callback in order; returns how many ran.
    pub fn run_pending(&self, ctx: &mut C) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(ctx);
            ran += 1;
        }
        ran
    }
}

impl<C: 'static> UiHandle<C> {
    /// Queues `f` for the UI thread. With `wait`, blocks until it has run.
    ///
    /// Never call with `wait` from the UI thread itself: it would wait on
    /// a queue nobody drains.
    pub fn schedule<F>(&self, f: F, wait: bool) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        if !wait {
            return self.tx.send(Box::new(f)).map_err(|_| QueueClosed);
        }
        let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);
        self.tx
            .send(Box::new(move |ctx: &mut C| {
                f(ctx);
                let _ = done_tx.send(());
            }))
            .map_err(|_| QueueClosed)?;
        done_rx.recv().map_err(|_| QueueClosed)
    }
}

/// Coalesces keystroke bursts so at most one live validation is pending.
#[derive(Debug, Default)]
pub struct LiveValidationThrottle {
    pending: bool,
    coalesced: u64,
}

impl LiveValidationThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call on each keystroke. Returns `true` when a validation should be
    /// scheduled, `false` when one is already waiting.
    pub fn request(&mut self) -> bool {
        if self.pending {
            self.coalesced += 1;
            return false;
        }
        self.pending = true;
        true
    }

    /// Call when the scheduled validation fires.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::{LiveValidationThrottle, QueueClosed, UiQueue};
    use crate::SaveDocument;
    use crate::document::path::DocPath;

    #[test]
    fn callbacks_run_in_order_on_drain() {
        let queue: UiQueue<Vec<u32>> = UiQueue::new();
        let handle = queue.handle();
        handle.schedule(|v| v.push(1), false).expect("queued");
        handle.schedule(|v| v.push(2), false).expect("queued");
        let mut state = Vec::new();
        assert_eq!(queue.run_pending(&mut state), 2);
        assert_eq!(state, [1, 2]);
        assert_eq!(queue.run_pending(&mut state), 0);
    }

    #[test]
    fn waiting_worker_resumes_after_ui_runs_callback() {
        let queue: UiQueue<Vec<&'static str>> = UiQueue::new();
        let handle = queue.handle();
        let worker = thread::spawn(move || handle.schedule(|v| v.push("from worker"), true));

        let mut state = Vec::new();
        while state.is_empty() {
            queue.run_pending(&mut state);
            thread::yield_now();
        }
        assert_eq!(worker.join().expect("worker"), Ok(()));
        assert_eq!(state, ["from worker"]);
    }

    #[test]
    fn worker_reads_a_snapshot_not_the_live_document() {
        let mut doc = SaveDocument::new(json!({"User": {"name": "Dana"}}));
        let queue: UiQueue<Vec<String>> = UiQueue::new();
        let handle = queue.handle();
        let snapshot = doc.snapshot();
        doc.set(&DocPath::root().child("User").child("name"), json!("Eve"))
            .expect("set should succeed");

        let worker = thread::spawn(move || {
            let name = snapshot["User"]["name"].as_str().unwrap_or_default().to_string();
            handle.schedule(move |names| names.push(name), false)
        });
        assert_eq!(worker.join().expect("worker"), Ok(()));

        let mut names = Vec::new();
        assert_eq!(queue.run_pending(&mut names), 1);
        assert_eq!(names, ["Dana"]);
        assert_eq!(doc.root()["User"]["name"], "Eve");
    }

    #[test]
    fn dropped_queue_reports_closed() {
        let queue: UiQueue<()> = UiQueue::new();
        let handle = queue.handle();
        drop(queue);
        assert_eq!(handle.schedule(|_| {}, false), Err(QueueClosed));
    }

    #[test]
    fn throttle_coalesces_bursts() {
        let mut throttle = LiveValidationThrottle::new();
        assert!(throttle.request());
        assert!(!throttle.request());
        assert!(!throttle.request());
        assert_eq!(throttle.coalesced(), 2);
        assert!(throttle.take());
        assert!(!throttle.take());
        assert!(throttle.request());
    }
}
