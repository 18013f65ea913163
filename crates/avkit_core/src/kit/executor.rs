//! Fixed-size worker pool for asynchronous sessions.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted jobs on `size` worker threads, in submission order.
///
/// The pool size is the number of sessions that may run at the same time.
pub struct Executor {
    size: usize,
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .filter_map(|index| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("avkit-worker-{}", index))
                    .spawn(move || worker_loop(&receiver))
                    .map_err(|e| tracing::error!("Failed to start worker thread: {}", e))
                    .ok()
            })
            .collect();

        Self {
            size,
            sender: Some(sender),
            workers,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job. Returns `false` when the pool is shut down.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs and let workers drain the queue in the background.
    pub fn shutdown(&mut self) {
        self.sender = None;
        self.workers.clear();
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub fn join(mut self) {
        self.sender = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
    loop {
        let job = receiver.lock().recv();
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
