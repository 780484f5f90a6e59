use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::{info, warn};

type Job = Box<dyn FnOnce() + Send>;

/// A long-lived serial worker: one named thread draining a job queue.
///
/// Jobs run strictly in submission order; `submit` never blocks the
/// caller. Dropping the executor drains the queue and joins the thread.
pub struct SerialExecutor {
    name: String,
    sender: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

/// Cheap cross-thread handle for submitting work to a [`SerialExecutor`].
#[derive(Clone)]
pub struct ExecutorHandle {
    sender: mpsc::Sender<Job>,
}

impl SerialExecutor {
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let thread_name = name.to_string();
        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                info!("executor '{thread_name}' starting");
                while let Ok(job) = receiver.recv() {
                    job();
                }
                info!("executor '{thread_name}' exiting");
            })
            .expect("failed to spawn executor thread");

        Self {
            name: name.to_string(),
            sender: Some(sender),
            thread: Some(thread),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> ExecutorHandle {
        ExecutorHandle {
            sender: self
                .sender
                .as_ref()
                .expect("executor already shut down")
                .clone(),
        }
    }

    /// Queue a job. Returns false after shutdown.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Close the queue and wait for queued jobs to finish.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("executor '{}' thread panicked", self.name);
            }
        }
    }
}

impl ExecutorHandle {
    /// Queue a job. Returns false if the executor has shut down.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.sender.send(Box::new(job)).is_ok()
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn jobs_run_in_submission_order() {
        let executor = SerialExecutor::new("test-serial");
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..10 {
            let log = Arc::clone(&log);
            executor.submit(move || log.lock().push(i));
        }
        drop(executor); // drains the queue
        assert_eq!(*log.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn handle_submits_from_another_thread() {
        let executor = SerialExecutor::new("test-handle");
        let handle = executor.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let submitter = {
            let count = Arc::clone(&count);
            std::thread::spawn(move || {
                for _ in 0..5 {
                    let count = Arc::clone(&count);
                    handle.submit(move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        };
        submitter.join().unwrap();
        drop(executor);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn submit_after_shutdown_returns_false() {
        let mut executor = SerialExecutor::new("test-shutdown");
        let handle = executor.handle();
        executor.shutdown();
        assert!(!executor.submit(|| {}));
        assert!(!handle.submit(|| {}));
    }

    #[test]
    fn shutdown_waits_for_queued_jobs() {
        let mut executor = SerialExecutor::new("test-drain");
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            executor.submit(move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        executor.shutdown();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn executor_thread_carries_the_given_name() {
        let executor = SerialExecutor::new("processing");
        let (tx, rx) = mpsc::channel();
        executor.submit(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });
        assert_eq!(rx.recv().unwrap().as_deref(), Some("processing"));
    }
}
