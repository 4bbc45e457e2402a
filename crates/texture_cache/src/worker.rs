use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(2),
        }
    }
}

/// Fixed pool of generation workers fed through an unbounded channel.
///
/// The in-flight count covers queued and running jobs, so `wait_idle`
/// returning means every submitted job has fully completed.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
    in_flight: Arc<InFlight>,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Self {
        assert!(
            config.worker_count > 0,
            "worker count must be greater than zero"
        );
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let in_flight = Arc::new(InFlight::default());
        let workers = (0..config.worker_count)
            .map(|index| {
                let receiver = receiver.clone();
                let in_flight = Arc::clone(&in_flight);
                thread::Builder::new()
                    .name(format!("texture-worker-{index}"))
                    .spawn(move || worker_loop(receiver, in_flight))
                    .expect("spawn texture worker thread")
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
            in_flight,
        }
    }

    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        self.in_flight.begin();
        self.sender
            .as_ref()
            .expect("worker pool already shut down")
            .send(Box::new(job))
            .expect("worker pool channel disconnected");
    }

    /// Block until no job is queued or running. Off the hot path: the one
    /// legitimate caller is teardown.
    pub fn wait_idle(&self) {
        self.in_flight.wait_drained();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                eprintln!("[texture_cache] worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop(receiver: Receiver<Job>, in_flight: Arc<InFlight>) {
    for job in receiver.iter() {
        // The guard decrements even if the job unwinds, so wait_idle can
        // never deadlock on a panicked job.
        let _completion = CompletionGuard(&in_flight);
        job();
    }
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    drained: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *self.count.lock().expect("in-flight counter poisoned") += 1;
    }

    fn finish(&self) {
        let mut count = self.count.lock().expect("in-flight counter poisoned");
        *count -= 1;
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    fn wait_drained(&self) {
        let mut count = self.count.lock().expect("in-flight counter poisoned");
        while *count > 0 {
            count = self
                .drained
                .wait(count)
                .expect("in-flight counter poisoned");
        }
    }
}

struct CompletionGuard<'a>(&'a InFlight);

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}
