use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Schedules nullary units of work. The cache treats this as an external
/// collaborator owned by the host; shutdown (draining in-flight jobs) is
/// the host's responsibility, not the cache's.
pub trait WorkerPool: Send + Sync {
    fn execute(&self, job: Job);
}

struct Shared {
    queue: Mutex<VecDeque<Job>>,
    condvar: Condvar,
    shutting_down: Mutex<bool>,
}

/// A small fixed-size OS-thread pool backed by a `Mutex<VecDeque>` +
/// `Condvar` queue. This is the trivial, swappable default the cache needs
/// to run standalone; the coalescing/cancellation design lives entirely in
/// the work shim layered on top, not here.
pub struct SimpleThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SimpleThreadPool {
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutting_down: Mutex::new(false),
        });

        let workers = (0..worker_count)
            .map(|idx| spawn_worker(idx, Arc::clone(&shared)))
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }
}

fn spawn_worker(idx: usize, shared: Arc<Shared>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("readthrough-cache-worker-{idx}"))
        .spawn(move || loop {
            let mut queue = shared.queue.lock().expect("worker queue lock poisoned");
            while queue.is_empty() && !*shared.shutting_down.lock().expect("shutdown flag poisoned") {
                queue = shared.condvar.wait(queue).expect("worker queue lock poisoned");
            }

            let job = queue.pop_front();
            drop(queue);

            match job {
                Some(job) => job(),
                None => {
                    if *shared.shutting_down.lock().expect("shutdown flag poisoned") {
                        return;
                    }
                }
            }
        })
        .expect("failed to spawn worker thread")
}

impl WorkerPool for SimpleThreadPool {
    fn execute(&self, job: Job) {
        self.shared
            .queue
            .lock()
            .expect("worker queue lock poisoned")
            .push_back(job);
        self.shared.condvar.notify_one();
    }
}

impl Drop for SimpleThreadPool {
    fn drop(&mut self) {
        *self.shared.shutting_down.lock().expect("shutdown flag poisoned") = true;
        self.shared.condvar.notify_all();

        let workers = std::mem::take(&mut *self.workers.lock().expect("workers lock poisoned"));
        for worker in workers {
            let _ = worker.join();
        }
    }
}
