use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

type Job = Box<dyn FnOnce() -> bool + Send + 'static>;

struct JobState {
    done: bool,
    result: bool,
}

/// A handle to a single submitted job. Dropping it without calling
/// [`JobHandle::wait`] is fine — the job still runs to completion, it
/// just can't be waited on afterwards.
pub struct JobHandle {
    state: Arc<(Mutex<JobState>, Condvar)>,
    handle_id: u64,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.handle_id
    }

    /// `thread_success` in spec terms: blocks until the job completes and
    /// returns whatever `bool` it returned.
    pub fn wait(&self) -> bool {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock();
        while !state.done {
            cvar.wait(&mut state);
        }
        state.result
    }

    /// `thread_finished` in spec terms: non-blocking completion check.
    pub fn is_done(&self) -> bool {
        self.state.0.lock().done
    }
}

struct Shared {
    pending: AtomicUsize,
    /// Sticky: once any job returns `false`, stays `false` until the pool
    /// is dropped. Mirrors the original's latched failure state — the
    /// pool itself never panics or cancels running work on a failure.
    all_succeeded: AtomicBool,
    idle_mutex: Mutex<()>,
    idle_cvar: Condvar,
}

/// A fixed-size worker thread pool.
///
/// Jobs are pushed onto a shared queue; any idle worker pops the next one.
/// [`ThreadPool::wait_for_idle`] blocks until every submitted job (not just
/// those submitted so far at call time, but any still in flight) has
/// completed, mirroring the original's pool-wide barrier used at the end
/// of each frame.
pub struct ThreadPool {
    sender: crossbeam_channel::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    next_handle_id: AtomicU64,
}

impl ThreadPool {
    /// Spawns `num_workers` worker threads. `num_workers` is clamped to at
    /// least 1.
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let shared = Arc::new(Shared {
            pending: AtomicUsize::new(0),
            all_succeeded: AtomicBool::new(true),
            idle_mutex: Mutex::new(()),
            idle_cvar: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(num_workers);
        for worker_index in 0..num_workers {
            let receiver = receiver.clone();
            let shared = shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("glint-worker-{worker_index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if !job() {
                            shared.all_succeeded.store(false, Ordering::SeqCst);
                        }
                        if shared.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                            let _guard = shared.idle_mutex.lock();
                            shared.idle_cvar.notify_all();
                        }
                    }
                })
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        Self {
            sender,
            workers,
            shared,
            next_handle_id: AtomicU64::new(1),
        }
    }

    /// Submits a job returning success/failure, yielding a handle with a
    /// monotonically-increasing id that can be individually waited on via
    /// [`JobHandle::wait`].
    pub fn submit<F>(&self, job: F) -> JobHandle
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        let handle_id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new((
            Mutex::new(JobState {
                done: false,
                result: false,
            }),
            Condvar::new(),
        ));
        let state_for_job = state.clone();
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        let wrapped: Job = Box::new(move || {
            let result = job();
            let (lock, cvar) = &*state_for_job;
            {
                let mut guard = lock.lock();
                guard.done = true;
                guard.result = result;
            }
            cvar.notify_all();
            result
        });
        self.sender
            .send(wrapped)
            .expect("thread pool workers are gone");
        JobHandle { state, handle_id }
    }

    /// Submits a job without needing a handle; fire-and-forget. Its
    /// return value still feeds into [`ThreadPool::wait_for_idle`]'s
    /// sticky success flag.
    pub fn submit_detached<F>(&self, job: F)
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        let _ = self.submit(job);
    }

    /// Blocks the calling thread until no jobs are pending or in flight.
    /// Returns `true` iff every job submitted so far returned `true`; the
    /// failure flag is sticky and is not reset between calls.
    pub fn wait_for_idle(&self) -> bool {
        let mut guard = self.shared.idle_mutex.lock();
        while self.shared.pending.load(Ordering::Acquire) != 0 {
            self.shared.idle_cvar.wait(&mut guard);
        }
        self.shared.all_succeeded.load(Ordering::SeqCst)
    }

    /// Non-blocking poll of a handle's completion (`thread_finished` in
    /// spec terms).
    pub fn thread_finished(&self, handle: &JobHandle) -> bool {
        handle.is_done()
    }

    /// Blocks until `handle`'s job completes and returns its result
    /// (`thread_success` in spec terms).
    pub fn thread_success(&self, handle: &JobHandle) -> bool {
        handle.wait()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.wait_for_idle();
        // Dropping `sender` after the last clone closes the channel; workers
        // observe `recv()` return `Err` and exit their loop.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn submitted_jobs_all_run() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicI32::new(0));
        for _ in 0..100 {
            let counter = counter.clone();
            pool.submit_detached(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            });
        }
        assert!(pool.wait_for_idle());
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn job_handle_waits_for_its_own_job() {
        let pool = ThreadPool::new(2);
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag_clone = flag.clone();
        let handle = pool.submit(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            flag_clone.store(true, Ordering::SeqCst);
            true
        });
        assert!(handle.wait());
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn job_handle_ids_are_monotonically_increasing() {
        let pool = ThreadPool::new(2);
        let h1 = pool.submit(|| true);
        let h2 = pool.submit(|| true);
        assert!(h2.id() > h1.id());
        h1.wait();
        h2.wait();
    }

    #[test]
    fn a_failing_job_sticks_wait_for_idle_to_false() {
        let pool = ThreadPool::new(2);
        pool.submit_detached(|| true);
        pool.submit_detached(|| false);
        assert!(!pool.wait_for_idle());
    }

    #[test]
    fn thread_finished_polls_without_blocking() {
        let pool = ThreadPool::new(1);
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let handle = pool.submit(move || {
            rx.recv().ok();
            true
        });
        assert!(!pool.thread_finished(&handle));
        tx.send(()).unwrap();
        assert!(pool.thread_success(&handle));
    }
}
