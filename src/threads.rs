//! Shared execution machinery for the multi-threaded scan strategies: a
//! scoped fixed-size worker runner, a mutex-guarded row cursor, and a FIFO
//! job queue with the idle-count termination rule (all workers waiting and
//! nothing queued means no job can ever appear again).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::thread;

pub fn default_thread_count() -> usize {
    num_cpus::get_physical()
}

/// Run `n` copies of a worker body on scoped threads and join them all.
pub fn run_workers<F>(n: usize, body: F)
where
    F: Fn(usize) + Send + Sync,
{
    let body = &body;
    thread::scope(|scope| {
        for worker in 0..n {
            scope.spawn(move || body(worker));
        }
    });
}

/// Hands out row indices with a fixed stride; workers pull until exhausted.
pub struct RowCursor {
    next: Mutex<usize>,
    step: usize,
    limit: usize,
}

impl RowCursor {
    pub fn new(step: usize, limit: usize) -> Self {
        Self {
            next: Mutex::new(0),
            step,
            limit,
        }
    }

    pub fn next(&self) -> Option<usize> {
        let mut next = self.next.lock().unwrap();
        if *next >= self.limit {
            return None;
        }
        let row = *next;
        *next += self.step;
        Some(row)
    }
}

struct QueueState<T> {
    jobs: VecDeque<T>,
    idle: usize,
    done: bool,
}

/// FIFO work queue for workers that may themselves enqueue more work.
/// Terminates when every worker is idle and the queue is empty, or when
/// closed explicitly (cancellation).
pub struct JobQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    workers: usize,
}

impl<T> JobQueue<T> {
    pub fn new(workers: usize) -> Self {
        assert!(workers > 0, "queue needs at least one worker");
        Self {
            state: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                idle: 0,
                done: false,
            }),
            available: Condvar::new(),
            workers,
        }
    }

    pub fn push(&self, job: T) {
        let mut state = self.state.lock().unwrap();
        if state.done {
            return;
        }
        state.jobs.push_back(job);
        drop(state);
        self.available.notify_one();
    }

    /// Block until a job is available or the queue terminates.
    pub fn next(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.done {
                return None;
            }
            state.idle += 1;
            if state.idle == self.workers {
                state.done = true;
                drop(state);
                self.available.notify_all();
                return None;
            }
            state = self.available.wait(state).unwrap();
            state.idle -= 1;
        }
    }

    /// Abort outstanding work; waiting workers return `None`.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.done = true;
        state.jobs.clear();
        drop(state);
        self.available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn row_cursor_strides() {
        let cursor = RowCursor::new(4, 10);
        let rows: Vec<usize> = std::iter::from_fn(|| cursor.next()).collect();
        assert_eq!(rows, vec![0, 4, 8]);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn queue_drains_and_terminates() {
        let queue = JobQueue::new(4);
        for i in 0..100 {
            queue.push(i);
        }
        let seen = AtomicUsize::new(0);
        run_workers(4, |_| {
            while let Some(_job) = queue.next() {
                seen.fetch_add(1, Ordering::Relaxed);
            }
        });
        assert_eq!(seen.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn workers_can_enqueue_recursively() {
        // each job below 64 spawns two children; total = nodes of a binary
        // tree rooted at 1
        let queue = JobQueue::new(3);
        queue.push(1usize);
        let seen = AtomicUsize::new(0);
        run_workers(3, |_| {
            while let Some(job) = queue.next() {
                seen.fetch_add(1, Ordering::Relaxed);
                if job < 64 {
                    queue.push(job * 2);
                    queue.push(job * 2 + 1);
                }
            }
        });
        assert_eq!(seen.load(Ordering::Relaxed), 127);
    }

    #[test]
    fn close_releases_waiters() {
        let queue: JobQueue<usize> = JobQueue::new(8);
        run_workers(2, |worker| {
            if worker == 0 {
                queue.close();
            } else {
                assert_eq!(queue.next(), None);
            }
        });
    }
}
