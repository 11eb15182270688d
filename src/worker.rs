// This file is part of msg-router.
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! The parallel worker pool and the single timer thread.
//!
//! Dispatch (`stub.transmit`) runs on the worker pool so that a slow or
//! blocking transport never stalls the caller's `route()`. A single
//! dedicated thread owns every timer in the router: the queue sweeper
//! and every in-flight backoff retry. We use real OS threads rather than
//! an async runtime's bounded blocking-task pool for the same reason the
//! teacher avoids `async_std::task::spawn_blocking` for its long-running
//! threads: these run for the lifetime of the router, not as one-off
//! blocking calls, and should not compete with a pool sized for the
//! latter.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use threadpool::ThreadPool;

/// Runs `stub.transmit` calls (and anything else the router hands off)
/// off the caller's thread. `ThreadPool` is internally an `Arc`, so
/// cloning a `DispatchPool` shares the same worker set.
#[derive(Clone)]
pub struct DispatchPool {
    pool: ThreadPool,
}

impl DispatchPool {
    pub fn new(workers: usize) -> Self {
        DispatchPool {
            pool: ThreadPool::new(workers.max(1)),
        }
    }

    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.execute(job);
    }

    pub fn join(&self) {
        self.pool.join();
    }

    /// Wait up to `timeout` for every queued and in-flight job to finish.
    /// Returns `false` on timeout; jobs already handed to a worker keep
    /// running in the background regardless; there is no safe way to
    /// cancel a live OS thread.
    pub fn join_with_timeout(&self, timeout: Duration) -> bool {
        let pool = self.pool.clone();
        let (tx, rx) = bounded(1);
        std::thread::spawn(move || {
            pool.join();
            let _ = tx.send(());
        });
        rx.recv_timeout(timeout).is_ok()
    }
}

type TimerJob = Box<dyn FnOnce() + Send>;

enum TimerMsg {
    Schedule(Instant, TimerJob),
    Shutdown,
}

struct ScheduledJob {
    at: Instant,
    seq: u64,
    job: TimerJob,
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}
impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the *soonest* deadline
        // sorts first.
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A handle to the dedicated timer thread. `shutdown` takes `&self` and
/// is idempotent (a second call is a no-op) so a `Scheduler` can live
/// behind an `Arc` alongside the rest of the router's state.
pub struct Scheduler {
    tx: Sender<TimerMsg>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn start() -> Self {
        let (tx, rx): (Sender<TimerMsg>, Receiver<TimerMsg>) = bounded(1024);

        let handle = std::thread::Builder::new()
            .name("router-timer".to_string())
            .spawn(move || run_timer_loop(rx))
            .expect("failed to spawn timer thread");

        Scheduler {
            tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Run `job` once, at or after `at`. Ordering between jobs with
    /// identical deadlines follows scheduling order.
    pub fn schedule_at<F>(&self, at: Instant, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(TimerMsg::Schedule(at, Box::new(job)));
    }

    pub fn schedule_after<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, job);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(TimerMsg::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer_loop(rx: Receiver<TimerMsg>) {
    let mut heap: BinaryHeap<ScheduledJob> = BinaryHeap::new();
    let mut seq: u64 = 0;

    loop {
        let timeout = match heap.peek() {
            Some(next) => next
                .at
                .checked_duration_since(Instant::now())
                .unwrap_or(Duration::from_millis(0)),
            None => Duration::from_secs(3600),
        };

        match rx.recv_timeout(timeout) {
            Ok(TimerMsg::Schedule(at, job)) => {
                heap.push(ScheduledJob { at, seq, job });
                seq += 1;
            }
            Ok(TimerMsg::Shutdown) => return,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                while let Some(next) = heap.peek() {
                    if next.at > now {
                        break;
                    }
                    if let Some(due) = heap.pop() {
                        (due.job)();
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Jitter an exponential backoff delay by `+/- fraction`.
pub fn jittered(delay: Duration, fraction: f64) -> Duration {
    use rand::Rng;
    let fraction = fraction.clamp(0.0, 1.0);
    let factor = 1.0 + rand::thread_rng().gen_range(-fraction..=fraction);
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AOrd};
    use std::sync::Arc;

    #[test]
    fn dispatch_pool_runs_jobs() {
        let pool = DispatchPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, AOrd::SeqCst);
            });
        }

        pool.join();
        assert_eq!(counter.load(AOrd::SeqCst), 10);
    }

    #[test]
    fn scheduler_runs_jobs_in_deadline_order() {
        let scheduler = Scheduler::start();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let o1 = order.clone();
        scheduler.schedule_after(Duration::from_millis(30), move || o1.lock().push(1));
        let o2 = order.clone();
        scheduler.schedule_after(Duration::from_millis(10), move || o2.lock().push(2));
        let o3 = order.clone();
        scheduler.schedule_after(Duration::from_millis(20), move || o3.lock().push(3));

        std::thread::sleep(Duration::from_millis(60));
        scheduler.shutdown();

        assert_eq!(*order.lock(), vec![2, 3, 1]);
    }

    #[test]
    fn jittered_delay_stays_non_negative_and_bounded() {
        for _ in 0..100 {
            let d = jittered(Duration::from_millis(100), 0.25);
            assert!(d >= Duration::from_millis(0));
            assert!(d <= Duration::from_millis(125));
        }
    }
}
