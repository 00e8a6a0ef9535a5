// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded pool of on-demand decode workers.

use super::error::panic_message;
use super::policy::{PriorityCancelable, PriorityCancelingLifoPolicy, ThreadPolicyProvider};
use super::settings::ThrottlerSettings;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
enum WorkerState {
    /// Spawned, has not taken an item yet.
    Starting,
    /// Running an item that started at the given instant.
    Running(Instant),
}

struct LimiterState {
    policy: Box<dyn ThreadPolicyProvider>,
    workers: HashMap<usize, WorkerState>,
    next_worker: usize,
    /// A watchdog thread is waiting for the next stall deadline.
    watching: bool,
}

struct LimiterShared {
    state: Mutex<LimiterState>,
    limit: usize,
    spawn_ceiling: usize,
    stall_timeout: Duration,
    thread_name_prefix: String,
}

/// Runs queued work on at most `limit` threads at a time.
///
/// Threads are started on demand and exit as soon as the queue is empty. A
/// worker whose current item has been running for longer than the stall
/// timeout no longer counts against the limit, so a wedged stream does not
/// hold back the rest of the queue; the spawn ceiling still bounds the number
/// of live threads. While queued work waits on busy workers, a watchdog thread
/// wakes at the next stall deadline and starts a replacement.
pub struct ThreadLimiter {
    shared: Arc<LimiterShared>,
}

impl ThreadLimiter {
    /// Creates a limiter over a custom policy. `limit` is raised to at least
    /// one, and `spawn_ceiling` to at least `limit`.
    pub fn new(
        limit: usize,
        spawn_ceiling: usize,
        stall_timeout: Duration,
        policy: Box<dyn ThreadPolicyProvider>,
        thread_name_prefix: impl Into<String>,
    ) -> Self {
        let limit = limit.max(1);
        Self {
            shared: Arc::new(LimiterShared {
                state: Mutex::new(LimiterState {
                    policy,
                    workers: HashMap::new(),
                    next_worker: 0,
                    watching: false,
                }),
                limit,
                spawn_ceiling: spawn_ceiling.max(limit),
                stall_timeout,
                thread_name_prefix: thread_name_prefix.into(),
            }),
        }
    }

    /// Creates a limiter with the priority LIFO policy.
    pub fn from_settings(settings: &ThrottlerSettings) -> Self {
        Self::new(
            settings.decode_thread_limit,
            settings.spawn_ceiling,
            settings.stall_timeout(),
            Box::new(PriorityCancelingLifoPolicy::new()),
            settings.thread_name_prefix.clone(),
        )
    }

    /// Queues an item and starts a worker if a slot is free.
    pub fn spawn(&self, item: Arc<dyn PriorityCancelable>) {
        let mut state = self.shared.lock_state();
        state.policy.put(item);
        self.shared.pump(&mut state);
    }

    /// Re-evaluates a queued item after its priority changed. A no-op for an
    /// item that is already running or done.
    pub fn reschedule(&self, item: &Arc<dyn PriorityCancelable>) {
        let mut state = self.shared.lock_state();
        if state.policy.reschedule(item) {
            self.shared.pump(&mut state);
        }
    }

    /// Maximum number of items running at once.
    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    /// Number of queued items.
    pub fn queued(&self) -> usize {
        self.shared.lock_state().policy.len()
    }

    /// Number of live worker threads, stalled ones included.
    pub fn live_workers(&self) -> usize {
        self.shared.lock_state().workers.len()
    }
}

impl LimiterShared {
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        // Items run outside the lock; a poisoned lock only means a
        // still_wanted() check panicked, and the queue itself is intact.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn busy(&self, state: &LimiterState, now: Instant) -> usize {
        state
            .workers
            .values()
            .filter(|worker| match worker {
                WorkerState::Starting => true,
                WorkerState::Running(started) => now.duration_since(*started) < self.stall_timeout,
            })
            .count()
    }

    fn starting(state: &LimiterState) -> usize {
        state
            .workers
            .values()
            .filter(|worker| matches!(worker, WorkerState::Starting))
            .count()
    }

    /// Earliest instant at which a currently busy worker counts as stalled.
    fn next_stall(&self, state: &LimiterState, now: Instant) -> Option<Instant> {
        state
            .workers
            .values()
            .filter_map(|worker| match worker {
                WorkerState::Running(started) => started.checked_add(self.stall_timeout),
                WorkerState::Starting => None,
            })
            .filter(|deadline| *deadline > now)
            .min()
    }

    /// Starts workers while there is queued work nobody is about to pick up
    /// and a free slot. When every slot is busy, arms the stall watchdog.
    fn pump(self: &Arc<Self>, state: &mut LimiterState) {
        loop {
            if state.workers.len() >= self.spawn_ceiling
                || state.policy.is_empty()
                || Self::starting(state) >= state.policy.len()
            {
                return;
            }
            let now = Instant::now();
            if self.busy(state, now) >= self.limit {
                self.arm_watchdog(state, now);
                return;
            }

            let id = state.next_worker;
            state.next_worker += 1;
            let shared = Arc::clone(self);
            let spawned = thread::Builder::new()
                .name(format!("{}-{id}", self.thread_name_prefix))
                .spawn(move || shared.work(id));
            match spawned {
                Ok(_) => {
                    state.workers.insert(id, WorkerState::Starting);
                    log::debug!(
                        "Started decode worker {id} ({} live, {} queued)",
                        state.workers.len(),
                        state.policy.len()
                    );
                }
                Err(e) => {
                    log::error!("Failed to start decode worker: {e}");
                    return;
                }
            }
        }
    }

    fn arm_watchdog(self: &Arc<Self>, state: &mut LimiterState, now: Instant) {
        if state.watching {
            return;
        }
        let Some(deadline) = self.next_stall(state, now) else {
            return;
        };
        let shared = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("{}-watchdog", self.thread_name_prefix))
            .spawn(move || shared.watch(deadline));
        match spawned {
            Ok(_) => state.watching = true,
            Err(e) => log::error!("Failed to start the stall watchdog: {e}"),
        }
    }

    /// Sleeps until `deadline`, then re-pumps. Keeps going for as long as
    /// queued work is held back by busy workers.
    fn watch(self: Arc<Self>, mut deadline: Instant) {
        loop {
            thread::sleep(deadline.saturating_duration_since(Instant::now()));

            let mut state = self.lock_state();
            self.pump(&mut state);
            let now = Instant::now();
            let blocked = state.workers.len() < self.spawn_ceiling
                && self.busy(&state, now) >= self.limit
                && !state.policy.is_empty();
            match self.next_stall(&state, now) {
                Some(next) if blocked => deadline = next,
                _ => {
                    state.watching = false;
                    return;
                }
            }
        }
    }

    fn work(self: Arc<Self>, id: usize) {
        let mut state = self.lock_state();
        loop {
            // Give up our slot first so the checks below only count others.
            state.workers.remove(&id);
            if self.busy(&state, Instant::now()) >= self.limit || state.policy.is_empty() {
                break;
            }
            let Some(item) = state.policy.get() else {
                break;
            };
            let now = Instant::now();
            state.workers.insert(id, WorkerState::Running(now));
            if !state.policy.is_empty() {
                // Starting workers have no deadline, so nobody may be watching yet.
                self.arm_watchdog(&mut state, now);
            }
            drop(state);

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| item.run())) {
                log::error!(
                    "Decode worker {id} recovered from a panic: {}",
                    panic_message(payload.as_ref())
                );
            }

            state = self.lock_state();
        }
        log::debug!("Decode worker {id} exiting ({} live)", state.workers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver, Sender};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(5);

    struct Job {
        name: &'static str,
        priority: i32,
        wanted: AtomicBool,
        gate: Option<Receiver<()>>,
        hold: Duration,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        done: Sender<&'static str>,
    }

    impl PriorityCancelable for Job {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn update_priority(&self) {}

        fn still_wanted(&self) -> bool {
            self.wanted.load(Ordering::SeqCst)
        }

        fn run(self: Arc<Self>) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                let _ = gate.recv_timeout(WAIT);
            }
            thread::sleep(self.hold);
            self.running.fetch_sub(1, Ordering::SeqCst);
            let _ = self.done.send(self.name);
        }
    }

    struct Bench {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        done_tx: Sender<&'static str>,
        done: Receiver<&'static str>,
    }

    impl Bench {
        fn new() -> Self {
            let (done_tx, done) = unbounded();
            Self {
                running: Arc::default(),
                peak: Arc::default(),
                done_tx,
                done,
            }
        }

        fn job(&self, name: &'static str, gate: Option<Receiver<()>>, hold: Duration) -> Arc<Job> {
            Arc::new(Job {
                name,
                priority: 0,
                wanted: AtomicBool::new(true),
                gate,
                hold,
                running: self.running.clone(),
                peak: self.peak.clone(),
                done: self.done_tx.clone(),
            })
        }

        fn wait_running(&self, count: usize) {
            let deadline = Instant::now() + WAIT;
            while self.running.load(Ordering::SeqCst) < count {
                assert!(Instant::now() < deadline, "job never started");
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn finished(&self, count: usize) -> Vec<&'static str> {
            (0..count)
                .map(|_| self.done.recv_timeout(WAIT).expect("job did not finish"))
                .collect()
        }
    }

    fn limiter(limit: usize, ceiling: usize, stall: Duration) -> ThreadLimiter {
        ThreadLimiter::new(
            limit,
            ceiling,
            stall,
            Box::new(PriorityCancelingLifoPolicy::new()),
            "test-decode",
        )
    }

    #[test]
    fn bursts_never_exceed_the_limit() {
        let bench = Bench::new();
        let limiter = limiter(2, 64, WAIT);

        for _ in 0..8 {
            limiter.spawn(bench.job("job", None, Duration::from_millis(10)));
        }

        assert_eq!(bench.finished(8).len(), 8);
        assert!(bench.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn workers_exit_when_the_queue_drains() {
        let bench = Bench::new();
        let limiter = limiter(3, 64, WAIT);
        limiter.spawn(bench.job("only", None, Duration::ZERO));
        bench.finished(1);

        let deadline = Instant::now() + WAIT;
        while limiter.live_workers() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(limiter.live_workers(), 0);
        assert_eq!(limiter.queued(), 0);
    }

    #[test]
    fn queued_items_run_newest_first() {
        let bench = Bench::new();
        let limiter = limiter(1, 64, WAIT);
        let (release, gate) = unbounded();

        limiter.spawn(bench.job("blocker", Some(gate), Duration::ZERO));
        bench.wait_running(1);
        limiter.spawn(bench.job("a", None, Duration::ZERO));
        limiter.spawn(bench.job("b", None, Duration::ZERO));
        limiter.spawn(bench.job("c", None, Duration::ZERO));
        release.send(()).unwrap();

        assert_eq!(bench.finished(4), vec!["blocker", "c", "b", "a"]);
    }

    #[test]
    fn unwanted_items_never_run() {
        let bench = Bench::new();
        let limiter = limiter(1, 64, WAIT);
        let (release, gate) = unbounded();

        limiter.spawn(bench.job("blocker", Some(gate), Duration::ZERO));
        bench.wait_running(1);
        let dropped = bench.job("dropped", None, Duration::ZERO);
        limiter.spawn(dropped.clone());
        limiter.spawn(bench.job("kept", None, Duration::ZERO));
        dropped.wanted.store(false, Ordering::SeqCst);
        release.send(()).unwrap();

        assert_eq!(bench.finished(2), vec!["blocker", "kept"]);
        assert!(bench.done.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn a_stalled_worker_frees_its_slot() {
        let bench = Bench::new();
        let limiter = limiter(1, 64, Duration::from_millis(20));
        let (release, gate) = unbounded();

        limiter.spawn(bench.job("stalled", Some(gate), Duration::ZERO));
        bench.wait_running(1);
        thread::sleep(Duration::from_millis(60));
        limiter.spawn(bench.job("next", None, Duration::ZERO));

        assert_eq!(bench.finished(1), vec!["next"]);
        release.send(()).unwrap();
        assert_eq!(bench.finished(1), vec!["stalled"]);
    }

    #[test]
    fn work_queued_before_a_stall_starts_without_another_spawn() {
        let bench = Bench::new();
        let limiter = limiter(1, 64, Duration::from_millis(20));
        let (release, gate) = unbounded();

        limiter.spawn(bench.job("stalled", Some(gate), Duration::ZERO));
        bench.wait_running(1);
        limiter.spawn(bench.job("next", None, Duration::ZERO));

        assert_eq!(bench.done.recv_timeout(Duration::from_secs(1)).ok(), Some("next"));
        release.send(()).unwrap();
        assert_eq!(bench.finished(1), vec!["stalled"]);
    }

    #[test]
    fn the_watchdog_keeps_rescuing_until_the_queue_drains() {
        let bench = Bench::new();
        let limiter = limiter(1, 64, Duration::from_millis(20));
        let (release, gate) = unbounded();

        for name in ["first", "second", "third"] {
            limiter.spawn(bench.job(name, Some(gate.clone()), Duration::ZERO));
        }
        bench.wait_running(3);
        assert_eq!(limiter.queued(), 0);
        assert_eq!(limiter.live_workers(), 3);

        for _ in 0..3 {
            release.send(()).unwrap();
        }
        assert_eq!(bench.finished(3).len(), 3);
    }

    #[test]
    fn the_spawn_ceiling_holds_even_when_stalled() {
        let bench = Bench::new();
        let limiter = limiter(1, 1, Duration::from_millis(1));
        let (release, gate) = unbounded();

        limiter.spawn(bench.job("stalled", Some(gate), Duration::ZERO));
        bench.wait_running(1);
        thread::sleep(Duration::from_millis(20));
        limiter.spawn(bench.job("next", None, Duration::ZERO));

        assert!(bench.done.recv_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(limiter.live_workers(), 1);
        release.send(()).unwrap();
        assert_eq!(bench.finished(2), vec!["stalled", "next"]);
    }

    #[test]
    fn a_panicking_item_does_not_leak_its_slot() {
        struct Boom;
        impl PriorityCancelable for Boom {
            fn priority(&self) -> i32 {
                0
            }
            fn update_priority(&self) {}
            fn still_wanted(&self) -> bool {
                true
            }
            fn run(self: Arc<Self>) {
                panic!("decoder exploded");
            }
        }

        let bench = Bench::new();
        let limiter = limiter(1, 1, WAIT);
        limiter.spawn(Arc::new(Boom));
        limiter.spawn(bench.job("after", None, Duration::ZERO));

        assert_eq!(bench.finished(1), vec!["after"]);
    }
}
