//! Shared FIFO scheduler with concurrency and pacing gates.
//!
//! Drives batch refreshes without overwhelming upstream sources:
//! - at most `max_concurrent` tasks run simultaneously
//! - successive task *starts* (not completions) are spaced by `min_delay`
//! - every completion triggers an attempt to start the next queued task
//!
//! The queue is serviced strictly FIFO. There is no cancellation: a handle
//! whose caller walked away simply never settles, and the task still runs.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::oneshot;
use tokio::time::Instant;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Scheduler tuning.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum tasks executing simultaneously
    pub max_concurrent: usize,
    /// Minimum spacing between successive task starts
    pub min_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            min_delay: Duration::from_millis(350),
        }
    }
}

/// Queue state. Three transitions: enqueue, gated-start, complete-and-advance.
struct State {
    queue: VecDeque<Job>,
    running: usize,
    last_start: Option<Instant>,
    /// A delayed advance is already pending; avoids stacking wakeups
    wakeup_scheduled: bool,
}

struct Inner {
    config: SchedulerConfig,
    state: Mutex<State>,
}

/// Handle to a scheduled task's result.
///
/// Resolves to `None` when the task could not deliver a result (its future
/// panicked); abandoned handles are harmless.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task to finish and take its result.
    pub async fn join(self) -> Option<T> {
        self.rx.await.ok()
    }
}

/// Shared FIFO scheduler.
#[derive(Clone)]
pub struct ThrottledScheduler {
    inner: Arc<Inner>,
}

impl ThrottledScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: SchedulerConfig {
                    max_concurrent: config.max_concurrent.max(1),
                    ..config
                },
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    running: 0,
                    last_start: None,
                    wakeup_scheduled: false,
                }),
            }),
        }
    }

    /// Enqueue a unit of work. Must be called from within a tokio runtime.
    pub fn submit<T, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = task.await;
            // The caller may have dropped its handle; the result is then
            // discarded, which is fine.
            let _ = tx.send(result);
        });

        {
            let mut state = self.inner.lock_state();
            state.queue.push_back(job);
            debug!("Scheduler: enqueued task ({} queued)", state.queue.len());
        }
        Inner::advance(self.inner.clone());

        TaskHandle { rx }
    }

    /// Tasks currently executing.
    pub fn running(&self) -> usize {
        self.inner.lock_state().running
    }

    /// Tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.inner.lock_state().queue.len()
    }
}

impl Default for ThrottledScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Inner {
    /// Lock the state mutex, recovering from poison if necessary. Worst case
    /// is a slightly stale counter, which beats panicking the scheduler.
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Scheduler state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Start as many queued tasks as the gates allow.
    fn advance(self: Arc<Self>) {
        loop {
            let job = {
                let mut state = self.lock_state();

                if state.running >= self.config.max_concurrent || state.queue.is_empty() {
                    return;
                }

                let now = Instant::now();
                if let Some(last_start) = state.last_start {
                    let gate = last_start + self.config.min_delay;
                    if now < gate {
                        // Too soon after the previous start; come back when
                        // the pacing gate opens.
                        if !state.wakeup_scheduled {
                            state.wakeup_scheduled = true;
                            let inner = self.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep_until(gate).await;
                                inner.lock_state().wakeup_scheduled = false;
                                Inner::advance(inner);
                            });
                        }
                        return;
                    }
                }

                let Some(job) = state.queue.pop_front() else {
                    return;
                };
                state.running += 1;
                state.last_start = Some(now);
                job
            };

            let inner = self.clone();
            tokio::spawn(async move {
                // Run the job in its own task so a panic is contained and
                // completion still advances the queue.
                if let Err(error) = tokio::spawn(job).await {
                    warn!("Scheduled task aborted: {}", error);
                }
                inner.lock_state().running -= 1;
                Inner::advance(inner);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scheduler(max_concurrent: usize, min_delay: Duration) -> ThrottledScheduler {
        ThrottledScheduler::new(SchedulerConfig {
            max_concurrent,
            min_delay,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_max_concurrent() {
        let scheduler = scheduler(2, Duration::ZERO);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            handles.push(scheduler.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_are_spaced_by_min_delay() {
        let min_delay = Duration::from_millis(100);
        let scheduler = scheduler(4, min_delay);
        let starts = Arc::new(Mutex::new(Vec::<Instant>::new()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let starts = starts.clone();
            handles.push(scheduler.submit(async move {
                starts.lock().unwrap().push(Instant::now());
            }));
        }

        for handle in handles {
            handle.join().await.unwrap();
        }

        let starts = starts.lock().unwrap();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= min_delay);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_is_serviced_fifo() {
        let scheduler = scheduler(1, Duration::ZERO);
        let order = Arc::new(Mutex::new(Vec::<usize>::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let order = order.clone();
            handles.push(scheduler.submit(async move {
                order.lock().unwrap().push(i);
            }));
        }

        for handle in handles {
            handle.join().await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_advances_the_queue() {
        let scheduler = scheduler(1, Duration::ZERO);

        let first = scheduler.submit(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            1
        });
        let second = scheduler.submit(async { 2 });

        assert_eq!(first.join().await, Some(1));
        assert_eq!(second.join().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_handle_does_not_block_siblings() {
        let scheduler = scheduler(1, Duration::ZERO);
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        let abandoned = scheduler.submit(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(abandoned);

        let counter = ran.clone();
        let kept = scheduler.submit(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            "done"
        });

        assert_eq!(kept.join().await, Some("done"));
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_are_delivered_per_task() {
        let scheduler = scheduler(2, Duration::from_millis(5));

        let a = scheduler.submit(async { 10u32 });
        let b = scheduler.submit(async { 20u32 });

        assert_eq!(a.join().await, Some(10));
        assert_eq!(b.join().await, Some(20));
    }
}
