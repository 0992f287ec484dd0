//! Single-threaded cooperative task queue.
//!
//! Tasks are keyed closures with a priority and an optional delay. Submitting
//! under a key that is already pending replaces the pending task, which gives
//! debounce behaviour for free. Each [`Scheduler::tick`] runs the tasks that
//! were due when it started; anything a task submits waits for the next tick.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Immediate,
    High,
    Normal,
    Low,
    Idle,
}

type TaskFn<C> = Box<dyn FnOnce(&mut C, &mut Scheduler<C>)>;

struct Scheduled<C> {
    key: String,
    priority: Priority,
    due: Instant,
    seq: u64,
    run: TaskFn<C>,
}

pub struct Scheduler<C> {
    queue: Vec<Scheduled<C>>,
    next_seq: u64,
}

impl<C> Default for Scheduler<C> {
    fn default() -> Self { Self { queue: Vec::new(), next_seq: 0 } }
}

impl<C> Scheduler<C> {
    pub fn new() -> Self { Self::default() }

    pub fn submit<F>(&mut self, key: impl Into<String>, priority: Priority, delay: Duration, task: F)
    where
        F: FnOnce(&mut C, &mut Scheduler<C>) + 'static,
    {
        let key = key.into();
        self.cancel(&key);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled { key, priority, due: Instant::now() + delay, seq, run: Box::new(task) });
    }

    /// Drop the pending task under `key`. Returns whether one was pending.
    pub fn cancel(&mut self, key: &str) -> bool {
        let before = self.queue.len();
        self.queue.retain(|t| t.key != key);
        self.queue.len() != before
    }

    pub fn is_pending(&self, key: &str) -> bool { self.queue.iter().any(|t| t.key == key) }
    pub fn len(&self) -> usize { self.queue.len() }
    pub fn is_empty(&self) -> bool { self.queue.is_empty() }

    fn next_due(&self) -> Option<Instant> { self.queue.iter().map(|t| t.due).min() }

    /// Run every task that was due at the start of this tick, highest priority
    /// first and FIFO within a priority. Returns how many ran.
    pub fn tick(&mut self, ctx: &mut C) -> usize {
        let now = Instant::now();
        let horizon = self.next_seq;
        let mut ran = 0;
        loop {
            let pick = self
                .queue
                .iter()
                .enumerate()
                .filter(|(_, t)| t.seq < horizon && t.due <= now)
                .min_by_key(|(_, t)| (t.priority, t.seq))
                .map(|(i, _)| i);
            let Some(i) = pick else { break };
            let task = self.queue.swap_remove(i);
            tracing::trace!(key = %task.key, priority = ?task.priority, "running task");
            (task.run)(ctx, self);
            ran += 1;
        }
        ran
    }

    /// Tick until the queue drains, sleeping until the next delayed task is due.
    pub fn run_until_idle(&mut self, ctx: &mut C) {
        loop {
            self.tick(ctx);
            let Some(due) = self.next_due() else { break };
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_by_priority_then_fifo() {
        let mut log: Vec<&'static str> = Vec::new();
        let mut scheduler: Scheduler<Vec<&'static str>> = Scheduler::new();
        scheduler.submit("idle", Priority::Idle, Duration::ZERO, |log: &mut Vec<&'static str>, _: &mut Scheduler<_>| log.push("idle"));
        scheduler.submit("a", Priority::Normal, Duration::ZERO, |log: &mut Vec<&'static str>, _: &mut Scheduler<_>| log.push("a"));
        scheduler.submit("b", Priority::Normal, Duration::ZERO, |log: &mut Vec<&'static str>, _: &mut Scheduler<_>| log.push("b"));
        scheduler.submit("now", Priority::Immediate, Duration::ZERO, |log: &mut Vec<&'static str>, _: &mut Scheduler<_>| log.push("now"));
        assert_eq!(scheduler.tick(&mut log), 4);
        assert_eq!(log, vec!["now", "a", "b", "idle"]);
    }

    #[test]
    fn same_key_replaces_and_cancel_removes() {
        let mut hits = 0u32;
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        scheduler.submit("search", Priority::High, Duration::ZERO, |n: &mut u32, _: &mut Scheduler<u32>| *n += 1);
        scheduler.submit("search", Priority::High, Duration::ZERO, |n: &mut u32, _: &mut Scheduler<u32>| *n += 10);
        scheduler.submit("other", Priority::Low, Duration::ZERO, |n: &mut u32, _: &mut Scheduler<u32>| *n += 100);
        assert!(scheduler.cancel("other"));
        assert!(!scheduler.cancel("other"));
        scheduler.run_until_idle(&mut hits);
        assert_eq!(hits, 10);
    }

    #[test]
    fn resubmitted_tasks_wait_for_next_tick() {
        fn again(n: &mut u32, scheduler: &mut Scheduler<u32>) {
            *n += 1;
            if *n < 3 {
                scheduler.submit("loop", Priority::Normal, Duration::ZERO, again);
            }
        }
        let mut n = 0u32;
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        scheduler.submit("loop", Priority::Normal, Duration::ZERO, again);
        assert_eq!(scheduler.tick(&mut n), 1);
        assert!(scheduler.is_pending("loop"));
        scheduler.run_until_idle(&mut n);
        assert_eq!(n, 3);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn delayed_tasks_are_not_due_immediately() {
        let mut n = 0u32;
        let mut scheduler: Scheduler<u32> = Scheduler::new();
        scheduler.submit("later", Priority::Normal, Duration::from_millis(20), |n: &mut u32, _: &mut Scheduler<u32>| *n += 1);
        assert_eq!(scheduler.tick(&mut n), 0);
        scheduler.run_until_idle(&mut n);
        assert_eq!(n, 1);
    }
}
