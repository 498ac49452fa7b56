//! Tick-based scheduling
//!
//! Everything runs on the simulation thread: delayed work sits in a queue
//! drained between ticks, and repeating work is driven by an explicit task
//! whose cancellation flag is checked before every run.

use std::cell::Cell;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;

/// Work items released once their due tick is reached
///
/// Items due on the same tick come out in insertion order.
#[derive(Debug)]
pub struct DelayQueue<T> {
    heap: BinaryHeap<Reverse<(u64, u64)>>,
    items: HashMap<u64, T>,
    next_seq: u64,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            items: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due_tick: u64, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((due_tick, seq)));
        self.items.insert(seq, item);
    }

    /// Remove and return every item due at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(&Reverse((tick, seq))) = self.heap.peek() {
            if tick > now {
                break;
            }
            self.heap.pop();
            if let Some(item) = self.items.remove(&seq) {
                due.push(item);
            }
        }
        due
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.items.clear();
    }
}

/// Shared cancellation flag for a scheduled task
///
/// Cloning yields another handle to the same task.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Outcome of polling a repeating task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPoll {
    /// Not due yet
    Pending,
    /// Due now; the next run has been scheduled
    Due,
    /// Cancelled through its handle
    Cancelled,
}

/// A fixed-cadence task driven by the tick counter
#[derive(Debug)]
pub struct RepeatingTask {
    interval_ticks: u64,
    next_due: u64,
    handle: TaskHandle,
}

impl RepeatingTask {
    /// First run is due at `first_due`
    pub fn new(first_due: u64, interval_ticks: u64) -> Self {
        Self {
            interval_ticks: interval_ticks.max(1),
            next_due: first_due,
            handle: TaskHandle::default(),
        }
    }

    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }

    pub fn next_due(&self) -> u64 {
        self.next_due
    }

    pub fn poll(&mut self, now: u64) -> TaskPoll {
        if self.handle.is_cancelled() {
            return TaskPoll::Cancelled;
        }
        if now < self.next_due {
            return TaskPoll::Pending;
        }
        self.next_due = now + self.interval_ticks;
        TaskPoll::Due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_queue_releases_in_order() {
        let mut queue = DelayQueue::new();
        queue.push(10, "b");
        queue.push(5, "a");
        queue.push(10, "c");
        assert!(queue.pop_due(4).is_empty());
        assert_eq!(queue.pop_due(5), vec!["a"]);
        assert_eq!(queue.pop_due(20), vec!["b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_delay_queue_clear() {
        let mut queue = DelayQueue::new();
        queue.push(1, 1u32);
        queue.push(2, 2u32);
        assert_eq!(queue.len(), 2);
        queue.clear();
        assert!(queue.pop_due(100).is_empty());
    }

    #[test]
    fn test_repeating_task_cadence() {
        let mut task = RepeatingTask::new(0, 108);
        assert_eq!(task.poll(0), TaskPoll::Due);
        assert_eq!(task.poll(1), TaskPoll::Pending);
        assert_eq!(task.poll(107), TaskPoll::Pending);
        assert_eq!(task.poll(108), TaskPoll::Due);
        assert_eq!(task.next_due(), 216);
    }

    #[test]
    fn test_cancel_through_handle() {
        let mut task = RepeatingTask::new(0, 10);
        let handle = task.handle();
        handle.cancel();
        assert!(task.handle().is_cancelled());
        assert_eq!(task.poll(0), TaskPoll::Cancelled);
        assert_eq!(task.poll(50), TaskPoll::Cancelled);
    }
}
