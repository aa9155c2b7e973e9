//! The time-ordered message queue of the scheduler.

use crate::message::{Message, Time};
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

/// A message waiting to be processed at `time`.
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) time: Time,
    seq: u64,
    pub(crate) message: Message,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

/// Min-heap of tasks ordered by time, then by insertion.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    heap: BinaryHeap<Reverse<Task>>,
    inserted: u64,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, time: Time, message: Message) {
        let seq = self.inserted;
        self.inserted += 1;
        self.heap.push(Reverse(Task { time, seq, message }));
    }

    pub(crate) fn peek_time(&self) -> Option<Time> {
        self.heap.peek().map(|Reverse(task)| task.time)
    }

    /// Removes every task due at the earliest time, in insertion order.
    pub(crate) fn pop_batch(&mut self) -> Vec<Task> {
        let mut batch = Vec::new();
        let Some(time) = self.peek_time() else {
            return batch;
        };
        while self.peek_time() == Some(time) {
            if let Some(Reverse(task)) = self.heap.pop() {
                batch.push(task);
            }
        }
        batch
    }

    /// Puts back tasks taken by [`pop_batch`](Self::pop_batch) that were not
    /// processed. They keep their original position in the order.
    pub(crate) fn restore(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.heap.extend(tasks.into_iter().map(Reverse));
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}
