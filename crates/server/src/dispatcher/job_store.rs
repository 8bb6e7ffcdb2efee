//! Unfinished work: the pending-job index and the delivery queue over it.
//!
//! Both live in one structure so they cannot drift apart. A job enters the
//! index and the queue together, leaves the queue when a worker takes it,
//! and leaves the index when its result is accepted.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use chess_core::Job;

/// Delivery queue is at capacity; the job was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull {
    pub capacity: usize,
}

struct PendingJob {
    job: Job,
    seq: u64,
    delivered: bool,
}

/// Heap entry: highest priority first, then submission order.
#[derive(PartialEq, Eq)]
struct QueueEntry {
    priority: i32,
    seq: u64,
    job_id: String,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct JobStore {
    capacity: usize,
    pending: HashMap<String, PendingJob>,
    queue: BinaryHeap<QueueEntry>,
    /// Jobs in `pending` not yet handed to a worker
    waiting: usize,
    next_seq: u64,
}

impl JobStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pending: HashMap::new(),
            queue: BinaryHeap::new(),
            waiting: 0,
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `count` more jobs fit in the delivery queue.
    pub fn has_room(&self, count: usize) -> bool {
        self.waiting + count <= self.capacity
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.pending.contains_key(job_id)
    }

    /// Record a job as pending and queue it for delivery.
    pub fn submit(&mut self, job: Job) -> Result<(), QueueFull> {
        if !self.has_room(1) {
            return Err(QueueFull {
                capacity: self.capacity,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.queue.push(QueueEntry {
            priority: job.priority,
            seq,
            job_id: job.id.clone(),
        });
        self.pending.insert(
            job.id.clone(),
            PendingJob {
                job,
                seq,
                delivered: false,
            },
        );
        self.waiting += 1;
        Ok(())
    }

    /// Take the next job for delivery, if any. The job stays pending.
    pub fn pop(&mut self) -> Option<Job> {
        while let Some(entry) = self.queue.pop() {
            // Entries whose job was released (or replaced) before delivery are stale.
            let Some(pending) = self.pending.get_mut(&entry.job_id) else {
                continue;
            };
            if pending.seq != entry.seq || pending.delivered {
                continue;
            }
            pending.delivered = true;
            self.waiting -= 1;
            return Some(pending.job.clone());
        }
        None
    }

    /// Drop a job from the pending index. Returns it if it was pending.
    pub fn release(&mut self, job_id: &str) -> Option<Job> {
        let pending = self.pending.remove(job_id)?;
        if !pending.delivered {
            self.waiting -= 1;
        }
        Some(pending.job)
    }

    /// Jobs awaiting delivery.
    pub fn queued_len(&self) -> usize {
        self.waiting
    }

    /// Jobs without a result, delivered or not.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Snapshot of every pending job in submission order.
    pub fn pending_jobs(&self) -> Vec<Job> {
        let mut entries: Vec<&PendingJob> = self.pending.values().collect();
        entries.sort_by_key(|p| p.seq);
        entries.into_iter().map(|p| p.job.clone()).collect()
    }
}
