//! Bounded keyboard queue shared by the window thread and the application.
//!
//! The window thread is the only producer. `tail` is written by the producer
//! alone and `head` by whichever consumer holds the reader lock, so the
//! producer never waits on a lock: each side publishes its index with
//! release ordering after touching the slot. The reader lock keeps `head`
//! moving forward when several application threads read keys through a
//! shared `Lab`.
//!
//! Every push attempt releases one semaphore permit, including pushes that
//! were dropped because the ring was full. A consumer woken by such a permit
//! finds the ring drained and gets [`Key::NONE`].

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::key::Key;

/// Ring size; one slot stays free to tell full from empty
pub const QUEUE_CAPACITY: usize = 32;

/// Returned by [`KeyQueue::push`] when the event was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull(pub Key);

/// Fixed-size single-producer/single-consumer ring of key codes
pub struct KeyQueue {
    slots: [AtomicU32; QUEUE_CAPACITY],
    head: AtomicUsize,
    tail: AtomicUsize,
    /// Serializes consumers
    reader: Mutex<()>,
    permits: Semaphore,
}

impl Default for KeyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyQueue {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicU32::new(0)),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            reader: Mutex::new(()),
            permits: Semaphore::new(0),
        }
    }

    /// Producer side. Never blocks; drops the key when the ring is full.
    /// One permit is released either way.
    pub fn push(&self, key: Key) -> Result<(), QueueFull> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % QUEUE_CAPACITY;
        let result = if next == self.head.load(Ordering::Acquire) {
            Err(QueueFull(key))
        } else {
            self.slots[tail].store(key.0, Ordering::Relaxed);
            self.tail.store(next, Ordering::Release);
            Ok(())
        };
        self.permits.release();
        result
    }

    /// Consumer side. Removes the oldest key, or returns [`Key::NONE`]
    /// when empty. Does not touch the semaphore.
    pub fn pop(&self) -> Key {
        let _reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        let head = self.head.load(Ordering::Relaxed);
        if head == self.tail.load(Ordering::Acquire) {
            return Key::NONE;
        }
        let code = self.slots[head].swap(0, Ordering::Relaxed);
        self.head.store((head + 1) % QUEUE_CAPACITY, Ordering::Release);
        Key(code)
    }

    /// Consumer side. Waits for a permit, then pops.
    pub fn pop_blocking(&self) -> Key {
        self.permits.acquire();
        self.pop()
    }

    /// Consumer side. Like [`pop_blocking`](Self::pop_blocking) but gives up
    /// after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Key> {
        if self.permits.acquire_timeout(timeout) {
            Some(self.pop())
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.head.load(Ordering::Acquire) != self.tail.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (tail + QUEUE_CAPACITY - head) % QUEUE_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        !self.is_ready()
    }

    /// Permits not yet consumed
    pub fn pending_permits(&self) -> usize {
        self.permits.available()
    }
}

/// Counting semaphore
#[derive(Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    pub fn release(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        self.cond.notify_one();
    }

    pub fn acquire(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self.cond.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    /// Returns false if no permit showed up before `timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            count = guard;
        }
        *count -= 1;
        true
    }

    pub fn available(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = KeyQueue::new();
        let keys: Vec<Key> = (b'a'..=b'z').map(|c| Key(c as u32)).collect();
        for &key in &keys {
            assert!(queue.push(key).is_ok());
        }
        assert_eq!(queue.len(), keys.len());
        for &key in &keys {
            assert_eq!(queue.pop_blocking(), key);
        }
        assert!(queue.is_empty());
        assert_eq!(queue.pending_permits(), 0);
    }

    #[test]
    fn test_pop_empty_returns_sentinel() {
        let queue = KeyQueue::new();
        assert_eq!(queue.pop(), Key::NONE);
        assert!(!queue.is_ready());
        assert_eq!(queue.pop_timeout(Duration::from_millis(10)), None);
    }

    #[test]
    fn test_overflow_drops_newest() {
        let queue = KeyQueue::new();
        let extra = 5;
        let attempts = QUEUE_CAPACITY + extra;
        let mut dropped = 0;
        for i in 0..attempts {
            if queue.push(Key(i as u32 + 1)).is_err() {
                dropped += 1;
            }
        }
        assert_eq!(queue.len(), QUEUE_CAPACITY - 1);
        assert_eq!(dropped, extra + 1);
        assert_eq!(queue.pending_permits(), attempts);

        // Every permit wakes a pop; the oldest keys come out first, then
        // the sentinel once the ring is drained
        for i in 0..QUEUE_CAPACITY - 1 {
            assert_eq!(queue.pop_blocking(), Key(i as u32 + 1));
        }
        for _ in QUEUE_CAPACITY - 1..attempts {
            assert_eq!(queue.pop_blocking(), Key::NONE);
        }
        assert_eq!(queue.pending_permits(), 0);
    }

    #[test]
    fn test_concurrent_consumers_take_each_key_once() {
        let queue = Arc::new(KeyQueue::new());
        for round in 0..500 {
            for code in 1..QUEUE_CAPACITY as u32 {
                queue.push(Key(code)).unwrap();
            }
            let barrier = Arc::new(Barrier::new(2));
            let readers: Vec<_> = (0..2)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        (0..15).map(|_| queue.pop_blocking().0).collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut taken: Vec<u32> = readers
                .into_iter()
                .flat_map(|reader| reader.join().unwrap())
                .collect();
            taken.sort_unstable();
            assert_eq!(taken, (1..=30).collect::<Vec<_>>(), "round {}", round);
            assert_eq!(queue.pop_blocking(), Key(31));
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_wraparound() {
        let queue = KeyQueue::new();
        for round in 0..3 * QUEUE_CAPACITY as u32 {
            queue.push(Key(round + 1)).unwrap();
            queue.push(Key(round + 1000)).unwrap();
            assert_eq!(queue.pop_blocking(), Key(round + 1));
            assert_eq!(queue.pop_blocking(), Key(round + 1000));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_blocking_pop_wakes_on_push() {
        let queue = Arc::new(KeyQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || (0..100).map(|_| queue.pop_blocking()).collect::<Vec<_>>())
        };
        for i in 0..100u32 {
            // Keep the producer below capacity so nothing is dropped
            while queue.len() >= QUEUE_CAPACITY - 2 {
                thread::yield_now();
            }
            queue.push(Key(i + 1)).unwrap();
        }
        let received = consumer.join().unwrap();
        let expected: Vec<Key> = (1..=100).map(Key).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_semaphore_timeout() {
        let sem = Semaphore::new(1);
        assert!(sem.acquire_timeout(Duration::from_millis(1)));
        assert!(!sem.acquire_timeout(Duration::from_millis(20)));
        sem.release();
        assert_eq!(sem.available(), 1);
    }
}
