//! Unbounded blocking FIFO queue.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

/// An unbounded FIFO queue whose `receive` blocks until a value arrives.
///
/// The pool uses two of these: one carries [`JobMessage`]s from the
/// scheduler to the workers, the other carries wait samples from the
/// workers back to the timing thread.
///
/// Sending never fails and never blocks. Receiving never yields a
/// "missing" value; an empty queue simply suspends the caller.
///
/// # Example
///
/// ```rust
/// use rust_wave_pool::queue::BlockingQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(BlockingQueue::new());
/// let consumer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || (queue.receive(), queue.receive()))
/// };
///
/// queue.send(1);
/// queue.send(2);
/// assert_eq!(consumer.join().unwrap(), (1, 2));
/// ```
///
/// [`JobMessage`]: crate::core::JobMessage
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Appends a value to the tail and wakes one blocked receiver.
    pub fn send(&self, value: T) {
        let mut items = self.items.lock();
        items.push_back(value);
        self.available.notify_one();
    }

    /// Appends every value under a single lock acquisition.
    ///
    /// Values keep their iteration order and no other sender can
    /// interleave with them. Returns the number of values appended.
    pub fn send_all<I>(&self, values: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let mut items = self.items.lock();
        let before = items.len();
        items.extend(values);
        let added = items.len() - before;
        for _ in 0..added {
            self.available.notify_one();
        }
        added
    }

    /// Removes and returns the head, blocking while the queue is empty.
    pub fn receive(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(value) = items.pop_front() {
                return value;
            }
            self.available.wait(&mut items);
        }
    }

    /// Like [`receive`](Self::receive) but gives up after `timeout`.
    pub fn receive_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock();
        loop {
            if let Some(value) = items.pop_front() {
                return Some(value);
            }
            if self.available.wait_until(&mut items, deadline).timed_out() {
                return items.pop_front();
            }
        }
    }

    /// Removes the head if one is present, without blocking.
    pub fn try_receive(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Number of queued values at this instant.
    ///
    /// Other threads may change the queue as soon as this returns, so the
    /// value is for observability only.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue was empty at this instant.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_send_receive_fifo() {
        let queue = BlockingQueue::new();
        for i in 0..5 {
            queue.send(i);
        }
        let received: Vec<_> = (0..5).map(|_| queue.receive()).collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_len_and_is_empty() {
        let queue = BlockingQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);

        queue.send("a");
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 1);

        queue.receive();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_send_all_preserves_order() {
        let queue = BlockingQueue::new();
        queue.send(0);
        assert_eq!(queue.send_all(vec![1, 2, 3]), 3);
        assert_eq!(queue.send_all(Vec::<i32>::new()), 0);

        let received: Vec<_> = std::iter::from_fn(|| queue.try_receive()).collect();
        assert_eq!(received, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_try_receive_empty() {
        let queue: BlockingQueue<u8> = BlockingQueue::new();
        assert!(queue.try_receive().is_none());
    }

    #[test]
    fn test_receive_timeout_expires() {
        let queue: BlockingQueue<u8> = BlockingQueue::new();
        let start = Instant::now();
        assert!(queue.receive_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_receive_blocks_until_send() {
        let queue = Arc::new(BlockingQueue::new());
        let received = Arc::new(AtomicBool::new(false));

        let consumer = {
            let queue = Arc::clone(&queue);
            let received = Arc::clone(&received);
            thread::spawn(move || {
                let value = queue.receive();
                received.store(true, Ordering::SeqCst);
                value
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!received.load(Ordering::SeqCst), "receive returned on an empty queue");

        queue.send(42);
        assert_eq!(consumer.join().expect("consumer panicked"), 42);
        assert!(received.load(Ordering::SeqCst));
    }

    #[test]
    fn test_every_blocked_receiver_is_woken() {
        let queue = Arc::new(BlockingQueue::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.receive())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        queue.send_all(0..4);

        let mut values: Vec<i32> = consumers
            .into_iter()
            .map(|c| c.join().expect("consumer panicked"))
            .collect();
        values.sort_unstable();
        assert_eq!(values, vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_concurrent_send_receive_no_loss() {
        let queue = Arc::new(BlockingQueue::new());
        let per_producer = 250;

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        queue.send(p * per_producer + i);
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    (0..per_producer * 2)
                        .map(|_| queue.receive())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for producer in producers {
            producer.join().expect("producer panicked");
        }
        let mut all: Vec<_> = consumers
            .into_iter()
            .flat_map(|c| c.join().expect("consumer panicked"))
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..per_producer * 4).collect::<Vec<_>>());
    }
}
