use std::ptr;
use std::sync::{Condvar, Mutex};

struct Node<T> {
    value: Option<T>,
    next: *mut Node<T>,
}

/// A multi-producer, single-consumer queue with independent head and tail
/// locks (the classic Michael & Scott two-lock queue), rather than a
/// single mutex guarding the whole structure. A dummy head node means
/// `push` only ever touches the tail lock and `pop` only ever touches the
/// head lock, so producers and the single consumer never contend with
/// each other on the same lock.
///
/// Safety: all nodes are heap-allocated via `Box::into_raw` and reclaimed
/// exactly once, either in `pop` (the popped-from dummy) or `Drop`.
pub struct MpscQueue<T> {
    head: Mutex<*mut Node<T>>,
    tail: Mutex<*mut Node<T>>,
    /// Signalled on every push so a single consumer can block in
    /// [`MpscQueue::wait`]/[`MpscQueue::pop`] instead of busy-spinning.
    non_empty: (Mutex<()>, Condvar),
}

unsafe impl<T: Send> Send for MpscQueue<T> {}
unsafe impl<T: Send> Sync for MpscQueue<T> {}

impl<T> MpscQueue<T> {
    pub fn new() -> Self {
        let dummy = Box::into_raw(Box::new(Node {
            value: None,
            next: ptr::null_mut(),
        }));
        Self {
            head: Mutex::new(dummy),
            tail: Mutex::new(dummy),
            non_empty: (Mutex::new(()), Condvar::new()),
        }
    }

    /// Pushes a value. Safe to call from any number of threads
    /// concurrently.
    pub fn push(&self, value: T) {
        let new_node = Box::into_raw(Box::new(Node {
            value: Some(value),
            next: ptr::null_mut(),
        }));
        let mut tail = self.tail.lock().unwrap();
        unsafe {
            (**tail).next = new_node;
        }
        *tail = new_node;
        drop(tail);
        let _guard = self.non_empty.0.lock().unwrap();
        self.non_empty.1.notify_one();
    }

    /// Pops the oldest value without blocking, or `None` if empty. Must
    /// not be called concurrently from more than one thread — this is an
    /// MPSC queue, not MPMC.
    pub fn try_pop(&self) -> Option<T> {
        let mut head = self.head.lock().unwrap();
        let old_dummy = *head;
        let next = unsafe { (*old_dummy).next };
        if next.is_null() {
            return None;
        }
        let value = unsafe { (*next).value.take() };
        *head = next;
        drop(unsafe { Box::from_raw(old_dummy) });
        value
    }

    /// Writes the oldest value into `out` and returns `true`, or leaves
    /// `out` untouched and returns `false` if the queue was empty.
    pub fn try_pop_into(&self, out: &mut Option<T>) -> bool {
        match self.try_pop() {
            Some(v) => {
                *out = Some(v);
                true
            }
            None => false,
        }
    }

    /// Blocks until the queue is non-empty, without consuming anything.
    pub fn wait(&self) {
        if !self.is_empty() {
            return;
        }
        let mut guard = self.non_empty.0.lock().unwrap();
        while self.is_empty() {
            guard = self.non_empty.1.wait(guard).unwrap();
        }
    }

    /// Blocks until a value is available, then pops and returns it.
    pub fn pop(&self) -> T {
        loop {
            if let Some(v) = self.try_pop() {
                return v;
            }
            self.wait();
        }
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.lock().unwrap();
        unsafe { (**head).next.is_null() }
    }
}

impl<T> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        let mut current = *self.head.get_mut().unwrap();
        while !current.is_null() {
            let node = unsafe { Box::from_raw(current) };
            current = node.next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_single_producer() {
        let q = MpscQueue::new();
        for i in 0..10 {
            q.push(i);
        }
        for i in 0..10 {
            assert_eq!(q.try_pop(), Some(i));
        }
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn multiple_producers_all_values_delivered() {
        let q = Arc::new(MpscQueue::new());
        let producers: Vec<_> = (0..8)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        q.push(p * 1000 + i);
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }
        let mut count = 0;
        while q.try_pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 8000);
    }

    #[test]
    fn blocking_pop_waits_for_a_push_from_another_thread() {
        let q = Arc::new(MpscQueue::new());
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                thread::sleep(std::time::Duration::from_millis(20));
                q.push(7);
            })
        };
        assert_eq!(q.pop(), 7);
        producer.join().unwrap();
    }

    #[test]
    fn wait_returns_once_queue_is_non_empty() {
        let q = Arc::new(MpscQueue::new());
        q.push(1);
        q.wait();
        assert!(!q.is_empty());
    }
}
