//! Single-slot, latest-wins handoff between a camera producer and its consumer.
//!
//! The producer overwrites the slot unconditionally and then waits (bounded)
//! for the consumer to take it, which throttles capture to the consumer's
//! cadence. Unread items are dropped, never queued. Both sides use bounded
//! waits so neither can hang on a stalled counterpart, and `close` wakes
//! every waiter.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outcome of a consumer read.
#[derive(Debug, PartialEq, Eq)]
pub enum Take<T> {
    Item(T),
    /// Nothing arrived within the timeout
    Empty,
    /// The mailbox was closed; no further items will arrive
    Closed,
}

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    published: u64,
    overwritten: u64,
    closed: bool,
}

#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    signal: Condvar,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                item: None,
                published: 0,
                overwritten: 0,
                closed: false,
            }),
            signal: Condvar::new(),
        }
    }

    // A panicking peer must not take the pipeline down with it.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the slot content and wake the consumer.
    ///
    /// Returns `true` if an unread item was discarded. Items published after
    /// `close` are dropped.
    pub fn publish(&self, item: T) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        let replaced = slot.item.replace(item).is_some();
        slot.published += 1;
        if replaced {
            slot.overwritten += 1;
        }
        drop(slot);
        self.signal.notify_all();
        replaced
    }

    /// Producer side: wait until the consumer took the slot, the mailbox was
    /// closed, or `timeout` elapsed. Returns `true` if the item was taken.
    pub fn wait_for_consumer(&self, timeout: Duration) -> bool {
        let slot = self.lock();
        let (slot, _) = self
            .signal
            .wait_timeout_while(slot, timeout, |s| s.item.is_some() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        slot.item.is_none() && !slot.closed
    }

    /// Consumer side: take the latest item, waiting up to `timeout` for one.
    pub fn take_timeout(&self, timeout: Duration) -> Take<T> {
        let slot = self.lock();
        let (mut slot, _) = self
            .signal
            .wait_timeout_while(slot, timeout, |s| s.item.is_none() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if slot.closed {
            return Take::Closed;
        }
        match slot.item.take() {
            Some(item) => {
                drop(slot);
                self.signal.notify_all();
                Take::Item(item)
            }
            None => Take::Empty,
        }
    }

    pub fn try_take(&self) -> Take<T> {
        self.take_timeout(Duration::ZERO)
    }

    /// Close the mailbox, dropping any unread item and waking both sides.
    pub fn close(&self) {
        let mut slot = self.lock();
        slot.closed = true;
        slot.item = None;
        drop(slot);
        self.signal.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn published(&self) -> u64 {
        self.lock().published
    }

    /// Items dropped unread because a newer one replaced them.
    pub fn overwritten(&self) -> u64 {
        self.lock().overwritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_latest_wins() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.publish(1));
        assert!(mailbox.publish(2));
        assert_eq!(mailbox.try_take(), Take::Item(2));
        assert_eq!(mailbox.try_take(), Take::Empty);
        assert_eq!(mailbox.published(), 2);
        assert_eq!(mailbox.overwritten(), 1);
    }

    #[test]
    fn test_take_times_out_when_empty() {
        let mailbox: Mailbox<u32> = Mailbox::new();
        let start = Instant::now();
        assert_eq!(mailbox.take_timeout(Duration::from_millis(30)), Take::Empty);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_producer_wait_is_bounded() {
        let mailbox = Mailbox::new();
        mailbox.publish(1);
        let start = Instant::now();
        assert!(!mailbox.wait_for_consumer(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_consumer_take_releases_producer() {
        let mailbox = Arc::new(Mailbox::new());
        mailbox.publish(7);

        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                mailbox.take_timeout(Duration::from_secs(1))
            })
        };
        assert!(mailbox.wait_for_consumer(Duration::from_secs(5)));
        assert_eq!(consumer.join().unwrap(), Take::Item(7));
    }

    #[test]
    fn test_close_wakes_waiting_consumer() {
        let mailbox: Arc<Mailbox<u32>> = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || mailbox.take_timeout(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        mailbox.close();
        assert_eq!(consumer.join().unwrap(), Take::Closed);
        assert!(!mailbox.publish(1));
        assert!(mailbox.is_closed());
    }

    #[test]
    fn test_consumer_never_sees_older_item() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                for i in 0..500u32 {
                    mailbox.publish(i);
                    mailbox.wait_for_consumer(Duration::from_micros(200));
                }
                mailbox.close();
            })
        };
        let mut last = None;
        loop {
            match mailbox.take_timeout(Duration::from_millis(50)) {
                Take::Item(i) => {
                    assert!(last.map_or(true, |l| i > l));
                    last = Some(i);
                }
                Take::Empty => {}
                Take::Closed => break,
            }
        }
        producer.join().unwrap();
    }
}
