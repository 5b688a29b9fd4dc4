//! Notification bus.
//!
//! Delivers pulse, throttled-pulse and sweep notifications from the
//! acquisition loop to client tasks. Each subscription owns a lock-free
//! one-slot mailbox: when a client has not consumed the previous
//! notification the older one is replaced and a drop counter is
//! incremented, so the acquisition loop never waits for a slow client.

use crate::buffer::ScanlineHandle;
use crate::sweep::SweepHandle;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// A notification payload that packs into a 32-bit token, so the mailbox
/// slot can be a single atomic word.
pub trait Token: Copy {
    /// Packs the payload.
    fn into_raw(self) -> u32;
    /// Unpacks the payload.
    fn from_raw(raw: u32) -> Self;
}

impl Token for ScanlineHandle {
    fn into_raw(self) -> u32 {
        self.raw()
    }

    fn from_raw(raw: u32) -> Self {
        ScanlineHandle::from_raw(raw)
    }
}

impl Token for SweepHandle {
    fn into_raw(self) -> u32 {
        self.raw()
    }

    fn from_raw(raw: u32) -> Self {
        SweepHandle::from_raw(raw)
    }
}

const EMPTY: u64 = u64::MAX;

#[derive(Debug)]
struct Shared {
    slot: AtomicU64,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl Shared {
    fn new() -> Arc<Shared> {
        Arc::new(Shared {
            slot: AtomicU64::new(EMPTY),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        })
    }
}

/// Receiving end of a one-slot mailbox.
#[derive(Debug)]
pub struct Mailbox<T> {
    shared: Arc<Shared>,
    _payload: PhantomData<T>,
}

#[derive(Debug)]
struct Sender<T> {
    shared: Arc<Shared>,
    _payload: PhantomData<T>,
}

impl<T: Token> Mailbox<T> {
    fn channel() -> (Sender<T>, Mailbox<T>) {
        let shared = Shared::new();
        (
            Sender {
                shared: Arc::clone(&shared),
                _payload: PhantomData,
            },
            Mailbox {
                shared,
                _payload: PhantomData,
            },
        )
    }

    /// Takes the pending notification, if any.
    pub fn try_recv(&self) -> Option<T> {
        match self.shared.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            raw => Some(T::from_raw(raw as u32)),
        }
    }

    /// Waits for the next notification. Returns `None` once the mailbox
    /// has been closed and drained; that is the shutdown sentinel.
    pub async fn recv(&self) -> Option<T> {
        loop {
            if let Some(value) = self.try_recv() {
                return Some(value);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // drain a value that raced the close
                return self.try_recv();
            }
            self.shared.notify.notified().await;
        }
    }

    /// Notifications replaced before this client consumed them.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// True once the producer has closed the mailbox.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl<T: Token> Sender<T> {
    fn send(&self, value: T) {
        if self.shared.closed.load(Ordering::Relaxed) {
            return;
        }
        if self.shared.slot.swap(value.into_raw() as u64, Ordering::AcqRel) != EMPTY {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.notify.notify_one();
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }

    fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct PulseSub {
    tx: Sender<ScanlineHandle>,
    min_interval: Option<Duration>,
    last_delivery: Option<Instant>,
}

/// Fan-out point between the acquisition loop and client mailboxes.
///
/// Publishing touches only the lock-free mailbox slots plus a short
/// registry lock that clients take only while subscribing; nothing a
/// client does after subscribing can block the publisher.
#[derive(Debug, Default)]
pub struct NotificationBus {
    pulse_subs: Mutex<Vec<PulseSub>>,
    sweep_subs: Mutex<Vec<Sender<SweepHandle>>>,
    closed: AtomicBool,
}

impl NotificationBus {
    /// Creates an empty bus.
    pub fn new() -> NotificationBus {
        NotificationBus::default()
    }

    /// Registers a pulse subscription. With `min_interval` set, delivery
    /// is throttled: a scanline is delivered only when its capture time is
    /// at least that long after the previous delivery's.
    pub fn subscribe_pulses(&self, min_interval: Option<Duration>) -> Mailbox<ScanlineHandle> {
        let (tx, rx) = Mailbox::channel();
        if self.closed.load(Ordering::Acquire) {
            tx.close();
        }
        self.pulse_subs.lock().unwrap().push(PulseSub {
            tx,
            min_interval,
            last_delivery: None,
        });
        rx
    }

    /// Registers a sweep subscription: one notification per sweep close.
    pub fn subscribe_sweeps(&self) -> Mailbox<SweepHandle> {
        let (tx, rx) = Mailbox::channel();
        if self.closed.load(Ordering::Acquire) {
            tx.close();
        }
        self.sweep_subs.lock().unwrap().push(tx);
        rx
    }

    /// Publishes a captured scanline to every pulse subscription whose
    /// throttle window has elapsed. `captured_at` is the capture time used
    /// for throttling.
    pub fn publish_pulse(&self, handle: ScanlineHandle, captured_at: Instant) {
        for sub in self.pulse_subs.lock().unwrap().iter_mut() {
            let due = match (sub.min_interval, sub.last_delivery) {
                (Some(interval), Some(last)) => {
                    captured_at.saturating_duration_since(last) >= interval
                }
                _ => true,
            };
            if due {
                sub.tx.send(handle);
                sub.last_delivery = Some(captured_at);
            }
        }
    }

    /// Publishes a closed sweep to every sweep subscription.
    pub fn publish_sweep(&self, handle: SweepHandle) {
        for tx in self.sweep_subs.lock().unwrap().iter() {
            tx.send(handle);
        }
    }

    /// Closes every mailbox. Clients observe the shutdown sentinel after
    /// draining any pending notification.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for sub in self.pulse_subs.lock().unwrap().iter() {
            sub.tx.close();
        }
        for tx in self.sweep_subs.lock().unwrap().iter() {
            tx.close();
        }
    }

    /// Total notifications dropped across all mailboxes.
    pub fn dropped_total(&self) -> u64 {
        let pulses: u64 = self
            .pulse_subs
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.tx.dropped())
            .sum();
        let sweeps: u64 = self
            .sweep_subs
            .lock()
            .unwrap()
            .iter()
            .map(|tx| tx.dropped())
            .sum();
        pulses + sweeps
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn handle(serial: u32) -> ScanlineHandle {
        ScanlineHandle::new(serial as usize % 100, serial)
    }

    #[test]
    fn unconsumed_notifications_coalesce_to_latest() {
        let bus = NotificationBus::new();
        let mailbox = bus.subscribe_pulses(None);
        let t = Instant::now();
        for serial in 1..=3 {
            bus.publish_pulse(handle(serial), t);
        }
        assert_eq!(mailbox.try_recv(), Some(handle(3)));
        assert_eq!(mailbox.try_recv(), None);
        assert_eq!(mailbox.dropped(), 2);
        assert_eq!(bus.dropped_total(), 2);
    }

    #[test]
    fn prompt_consumer_sees_every_pulse() {
        let bus = NotificationBus::new();
        let mailbox = bus.subscribe_pulses(None);
        let t = Instant::now();
        for serial in 1..=50 {
            bus.publish_pulse(handle(serial), t);
            assert_eq!(mailbox.try_recv(), Some(handle(serial)));
        }
        assert_eq!(mailbox.dropped(), 0);
    }

    #[test]
    fn throttled_subscription_paces_deliveries() {
        // one second of pulses at 2,100 Hz against a 200 ms throttle
        let bus = NotificationBus::new();
        let mailbox = bus.subscribe_pulses(Some(Duration::from_millis(200)));
        let base = Instant::now();
        let step = Duration::from_micros(476);
        let mut deliveries = Vec::new();
        for i in 0..2100u32 {
            bus.publish_pulse(handle(i), base + step * i);
            if let Some(h) = mailbox.try_recv() {
                deliveries.push((i, h));
            }
        }
        assert_eq!(deliveries.len(), 5);
        // the first pulse is delivered immediately
        assert_eq!(deliveries[0].0, 0);
        // consecutive deliveries are at least 200 ms of capture time apart
        for pair in deliveries.windows(2) {
            let gap = step * (pair[1].0 - pair[0].0);
            assert!(gap >= Duration::from_millis(200), "gap {gap:?}");
        }
    }

    #[test]
    fn sweep_subscribers_each_get_the_handle() {
        let bus = NotificationBus::new();
        let a = bus.subscribe_sweeps();
        let b = bus.subscribe_sweeps();
        let h = SweepHandle::new(2, 77);
        bus.publish_sweep(h);
        assert_eq!(a.try_recv(), Some(h));
        assert_eq!(b.try_recv(), Some(h));
    }

    #[tokio::test]
    async fn recv_drains_then_observes_close() {
        let bus = NotificationBus::new();
        let mailbox = bus.subscribe_pulses(None);
        bus.publish_pulse(handle(9), Instant::now());
        bus.close();
        assert_eq!(mailbox.recv().await, Some(handle(9)));
        assert_eq!(mailbox.recv().await, None);
        assert!(mailbox.is_closed());
    }

    #[tokio::test]
    async fn recv_wakes_on_publish() {
        let bus = Arc::new(NotificationBus::new());
        let mailbox = bus.subscribe_pulses(None);
        let publisher = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                bus.publish_pulse(handle(5), Instant::now());
            })
        };
        assert_eq!(mailbox.recv().await, Some(handle(5)));
        publisher.await.unwrap();
    }

    #[test]
    fn subscriptions_after_close_are_born_closed() {
        let bus = NotificationBus::new();
        bus.close();
        let mailbox = bus.subscribe_pulses(None);
        assert!(mailbox.is_closed());
    }
}
