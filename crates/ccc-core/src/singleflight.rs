use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Keyed in-flight tracker: the first caller for a key leads, later callers follow
/// and wait for the leader instead of issuing a duplicate request.
#[derive(Default)]
pub struct Singleflight {
    flights: Mutex<HashMap<String, Arc<FlightState>>>,
}

impl Singleflight {
    pub fn begin(&self, key: &str) -> FlightGuard<'_> {
        let mut map = self.flights.lock();
        if let Some(state) = map.get(key) {
            state.add_ref();
            FlightGuard::new_follower(self, key.to_string(), Arc::clone(state))
        } else {
            let state = Arc::new(FlightState::new());
            map.insert(key.to_string(), Arc::clone(&state));
            FlightGuard::new_leader(self, key.to_string(), state)
        }
    }

    pub fn in_flight(&self, key: &str) -> bool {
        self.flights.lock().contains_key(key)
    }

    fn release(&self, key: &str, flight: &Arc<FlightState>) {
        let mut map = self.flights.lock();
        if flight.release() == 0 {
            if let Some(existing) = map.get(key) {
                if Arc::ptr_eq(existing, flight) {
                    map.remove(key);
                }
            }
        }
    }

    /// Leader finished: new callers for `key` start a fresh flight from here on.
    fn retire(&self, key: &str, flight: &Arc<FlightState>) {
        let mut map = self.flights.lock();
        if let Some(existing) = map.get(key) {
            if Arc::ptr_eq(existing, flight) {
                map.remove(key);
            }
        }
    }
}

struct FlightState {
    notify: Notify,
    done: AtomicBool,
    refs: AtomicUsize,
}

impl FlightState {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            done: AtomicBool::new(false),
            refs: AtomicUsize::new(1),
        }
    }

    fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self) -> usize {
        self.refs.fetch_sub(1, Ordering::AcqRel) - 1
    }

    async fn wait(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.done.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    fn finish(&self) {
        self.done.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

pub struct FlightGuard<'a> {
    singleflight: &'a Singleflight,
    key: String,
    flight: Arc<FlightState>,
    is_leader: bool,
}

impl<'a> FlightGuard<'a> {
    fn new_leader(singleflight: &'a Singleflight, key: String, flight: Arc<FlightState>) -> Self {
        Self {
            singleflight,
            key,
            flight,
            is_leader: true,
        }
    }

    fn new_follower(singleflight: &'a Singleflight, key: String, flight: Arc<FlightState>) -> Self {
        Self {
            singleflight,
            key,
            flight,
            is_leader: false,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader
    }

    /// Wait until the leader of this flight has finished.
    pub async fn wait(&self) {
        self.flight.wait().await;
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.is_leader {
            self.singleflight.retire(&self.key, &self.flight);
            self.flight.finish();
        }
        self.singleflight.release(&self.key, &self.flight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn second_caller_follows() {
        let sf = Singleflight::default();
        let leader = sf.begin("regret");
        let follower = sf.begin("regret");
        let other = sf.begin("probe");
        assert!(leader.is_leader());
        assert!(!follower.is_leader());
        assert!(other.is_leader());
        drop(leader);
        assert!(!sf.in_flight("regret"));
        drop(follower);
        let next = sf.begin("regret");
        assert!(next.is_leader());
    }

    #[tokio::test]
    async fn follower_wakes_when_leader_finishes() {
        let sf = Arc::new(Singleflight::default());
        let sf2 = sf.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let leader_task = tokio::spawn(async move {
            let guard = sf2.begin("k");
            assert!(guard.is_leader());
            let _ = tx.send(());
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        rx.await.unwrap();
        let follower = sf.begin("k");
        assert!(!follower.is_leader());
        tokio::time::timeout(Duration::from_secs(2), follower.wait())
            .await
            .expect("follower released");
        leader_task.await.unwrap();
    }

    #[tokio::test]
    async fn wait_after_finish_returns_immediately() {
        let sf = Singleflight::default();
        let leader = sf.begin("k");
        let follower = sf.begin("k");
        drop(leader);
        tokio::time::timeout(Duration::from_millis(200), follower.wait())
            .await
            .expect("no lost wakeup");
    }
}
