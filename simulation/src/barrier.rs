//! Reusable round barrier
//!
//! Every node meets every other node twice per round. The barrier counts
//! arrivals under a mutex and publishes each completed generation on a
//! `watch` channel, which waiting parties await.
//!
//! Parties can also leave. A node that has seen the coordinator's shutdown
//! leaves after its last round, and the remaining nodes carry on without
//! waiting for it. Shutdown reaches nodes in different rounds, so without
//! leaving, the first node to stop would strand everyone else at the next
//! rendezvous.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::BarrierError;

/// Outcome of a barrier wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult(bool);

impl BarrierWaitResult {
    /// True for exactly one party per generation: the one whose arrival released it
    pub fn is_leader(&self) -> bool {
        self.0
    }
}

#[derive(Debug)]
struct BarrierState {
    parties: usize,
    arrived: usize,
    generation: u64,
}

/// A deregistering barrier for a fixed initial number of parties
#[derive(Debug)]
pub struct RoundBarrier {
    state: Mutex<BarrierState>,
    generation: watch::Sender<u64>,
    timeout: Option<Duration>,
}

impl RoundBarrier {
    /// Create a barrier for `parties` participants
    pub fn new(parties: usize) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            state: Mutex::new(BarrierState {
                parties,
                arrived: 0,
                generation: 0,
            }),
            generation,
            timeout: None,
        }
    }

    /// Fail waits that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parties still registered
    pub fn parties(&self) -> usize {
        self.state.lock().parties
    }

    /// Completed generations so far
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Wait until every registered party has arrived
    pub async fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        let (target, mut rx) = {
            let mut state = self.state.lock();
            if state.parties == 0 {
                return Err(BarrierError::NoParties);
            }
            state.arrived += 1;
            if state.arrived >= state.parties {
                self.release(&mut state);
                return Ok(BarrierWaitResult(true));
            }
            // Subscribing under the lock means the release cannot be missed
            (state.generation + 1, self.generation.subscribe())
        };

        let released = async move {
            rx.wait_for(|generation| *generation >= target)
                .await
                .map(|_| ())
                .map_err(|_| BarrierError::Closed)
        };

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, released).await {
                Ok(result) => result?,
                Err(_) => {
                    self.withdraw(target);
                    return Err(BarrierError::TimedOut {
                        waited_ms: limit.as_millis() as u64,
                    });
                }
            },
            None => released.await?,
        }
        Ok(BarrierWaitResult(false))
    }

    /// Take back an arrival whose generation was never released
    fn withdraw(&self, target: u64) {
        let mut state = self.state.lock();
        if state.generation < target {
            state.arrived = state.arrived.saturating_sub(1);
        }
    }

    /// Permanently deregister one party
    ///
    /// Releases the current generation if everyone still registered has
    /// already arrived. A party that timed out has already withdrawn its
    /// arrival, so leaving afterwards does not release the others early.
    /// A wait dropped mid-flight is not withdrawn.
    pub fn leave(&self) {
        let mut state = self.state.lock();
        state.parties = state.parties.saturating_sub(1);
        if state.arrived > 0 && state.arrived >= state.parties {
            self.release(&mut state);
        }
    }

    fn release(&self, state: &mut BarrierState) {
        state.arrived = 0;
        state.generation += 1;
        self.generation.send_replace(state.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_single_leader_per_generation() {
        let barrier = Arc::new(RoundBarrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move { barrier.wait().await.unwrap() }));
        }

        let mut leaders = 0;
        for handle in handles {
            if handle.await.unwrap().is_leader() {
                leaders += 1;
            }
        }
        assert_eq!(leaders, 1);
        assert_eq!(barrier.generation(), 1);
    }

    #[tokio::test]
    async fn test_barrier_is_reusable_across_rounds() {
        const PARTIES: usize = 5;
        const ROUNDS: usize = 20;

        let barrier = Arc::new(RoundBarrier::new(PARTIES));
        let arrivals = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..PARTIES {
            let barrier = barrier.clone();
            let arrivals = arrivals.clone();
            handles.push(tokio::spawn(async move {
                for round in 0..ROUNDS {
                    arrivals.fetch_add(1, Ordering::SeqCst);
                    barrier.wait().await.unwrap();
                    // Nobody passes before the whole round has arrived
                    assert!(arrivals.load(Ordering::SeqCst) >= PARTIES * (round + 1));
                    barrier.wait().await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(barrier.generation(), (ROUNDS * 2) as u64);
    }

    #[test]
    fn test_leave_releases_waiting_parties() {
        let barrier = RoundBarrier::new(3);

        let mut first = tokio_test::task::spawn(barrier.wait());
        let mut second = tokio_test::task::spawn(barrier.wait());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        barrier.leave();
        assert!(first.is_woken());
        assert!(assert_ready!(first.poll()).is_ok());
        assert!(assert_ready!(second.poll()).is_ok());
        assert_eq!(barrier.parties(), 2);
    }

    #[test]
    fn test_leave_without_waiters_does_not_release() {
        let barrier = RoundBarrier::new(2);
        barrier.leave();
        assert_eq!(barrier.generation(), 0);
        assert_eq!(barrier.parties(), 1);

        // The remaining party passes straight through
        let mut wait = tokio_test::task::spawn(barrier.wait());
        let result = assert_ready!(wait.poll()).unwrap();
        assert!(result.is_leader());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let barrier = RoundBarrier::new(2).with_timeout(Some(Duration::from_millis(20)));
        let result = barrier.wait().await;
        assert!(matches!(result, Err(BarrierError::TimedOut { waited_ms: 20 })));
    }

    #[tokio::test]
    async fn test_leave_after_timeout_does_not_release_early() {
        let barrier = RoundBarrier::new(3).with_timeout(Some(Duration::from_millis(20)));
        assert!(matches!(barrier.wait().await, Err(BarrierError::TimedOut { .. })));

        let mut second = tokio_test::task::spawn(barrier.wait());
        assert_pending!(second.poll());

        // The timed-out party gives up its slot; one party is still missing
        barrier.leave();
        assert_eq!(barrier.parties(), 2);
        assert_eq!(barrier.generation(), 0);
        assert_pending!(second.poll());

        let mut third = tokio_test::task::spawn(barrier.wait());
        assert!(assert_ready!(third.poll()).unwrap().is_leader());
        assert!(assert_ready!(second.poll()).is_ok());
        assert_eq!(barrier.generation(), 1);
    }

    #[tokio::test]
    async fn test_empty_barrier_is_an_error() {
        let barrier = RoundBarrier::new(1);
        barrier.leave();
        assert!(matches!(barrier.wait().await, Err(BarrierError::NoParties)));
    }
}
