//! Per-layer circuit breaker

use cache_chain_core::{CacheError, CircuitState, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Call counters accumulated within one breaker generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Counts::default();
    }

    /// Fraction of requests in this generation that failed
    pub fn failure_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            f64::from(self.total_failures) / f64::from(self.requests)
        }
    }
}

/// Predicate deciding when accumulated counts open the circuit
pub type TripPredicate = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

type StateObserver = Box<dyn Fn(&str, CircuitState) + Send + Sync>;

/// Default trip predicate: at least 20 requests with a failure rate of 15%
pub fn default_trip(counts: &Counts) -> bool {
    counts.requests >= 20 && counts.failure_rate() >= 0.15
}

/// Circuit breaker configuration
#[derive(Clone)]
pub struct BreakerConfig {
    /// Maximum concurrent probes permitted while half-open
    pub max_requests: u32,
    /// Rolling window after which closed-state counts reset (zero = never)
    pub interval: Duration,
    /// How long the breaker stays open before probing
    pub timeout: Duration,
    /// Predicate consulted after every closed-state failure
    pub ready_to_trip: TripPredicate,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            ready_to_trip: Arc::new(default_trip),
        }
    }
}

impl fmt::Debug for BreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BreakerConfig")
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BreakerConfig {
    /// Set the half-open probe limit
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Set the closed-state rolling window
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the open-state duration
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the trip predicate
    pub fn ready_to_trip(
        mut self,
        predicate: impl Fn(&Counts) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.ready_to_trip = Arc::new(predicate);
        self
    }
}

#[derive(Debug)]
struct Shared {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// Per-layer state machine protecting a single wrapped backend
///
/// Callers obtain a generation token from [`before_call`], perform the
/// operation, and report the outcome through [`after_call`]. Outcomes from a
/// previous generation are discarded, so a slow call finishing after the
/// breaker has moved on cannot corrupt the new window.
///
/// [`before_call`]: CircuitBreaker::before_call
/// [`after_call`]: CircuitBreaker::after_call
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    shared: Mutex<Shared>,
    observer: Option<StateObserver>,
}

impl CircuitBreaker {
    /// Create a breaker for the named layer
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let expiry = (!config.interval.is_zero()).then(|| Instant::now() + config.interval);
        Self {
            name: name.into(),
            config,
            shared: Mutex::new(Shared {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
            observer: None,
        }
    }

    /// Attach a state-transition observer, invoked once per edge
    pub fn with_observer(
        mut self,
        observer: impl Fn(&str, CircuitState) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Layer name this breaker protects
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, advancing open to half-open when the timeout elapsed
    pub fn state(&self) -> CircuitState {
        let mut edges = Vec::new();
        let state = {
            let mut shared = self.shared.lock();
            self.roll(&mut shared, Instant::now(), &mut edges);
            shared.state
        };
        self.notify(&edges);
        state
    }

    /// Snapshot of the current generation's counters
    pub fn counts(&self) -> Counts {
        let mut edges = Vec::new();
        let counts = {
            let mut shared = self.shared.lock();
            self.roll(&mut shared, Instant::now(), &mut edges);
            shared.counts
        };
        self.notify(&edges);
        counts
    }

    /// Gate a call; returns the generation token to report the outcome with
    pub(crate) fn before_call(&self) -> Result<u64> {
        let mut edges = Vec::new();
        let result = {
            let mut shared = self.shared.lock();
            let now = Instant::now();
            self.roll(&mut shared, now, &mut edges);
            match shared.state {
                CircuitState::Closed => {
                    shared.counts.on_request();
                    Ok(shared.generation)
                }
                CircuitState::Open => Err(CacheError::CircuitOpen(self.name.clone())),
                CircuitState::HalfOpen => {
                    // Excess probes are rejected exactly like an open circuit
                    if shared.counts.requests >= self.config.max_requests {
                        Err(CacheError::CircuitOpen(self.name.clone()))
                    } else {
                        shared.counts.on_request();
                        Ok(shared.generation)
                    }
                }
            }
        };
        self.notify(&edges);
        result
    }

    /// Report a call outcome for the given generation
    pub(crate) fn after_call(&self, generation: u64, success: bool) {
        let mut edges = Vec::new();
        {
            let mut shared = self.shared.lock();
            let now = Instant::now();
            self.roll(&mut shared, now, &mut edges);
            if shared.generation == generation {
                if success {
                    shared.counts.on_success();
                    if shared.state == CircuitState::HalfOpen {
                        self.set_state(&mut shared, CircuitState::Closed, now, &mut edges);
                    }
                } else {
                    shared.counts.on_failure();
                    match shared.state {
                        CircuitState::Closed => {
                            if (self.config.ready_to_trip)(&shared.counts) {
                                self.set_state(&mut shared, CircuitState::Open, now, &mut edges);
                            }
                        }
                        CircuitState::HalfOpen => {
                            self.set_state(&mut shared, CircuitState::Open, now, &mut edges);
                        }
                        CircuitState::Open => {}
                    }
                }
            }
        }
        self.notify(&edges);
    }

    /// Advance time-driven transitions: closed-window reset, open → half-open
    fn roll(&self, shared: &mut Shared, now: Instant, edges: &mut Vec<CircuitState>) {
        match shared.state {
            CircuitState::Closed => {
                if shared.expiry.is_some_and(|expiry| now >= expiry) {
                    // Rolling window reset; not a state edge
                    shared.generation += 1;
                    shared.counts.clear();
                    shared.expiry =
                        (!self.config.interval.is_zero()).then(|| now + self.config.interval);
                }
            }
            CircuitState::Open => {
                if shared.expiry.is_some_and(|expiry| now >= expiry) {
                    self.set_state(shared, CircuitState::HalfOpen, now, edges);
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn set_state(
        &self,
        shared: &mut Shared,
        state: CircuitState,
        now: Instant,
        edges: &mut Vec<CircuitState>,
    ) {
        if shared.state == state {
            return;
        }
        shared.state = state;
        shared.generation += 1;
        shared.counts.clear();
        shared.expiry = match state {
            CircuitState::Closed => {
                (!self.config.interval.is_zero()).then(|| now + self.config.interval)
            }
            CircuitState::Open => Some(now + self.config.timeout),
            CircuitState::HalfOpen => None,
        };
        edges.push(state);
    }

    fn notify(&self, edges: &[CircuitState]) {
        if let Some(observer) = &self.observer {
            for state in edges {
                observer(&self.name, *state);
            }
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick_config() -> BreakerConfig {
        BreakerConfig::default()
            .timeout(Duration::from_millis(50))
            .ready_to_trip(|counts| counts.consecutive_failures >= 3)
    }

    #[test]
    fn test_default_trip_predicate() {
        let mut counts = Counts::default();
        for _ in 0..19 {
            counts.on_request();
            counts.on_failure();
        }
        assert!(!default_trip(&counts));

        counts.on_request();
        counts.on_failure();
        assert!(default_trip(&counts));

        // 20 requests but a low failure rate stays closed
        let mut healthy = Counts::default();
        for _ in 0..20 {
            healthy.on_request();
            healthy.on_success();
        }
        assert!(!default_trip(&healthy));
    }

    #[test]
    fn test_trips_to_open() {
        let breaker = CircuitBreaker::new("l1", quick_config());

        for _ in 0..3 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = breaker.before_call().unwrap_err();
        assert_eq!(err.kind().as_str(), "circuit_breaker_open");
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let breaker = CircuitBreaker::new("l1", quick_config());

        for _ in 0..2 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        let generation = breaker.before_call().unwrap();
        breaker.after_call(generation, true);
        for _ in 0..2 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_to_half_open_after_timeout() {
        let breaker = CircuitBreaker::new("l1", quick_config());
        for _ in 0..3 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes() {
        let breaker = CircuitBreaker::new("l1", quick_config());
        for _ in 0..3 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        std::thread::sleep(Duration::from_millis(60));

        let generation = breaker.before_call().unwrap();
        breaker.after_call(generation, true);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("l1", quick_config());
        for _ in 0..3 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        std::thread::sleep(Duration::from_millis(60));

        let generation = breaker.before_call().unwrap();
        breaker.after_call(generation, false);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_probe_limit() {
        let config = quick_config().max_requests(2);
        let breaker = CircuitBreaker::new("l1", config);
        for _ in 0..3 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Two in-flight probes allowed, the third is rejected
        let first = breaker.before_call();
        let second = breaker.before_call();
        let third = breaker.before_call();
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(third.is_err());
    }

    #[test]
    fn test_closed_window_reset() {
        let config = quick_config().interval(Duration::from_millis(30));
        let breaker = CircuitBreaker::new("l1", config);

        for _ in 0..2 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        assert_eq!(breaker.counts().consecutive_failures, 2);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(breaker.counts(), Counts::default());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let config = quick_config().interval(Duration::from_millis(20));
        let breaker = CircuitBreaker::new("l1", config);

        let generation = breaker.before_call().unwrap();
        std::thread::sleep(Duration::from_millis(30));
        // The window rolled while the call was in flight
        breaker.after_call(generation, false);
        assert_eq!(breaker.counts().total_failures, 0);
    }

    #[test]
    fn test_observer_fires_once_per_edge() {
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let seen = transitions.clone();
        let breaker = CircuitBreaker::new("l1", quick_config())
            .with_observer(move |_, state| seen.lock().push(state));

        for _ in 0..3 {
            let generation = breaker.before_call().unwrap();
            breaker.after_call(generation, false);
        }
        std::thread::sleep(Duration::from_millis(60));
        let generation = breaker.before_call().unwrap();
        breaker.after_call(generation, true);

        assert_eq!(
            *transitions.lock(),
            vec![
                CircuitState::Open,
                CircuitState::HalfOpen,
                CircuitState::Closed
            ]
        );
    }

    #[test]
    fn test_open_rejections_do_not_touch_backend_accounting() {
        let invocations = AtomicUsize::new(0);
        let breaker = CircuitBreaker::new("l1", quick_config());

        for _ in 0..3 {
            let generation = breaker.before_call().unwrap();
            invocations.fetch_add(1, Ordering::Relaxed);
            breaker.after_call(generation, false);
        }
        for _ in 0..10 {
            if let Ok(generation) = breaker.before_call() {
                invocations.fetch_add(1, Ordering::Relaxed);
                breaker.after_call(generation, false);
            }
        }
        assert_eq!(invocations.load(Ordering::Relaxed), 3);
    }
}
