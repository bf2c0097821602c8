//! Per-callsite log sampling.
//!
//! Within each tick the first `first` events from a callsite pass, after
//! that only every `thereafter`-th one does. Counters reset when the tick
//! elapses. Spans are never sampled.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::callsite::Identifier;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_FIRST: u64 = 100;
pub const DEFAULT_THEREAFTER: u64 = 100;

#[derive(Debug)]
pub struct Sampler {
    tick: Duration,
    first: u64,
    thereafter: u64,
    counters: Mutex<HashMap<Identifier, Counter>>,
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    window_start: Instant,
    seen: u64,
}

impl Counter {
    fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            seen: 0,
        }
    }

    fn admit(&mut self, now: Instant, tick: Duration, first: u64, thereafter: u64) -> bool {
        if now.saturating_duration_since(self.window_start) >= tick {
            self.window_start = now;
            self.seen = 0;
        }
        self.seen += 1;

        if self.seen <= first {
            return true;
        }
        thereafter > 0 && (self.seen - first) % thereafter == 0
    }
}

impl Sampler {
    pub fn new(tick: Duration, first: u64, thereafter: u64) -> Self {
        Self {
            tick,
            first,
            thereafter,
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn admit(&self, callsite: Identifier, now: Instant) -> bool {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(callsite)
            .or_insert_with(|| Counter::new(now))
            .admit(now, self.tick, self.first, self.thereafter)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK, DEFAULT_FIRST, DEFAULT_THEREAFTER)
    }
}

impl<S: Subscriber> Layer<S> for Sampler {
    // Runs only once every layer's `enabled` has passed, so events dropped
    // by the level filter are never counted.
    fn event_enabled(&self, event: &Event<'_>, _ctx: Context<'_, S>) -> bool {
        self.admit(event.metadata().callsite(), Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_events_pass_then_every_nth() {
        let start = Instant::now();
        let mut counter = Counter::new(start);

        let admitted: Vec<u64> = (1..=30)
            .filter(|_| counter.admit(start, Duration::from_secs(1), 5, 10))
            .collect();

        // 5 leading events, then the 15th, 25th
        assert_eq!(admitted.len(), 7);
    }

    #[test]
    fn test_counter_resets_after_tick() {
        let start = Instant::now();
        let tick = Duration::from_millis(10);
        let mut counter = Counter::new(start);

        assert!(counter.admit(start, tick, 1, 100));
        assert!(!counter.admit(start, tick, 1, 100));

        let later = start + Duration::from_millis(20);
        assert!(counter.admit(later, tick, 1, 100));
    }

    #[test]
    fn test_zero_thereafter_drops_overflow() {
        let start = Instant::now();
        let mut counter = Counter::new(start);
        assert!(counter.admit(start, DEFAULT_TICK, 1, 0));
        for _ in 0..10 {
            assert!(!counter.admit(start, DEFAULT_TICK, 1, 0));
        }
    }

    #[test]
    fn test_sampler_limits_events_from_one_callsite() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tracing_subscriber::layer::SubscriberExt;

        struct CountEvents(Arc<AtomicUsize>);
        impl<S: Subscriber> Layer<S> for CountEvents {
            fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry()
            .with(Sampler::new(Duration::from_secs(60), 3, 1000))
            .with(CountEvents(count.clone()));

        tracing::subscriber::with_default(subscriber, || {
            for i in 0..50 {
                tracing::info!(i, "burst");
            }
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_filtered_events_are_not_counted() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;
        use tracing_subscriber::filter::LevelFilter;
        use tracing_subscriber::layer::SubscriberExt;

        struct CountEvents(Arc<AtomicUsize>);
        impl<S: Subscriber> Layer<S> for CountEvents {
            fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let sampler = Arc::new(Sampler::new(Duration::from_secs(60), 2, 1000));
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry()
            .with(LevelFilter::INFO)
            .with(SharedSampler(sampler.clone()))
            .with(CountEvents(count.clone()));

        tracing::subscriber::with_default(subscriber, || {
            for _ in 0..3 {
                emit_debug_then_info();
            }
        });

        // the dropped debug events never reach the counters
        assert_eq!(count.load(Ordering::SeqCst), 2);
        let counters = sampler.counters.lock().unwrap();
        assert_eq!(counters.len(), 1);
        assert_eq!(counters.values().next().unwrap().seen, 3);
    }

    fn emit_debug_then_info() {
        tracing::debug!("noisy");
        tracing::info!("kept");
    }

    struct SharedSampler(std::sync::Arc<Sampler>);

    impl<S: Subscriber> Layer<S> for SharedSampler {
        fn event_enabled(&self, event: &Event<'_>, ctx: Context<'_, S>) -> bool {
            Layer::<S>::event_enabled(&*self.0, event, ctx)
        }
    }
}
