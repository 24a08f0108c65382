//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! request task
//!     → throttle.rs (global leaky bucket, delays only)
//!     → engine (blocked list → exemption → per-client window counter)
//!     → Decision::Allow | Decision::Blocked | Decision::CapExceeded
//!
//! threshold crossing
//!     → notify.rs (webhook, spawned after the engine lock is released)
//! ```
//!
//! # Design Decisions
//! - One process-wide mutex serializes every counter read-modify-write, so
//!   concurrent requests for the same identity cannot lose updates or
//!   double-fire alerts
//! - Alerts fire on the crossing transition (previous count below the cap,
//!   new count at or above it), once per window
//! - A seen marker with the window's remaining TTL additionally deduplicates
//!   hard-cap alerts
//! - Every accepted request rewrites the counter with a full window TTL: the
//!   window rolls forward under load rather than ticking on a fixed clock

pub mod policy;
pub mod throttle;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time;

use crate::cache::TtlCache;
use crate::config::AdmissionConfig;
use crate::notify::Notifier;
use crate::observability::metrics;
use policy::IpPolicy;

/// How often expired window entries are physically removed.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Outcome of the per-client admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward the request.
    Allow,
    /// Identity is on the blocked list.
    Blocked,
    /// Identity spent its hard cap for the current window.
    CapExceeded { retry_after: Duration },
}

struct Verdict {
    decision: Decision,
    soft_crossed: bool,
    hard_crossed: bool,
}

/// Per-client capping and alerting over the shared TTL cache.
pub struct AdmissionEngine {
    policy: IpPolicy,
    soft_cap: u32,
    hard_cap: u32,
    window: Duration,
    counters: TtlCache<u32>,
    seen: TtlCache<()>,
    lock: Mutex<()>,
    upstream_host: String,
    notifier: Arc<Notifier>,
}

impl AdmissionEngine {
    /// Build the engine from validated configuration. `upstream_host` only
    /// labels alert messages.
    pub fn new(config: &AdmissionConfig, upstream_host: String, notifier: Arc<Notifier>) -> Self {
        Self {
            policy: IpPolicy::new(&config.blocked_ips, &config.always_allowed_ips),
            soft_cap: config.soft_cap_per_minute,
            hard_cap: config.hard_cap_per_minute,
            window: Duration::from_secs(config.window_secs),
            counters: TtlCache::new(),
            seen: TtlCache::new(),
            lock: Mutex::new(()),
            upstream_host,
            notifier,
        }
    }

    /// Decide whether `identity` may proceed and record the request against
    /// its window. `origin` and `session` only annotate alerts and logs.
    ///
    /// Threshold alerts are dispatched on detached tasks after the engine
    /// lock is released, so delivery never delays or fails the request.
    pub fn check_and_record(&self, identity: &str, origin: &str, session: u64) -> Decision {
        if self.policy.is_blocked(identity) {
            metrics::record_rejection("blocked");
            return Decision::Blocked;
        }
        if self.policy.is_always_allowed(identity) {
            return Decision::Allow;
        }

        let verdict = self.evaluate(identity);

        if verdict.soft_crossed {
            tracing::warn!(
                client = %identity,
                origin = %origin,
                cap = self.soft_cap,
                session,
                "soft cap reached"
            );
            metrics::record_alert("soft_cap");
            self.dispatch_alert(format!(
                "⚠️ SOFT cap reached ({} req/min) IP={} ORIGIN={} PROXY={} ID={}",
                self.soft_cap, identity, origin, self.upstream_host, session
            ));
        }
        if verdict.hard_crossed {
            tracing::warn!(
                client = %identity,
                origin = %origin,
                cap = self.hard_cap,
                session,
                "hard cap reached"
            );
            metrics::record_alert("hard_cap");
            self.dispatch_alert(format!(
                "🚫 HARD cap reached ({} req/min) IP={} ORIGIN={} PROXY={} ID={}",
                self.hard_cap, identity, origin, self.upstream_host, session
            ));
        }
        if matches!(verdict.decision, Decision::CapExceeded { .. }) {
            metrics::record_rejection("hard_cap");
        }

        verdict.decision
    }

    /// The serialized read-modify-write over the counter and seen caches.
    fn evaluate(&self, identity: &str) -> Verdict {
        let _guard = self.lock.lock().expect("admission mutex poisoned");
        let now = Instant::now();

        let (prev, window_expires_at) = match self.counters.get(identity) {
            Some((count, expires_at)) => (count, expires_at),
            None => (0, now + self.window),
        };

        if prev >= self.hard_cap {
            return Verdict {
                decision: Decision::CapExceeded {
                    retry_after: window_expires_at.saturating_duration_since(now),
                },
                soft_crossed: false,
                hard_crossed: false,
            };
        }

        let count = prev + 1;
        let soft_crossed = prev < self.soft_cap && count >= self.soft_cap;
        let mut hard_crossed = prev < self.hard_cap && count >= self.hard_cap;
        if hard_crossed {
            if self.seen.get(identity).is_some() {
                hard_crossed = false;
            } else {
                let remaining = window_expires_at.saturating_duration_since(now);
                self.seen.set(identity, (), remaining);
            }
        }

        self.counters.set(identity, count, self.window);

        Verdict {
            decision: Decision::Allow,
            soft_crossed,
            hard_crossed,
        }
    }

    fn dispatch_alert(&self, message: String) {
        if !self.notifier.is_enabled() {
            return;
        }
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(&message).await {
                tracing::warn!(error = %err, "alert delivery failed");
            }
        });
    }

    /// Periodically remove expired window entries until shutdown.
    pub async fn run_sweeper(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.counters.purge_expired();
                    self.seen.purge_expired();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("admission sweeper stopping");
                    break;
                }
            }
        }
    }
}

/// Whole seconds, rounded to the nearest, for retry-after messages.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_secs_f64().round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifierConfig;

    fn engine(soft: u32, hard: u32) -> AdmissionEngine {
        let config = AdmissionConfig {
            soft_cap_per_minute: soft,
            hard_cap_per_minute: hard,
            window_secs: 60,
            blocked_ips: vec!["198.51.100.1".to_string()],
            always_allowed_ips: vec!["127.0.0.1".to_string(), "198.51.100.1".to_string()],
            ..AdmissionConfig::default()
        };
        AdmissionEngine::new(
            &config,
            "upstream.example".to_string(),
            Arc::new(Notifier::new(&NotifierConfig::default())),
        )
    }

    #[test]
    fn blocked_wins_over_always_allowed() {
        let engine = engine(2, 3);
        assert_eq!(
            engine.check_and_record("198.51.100.1", "", 1),
            Decision::Blocked
        );
    }

    #[test]
    fn always_allowed_is_never_capped() {
        let engine = engine(1, 2);
        for session in 0..20 {
            assert_eq!(
                engine.check_and_record("127.0.0.1", "", session),
                Decision::Allow
            );
        }
    }

    #[test]
    fn soft_crossing_fires_once() {
        let engine = engine(3, 100);

        let first = engine.evaluate("10.1.1.1");
        let second = engine.evaluate("10.1.1.1");
        let third = engine.evaluate("10.1.1.1");
        let fourth = engine.evaluate("10.1.1.1");

        assert!(!first.soft_crossed);
        assert!(!second.soft_crossed);
        assert!(third.soft_crossed);
        assert!(!fourth.soft_crossed);
        assert_eq!(fourth.decision, Decision::Allow);
    }

    #[test]
    fn hard_crossing_alerts_then_rejects() {
        let engine = engine(1, 3);

        assert!(!engine.evaluate("10.2.2.2").hard_crossed);
        assert!(!engine.evaluate("10.2.2.2").hard_crossed);

        let crossing = engine.evaluate("10.2.2.2");
        assert!(crossing.hard_crossed);
        assert_eq!(crossing.decision, Decision::Allow);

        let rejected = engine.evaluate("10.2.2.2");
        assert!(!rejected.hard_crossed);
        match rejected.decision {
            Decision::CapExceeded { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(60));
            }
            other => panic!("expected CapExceeded, got {:?}", other),
        }
    }

    #[test]
    fn seen_marker_suppresses_repeat_hard_alerts() {
        let engine = engine(1, 2);

        engine.evaluate("10.3.3.3");
        assert!(engine.evaluate("10.3.3.3").hard_crossed);

        // Rewind the counter while the seen marker is still alive.
        engine.counters.set("10.3.3.3", 1, Duration::from_secs(60));
        assert!(!engine.evaluate("10.3.3.3").hard_crossed);
    }

    #[test]
    fn identities_are_counted_independently() {
        let engine = engine(1, 2);

        engine.evaluate("10.4.4.4");
        engine.evaluate("10.4.4.4");
        assert!(matches!(
            engine.check_and_record("10.4.4.4", "", 1),
            Decision::CapExceeded { .. }
        ));
        assert_eq!(engine.check_and_record("10.5.5.5", "", 2), Decision::Allow);
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let config = AdmissionConfig {
            soft_cap_per_minute: 1,
            hard_cap_per_minute: 1,
            window_secs: 1,
            ..AdmissionConfig::default()
        };
        let engine = AdmissionEngine::new(
            &config,
            "upstream.example".to_string(),
            Arc::new(Notifier::new(&NotifierConfig::default())),
        );

        assert_eq!(engine.evaluate("10.6.6.6").decision, Decision::Allow);
        assert!(matches!(
            engine.evaluate("10.6.6.6").decision,
            Decision::CapExceeded { .. }
        ));

        std::thread::sleep(Duration::from_millis(1100));
        let fresh = engine.evaluate("10.6.6.6");
        assert_eq!(fresh.decision, Decision::Allow);
        // a new window crosses the cap again
        assert!(fresh.hard_crossed);
    }

    #[test]
    fn retry_after_rounds_to_whole_seconds() {
        assert_eq!(retry_after_secs(Duration::from_millis(59_400)), 59);
        assert_eq!(retry_after_secs(Duration::from_millis(59_600)), 60);
        assert_eq!(retry_after_secs(Duration::ZERO), 0);
    }
}
