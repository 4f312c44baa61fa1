//! Acquisition controller: resolve an asset URL now, or provoke the host
//! viewer and poll until one shows up.

use std::future::Future;

use crate::{
    config::Config,
    discovery::{Channel, DiscoveryLog, Generation},
    page::{Page, rendered_asset, scan_frames},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval_ms: u32,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval_ms: 500, max_attempts: 30 }
    }
}

impl From<&Config> for PollPolicy {
    fn from(cfg: &Config) -> Self {
        Self { interval_ms: cfg.poll_interval_ms, max_attempts: cfg.poll_attempts }
    }
}

#[derive(Debug)]
pub enum Acquisition {
    /// A URL was already known.
    Ready(String),
    /// The viewer was activated; drive the session until it terminates.
    Polling(PollSession),
}

/// Outcome of one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Resolved(String),
    Pending,
    TimedOut { attempts: u32 },
    /// The view changed since the session started.
    Stale,
}

impl Tick {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Tick::Pending)
    }
}

/// Bounded poll state machine bound to the view it was started in.
#[derive(Debug)]
pub struct PollSession {
    generation: Generation,
    attempts: u32,
    policy: PollPolicy,
    finished: bool,
}

impl PollSession {
    pub fn new(generation: Generation, policy: PollPolicy) -> Self {
        Self { generation, attempts: 0, policy, finished: false }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Run one attempt. Once a terminal outcome was returned, further calls
    /// keep returning `Stale` without touching the page.
    pub fn tick<P: Page + ?Sized>(&mut self, log: &DiscoveryLog, page: &P) -> Tick {
        if self.finished {
            return Tick::Stale;
        }
        let outcome = self.attempt(log, page);
        self.finished = outcome.is_terminal();
        outcome
    }

    fn attempt<P: Page + ?Sized>(&mut self, log: &DiscoveryLog, page: &P) -> Tick {
        if log.generation() != self.generation {
            log::debug!("poll session for {} abandoned, now at {}", self.generation, log.generation());
            return Tick::Stale;
        }
        self.attempts += 1;

        if let Some(url) = known_asset(log, page) {
            return Tick::Resolved(url);
        }
        if scan_frames(page, &log.capture(Channel::FrameScan)) > 0 {
            if let Some(url) = log.latest() {
                return Tick::Resolved(url);
            }
        }
        if self.attempts >= self.policy.max_attempts {
            return Tick::TimedOut { attempts: self.attempts };
        }
        Tick::Pending
    }
}

/// Steps 1 and 2: latest logged URL, else a rendered viewer's `src`.
fn known_asset<P: Page + ?Sized>(log: &DiscoveryLog, page: &P) -> Option<String> {
    log.latest().or_else(|| rendered_asset(page))
}

/// Resolve from what is known, else activate the viewer and hand back a
/// session to poll.
pub fn acquire<P: Page + ?Sized>(log: &DiscoveryLog, page: &P, policy: PollPolicy) -> Acquisition {
    if let Some(url) = known_asset(log, page) {
        return Acquisition::Ready(url);
    }
    log::info!("no model URL known yet, activating the viewer");
    page.activate_viewer();
    Acquisition::Polling(PollSession::new(log.generation(), policy))
}

/// Source of poll ticks. The browser uses real timers; tests use a fake clock.
pub trait Ticker {
    fn sleep(&self, ms: u32) -> impl Future<Output = ()>;
}

/// Drive `session` to a terminal outcome, sleeping one interval before each
/// attempt.
pub async fn run_session<P: Page + ?Sized, T: Ticker>(
    mut session: PollSession,
    log: &DiscoveryLog,
    page: &P,
    ticker: &T,
) -> Tick {
    loop {
        ticker.sleep(session.policy.interval_ms).await;
        let outcome = session.tick(log, page);
        if outcome.is_terminal() {
            return outcome;
        }
    }
}


#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use futures::executor::block_on;

    use super::{fake::FakeClock, *};
    use crate::page::{FrameAccessError, fake::FakePage};

    #[test]
    fn resolves_latest_logged_url_first() {
        let log = DiscoveryLog::new();
        let net = log.capture(Channel::Network);
        net.observe(Some("https://x/A.glb"));
        net.observe(Some("https://x/B.glb"));
        let page = FakePage::default();
        page.viewers.replace(vec![Some("https://x/C.glb".into())]);

        match acquire(&log, &page, PollPolicy::default()) {
            Acquisition::Ready(url) => assert_eq!(url, "https://x/B.glb"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(page.activations.get(), 0);
    }

    #[test]
    fn rendered_viewer_resolves_without_activation() {
        let log = DiscoveryLog::new();
        let page = FakePage::default();
        page.viewers.replace(vec![Some("https://x/1_a.glb".into())]);

        match acquire(&log, &page, PollPolicy::default()) {
            Acquisition::Ready(url) => assert_eq!(url, "https://x/1_a.glb"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(page.activations.get(), 0);
    }

    #[test]
    fn viewer_appearing_after_activation_is_found_within_two_ticks() {
        let log = DiscoveryLog::new();
        let page = FakePage::default();
        // Probes are counted from activation on: tick 1 misses, tick 2 hits.
        page.appear_after.replace(Some((2, "https://x/77_model.glb".into())));

        let Acquisition::Polling(session) = acquire(&log, &page, PollPolicy::default()) else {
            panic!("expected polling");
        };
        assert_eq!(page.activations.get(), 1);

        let clock = FakeClock::default();
        let outcome = block_on(run_session(session, &log, &page, &clock));
        assert_eq!(outcome, Tick::Resolved("https://x/77_model.glb".into()));
        assert_eq!(clock.sleeps.get(), 2);
        assert_eq!(clock.now_ms.get(), 1000);
    }

    #[test]
    fn times_out_after_exactly_max_attempts() {
        let log = DiscoveryLog::new();
        let page = FakePage::default();
        let Acquisition::Polling(session) = acquire(&log, &page, PollPolicy::default()) else {
            panic!("expected polling");
        };

        let clock = FakeClock::default();
        let outcome = block_on(run_session(session, &log, &page, &clock));
        assert_eq!(outcome, Tick::TimedOut { attempts: 30 });
        assert_eq!(clock.sleeps.get(), 30);
        assert_eq!(clock.now_ms.get(), 15_000);
    }

    #[test]
    fn network_capture_during_polling_resolves() {
        let log = DiscoveryLog::new();
        let page = FakePage::default();
        let Acquisition::Polling(session) = acquire(&log, &page, PollPolicy::default()) else {
            panic!("expected polling");
        };

        let net = log.capture(Channel::Network);
        let clock = FakeClock::default().at_tick(4, move || {
            net.observe(Some("https://x/low.glb"));
            net.observe(Some("https://x/high.glb"));
        });
        let outcome = block_on(run_session(session, &log, &page, &clock));
        assert_eq!(outcome, Tick::Resolved("https://x/high.glb".into()));
        assert_eq!(clock.sleeps.get(), 4);
    }

    #[test]
    fn iframe_models_resolve_on_the_same_tick() {
        let log = DiscoveryLog::new();
        let page = FakePage::default();
        page.frames.replace(vec![
            Err(FrameAccessError { index: 0, reason: "cross-origin".into() }),
            Ok(vec!["https://x/5_frame.glb".into()]),
        ]);
        let mut session = PollSession::new(log.generation(), PollPolicy::default());
        assert_eq!(session.tick(&log, &page), Tick::Resolved("https://x/5_frame.glb".into()));
        assert_eq!(session.attempts(), 1);
    }

    #[test]
    fn navigation_makes_the_session_stale() {
        let log = Rc::new(DiscoveryLog::new());
        let page = FakePage::default();
        let Acquisition::Polling(session) = acquire(&*log, &page, PollPolicy::default()) else {
            panic!("expected polling");
        };

        let nav = Rc::clone(&log);
        let clock = FakeClock::default().at_tick(3, move || {
            nav.reset();
            nav.capture(Channel::Network).observe(Some("https://x/other_product.glb"));
        });
        let outcome = block_on(run_session(session, &log, &page, &clock));
        assert_eq!(outcome, Tick::Stale);
        assert_eq!(clock.sleeps.get(), 3);
    }

    #[test]
    fn finished_session_never_resolves_again() {
        let log = DiscoveryLog::new();
        let page = FakePage::default();
        let mut session = PollSession::new(log.generation(), PollPolicy { interval_ms: 10, max_attempts: 1 });
        assert_eq!(session.tick(&log, &page), Tick::TimedOut { attempts: 1 });
        log.capture(Channel::Network).observe(Some("https://x/late.glb"));
        assert_eq!(session.tick(&log, &page), Tick::Stale);
    }
}
