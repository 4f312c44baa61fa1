//! One user request end to end: acquire a URL, then download it.

use std::cell::Cell;

use crate::{
    acquire::{Acquisition, PollPolicy, Tick, Ticker, acquire, run_session},
    config::Config,
    discovery::DiscoveryLog,
    download::{DownloadPlan, Transport, download},
    error::{GrabError, GrabResult},
    page::Page,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grabbed {
    pub url: String,
    pub filename: String,
    pub bytes: usize,
}

pub struct Engine {
    config: Config,
    log: DiscoveryLog,
    in_flight: Cell<bool>,
}

/// Clears the in-flight flag when the request ends, however it ends.
struct FlightGuard<'a>(&'a Cell<bool>);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Engine {
    pub fn new(config: Config, log: DiscoveryLog) -> Self {
        Self { config, log, in_flight: Cell::new(false) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log(&self) -> &DiscoveryLog {
        &self.log
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.get()
    }

    fn begin(&self) -> Option<FlightGuard<'_>> {
        if self.in_flight.replace(true) {
            return None;
        }
        Some(FlightGuard(&self.in_flight))
    }

    /// Resolve the asset URL and save it. Only one request runs at a time;
    /// a click while one is running gets `Busy`.
    pub async fn grab<P, T, K>(&self, page: &P, transport: &T, ticker: &K) -> GrabResult<Grabbed>
    where
        P: Page + ?Sized,
        T: Transport + ?Sized,
        K: Ticker,
    {
        let Some(_flight) = self.begin() else {
            log::debug!("ignoring request, one is already in flight");
            return Err(GrabError::Busy);
        };

        let url = match acquire(&self.log, page, PollPolicy::from(&self.config)) {
            Acquisition::Ready(url) => url,
            Acquisition::Polling(session) => match run_session(session, &self.log, page, ticker).await {
                Tick::Resolved(url) => url,
                Tick::TimedOut { attempts } => {
                    log::warn!("no model URL after {attempts} attempts");
                    return Err(GrabError::NotFound { attempts });
                }
                Tick::Stale | Tick::Pending => return Err(GrabError::Superseded),
            },
        };

        let plan = DownloadPlan::new(url, page.title().as_deref(), &self.config.naming);
        let bytes = download(transport, &plan).await?;
        Ok(Grabbed { url: plan.url, filename: plan.filename, bytes })
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::{
        acquire::fake::FakeClock, discovery::Channel, download::fake::FakeTransport,
        page::fake::FakePage,
    };

    const URL: &str = "https://web-api.ikea.com/assets/12345_abc.glb";

    #[test]
    fn logged_url_is_downloaded_immediately() {
        let engine = Engine::new(Config::default(), DiscoveryLog::new());
        engine.log().capture(Channel::Network).observe(Some("https://x/partial.glb"));
        engine.log().capture(Channel::Network).observe(Some(URL));
        let page = FakePage::titled("Red Lamp - IKEA");
        let transport = FakeTransport::serving(URL, &[0u8; 64]);
        let clock = FakeClock::default();

        let grabbed = block_on(engine.grab(&page, &transport, &clock)).unwrap();
        assert_eq!(grabbed.url, URL);
        assert_eq!(grabbed.filename, "Red Lamp (12345).glb");
        assert_eq!(grabbed.bytes, 64);
        assert_eq!(clock.sleeps.get(), 0);
        assert_eq!(page.activations.get(), 0);
        assert!(!engine.is_busy());
    }

    #[test]
    fn polls_after_activation_then_downloads() {
        let engine = Engine::new(Config::default(), DiscoveryLog::new());
        let page = FakePage::titled("Blue Chair, Oak - IKEA");
        page.appear_after.replace(Some((2, URL.into())));
        let transport = FakeTransport::serving(URL, b"glb");
        let clock = FakeClock::default();

        let grabbed = block_on(engine.grab(&page, &transport, &clock)).unwrap();
        assert_eq!(grabbed.filename, "Blue Chair - Oak (12345).glb");
        assert_eq!(page.activations.get(), 1);
        assert_eq!(clock.sleeps.get(), 2);
    }

    #[test]
    fn timeout_downloads_nothing() {
        let engine = Engine::new(Config::default(), DiscoveryLog::new());
        let page = FakePage::default();
        let transport = FakeTransport::default();
        let clock = FakeClock::default();

        let err = block_on(engine.grab(&page, &transport, &clock)).unwrap_err();
        assert!(matches!(err, GrabError::NotFound { attempts: 30 }));
        assert!(err.notice().is_some());
        assert_eq!(clock.sleeps.get(), 30);
        assert!(transport.fetched.borrow().is_empty());
        assert!(!engine.is_busy());
    }

    #[test]
    fn navigation_mid_poll_is_not_acted_upon() {
        let log = DiscoveryLog::new();
        let engine = Engine::new(Config::default(), log.clone());
        let page = FakePage::default();
        let transport = FakeTransport::serving("https://x/other.glb", b"x");
        let clock = FakeClock::default().at_tick(2, move || {
            log.reset();
            log.capture(Channel::Network).observe(Some("https://x/other.glb"));
        });

        let err = block_on(engine.grab(&page, &transport, &clock)).unwrap_err();
        assert!(matches!(err, GrabError::Superseded));
        assert!(err.notice().is_none());
        assert!(transport.fetched.borrow().is_empty());
    }

    #[test]
    fn second_request_while_in_flight_is_refused() {
        let engine = Engine::new(Config::default(), DiscoveryLog::new());
        engine.log().capture(Channel::Network).observe(Some(URL));
        let page = FakePage::default();
        let transport = FakeTransport::serving(URL, b"glb");
        let clock = FakeClock::default();

        let held = engine.begin();
        assert!(held.is_some());
        let err = block_on(engine.grab(&page, &transport, &clock)).unwrap_err();
        assert!(matches!(err, GrabError::Busy));

        drop(held);
        assert!(block_on(engine.grab(&page, &transport, &clock)).is_ok());
    }

    #[test]
    fn fetch_failure_surfaces_reason() {
        let engine = Engine::new(Config::default(), DiscoveryLog::new());
        engine.log().capture(Channel::Network).observe(Some(URL));
        let page = FakePage::default();
        let transport = FakeTransport::default();
        let clock = FakeClock::default();

        let err = block_on(engine.grab(&page, &transport, &clock)).unwrap_err();
        assert_eq!(err.notice().as_deref(), Some("Error downloading model: HTTP 404 Not Found"));
        assert!(!engine.is_busy());
    }
}
