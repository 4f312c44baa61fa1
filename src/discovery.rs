//! Per-view log of discovered asset URLs.
//!
//! The log is shared between the passive capture channels (writers) and the
//! acquisition controller (reader). Everything runs on the page's single UI
//! thread, so a `Rc<RefCell<..>>` handle is enough; every borrow is released
//! before control returns to the event loop.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::classify::is_asset_url;

/// Identity of one logical page view. Bumped on every navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// The independent producers feeding the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Network,
    ResourceTiming,
    ViewerAttribute,
    FrameScan,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Network => "network",
            Channel::ResourceTiming => "resource-timing",
            Channel::ViewerAttribute => "viewer-attribute",
            Channel::FrameScan => "frame-scan",
        })
    }
}

#[derive(Default)]
struct ViewLog {
    generation: Generation,
    urls: Vec<String>,
}

/// Cheap-to-clone handle on the log of the current view.
#[derive(Clone, Default)]
pub struct DiscoveryLog {
    inner: Rc<RefCell<ViewLog>>,
}

impl DiscoveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently appended URL. Later entries supersede earlier partial
    /// loads, so this is the one to download.
    pub fn latest(&self) -> Option<String> {
        self.inner.borrow().urls.last().cloned()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.inner.borrow().urls.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().urls.is_empty()
    }

    pub fn generation(&self) -> Generation {
        self.inner.borrow().generation
    }

    /// Start a new view: drop every entry and hand out a fresh generation.
    pub fn reset(&self) -> Generation {
        let mut log = self.inner.borrow_mut();
        log.urls.clear();
        log.generation = log.generation.next();
        log.generation
    }

    /// Append-only capability for one channel.
    pub fn capture(&self, channel: Channel) -> Capture {
        Capture { log: self.clone(), channel }
    }

    fn append(&self, url: &str) {
        self.inner.borrow_mut().urls.push(url.to_owned());
    }
}

impl fmt::Debug for DiscoveryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let log = self.inner.borrow();
        f.debug_struct("DiscoveryLog")
            .field("generation", &log.generation)
            .field("urls", &log.urls)
            .finish()
    }
}

/// What a capture channel is handed: it can offer candidates, nothing else.
#[derive(Clone)]
pub struct Capture {
    log: DiscoveryLog,
    channel: Channel,
}

impl Capture {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Appends `candidate` if it is an asset URL. Returns whether it was kept.
    pub fn observe(&self, candidate: Option<&str>) -> bool {
        match candidate {
            Some(url) if is_asset_url(Some(url)) => {
                log::debug!("[{}] captured {url}", self.channel);
                self.log.append(url);
                true
            }
            _ => false,
        }
    }
}
