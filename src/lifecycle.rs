//! Page lifecycle: view changes and (re)injection of the download control.

use crate::{
    config::Config,
    discovery::{DiscoveryLog, Generation},
};

/// Owns the discovery log and knows which location the current view is for.
#[derive(Debug)]
pub struct Lifecycle {
    log: DiscoveryLog,
    location: String,
}

impl Lifecycle {
    pub fn new(log: DiscoveryLog, location: impl Into<String>) -> Self {
        Self { log, location: location.into() }
    }

    pub fn log(&self) -> &DiscoveryLog {
        &self.log
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Called on every document mutation. Starts a new view, clearing the log,
    /// only when `href` differs from the current location.
    pub fn observe_location(&mut self, href: &str) -> Option<Generation> {
        if href == self.location {
            return None;
        }
        self.location = href.to_owned();
        let generation = self.log.reset();
        log::info!("navigated to {href} ({generation})");
        Some(generation)
    }
}

/// Host-page operations needed to place the derived control.
pub trait ControlHost {
    type Native;

    /// The host's own control, if rendered yet.
    fn native_control(&self) -> Option<Self::Native>;

    /// Whether a derived control is already in the document.
    fn derived_present(&self) -> bool;

    /// Whether the derived control currently mirrors `native`.
    fn bound_to(&self, native: &Self::Native) -> bool;

    /// Build the derived control from `native` and insert it next to it.
    fn insert_derived(&self, native: Self::Native);

    /// Point an existing derived control at a re-rendered `native`.
    fn rebind(&self, native: Self::Native);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    Inserted,
    AlreadyPresent,
    /// The host re-rendered its control; the derived one now follows the new node.
    Rebound,
    NativeMissing,
}

/// Insert the derived control once, and keep it bound to the live native
/// control. Repeated calls leave a single instance.
pub fn ensure_control<H: ControlHost + ?Sized>(host: &H) -> Injection {
    let Some(native) = host.native_control() else {
        return Injection::NativeMissing;
    };
    if !host.derived_present() {
        host.insert_derived(native);
        return Injection::Inserted;
    }
    if host.bound_to(&native) {
        return Injection::AlreadyPresent;
    }
    host.rebind(native);
    Injection::Rebound
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    Done,
    RetryAfter(u32),
    GiveUp,
}

/// Bounded backoff for a native control that renders asynchronously. One
/// instance per view; it stops as soon as the view changes.
#[derive(Debug, Clone)]
pub struct InjectionRetry {
    generation: Generation,
    attempts: u32,
    max_attempts: u32,
    interval_ms: u32,
}

impl InjectionRetry {
    pub fn new(generation: Generation, cfg: &Config) -> Self {
        Self {
            generation,
            attempts: 0,
            max_attempts: cfg.inject_attempts,
            interval_ms: cfg.inject_interval_ms,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// One injection attempt, and what to do next.
    pub fn attempt<H: ControlHost + ?Sized>(&mut self, host: &H, log: &DiscoveryLog) -> RetryStep {
        if log.generation() != self.generation {
            return RetryStep::GiveUp;
        }
        self.attempts += 1;
        match ensure_control(host) {
            Injection::Inserted | Injection::AlreadyPresent | Injection::Rebound => RetryStep::Done,
            Injection::NativeMissing if self.attempts < self.max_attempts => {
                RetryStep::RetryAfter(self.interval_ms)
            }
            Injection::NativeMissing => {
                log::warn!("native control not found after {} attempts", self.attempts);
                RetryStep::GiveUp
            }
        }
    }
}
