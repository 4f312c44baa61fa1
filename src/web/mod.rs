//! Browser bindings: wires the engine's capabilities to the live page.

mod control;
mod intercept;
mod observe;
mod page;

use std::{cell::RefCell, future::Future, rc::Rc};

use anyhow::{Context, anyhow};
use js_sys::{Object, Reflect, WeakSet};
use once_cell::unsync::OnceCell;
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Document, Element, Node, NodeList, Window};

use crate::{
    acquire::Ticker,
    config::Config,
    discovery::DiscoveryLog,
    engine::Engine,
    error::GrabError,
    lifecycle::Lifecycle,
};

/// Global the user can set before the script loads to override `Config`.
const CONFIG_GLOBAL: &str = "__GLB_GRABBER__";

/// Page-lifetime state shared by every callback.
pub(crate) struct Runtime {
    engine: Engine,
    lifecycle: RefCell<Lifecycle>,
    /// Viewer elements that already carry an attribute observer.
    watched_viewers: WeakSet,
    /// What the derived control currently mirrors.
    binding: RefCell<Option<control::Binding>>,
}

impl Runtime {
    fn new(config: Config, log: DiscoveryLog, href: String) -> Rc<Self> {
        Rc::new(Self {
            lifecycle: RefCell::new(Lifecycle::new(log.clone(), href)),
            engine: Engine::new(config, log),
            watched_viewers: WeakSet::new(),
            binding: RefCell::new(None),
        })
    }
}

thread_local! {
    static RUNTIME: OnceCell<Rc<Runtime>> = OnceCell::new();
}

fn window() -> anyhow::Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("no `window` in this context"))
}

fn document() -> anyhow::Result<Document> {
    window()?.document().ok_or_else(|| anyhow!("window has no document"))
}

fn js_err(e: JsValue) -> anyhow::Error {
    anyhow!("{e:?}")
}

/// Elements of a node list. Checks the node type rather than `instanceof`,
/// which fails for nodes from another realm such as a same-origin iframe.
fn element_list(nodes: &NodeList) -> Vec<Element> {
    (0..nodes.length())
        .filter_map(|i| nodes.get(i))
        .filter(|n| n.node_type() == Node::ELEMENT_NODE)
        .map(|n| n.unchecked_into::<Element>())
        .collect()
}

/// Plain JS object from key/value pairs, for the various `*Init` dictionaries.
fn options(pairs: &[(&str, JsValue)]) -> Result<Object, JsValue> {
    let obj = Object::new();
    for (key, value) in pairs {
        Reflect::set(&obj, &JsValue::from_str(key), value)?;
    }
    Ok(obj)
}

fn load_config(window: &Window) -> (Config, Option<GrabError>) {
    let raw = match Reflect::get(window, &JsValue::from_str(CONFIG_GLOBAL)) {
        Ok(v) if !v.is_undefined() && !v.is_null() => v,
        _ => return (Config::default(), None),
    };
    let text = js_sys::JSON::stringify(&raw)
        .ok()
        .and_then(|s| s.as_string())
        .unwrap_or_default();
    match Config::from_json(&text) {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    }
}

/// Install the capture channels right away and wire the DOM once it exists.
pub fn boot() -> anyhow::Result<()> {
    let window = window()?;
    let (config, config_err) = load_config(&window);
    console_log::init_with_level(config.level()).ok();
    if let Some(e) = config_err {
        log::warn!("ignoring `{CONFIG_GLOBAL}`: {e}");
    }

    let log = DiscoveryLog::new();
    intercept::install(&window, &log).context("installing network capture")?;

    let href = window.location().href().map_err(js_err)?;
    let runtime = Runtime::new(config, log, href);
    RUNTIME
        .with(|cell| cell.set(Rc::clone(&runtime)))
        .map_err(|_| anyhow!("already installed on this page"))?;

    let document = document()?;
    if document.ready_state() == "loading" {
        let ready = Closure::once_into_js(move || {
            if let Err(e) = observe::on_dom_ready(&runtime) {
                log::error!("wiring the page failed: {e:#}");
            }
        });
        document
            .add_event_listener_with_callback("DOMContentLoaded", ready.unchecked_ref())
            .map_err(js_err)?;
    } else {
        observe::on_dom_ready(&runtime)?;
    }
    log::info!("glb-grabber installed");
    Ok(())
}

/// Snapshot of the current view's discovered URLs, for debugging from the
/// console.
#[wasm_bindgen(js_name = discoveredURLs)]
pub fn discovered_urls() -> js_sys::Array {
    RUNTIME
        .with(|cell| cell.get().map(|rt| rt.engine.log().snapshot()))
        .unwrap_or_default()
        .into_iter()
        .map(JsValue::from)
        .collect()
}

struct TimerTicker;

impl Ticker for TimerTicker {
    fn sleep(&self, ms: u32) -> impl Future<Output = ()> {
        gloo_timers::future::TimeoutFuture::new(ms)
    }
}

/// Click on the derived control: acquire, download, and tell the user when
/// it did not work. The native control is looked up now, since the host may
/// have re-rendered it since injection.
async fn grab(runtime: Rc<Runtime>) {
    let document = match document() {
        Ok(d) => d,
        Err(e) => {
            log::error!("{e:#}");
            return;
        }
    };
    let config = runtime.engine.config();
    let native = control::find_native(&document, config);
    let page = page::BrowserPage::new(document.clone(), config, native);
    let transport = page::BrowserTransport::new(document);

    match runtime.engine.grab(&page, &transport, &TimerTicker).await {
        Ok(grabbed) => log::info!("{} -> {} ({} bytes)", grabbed.url, grabbed.filename, grabbed.bytes),
        Err(err) => match err.notice() {
            Some(notice) => {
                log::error!("{err}");
                page::alert(&notice);
            }
            None => log::debug!("{err}"),
        },
    }
}
