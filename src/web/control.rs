//! The injected download control: a restyled clone of the host's own
//! viewer button that keeps mirroring its state.

use std::rc::Rc;

use gloo_timers::future::TimeoutFuture;
use js_sys::Array;
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Document, Element, Event, HtmlElement, MutationObserver};

use super::{Runtime, document, element_list, grab, options};
use crate::{
    config::Config,
    lifecycle::{ControlHost, InjectionRetry, RetryStep, ensure_control},
    locale::label_for,
};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const DOWNLOAD_GLYPH: &str = "M19 9h-4V3H9v6H5l7 7 7-7zM5 18v2h14v-2H5z";
const MIRRORED: [&str; 3] = ["class", "disabled", "aria-disabled"];

type MirrorCallback = Closure<dyn FnMut(Array, MutationObserver)>;

/// The native control the derived one currently mirrors. Dropping it
/// disconnects the mirror observer.
pub(super) struct Binding {
    native: HtmlElement,
    observer: MutationObserver,
    _mirror: MirrorCallback,
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// The host's native viewer control, looked up fresh from the document. The
/// derived control copies the native classes, so it is skipped by id.
pub(super) fn find_native(document: &Document, config: &Config) -> Option<HtmlElement> {
    let nodes = document.query_selector_all(&config.native_selector).ok()?;
    element_list(&nodes)
        .into_iter()
        .find(|el| el.id() != config.control_id)
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
}

struct BrowserControls {
    runtime: Rc<Runtime>,
    document: Document,
}

impl ControlHost for BrowserControls {
    type Native = HtmlElement;

    fn native_control(&self) -> Option<HtmlElement> {
        find_native(&self.document, self.runtime.engine.config())
    }

    fn derived_present(&self) -> bool {
        self.derived().is_some()
    }

    fn bound_to(&self, native: &HtmlElement) -> bool {
        self.runtime
            .binding
            .borrow()
            .as_ref()
            .is_some_and(|b| b.native.is_same_node(Some(native)))
    }

    fn insert_derived(&self, native: HtmlElement) {
        if let Err(e) = self.insert(&native) {
            log::error!("could not inject the download control: {e:?}");
        }
    }

    fn rebind(&self, native: HtmlElement) {
        let Some(derived) = self.derived() else { return };
        match self.bind(&native, &derived) {
            Ok(()) => log::debug!("download control follows the re-rendered native control"),
            Err(e) => log::error!("could not rebind the download control: {e:?}"),
        }
    }
}

impl BrowserControls {
    fn derived(&self) -> Option<HtmlElement> {
        let id = &self.runtime.engine.config().control_id;
        self.document
            .get_element_by_id(id)
            .and_then(|el| el.dyn_into::<HtmlElement>().ok())
    }

    fn insert(&self, native: &HtmlElement) -> Result<(), JsValue> {
        let derived = self.derive(native)?;
        let parent = native
            .parent_node()
            .ok_or_else(|| JsValue::from_str("native control is detached"))?;
        parent.insert_before(&derived, native.next_sibling().as_ref())?;
        self.bind(native, &derived)?;

        log::info!("download control injected");
        Ok(())
    }

    /// Mirror `native` onto `derived` now and on every later state change,
    /// replacing any previous binding.
    fn bind(&self, native: &HtmlElement, derived: &HtmlElement) -> Result<(), JsValue> {
        let id = self.runtime.engine.config().control_id.clone();
        mirror(native, derived, &id);

        let (source, target) = (native.clone(), derived.clone());
        let callback = MirrorCallback::new(move |_: Array, _: MutationObserver| {
            mirror(&source, &target, &id);
        });
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        let filter: Array = MIRRORED.iter().map(|a| JsValue::from_str(a)).collect();
        let init = options(&[("attributes", JsValue::TRUE), ("attributeFilter", filter.into())])?;
        observer.observe_with_options(native, init.unchecked_ref())?;

        *self.runtime.binding.borrow_mut() = Some(Binding {
            native: native.clone(),
            observer,
            _mirror: callback,
        });
        Ok(())
    }

    fn derive(&self, native: &HtmlElement) -> Result<HtmlElement, JsValue> {
        let config = self.runtime.engine.config();
        let href = self.document.location().and_then(|l| l.href().ok()).unwrap_or_default();
        let label = label_for(&href);

        let btn: HtmlElement = native.clone_node_with_deep(true)?.dyn_into()?;
        btn.set_id(&config.control_id);
        btn.set_attribute("type", "button")?;
        btn.set_attribute("aria-label", label)?;
        btn.set_attribute("data-automation-id", "pip-download-3d")?;

        let label_el = match btn.query_selector(".pip-btn__label")? {
            Some(el) => Some(el),
            None => btn.query_selector("[class*=\"btn__label\"]")?,
        };
        match label_el {
            Some(el) => el.set_text_content(Some(label)),
            None => btn.set_text_content(Some(label)),
        }
        self.set_icon(&btn)?;

        // The native control is resolved at click time; the one cloned here
        // may be gone by then.
        btn.remove_attribute("onclick")?;
        let runtime = Rc::clone(&self.runtime);
        let on_click = Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
            ev.prevent_default();
            ev.stop_propagation();
            crate::execute(grab(Rc::clone(&runtime)));
        });
        btn.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        on_click.forget();

        Ok(btn)
    }

    /// Replace (or add) the button's icon with a download glyph.
    fn set_icon(&self, btn: &HtmlElement) -> Result<(), JsValue> {
        let svg = match btn.query_selector("svg")? {
            Some(svg) => svg,
            None => {
                let svg = self.document.create_element_ns(Some(SVG_NS), "svg")?;
                let inner: Element = match btn.query_selector(".pip-btn__inner")? {
                    Some(inner) => inner,
                    None => btn.clone().into(),
                };
                inner.insert_before(&svg, inner.first_child().as_ref())?;
                svg
            }
        };
        for (name, value) in [("viewBox", "0 0 24 24"), ("width", "24"), ("height", "24"), ("aria-hidden", "true")] {
            svg.set_attribute(name, value)?;
        }
        svg.class_list().add_2("pip-svg-icon", "pip-btn__icon")?;
        while let Some(child) = svg.first_child() {
            svg.remove_child(&child)?;
        }
        let path = self.document.create_element_ns(Some(SVG_NS), "path")?;
        path.set_attribute("d", DOWNLOAD_GLYPH)?;
        svg.append_child(&path)?;
        Ok(())
    }
}

/// Copy enabled state and styling from the native control, keeping our id.
fn mirror(native: &HtmlElement, derived: &HtmlElement, id: &str) {
    derived.set_class_name(&native.class_name());
    derived.set_id(id);
    for attr in ["disabled", "aria-disabled"] {
        let copied = match native.get_attribute(attr) {
            Some(value) => derived.set_attribute(attr, &value),
            None => derived.remove_attribute(attr),
        };
        if let Err(e) = copied {
            log::debug!("mirroring `{attr}` failed: {e:?}");
        }
    }
}

/// Re-inject or rebind after a DOM change within the current view. Cheap
/// when the control is already in place.
pub(super) fn ensure_now(runtime: &Rc<Runtime>) {
    let Ok(document) = document() else { return };
    ensure_control(&BrowserControls { runtime: Rc::clone(runtime), document });
}

/// Inject the control for the current view, retrying while the host has not
/// rendered its own control yet.
pub(super) fn schedule_injection(runtime: &Rc<Runtime>) {
    let runtime = Rc::clone(runtime);
    crate::execute(async move {
        let document = match document() {
            Ok(d) => d,
            Err(e) => {
                log::error!("{e:#}");
                return;
            }
        };
        let log = runtime.engine.log().clone();
        let mut retry = InjectionRetry::new(log.generation(), runtime.engine.config());
        let host = BrowserControls { runtime, document };
        loop {
            match retry.attempt(&host, &log) {
                RetryStep::RetryAfter(ms) => TimeoutFuture::new(ms).await,
                RetryStep::Done | RetryStep::GiveUp => break,
            }
        }
    });
}
