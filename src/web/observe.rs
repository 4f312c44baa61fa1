//! DOM observers: navigation, viewer insertion, viewer `src` changes.

use std::rc::Rc;

use anyhow::Context;
use js_sys::Array;
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Element, MutationObserver, MutationRecord, Node};

use super::{Runtime, control, document, element_list, js_err, options};
use crate::discovery::{Capture, Channel};

type MutationCallback = Closure<dyn FnMut(Array, MutationObserver)>;

pub(super) fn on_dom_ready(runtime: &Rc<Runtime>) -> anyhow::Result<()> {
    control::schedule_injection(runtime);
    watch_navigation(runtime).context("watching navigation")?;
    watch_viewers(runtime).context("watching viewers")?;
    Ok(())
}

fn observe(target: &Node, callback: MutationCallback, init: &[(&str, JsValue)]) -> Result<(), JsValue> {
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    observer.observe_with_options(target, &options(init)?.unchecked_into())?;
    // Observers stay attached for the page's lifetime.
    callback.forget();
    Ok(())
}

/// Any mutation may be the host's router swapping the view; compare the
/// location and start a new view when it moved. Within a view, a mutation may
/// be the host re-rendering its control, so the derived one is re-checked.
fn watch_navigation(runtime: &Rc<Runtime>) -> anyhow::Result<()> {
    let document = document()?;
    let location = document.location().context("document has no location")?;
    let rt = Rc::clone(runtime);
    let callback = MutationCallback::new(move |_: Array, _: MutationObserver| {
        let Ok(href) = location.href() else { return };
        let navigated = rt.lifecycle.borrow_mut().observe_location(&href).is_some();
        if navigated {
            control::schedule_injection(&rt);
        } else {
            control::ensure_now(&rt);
        }
    });
    observe(
        &document,
        callback,
        &[("childList", JsValue::TRUE), ("subtree", JsValue::TRUE)],
    )
    .map_err(js_err)
}

/// Attach an attribute observer to every viewer, present now or inserted later.
fn watch_viewers(runtime: &Rc<Runtime>) -> anyhow::Result<()> {
    let document = document()?;
    let Some(body) = document.body() else {
        log::warn!("document has no body, viewer observation disabled");
        return Ok(());
    };
    let selector = runtime.engine.config().viewer_selector.clone();

    for viewer in query_all(&body, &selector) {
        watch_viewer(runtime, viewer);
    }

    let rt = Rc::clone(runtime);
    let callback = MutationCallback::new(move |records: Array, _: MutationObserver| {
        for record in records.iter() {
            let record: MutationRecord = record.unchecked_into();
            for element in element_list(&record.added_nodes()) {
                if element.matches(&selector).unwrap_or(false) {
                    watch_viewer(&rt, element.clone());
                }
                for viewer in query_all(&element, &selector) {
                    watch_viewer(&rt, viewer);
                }
            }
        }
    });
    observe(
        &body,
        callback,
        &[("childList", JsValue::TRUE), ("subtree", JsValue::TRUE)],
    )
    .map_err(js_err)
}

fn query_all(root: &Element, selector: &str) -> Vec<Element> {
    root.query_selector_all(selector)
        .map(|nodes| element_list(&nodes))
        .unwrap_or_default()
}

/// Report the viewer's current `src`, then every later change to it.
fn watch_viewer(runtime: &Rc<Runtime>, viewer: Element) {
    if runtime.watched_viewers.has(&viewer) {
        return;
    }
    runtime.watched_viewers.add(&viewer);

    let capture: Capture = runtime.engine.log().capture(Channel::ViewerAttribute);
    capture.observe(viewer.get_attribute("src").as_deref());

    let target = viewer.clone();
    let callback = MutationCallback::new(move |records: Array, _: MutationObserver| {
        for record in records.iter() {
            let record: MutationRecord = record.unchecked_into();
            if record.attribute_name().as_deref() == Some("src") {
                capture.observe(target.get_attribute("src").as_deref());
            }
        }
    });
    let filter = Array::of1(&JsValue::from_str("src"));
    if let Err(e) = observe(
        &viewer,
        callback,
        &[("attributes", JsValue::TRUE), ("attributeFilter", filter.into())],
    ) {
        log::debug!("could not observe viewer: {e:?}");
    }
}
