//! Network and resource-timing capture. Installed once, as early as possible,
//! so the viewer's first requests are seen.

use anyhow::Context;
use js_sys::{Array, Function, Reflect};
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{PerformanceEntry, PerformanceObserver, PerformanceObserverEntryList, Window};

use super::{js_err, options};
use crate::discovery::{Capture, Channel, DiscoveryLog};

// Rust closures cannot see the caller's `this`, so the delegating shell is
// JS. It ships with the module, so a CSP without `unsafe-eval` still allows it.
// The tap cannot affect the original call.
#[wasm_bindgen(inline_js = "export function tapped(tap, original, index) {
    return function () {
        try { tap(arguments[index]); } catch (_) {}
        return original.apply(this, arguments);
    };
}")]
extern "C" {
    #[wasm_bindgen(catch)]
    fn tapped(tap: &JsValue, original: &JsValue, index: u32) -> Result<JsValue, JsValue>;
}

pub(super) fn install(window: &Window, log: &DiscoveryLog) -> anyhow::Result<()> {
    wrap(window, "fetch", 0, log.capture(Channel::Network))
        .map_err(js_err)
        .context("wrapping fetch")?;

    let xhr_proto = Reflect::get(window, &JsValue::from_str("XMLHttpRequest"))
        .and_then(|xhr| Reflect::get(&xhr, &JsValue::from_str("prototype")))
        .map_err(js_err)
        .context("locating XMLHttpRequest")?;
    wrap(&xhr_proto, "open", 1, log.capture(Channel::Network))
        .map_err(js_err)
        .context("wrapping XMLHttpRequest.open")?;

    if let Err(e) = observe_resource_timing(window, log.capture(Channel::ResourceTiming)) {
        log::debug!("resource timing unavailable: {e:?}");
    }
    Ok(())
}

/// Replace `target[name]` with a wrapper that shows argument `index` to
/// `capture` and then delegates unchanged.
fn wrap(target: &JsValue, name: &str, index: u32, capture: Capture) -> Result<(), JsValue> {
    let key = JsValue::from_str(name);
    let original = Reflect::get(target, &key)?;
    if !original.is_function() {
        log::debug!("`{name}` is not a function here, not wrapping");
        return Ok(());
    }

    let tap = Closure::<dyn Fn(JsValue)>::new(move |arg: JsValue| {
        capture.observe(request_url(&arg).as_deref());
    });
    let wrapper = tapped(tap.as_ref(), &original, index)?;
    // The wrapper lives as long as the page.
    tap.forget();

    Reflect::set(target, &key, &wrapper)?;
    Ok(())
}

/// URL of a fetch/XHR target: a string, a `Request` or a `URL`.
fn request_url(arg: &JsValue) -> Option<String> {
    if let Some(url) = arg.as_string() {
        return Some(url);
    }
    if let Some(request) = arg.dyn_ref::<web_sys::Request>() {
        return Some(request.url());
    }
    arg.dyn_ref::<web_sys::Url>().map(web_sys::Url::href)
}

fn observe_resource_timing(window: &Window, capture: Capture) -> Result<(), JsValue> {
    if !Reflect::has(window, &JsValue::from_str("PerformanceObserver"))? {
        return Err(JsValue::from_str("PerformanceObserver is not supported"));
    }

    let callback = Closure::<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>::new(
        move |list: PerformanceObserverEntryList, _: PerformanceObserver| {
            for entry in list.get_entries().iter() {
                if let Ok(entry) = entry.dyn_into::<PerformanceEntry>() {
                    capture.observe(Some(&entry.name()));
                }
            }
        },
    );
    let observer = PerformanceObserver::new(callback.as_ref().unchecked_ref())?;

    let entry_types = Array::of1(&JsValue::from_str("resource"));
    let init = options(&[("entryTypes", entry_types.into())])?;
    let observe: Function = Reflect::get(&observer, &JsValue::from_str("observe"))?.dyn_into()?;
    observe.call1(&observer, &init)?;

    callback.forget();
    Ok(())
}
