use gloo_timers::callback::Timeout;
use js_sys::{Array, Reflect, Uint8Array};
use wasm_bindgen::{JsCast, prelude::*};
use web_sys::{Blob, Document, Element, HtmlAnchorElement, HtmlElement, Url};

use super::{element_list, options, window};
use crate::{
    classify::model_reference,
    config::Config,
    download::Transport,
    error::{GrabError, GrabResult},
    page::{FrameAccessError, Page},
};

/// Object URLs outlive the anchor click by this much; some browsers start
/// the download only after the click handler returns.
const REVOKE_AFTER_MS: u32 = 40_000;

/// The live document, plus the native control that activates the viewer.
pub(super) struct BrowserPage<'a> {
    document: Document,
    config: &'a Config,
    native: Option<HtmlElement>,
}

impl<'a> BrowserPage<'a> {
    pub fn new(document: Document, config: &'a Config, native: Option<HtmlElement>) -> Self {
        Self { document, config, native }
    }
}

fn elements(root: &Document, selector: &str) -> Result<Vec<Element>, JsValue> {
    Ok(element_list(&root.query_selector_all(selector)?))
}

impl Page for BrowserPage<'_> {
    fn title(&self) -> Option<String> {
        self.document
            .query_selector("title")
            .ok()
            .flatten()
            .and_then(|t| t.text_content())
    }

    fn viewer_sources(&self) -> Vec<Option<String>> {
        elements(&self.document, &self.config.viewer_selector)
            .unwrap_or_default()
            .iter()
            .map(|v| v.get_attribute("src"))
            .collect()
    }

    fn frame_sources(&self) -> Vec<Result<Vec<String>, FrameAccessError>> {
        let frames = elements(&self.document, "iframe").unwrap_or_default();
        frames
            .iter()
            .enumerate()
            .map(|(index, frame)| -> Result<Vec<String>, FrameAccessError> {
                let denied = |e: JsValue| FrameAccessError { index, reason: format!("{e:?}") };
                // Reading through Reflect turns a cross-origin throw into an Err.
                let content = Reflect::get(frame, &JsValue::from_str("contentDocument")).map_err(denied)?;
                if content.is_null() || content.is_undefined() {
                    return Ok(Vec::new());
                }
                // The frame's document belongs to the frame's realm, so an
                // `instanceof Document` check would always fail.
                let inner: &Document = content.unchecked_ref();
                let models = elements(inner, &self.config.frame_model_selector).map_err(denied)?;
                Ok(models
                    .iter()
                    .filter_map(|el| {
                        let src = el.get_attribute("src");
                        let gltf = el.get_attribute("gltf-model");
                        model_reference(src.as_deref(), gltf.as_deref()).map(str::to_owned)
                    })
                    .collect())
            })
            .collect()
    }

    fn activate_viewer(&self) {
        match &self.native {
            Some(native) => native.click(),
            None => log::warn!("native viewer control is gone, polling without activating"),
        }
    }
}

/// gloo-net fetch, and a temporary anchor click to save.
pub(super) struct BrowserTransport {
    document: Document,
}

impl BrowserTransport {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// Save through a temporary anchor. Returns the object URL, which stays
    /// valid for `REVOKE_AFTER_MS`.
    fn save_blob(&self, bytes: &[u8], filename: &str) -> Result<String, JsValue> {
        let data = Uint8Array::new_with_length(bytes.len() as u32);
        data.copy_from(bytes);
        let parts = Array::of1(&data);
        // Force a generic binary type whatever the server claimed.
        let bag = options(&[("type", JsValue::from_str("application/octet-stream"))])?;
        let blob = Blob::new_with_u8_array_sequence_and_options(&parts, bag.unchecked_ref())?;

        let href = Url::create_object_url_with_blob(&blob)?;
        let anchor: HtmlAnchorElement = self.document.create_element("a")?.dyn_into()?;
        anchor.set_href(&href);
        anchor.set_download(filename);

        let body = self.document.body().ok_or_else(|| JsValue::from_str("no body"))?;
        body.append_child(&anchor)?;
        anchor.click();
        body.remove_child(&anchor)?;

        let revoked = href.clone();
        Timeout::new(REVOKE_AFTER_MS, move || {
            if let Err(e) = Url::revoke_object_url(&revoked) {
                log::debug!("revoking {revoked} failed: {e:?}");
            }
        })
        .forget();
        Ok(href)
    }
}

impl Transport for BrowserTransport {
    async fn fetch(&self, url: &str) -> GrabResult<Vec<u8>> {
        let fetch_err = |e: gloo_net::Error| GrabError::Fetch(e.to_string());
        let response = gloo_net::http::Request::get(url).send().await.map_err(fetch_err)?;
        if !response.ok() {
            return Err(GrabError::Fetch(format!(
                "HTTP {} {}",
                response.status(),
                response.status_text()
            )));
        }
        response.binary().await.map_err(fetch_err)
    }

    fn save(&self, bytes: &[u8], filename: &str) -> GrabResult<()> {
        self.save_blob(bytes, filename).map(drop).map_err(|e| GrabError::Save {
            filename: filename.to_owned(),
            reason: format!("{e:?}"),
        })
    }
}

/// Blocking notice; the only UI surface besides the control itself.
pub(super) fn alert(message: &str) {
    match window() {
        Ok(w) => {
            if let Err(e) = w.alert_with_message(message) {
                log::error!("alert failed: {e:?}");
            }
        }
        Err(e) => log::error!("{e:#}"),
    }
}
