//! Capabilities the engine needs from the host page.

use crate::{
    classify::is_asset_url,
    discovery::{Capture, Channel},
};

/// An iframe whose document could not be read (cross-origin).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("frame {index} is not accessible: {reason}")]
pub struct FrameAccessError {
    pub index: usize,
    pub reason: String,
}

/// Read-only view of the page plus the one interaction the engine provokes.
pub trait Page {
    /// Text of the document `<title>`, if any.
    fn title(&self) -> Option<String>;

    /// `src` of every rendered viewer element, in document order.
    fn viewer_sources(&self) -> Vec<Option<String>>;

    /// Embedded model references per iframe, or why the frame was unreadable.
    fn frame_sources(&self) -> Vec<Result<Vec<String>, FrameAccessError>>;

    /// Poke the host's own viewer control so it starts loading the model.
    fn activate_viewer(&self);
}

/// First rendered viewer whose `src` is an asset URL.
pub fn rendered_asset<P: Page + ?Sized>(page: &P) -> Option<String> {
    page.viewer_sources()
        .into_iter()
        .flatten()
        .find(|src| is_asset_url(Some(src)))
}

/// Scan iframe content and feed accepted references to `capture`.
/// Returns how many were kept. Unreadable frames are skipped.
pub fn scan_frames<P: Page + ?Sized>(page: &P, capture: &Capture) -> usize {
    debug_assert_eq!(capture.channel(), Channel::FrameScan);
    let mut kept = 0;
    for frame in page.frame_sources() {
        match frame {
            Ok(refs) => {
                kept += refs.iter().filter(|r| capture.observe(Some(r))).count();
            }
            Err(e) => log::debug!("{e}"),
        }
    }
    kept
}
