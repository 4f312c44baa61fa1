//! Fetch a resolved asset and hand it to the save capability.

use std::future::Future;

use crate::{config::Naming, error::GrabResult, filename::derive_filename};

/// Byte fetch and save-as, provided by the host environment.
pub trait Transport {
    /// Fetch the payload at `url`. Non-success responses are errors.
    fn fetch(&self, url: &str) -> impl Future<Output = GrabResult<Vec<u8>>>;

    /// Save `bytes` under `filename` as an opaque binary file.
    fn save(&self, bytes: &[u8], filename: &str) -> GrabResult<()>;
}

/// What will be downloaded and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub url: String,
    pub filename: String,
}

impl DownloadPlan {
    pub fn new(url: String, title: Option<&str>, naming: &Naming) -> Self {
        let filename = derive_filename(title, &url, naming);
        Self { url, filename }
    }
}

/// Fetch then save. No retry: the first failure is returned to the caller.
pub async fn download<T: Transport + ?Sized>(transport: &T, plan: &DownloadPlan) -> GrabResult<usize> {
    log::info!("downloading {} as {:?}", plan.url, plan.filename);
    let bytes = transport.fetch(&plan.url).await?;
    transport.save(&bytes, &plan.filename)?;
    log::info!("saved {:?} ({} bytes)", plan.filename, bytes.len());
    Ok(bytes.len())
}


#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::{fake::FakeTransport, *};
    use crate::error::GrabError;

    #[test]
    fn fetches_and_saves_under_derived_name() {
        let url = "https://x/assets/12345_abc.glb";
        let transport = FakeTransport::serving(url, b"glTF\x02\x00\x00\x00");
        let plan = DownloadPlan::new(url.into(), Some("Blue Chair, Oak - IKEA"), &Naming::default());

        let size = block_on(download(&transport, &plan)).unwrap();
        assert_eq!(size, 8);
        assert_eq!(
            transport.saved.borrow().as_slice(),
            &[("Blue Chair - Oak (12345).glb".to_owned(), 8)]
        );
    }

    #[test]
    fn fetch_failure_saves_nothing() {
        let transport = FakeTransport::default();
        let plan = DownloadPlan::new("https://x/1_a.glb".into(), None, &Naming::default());

        let err = block_on(download(&transport, &plan)).unwrap_err();
        assert!(matches!(err, GrabError::Fetch(ref reason) if reason.contains("404")));
        assert_eq!(transport.fetched.borrow().len(), 1);
        assert!(transport.saved.borrow().is_empty());
    }
}
