use std::sync::Arc;

use ario_gateway_data_source::{CompositeDataSource, GetDataRequest};
use ario_gateway_primitives::Id;
use camino::Utf8PathBuf;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::BundlesError;

/// Streams a bundle's bytes into a local temp sink (spec §4.5
/// "Processing"), via the composite data source's background ordering
/// (`getData` on the verification/unbundling path, not the reader path).
pub struct BundleDownloader {
    data_source: Arc<CompositeDataSource>,
    spool_dir: Utf8PathBuf,
}

impl BundleDownloader {
    #[must_use]
    pub fn new(data_source: Arc<CompositeDataSource>, spool_dir: Utf8PathBuf) -> Self {
        Self {
            data_source,
            spool_dir,
        }
    }

    /// Fetches the whole bundle and writes it to `{spool_dir}/{id}.bundle`,
    /// returning the spooled path.
    pub async fn download(&self, id: Id) -> Result<Utf8PathBuf, BundlesError> {
        let response = self
            .data_source
            .get_data_background(&GetDataRequest::whole(id))
            .await?;

        let path = self.spool_dir.join(format!("{}.bundle", id.to_base64url()));
        let mut file = tokio::fs::File::create(path.as_std_path()).await?;
        let mut stream = response.stream;
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(path)
    }
}
