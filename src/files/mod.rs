use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error};
use uuid::Uuid;

use crate::db::StoreError;

/// Where uploaded receipt images end up. The returned URL is stored on the
/// bill as-is and later rendered by the preview page.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    async fn save_receipt(
        &self,
        owner: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StoreError>;
}

/// Writes receipts below a configured directory; the directory is served
/// under `/receipts` by the router.
pub struct DiskReceiptStore {
    dir: PathBuf,
}

impl DiskReceiptStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_owned(),
        }
    }

    pub async fn init(&self) -> Result<(), anyhow::Error> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}

#[async_trait]
impl ReceiptStore for DiskReceiptStore {
    async fn save_receipt(
        &self,
        owner: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StoreError> {
        // The extension was validated upstream; the stored name is freshly
        // generated so client file names never reach the filesystem.
        let ext = match file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => {
                error!("Receipt file name without extension: {file_name}");
                return Err(StoreError::Internal);
            }
        };
        let stored_name = format!("{}.{ext}", Uuid::new_v4());
        let path = self.dir.join(&stored_name);

        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!("Error writing receipt {} for {owner}: {e}", path.display());
            StoreError::Internal
        })?;

        debug!("stored receipt {stored_name} for {owner}");
        Ok(format!("/receipts/{stored_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_bytes_and_returns_a_receipts_url() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DiskReceiptStore::new(tmp.path());
        store.init().await.expect("init");

        let url = store
            .save_receipt("a@a", "Facture.JPG", b"image bytes")
            .await
            .expect("save");

        let stored_name = url.strip_prefix("/receipts/").expect("url prefix");
        assert!(stored_name.ends_with(".jpg"), "extension lowered: {url}");

        let on_disk = std::fs::read(tmp.path().join(stored_name)).expect("read back");
        assert_eq!(on_disk, b"image bytes");
    }

    #[tokio::test]
    async fn refuses_names_without_extension() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = DiskReceiptStore::new(tmp.path());
        store.init().await.expect("init");

        let err = store
            .save_receipt("a@a", "receipt", b"")
            .await
            .expect_err("no extension");
        assert_eq!(err, StoreError::Internal);
    }
}
