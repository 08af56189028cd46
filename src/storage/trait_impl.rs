//! [`BaselineStore`] implementation for [`SqliteBaselineStore`].

use async_trait::async_trait;

use crate::baseline::BaselineRecord;
use crate::error::StorageError;
use crate::traits::{BaselineStore, StoredBaseline};

use super::core::SqliteBaselineStore;

#[async_trait]
impl BaselineStore for SqliteBaselineStore {
    async fn save(&self, record: &BaselineRecord) -> Result<StoredBaseline, StorageError> {
        self.save_baseline(record).await
    }

    async fn load(&self, id: &str) -> Result<BaselineRecord, StorageError> {
        self.load_baseline(id).await
    }

    async fn load_latest(&self) -> Result<Option<BaselineRecord>, StorageError> {
        self.load_latest_baseline().await
    }

    async fn list(&self, limit: u32) -> Result<Vec<StoredBaseline>, StorageError> {
        self.list_baselines(limit).await
    }
}
